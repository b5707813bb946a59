//! Relative path validation for destinations.

use crate::error::{ErrorKind, Result};
use updrop_source::SEPARATOR;

/// Normalizes a slash-separated relative path and makes sure it can't leave
/// the destination root.
///
/// Empty and `.` components are dropped, `..` pops the previous component
/// (and is rejected when there is none). Null bytes, backslashes and drive
/// prefixes are rejected outright.
///
/// # Examples
///
/// ```
/// use updrop_transport::validate_path;
///
/// assert_eq!(validate_path("Photos//2023/./y.jpg").unwrap(), "Photos/2023/y.jpg");
/// assert_eq!(validate_path("a/../b.txt").unwrap(), "b.txt");
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("").is_err());
/// ```
pub fn validate(path: &str) -> Result<String> {
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_string()));
    let mut components: Vec<&str> = Vec::new();
    for component in path.split(SEPARATOR) {
        match component {
            "" | "." => {},
            ".." => {
                components.pop().ok_or_else(invalid)?;
            },
            c if c.contains(['\0', '\\', ':']) => return Err(invalid()),
            c => components.push(c),
        }
    }
    if components.is_empty() {
        return Err(invalid());
    }
    Ok(components.join("/"))
}
