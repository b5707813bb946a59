use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use updrop::error::ErrorKind;
use updrop::{Config, QueueState, SelectionPayload, TaskStatus, TransportHandle, UploadPipeline};
use updrop_source::tree::{MockFile, MockTree};
use updrop_transport::backend::{Behavior, MockTransport};

const TIMEOUT: Duration = Duration::from_secs(5);

fn pipeline(transport: &Arc<MockTransport>, concurrency: usize) -> UploadPipeline<MockFile> {
    let handle: TransportHandle<MockFile> = transport.clone();
    UploadPipeline::new(handle, concurrency)
}

fn selection(items: &[&str]) -> SelectionPayload<String> {
    items.iter().map(|item| item.to_string()).collect()
}

async fn until(pipeline: &UploadPipeline<MockFile>, condition: impl FnMut(&QueueState) -> bool) {
    let mut state = pipeline.subscribe();
    tokio::time::timeout(TIMEOUT, state.wait_for(condition)).await.unwrap().unwrap();
}

fn relative_paths(pipeline: &UploadPipeline<MockFile>) -> Vec<String> {
    pipeline.store().snapshot().tasks().iter().map(|t| t.relative_path().to_string()).collect()
}

#[rstest]
#[case::flat_files(&["a.png", "b.png"], &["a.png", "b.png"], &["a.png", "b.png"])]
#[case::folder(&["Photos"], &["Photos/x.jpg", "Photos/2023/y.jpg"], &["x.jpg", "y.jpg"])]
#[tokio::test]
async fn selection_becomes_pending_tasks(#[case] items: &[&str], #[case] paths: &[&str], #[case] names: &[&str]) {
    let tree = MockTree::default()
        .with_file("a.png", "a")
        .with_file("b.png", "b")
        .with_file("Photos/x.jpg", "x")
        .with_file("Photos/2023/y.jpg", "y");
    let transport = Arc::new(MockTransport::with_default(Behavior::hold()));
    let pipeline = pipeline(&transport, 3);

    let ids = pipeline.submit(&tree, &selection(items)).await.unwrap();
    assert_eq!(ids.len(), paths.len());
    let state = pipeline.store().snapshot();
    assert!(state.panel_visible());
    assert_eq!(relative_paths(&pipeline), paths);
    let file_names: Vec<&str> = state.tasks().iter().map(|t| t.file_name()).collect();
    assert_eq!(file_names, names);
    assert!(state.tasks().iter().all(|t| t.progress_percent() == 0));

    transport.release(paths.len());
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();
    assert_eq!(pipeline.store().summary().done, paths.len());
}

#[tokio::test]
async fn paged_directory_is_read_completely() {
    let mut tree = MockTree::default().with_page_size(100);
    for i in 0..150 {
        tree = tree.with_file(format!("Big/{i:03}.bin"), vec![0u8; 4]);
    }
    let transport = Arc::new(MockTransport::new());
    let pipeline = pipeline(&transport, 3);

    let ids = pipeline.submit(&tree, &selection(&["Big"])).await.unwrap();
    assert_eq!(ids.len(), 150);
    // Two full-ish pages and the empty page that ends the listing.
    assert_eq!(tree.pages_read(), 3);
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();
    assert_eq!(pipeline.store().summary().done, 150);
}

#[tokio::test]
async fn unsupported_tree_falls_back_to_plain_files() {
    let tree = MockTree::default().with_file("a.png", "a").with_file("Photos/x.jpg", "x").unsupported();
    let transport = Arc::new(MockTransport::new());
    let pipeline = pipeline(&transport, 3);

    pipeline.submit(&tree, &selection(&["a.png", "Photos"])).await.unwrap();
    assert_eq!(relative_paths(&pipeline), ["a.png"]);
}

#[tokio::test]
async fn empty_selection_leaves_the_panel_closed() {
    let tree = MockTree::default().with_dir("Empty");
    let transport = Arc::new(MockTransport::new());
    let pipeline = pipeline(&transport, 3);

    let ids = pipeline.submit(&tree, &selection(&["Empty"])).await.unwrap();
    assert!(ids.is_empty());
    assert!(!pipeline.store().snapshot().panel_visible());
}

#[tokio::test]
async fn progress_is_visible_while_uploading() {
    let tree = MockTree::default().with_file("a.png", "a");
    let transport = Arc::new(MockTransport::with_default(Behavior::Hold { progress: vec![42] }));
    let pipeline = pipeline(&transport, 3);

    let ids = pipeline.submit(&tree, &selection(&["a.png"])).await.unwrap();
    until(&pipeline, |s| s.task(ids[0]).is_some_and(|t| t.progress_percent() == 42)).await;
    let task = pipeline.store().task(ids[0]).unwrap();
    assert_eq!(task.status(), TaskStatus::Uploading);
    assert!(task.is_cancellable());

    // The panel can't be closed while something is uploading.
    let err = pipeline.close_panel().unwrap_err();
    assert_eq!(&*err, &ErrorKind::Queue);

    transport.release(1);
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();
    pipeline.close_panel().unwrap();
    assert!(!pipeline.store().snapshot().panel_visible());
}

#[tokio::test]
async fn one_failure_among_five() {
    let tree = ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"]
        .into_iter()
        .fold(MockTree::default(), |tree, name| tree.with_file(name, name));
    let transport =
        Arc::new(MockTransport::new().with_path("3.txt", Behavior::Fail("network unreachable".to_string())));
    let pipeline = pipeline(&transport, 3);

    pipeline.submit(&tree, &selection(&["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"])).await.unwrap();
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();

    let state = pipeline.store().snapshot();
    for task in state.tasks() {
        if task.relative_path() == "3.txt" {
            assert_eq!(task.status(), TaskStatus::Error);
            assert_eq!(task.error_message(), Some("network error: network unreachable"));
        } else {
            assert_eq!(task.status(), TaskStatus::Done);
            assert_eq!(task.error_message(), None);
        }
    }
}

#[tokio::test]
async fn cancel_all_then_clear_finished() {
    let mut tree = MockTree::default();
    for i in 0..10 {
        tree = tree.with_file(format!("Drop/{i}.bin"), "x");
    }
    let transport = Arc::new(MockTransport::with_default(Behavior::hold()));
    let pipeline = pipeline(&transport, 4);

    pipeline.submit(&tree, &selection(&["Drop"])).await.unwrap();
    until(&pipeline, |s| s.summary().uploading == 4).await;
    assert_eq!(pipeline.store().summary().pending, 6);

    assert_eq!(pipeline.cancel_all(), 10);
    assert_eq!(pipeline.store().summary().cancelled, 10);
    assert_eq!(pipeline.clear_finished(), 10);
    assert!(pipeline.store().snapshot().tasks().is_empty());
}

#[tokio::test]
async fn cancelled_upload_stays_cancelled() {
    let tree = MockTree::default().with_file("a.png", "a").with_file("b.png", "b");
    // b.png only starts once a.png's slot has been released and handled.
    let transport = Arc::new(MockTransport::with_default(Behavior::hold()).with_path("b.png", Behavior::Succeed));
    let pipeline = pipeline(&transport, 1);

    let ids = pipeline.submit(&tree, &selection(&["a.png", "b.png"])).await.unwrap();
    until(&pipeline, |s| s.task(ids[0]).is_some_and(|t| t.status() == TaskStatus::Uploading)).await;
    assert!(pipeline.cancel_task(ids[0]));
    transport.release(1);

    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();
    assert_eq!(pipeline.store().task(ids[0]).unwrap().status(), TaskStatus::Cancelled);
    assert_eq!(pipeline.store().task(ids[1]).unwrap().status(), TaskStatus::Done);
}

#[tokio::test]
async fn removal_is_idempotent() {
    let tree = MockTree::default().with_file("a.png", "a");
    let transport = Arc::new(MockTransport::new());
    let pipeline = pipeline(&transport, 1);

    let ids = pipeline.submit(&tree, &selection(&["a.png"])).await.unwrap();
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();
    assert!(pipeline.remove_task(ids[0]));
    assert!(!pipeline.remove_task(ids[0]));
    assert!(!pipeline.cancel_task(ids[0]));
    assert!(pipeline.store().task(ids[0]).is_none());
}

#[tokio::test]
async fn local_pipeline_copies_a_folder() {
    let source = tempfile::TempDir::new().unwrap();
    let destination = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(source.path().join("Photos/2023")).unwrap();
    std::fs::write(source.path().join("Photos/x.jpg"), b"x").unwrap();
    std::fs::write(source.path().join("Photos/2023/y.jpg"), b"yy").unwrap();

    let config = Config { page_size: 1, destination: Some(destination.path().to_path_buf()), ..Config::default() };
    let (pipeline, tree) = UploadPipeline::local(&config).unwrap();
    let ids = pipeline.submit(&tree, &SelectionPayload::new([source.path().join("Photos")])).await.unwrap();
    assert_eq!(ids.len(), 2);
    tokio::time::timeout(TIMEOUT, pipeline.wait_idle()).await.unwrap();

    assert_eq!(pipeline.store().summary().done, 2);
    assert_eq!(std::fs::read(destination.path().join("Photos/x.jpg")).unwrap(), b"x");
    assert_eq!(std::fs::read(destination.path().join("Photos/2023/y.jpg")).unwrap(), b"yy");
    let mut server_paths: Vec<String> =
        pipeline.store().snapshot().tasks().iter().filter_map(|t| t.server_path().map(str::to_string)).collect();
    server_paths.sort();
    assert_eq!(server_paths, ["Photos/2023/y.jpg", "Photos/x.jpg"]);
}

#[tokio::test]
async fn local_pipeline_needs_a_destination() {
    let err = UploadPipeline::local(&Config::default()).err().unwrap();
    assert_eq!(&*err, &ErrorKind::Config);
}
