use common::ResourceKind;
use drive::{ErrorKind, StorageError, StorageService, UploadItem};
use std::io::{Cursor, Read};
use std::sync::Arc;
use storage::{stream, MemoryObjectStore, ObjectStore, StoreOperation};

const USER: u64 = 1;
const OTHER_USER: u64 = 2;

fn setup() -> (StorageService, MemoryObjectStore) {
    let store = MemoryObjectStore::new();
    let service = StorageService::new(Arc::new(store.clone()), 4);
    (service, store)
}

fn item(name: &str, content: &'static str) -> UploadItem {
    UploadItem {
        name: name.to_string(),
        content: stream::from_bytes(content),
        size: content.len() as u64,
        content_type: Some("text/plain".to_string()),
    }
}

async fn upload(service: &StorageService, user_id: u64, dir: &str, files: &[(&str, &'static str)]) {
    let items = files.iter().map(|(name, content)| item(name, content)).collect();
    service.upload_batch(dir, user_id, items).await.unwrap();
}

fn keys_under(store: &MemoryObjectStore, prefix: &str) -> Vec<String> {
    store
        .keys()
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .collect()
}

#[tokio::test]
async fn test_get_root_and_missing() {
    let (service, _) = setup();

    let root = service.get_resource("", USER).await.unwrap();
    assert_eq!(root.name, "root");
    assert_eq!(root.path, "");
    assert_eq!(root.kind, ResourceKind::Directory);

    let error = service.get_resource("nope.txt", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    let error = service.get_resource("a/../b", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidPath);
}

#[tokio::test]
async fn test_create_directory_twice() {
    let (service, _) = setup();

    let created = service.create_directory("docs", USER).await.unwrap();
    assert_eq!(created.name, "docs");
    assert_eq!(created.path, "");
    assert_eq!(created.kind, ResourceKind::Directory);

    let error = service.create_directory("/docs/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);

    let error = service.create_directory("", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn test_create_directory_missing_parent() {
    let (service, store) = setup();

    let error = service.create_directory("a/b/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(store.keys().is_empty());

    service.create_directory("a", USER).await.unwrap();
    let nested = service.create_directory("a/b", USER).await.unwrap();
    assert_eq!(nested.path, "a/");
    assert_eq!(nested.name, "b");
}

#[tokio::test]
async fn test_get_resource_falls_back_to_directory() {
    let (service, _) = setup();
    service.create_directory("photos", USER).await.unwrap();
    upload(&service, USER, "photos", &[("cat.png", "meow")]).await;

    let dir = service.get_resource("photos", USER).await.unwrap();
    assert_eq!(dir.kind, ResourceKind::Directory);
    assert_eq!(dir.size, None);

    let file = service.get_resource("/photos//cat.png", USER).await.unwrap();
    assert_eq!(file.kind, ResourceKind::File);
    assert_eq!(file.path, "photos/");
    assert_eq!(file.size, Some(4));

    let error = service.get_resource("photos/cat.png/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_directory() {
    let (service, store) = setup();
    service.create_directory("docs", USER).await.unwrap();
    upload(
        &service,
        USER,
        "docs",
        &[("a.txt", "a"), ("deep/b.txt", "bb"), ("deep/c.txt", "ccc")],
    )
    .await;
    // Directory implied only by a deeper key
    store
        .put("user-1-files/docs/implied/d.txt", stream::from_bytes("d"), 1, None)
        .await
        .unwrap();

    let listing = service.list_directory("docs", USER).await.unwrap();
    let names: Vec<(&str, ResourceKind)> = listing
        .iter()
        .map(|d| (d.name.as_str(), d.kind))
        .collect();
    assert_eq!(
        names,
        vec![
            ("a.txt", ResourceKind::File),
            ("deep", ResourceKind::Directory),
            ("implied", ResourceKind::Directory),
        ]
    );
    assert!(listing.iter().all(|d| d.path == "docs/"));

    let root = service.list_directory("", USER).await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].name, "docs");

    let error = service.list_directory("missing", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_upload_with_existing_name() {
    let (service, store) = setup();
    upload(&service, USER, "", &[("b.txt", "old")]).await;

    let items = vec![item("a.txt", "a"), item("b.txt", "new"), item("c.txt", "c")];
    let error = service.upload_batch("", USER, items).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert_eq!(error.root_cause().kind(), ErrorKind::AlreadyExists);

    let keys = keys_under(&store, "user-1-files/");
    assert_eq!(
        keys,
        vec!["user-1-files/a.txt", "user-1-files/b.txt", "user-1-files/c.txt"]
    );
    // The existing object is untouched
    assert_eq!(store.stat("user-1-files/b.txt").await.unwrap(), 3);
    let content = stream::collect(
        "user-1-files/b.txt",
        store.get_stream("user-1-files/b.txt").await.unwrap(),
        3,
    )
    .await
    .unwrap();
    assert_eq!(&content[..], b"old");
}

#[tokio::test]
async fn test_upload_validation_happens_before_store_calls() {
    let (service, store) = setup();

    let error = service.upload_batch("", USER, Vec::new()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);

    let items = vec![item("a.txt", "a"), item("/a.txt", "b")];
    let error = service.upload_batch("", USER, items).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);

    let items = vec![item("a.txt", "a"), item("../escape.txt", "b")];
    let error = service.upload_batch("", USER, items).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidPath);

    let items = vec![item("  ", "a")];
    let error = service.upload_batch("", USER, items).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);

    let error = service
        .upload_batch("missing/deeper", USER, vec![item("a.txt", "a")])
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    // A name cannot be both a file and a directory within one batch
    let items = vec![item("a", "a"), item("a/b.txt", "b")];
    let error = service.upload_batch("", USER, items).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);

    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_upload_creates_missing_target_directory() {
    let (service, store) = setup();

    let uploaded = service
        .upload_batch("newdir", USER, vec![item("a.txt", "a")])
        .await
        .unwrap();
    assert_eq!(uploaded[0].path, "newdir/");
    assert_eq!(
        keys_under(&store, "user-1-files/"),
        vec!["user-1-files/newdir/", "user-1-files/newdir/a.txt"]
    );

    let dir = service.get_resource("newdir", USER).await.unwrap();
    assert_eq!(dir.kind, ResourceKind::Directory);
    assert_eq!(service.list_directory("newdir", USER).await.unwrap().len(), 1);

    service.delete_resource("newdir", USER).await.unwrap();
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_upload_directory_cannot_shadow_file() {
    let (service, store) = setup();
    upload(&service, USER, "", &[("album", "not a folder")]).await;

    let error = service
        .upload_batch("", USER, vec![item("album/x.jpg", "x")])
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);

    let error = service
        .upload_batch("album", USER, vec![item("x.jpg", "x")])
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);

    assert_eq!(keys_under(&store, "user-1-files/"), vec!["user-1-files/album"]);
    let file = service.get_resource("album", USER).await.unwrap();
    assert_eq!(file.kind, ResourceKind::File);

    // And a file cannot take the name of an existing directory
    service.create_directory("photos", USER).await.unwrap();
    let error = service
        .upload_batch("", USER, vec![item("photos", "p")])
        .await
        .unwrap_err();
    assert_eq!(error.root_cause().kind(), ErrorKind::AlreadyExists);
    assert!(!store.exists("user-1-files/photos").await.unwrap());
}

#[tokio::test]
async fn test_upload_folder_creates_intermediate_directories() {
    let (service, store) = setup();
    service.create_directory("backup", USER).await.unwrap();

    let items = vec![
        item("album/2024/a.jpg", "aa"),
        item("album/b.jpg", "b"),
        item("", "skipped"),
    ];
    let uploaded = service.upload_batch("backup", USER, items).await.unwrap();

    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0].path, "backup/album/2024/");
    assert_eq!(uploaded[0].name, "a.jpg");
    assert_eq!(uploaded[0].size, Some(2));
    assert_eq!(uploaded[1].path, "backup/album/");

    assert_eq!(
        keys_under(&store, "user-1-files/"),
        vec![
            "user-1-files/backup/",
            "user-1-files/backup/album/",
            "user-1-files/backup/album/2024/",
            "user-1-files/backup/album/2024/a.jpg",
            "user-1-files/backup/album/b.jpg",
        ]
    );
    assert_eq!(
        store.content_type("user-1-files/backup/album/b.jpg").as_deref(),
        Some("text/plain")
    );
}

#[tokio::test]
async fn test_delete_directory_removes_all_keys() {
    let (service, store) = setup();
    service.create_directory("docs", USER).await.unwrap();
    upload(
        &service,
        USER,
        "docs",
        &[("a.txt", "a"), ("b.txt", "b"), ("sub/c.txt", "c")],
    )
    .await;
    upload(&service, USER, "", &[("keep.txt", "k")]).await;

    // K = 4 objects below the marker (3 files and the sub/ marker)
    assert_eq!(keys_under(&store, "user-1-files/docs/").len(), 5);

    service.delete_resource("docs", USER).await.unwrap();

    assert!(keys_under(&store, "user-1-files/docs/").is_empty());
    assert_eq!(keys_under(&store, "user-1-files/"), vec!["user-1-files/keep.txt"]);
    let error = service.get_resource("docs/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_failure_keeps_marker() {
    let (service, store) = setup();
    service.create_directory("docs", USER).await.unwrap();
    upload(&service, USER, "docs", &[("a.txt", "a"), ("b.txt", "b")]).await;
    store.inject_failure(StoreOperation::Delete, "user-1-files/docs/a.txt");

    let error = service.delete_resource("docs/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert_eq!(error.root_cause().kind(), ErrorKind::StoreUnavailable);

    // Siblings still ran, the marker stays so the directory remains visible
    assert_eq!(
        keys_under(&store, "user-1-files/"),
        vec!["user-1-files/docs/", "user-1-files/docs/a.txt"]
    );
    assert!(service.get_resource("docs", USER).await.is_ok());
}

#[tokio::test]
async fn test_delete_edge_cases() {
    let (service, _) = setup();

    let error = service.delete_resource("/", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);

    let error = service.delete_resource("ghost.txt", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    upload(&service, USER, "", &[("a.txt", "a")]).await;
    service.delete_resource("a.txt", USER).await.unwrap();
    assert!(service.get_resource("a.txt", USER).await.is_err());
}

#[tokio::test]
async fn test_move_file() {
    let (service, store) = setup();
    upload(&service, USER, "", &[("old.txt", "data"), ("old.txt.bak", "bak")]).await;

    let moved = service
        .move_resource("old.txt", "new.txt", USER)
        .await
        .unwrap();
    assert_eq!(moved.name, "new.txt");
    assert_eq!(moved.kind, ResourceKind::File);
    assert_eq!(moved.size, Some(4));

    let new = service.get_resource("new.txt", USER).await.unwrap();
    assert_eq!(new.kind, ResourceKind::File);
    let error = service.get_resource("old.txt", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    // Keys that merely share the prefix are left alone
    assert!(store.exists("user-1-files/old.txt.bak").await.unwrap());
}

#[tokio::test]
async fn test_move_directory() {
    let (service, store) = setup();
    service.create_directory("src", USER).await.unwrap();
    service.create_directory("dst", USER).await.unwrap();
    upload(&service, USER, "src", &[("a.txt", "a"), ("sub/b.txt", "b")]).await;

    let moved = service
        .move_resource("src", "dst/renamed", USER)
        .await
        .unwrap();
    assert_eq!(moved.kind, ResourceKind::Directory);
    assert_eq!(moved.path, "dst/");
    assert_eq!(moved.name, "renamed");

    assert_eq!(
        keys_under(&store, "user-1-files/"),
        vec![
            "user-1-files/dst/",
            "user-1-files/dst/renamed/",
            "user-1-files/dst/renamed/a.txt",
            "user-1-files/dst/renamed/sub/",
            "user-1-files/dst/renamed/sub/b.txt",
        ]
    );
}

#[tokio::test]
async fn test_move_rejections() {
    let (service, _) = setup();
    service.create_directory("a", USER).await.unwrap();
    upload(&service, USER, "", &[("f.txt", "f"), ("g.txt", "g")]).await;

    let cases = [
        ("", "b", ErrorKind::BadRequest),
        ("a", "", ErrorKind::BadRequest),
        ("a", "a/inner", ErrorKind::BadRequest),
        ("a/", "a", ErrorKind::BadRequest),
        ("f.txt", "h/", ErrorKind::BadRequest),
        ("missing.txt", "x.txt", ErrorKind::NotFound),
        ("f.txt", "g.txt", ErrorKind::AlreadyExists),
        ("f.txt", "a", ErrorKind::AlreadyExists),
        ("f.txt", "nowhere/f.txt", ErrorKind::NotFound),
        ("f.txt", "../f.txt", ErrorKind::InvalidPath),
    ];
    for (from, to, expected) in cases {
        let error = service.move_resource(from, to, USER).await.unwrap_err();
        assert_eq!(error.kind(), expected, "move {} -> {}", from, to);
    }

    // Moving a file into an existing directory works
    let moved = service.move_resource("f.txt", "a/f.txt", USER).await.unwrap();
    assert_eq!(moved.path, "a/");
}

#[tokio::test]
async fn test_move_failure_is_reported() {
    let (service, store) = setup();
    service.create_directory("src", USER).await.unwrap();
    upload(&service, USER, "src", &[("a.txt", "a"), ("b.txt", "b")]).await;
    store.inject_failure(StoreOperation::Copy, "user-1-files/src/b.txt");

    let error = service.move_resource("src", "dst", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OperationFailed);

    // Partial state is visible: a.txt moved, b.txt stayed
    assert!(store.exists("user-1-files/dst/a.txt").await.unwrap());
    assert!(store.exists("user-1-files/src/b.txt").await.unwrap());
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_scoped() {
    let (service, _) = setup();
    service.create_directory("Reports", USER).await.unwrap();
    upload(
        &service,
        USER,
        "Reports",
        &[("Annual-REPORT.pdf", "pdf"), ("notes.txt", "n")],
    )
    .await;
    upload(&service, OTHER_USER, "", &[("report.txt", "secret")]).await;

    let results = service.search("report", USER).await.unwrap();
    let names: Vec<&str> = results.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Reports", "Annual-REPORT.pdf"]);

    // Only base names are matched, not parent directories
    let results = service.search("reports/notes", USER).await.unwrap();
    assert!(results.is_empty());

    let other = service.search("REPORT", OTHER_USER).await.unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].name, "report.txt");

    let error = service.search("   ", USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_search_skips_root_marker() {
    let (service, store) = setup();
    store
        .put("user-1-files/", stream::empty(), 0, None)
        .await
        .unwrap();
    upload(&service, USER, "", &[("files.txt", "f")]).await;

    let results = service.search("files", USER).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "files.txt");
}

#[tokio::test]
async fn test_download_empty_directory_fails() {
    let (service, _) = setup();
    service.create_directory("empty", USER).await.unwrap();

    let mut sink = futures::io::Cursor::new(Vec::new());
    let error = service
        .download_resource("empty/", USER, &mut sink)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert!(sink.get_ref().is_empty());

    let error = service
        .download_resource("missing/", USER, &mut sink)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_download_directory_as_zip() {
    let (service, _) = setup();
    service.create_directory("docs", USER).await.unwrap();
    upload(&service, USER, "docs", &[("a.txt", "alpha"), ("sub/b.txt", "beta")]).await;

    let mut sink = futures::io::Cursor::new(Vec::new());
    let summary = service
        .download_resource("docs", USER, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.file_name, "docs.zip");
    assert_eq!(summary.kind, ResourceKind::Directory);
    assert_eq!(summary.entries, 2);
    assert_eq!(summary.bytes, 9);

    let mut archive = zip::ZipArchive::new(Cursor::new(sink.into_inner())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "sub/b.txt"]);

    let mut content = String::new();
    archive
        .by_name("sub/b.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "beta");
}

#[tokio::test]
async fn test_download_root_and_file() {
    let (service, _) = setup();
    upload(&service, USER, "", &[("top.txt", "top")]).await;
    upload(&service, OTHER_USER, "", &[("theirs.txt", "no")]).await;

    let mut sink = futures::io::Cursor::new(Vec::new());
    let summary = service.download_resource("", USER, &mut sink).await.unwrap();
    assert_eq!(summary.file_name, "root.zip");
    let archive = zip::ZipArchive::new(Cursor::new(sink.into_inner())).unwrap();
    assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["top.txt"]);

    let mut sink = futures::io::Cursor::new(Vec::new());
    let summary = service
        .download_resource("top.txt", USER, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.kind, ResourceKind::File);
    assert_eq!(summary.file_name, "top.txt");
    assert_eq!(sink.into_inner(), b"top".to_vec());

    let mut sink = futures::io::Cursor::new(Vec::new());
    let error = service
        .download_resource("gone.txt", USER, &mut sink)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(service.ensure_exists("gone.txt", USER).await.is_err());
    assert!(service.ensure_exists("top.txt", USER).await.is_ok());
}

#[tokio::test]
async fn test_download_streams_while_archiving() {
    use futures::TryStreamExt;

    let (service, _) = setup();
    service.create_directory("music", USER).await.unwrap();
    upload(&service, USER, "music", &[("a.mp3", "la la"), ("b/c.mp3", "do re mi")]).await;

    let download = service.open_download("music/", USER).await.unwrap();
    assert_eq!(download.file_name(), "music.zip");
    assert_eq!(download.kind(), ResourceKind::Directory);

    // A one-chunk pipe only completes if the reader drains it concurrently
    let (writer, body) = stream::pipe(1);
    let (summary, chunks) = futures::join!(
        download.write_to(writer),
        body.try_collect::<Vec<bytes::Bytes>>()
    );
    assert_eq!(summary.unwrap().entries, 2);

    let archive = zip::ZipArchive::new(Cursor::new(chunks.unwrap().concat())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["a.mp3", "b/c.mp3"]);
}

#[tokio::test]
async fn test_open_download_checks_before_writing() {
    let (service, _) = setup();
    service.create_directory("empty", USER).await.unwrap();
    service.create_directory("empty/nested", USER).await.unwrap();

    let error = service.open_download("empty", USER).await.err().unwrap();
    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert_eq!(error.to_string(), "Folder is empty");

    let error = service.open_download("missing.txt", USER).await.err().unwrap();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let (service, store) = setup();
    service.create_directory("shared", USER).await.unwrap();
    upload(&service, USER, "shared", &[("mine.txt", "1")]).await;

    let error = service.get_resource("shared/mine.txt", OTHER_USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    let error = service.list_directory("shared", OTHER_USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    let error = service.delete_resource("shared", OTHER_USER).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    // The same name is independent per user
    service.create_directory("shared", OTHER_USER).await.unwrap();
    service.delete_resource("shared", OTHER_USER).await.unwrap();
    assert_eq!(keys_under(&store, "user-2-files/").len(), 0);
    assert_eq!(keys_under(&store, "user-1-files/").len(), 2);
}

#[tokio::test]
async fn test_store_unavailable_surfaces() {
    let (service, store) = setup();
    store.inject_failure(StoreOperation::Stat, "user-1-files/a.txt");

    let error = service.get_resource("a.txt", USER).await.unwrap_err();
    assert!(matches!(error, StorageError::StoreUnavailable(_)));
}
