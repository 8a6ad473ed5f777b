use pretty_assertions::assert_eq;
use tempfile::TempDir;
use toolhost_filesystem::FilesystemService;
use toolhost_protocol::ItemKind;
use toolhost_sandbox::Sandbox;

fn service() -> (TempDir, FilesystemService) {
    let dir = TempDir::new().expect("tempdir");
    let sandbox = Sandbox::new(dir.path()).expect("sandbox");
    (dir, FilesystemService::new(sandbox))
}

#[tokio::test]
async fn empty_root_lists_as_empty() {
    let (_dir, service) = service();
    assert!(service.list_directory(".").await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_sorted_and_typed() {
    let (_dir, service) = service();
    service.create_directory("zoo").await.unwrap();
    service.write_file("alpha.txt", "a", false).await.unwrap();
    service.write_file("beta.txt", "b", false).await.unwrap();

    let entries = service.list_directory(".").await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.txt", "beta.txt", "zoo"]);
    assert_eq!(entries[0].kind, ItemKind::File);
    assert_eq!(entries[2].kind, ItemKind::Directory);
}

#[tokio::test]
async fn listing_a_file_reports_wrong_type() {
    let (_dir, service) = service();
    service.write_file("plain.txt", "x", false).await.unwrap();

    let err = service.list_directory("plain.txt").await.unwrap_err();
    assert_eq!(err.code(), "not_a_directory");
    let err = service.list_directory("missing").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let (_dir, service) = service();
    let content = "hello sandbox\nsecond line with unicode: żółć\n";
    service.write_file("notes.txt", content, false).await.unwrap();
    assert_eq!(service.read_file("notes.txt").await.unwrap(), content);

    // Overwrite is unconditional.
    service.write_file("notes.txt", "short", false).await.unwrap();
    assert_eq!(service.read_file("notes.txt").await.unwrap(), "short");
}

#[tokio::test]
async fn write_requires_parent_unless_asked_to_create() {
    let (_dir, service) = service();
    let err = service
        .write_file("deep/nested/file.txt", "x", false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "parent_missing");

    service
        .write_file("deep/nested/file.txt", "x", true)
        .await
        .unwrap();
    assert_eq!(service.read_file("deep/nested/file.txt").await.unwrap(), "x");
}

#[tokio::test]
async fn read_rejects_directories_and_binary_content() {
    let (dir, service) = service();
    service.create_directory("sub").await.unwrap();
    let err = service.read_file("sub").await.unwrap_err();
    assert_eq!(err.code(), "is_a_directory");

    std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    let err = service.read_file("blob.bin").await.unwrap_err();
    assert_eq!(err.code(), "not_text");
}

#[tokio::test]
async fn move_into_existing_directory_lands_inside_it() {
    let (_dir, service) = service();
    service.write_file("a/x.txt", "payload", true).await.unwrap();
    service.create_directory("a/y").await.unwrap();

    let landed = service.move_item("a/x.txt", "a/y").await.unwrap();
    assert_eq!(landed, "a/y/x.txt");
    assert_eq!(service.read_file("a/y/x.txt").await.unwrap(), "payload");
    assert_eq!(
        service.read_file("a/x.txt").await.unwrap_err().code(),
        "not_found"
    );
}

#[tokio::test]
async fn move_overwrites_an_existing_destination_file() {
    let (_dir, service) = service();
    service.write_file("src.txt", "new", false).await.unwrap();
    service.write_file("dir/src.txt", "old", true).await.unwrap();

    service.move_item("src.txt", "dir").await.unwrap();
    assert_eq!(service.read_file("dir/src.txt").await.unwrap(), "new");
}

#[tokio::test]
async fn move_missing_source_reports_not_found() {
    let (_dir, service) = service();
    let err = service.move_item("ghost.txt", "dest.txt").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn delete_file_refuses_directories() {
    let (_dir, service) = service();
    service.create_directory("keep").await.unwrap();
    let err = service.delete_file("keep").await.unwrap_err();
    assert_eq!(err.code(), "is_a_directory");

    service.write_file("gone.txt", "x", false).await.unwrap();
    service.delete_file("gone.txt").await.unwrap();
    assert_eq!(
        service.read_file("gone.txt").await.unwrap_err().code(),
        "not_found"
    );
}

#[tokio::test]
async fn create_directory_is_idempotent() {
    let (dir, service) = service();
    assert!(service.create_directory("logs").await.unwrap());
    assert!(!service.create_directory("logs").await.unwrap());
    assert!(dir.path().join("logs").is_dir());

    service.write_file("file.txt", "x", false).await.unwrap();
    let err = service.create_directory("file.txt").await.unwrap_err();
    assert_eq!(err.code(), "already_exists");
}

#[tokio::test]
async fn delete_directory_distinguishes_not_empty() {
    let (_dir, service) = service();
    service.write_file("full/inner.txt", "x", true).await.unwrap();

    let err = service.delete_directory("full", false).await.unwrap_err();
    assert_eq!(err.code(), "directory_not_empty");

    service.delete_directory("full", true).await.unwrap();
    assert_eq!(
        service.list_directory("full").await.unwrap_err().code(),
        "not_found"
    );
}

#[tokio::test]
async fn the_allowed_root_itself_is_never_deletable() {
    let (_dir, service) = service();
    for (path, recursive) in [(".", false), (".", true), ("", true), ("sub/..", true)] {
        let err = service.delete_directory(path, recursive).await.unwrap_err();
        assert_eq!(err.code(), "root_protected", "path {path:?}");
    }
}

#[tokio::test]
async fn metadata_reports_kind_size_and_paths() {
    let (dir, service) = service();
    service.write_file("notes.txt", "hello", false).await.unwrap();

    let meta = service.item_metadata("notes.txt").await.unwrap();
    assert_eq!(meta.kind, ItemKind::File);
    assert_eq!(meta.size_bytes, 5);
    assert_eq!(meta.name, "notes.txt");
    assert_eq!(meta.relative_path, "notes.txt");
    assert_eq!(
        meta.absolute_path,
        dir.path()
            .canonicalize()
            .unwrap()
            .join("notes.txt")
            .display()
            .to_string()
    );
    assert!(!meta.is_symlink);
    assert!(meta.symlink_target.is_none());
    // RFC 3339 with an explicit offset.
    assert!(meta.modified_at.contains('T'));

    let err = service.item_metadata("missing").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[cfg(unix)]
#[tokio::test]
async fn metadata_reports_symlinks_inside_the_root() {
    let (dir, service) = service();
    service.write_file("target.txt", "data", false).await.unwrap();
    std::os::unix::fs::symlink(
        dir.path().join("target.txt"),
        dir.path().join("alias.txt"),
    )
    .unwrap();

    let meta = service.item_metadata("alias.txt").await.unwrap();
    assert!(meta.is_symlink);
    assert_eq!(meta.kind, ItemKind::File);
    assert!(meta
        .symlink_target
        .as_deref()
        .unwrap()
        .ends_with("target.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn operations_reject_symlink_escapes() {
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

    let (dir, service) = service();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("leak")).unwrap();

    for err in [
        service.read_file("leak/secret.txt").await.unwrap_err(),
        service.list_directory("leak").await.unwrap_err(),
        service.write_file("leak/new.txt", "x", false).await.unwrap_err(),
        service.delete_file("leak/secret.txt").await.unwrap_err(),
    ] {
        assert_eq!(err.code(), "sandbox_violation");
    }
    // Nothing leaked through.
    assert!(outside.path().join("new.txt").symlink_metadata().is_err());
    assert!(outside.path().join("secret.txt").exists());
}

#[tokio::test]
async fn traversal_inputs_are_rejected_not_executed() {
    let (_dir, service) = service();
    for input in ["../outside.txt", "a/../../etc/passwd", "/etc/passwd"] {
        let err = service.read_file(input).await.unwrap_err();
        assert_eq!(err.code(), "sandbox_violation", "input {input:?}");
    }
}

#[tokio::test]
async fn working_directory_is_the_allowed_root() {
    let (dir, service) = service();
    assert_eq!(
        service.working_directory(),
        dir.path().canonicalize().unwrap().display().to_string()
    );
}
