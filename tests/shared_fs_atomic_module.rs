use benchkeeper::shared::fs_atomic::{
    atomic_write_file, atomic_write_file_with_mode, StagedWrite, OWNER_ONLY_MODE,
};
use std::fs;

#[test]
fn shared_fs_atomic_replaces_content_in_place() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("nested/output.txt");

    atomic_write_file(&target, b"first").expect("write first");
    assert_eq!(fs::read_to_string(&target).expect("read first"), "first");

    atomic_write_file(&target, b"second").expect("write second");
    assert_eq!(fs::read_to_string(&target).expect("read second"), "second");

    let leftovers: Vec<_> = fs::read_dir(target.parent().expect("parent"))
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind");
}

#[test]
fn shared_fs_atomic_dropped_stage_leaves_target_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("state.json");
    fs::write(&target, "original").expect("seed");

    let staged = StagedWrite::stage(&target, b"replacement", None).expect("stage");
    let temp_path = staged.temp_path().to_path_buf();
    assert!(temp_path.exists());
    drop(staged);

    assert!(!temp_path.exists());
    assert_eq!(fs::read_to_string(&target).expect("read"), "original");
}

#[cfg(unix)]
#[test]
fn shared_fs_atomic_mode_write_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("secret.json");
    fs::write(&target, "{}").expect("seed");
    fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).expect("chmod");

    atomic_write_file_with_mode(&target, b"{\"a\":1}", OWNER_ONLY_MODE).expect("write");

    let mode = fs::metadata(&target).expect("metadata").permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
