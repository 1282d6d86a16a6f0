use benchkeeper::runtime::{bootstrap_state_root, StatePaths, STATE_FILE_NAME};
use tempfile::tempdir;

#[test]
fn runtime_state_paths_bootstrap_creates_every_directory() {
    let tmp = tempdir().expect("tempdir");
    let state_root = tmp.path().join("benchkeeper");
    let paths = StatePaths::new(&state_root);

    bootstrap_state_root(&paths).expect("bootstrap state root");
    bootstrap_state_root(&paths).expect("bootstrap is repeatable");

    for dir in paths.required_directories() {
        assert!(dir.is_dir(), "expected directory {}", dir.display());
    }
    assert_eq!(paths.state_file(), state_root.join(STATE_FILE_NAME));
    assert!(paths.heal_check_marker().starts_with(paths.markers_dir()));
    assert!(paths.event_log_path().starts_with(paths.logs_dir()));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&state_root)
            .expect("metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o700);
    }
}
