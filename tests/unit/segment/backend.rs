use super::*;

const MISSING: &str = "/nonexistent/sprite-processor-test/rembg";

#[test]
fn loader_reports_missing_program() {
    let loader = RembgLoader::new(MISSING);
    let err = match loader.load(ModelId::U2net) {
        Ok(_) => panic!("loading through a missing program must fail"),
        Err(e) => format!("{e:#}"),
    };
    assert!(err.contains(MISSING), "{err}");
}

#[test]
fn segmenter_reports_spawn_failure() {
    let seg = RembgSegmenter {
        program: PathBuf::from(MISSING),
        model: ModelId::Silueta,
    };
    assert_eq!(seg.model(), ModelId::Silueta);
    let err = seg.remove_background(b"not a png").unwrap_err();
    assert!(format!("{err:#}").contains("failed to spawn"));
}

#[test]
fn loader_keeps_configured_program() {
    let loader = RembgLoader::new("/opt/rembg/bin/rembg");
    assert_eq!(
        loader.program(),
        std::path::Path::new("/opt/rembg/bin/rembg")
    );
}

/// A fake `rembg` that records its pid and then sleeps in place of the shell.
#[cfg(target_os = "linux")]
fn sleeping_rembg(dir: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("rembg");
    let body = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--help\" ]; then exit 0; fi\necho $$ > '{}'\nexec sleep 37\n",
        dir.join("pid").display()
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(target_os = "linux")]
#[test]
fn cancelled_call_kills_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let seg = RembgSegmenter {
        program: sleeping_rembg(dir.path()),
        model: ModelId::U2net,
    };
    let pid_file = dir.path().join("pid");

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let watcher_pid_file = pid_file.clone();
    let canceller = std::thread::spawn(move || {
        let start = std::time::Instant::now();
        while !watcher_pid_file.exists() && start.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(20));
        }
        std::thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let err = seg
        .remove_background_cancellable(b"png bytes", &cancel)
        .unwrap_err();
    canceller.join().unwrap();

    assert!(format!("{err:#}").contains("cancelled"), "{err:#}");
    assert!(start.elapsed() < Duration::from_secs(20));
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(!std::path::Path::new(&format!("/proc/{}", pid.trim())).exists());
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!other.is_cancelled());
    token.cancel();
    assert!(other.is_cancelled());
}
