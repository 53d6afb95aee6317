use super::*;
use clap::error::ErrorKind;
use crate::render::{format_elapsed, output_style_for, render_status_line};
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_base() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "rollgate-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ))
}

fn write_package(base: &Path, version: &str, hook: Option<&str>) -> PathBuf {
    let package = base.join(format!("pkg-{version}"));
    fs::create_dir_all(package.join("files")).expect("must create files dir");
    fs::write(
        package.join("manifest.json"),
        format!("{{ \"Version\": \"{version}\" }}"),
    )
    .expect("must write manifest");
    fs::write(package.join("files").join("a.txt"), version).expect("must write file");
    if let Some(hook) = hook {
        fs::write(package.join("preinstall.txt"), hook).expect("must write hook");
    }
    package
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

#[test]
fn cli_parses_update_with_package_and_global_root() {
    let cli = parse(&["rollgate", "update", "--package", "/tmp/pkg", "--root", "/srv/game"]);
    assert_eq!(cli.root.as_deref(), Some(Path::new("/srv/game")));
    match cli.command {
        Commands::Update { package } => assert_eq!(package, PathBuf::from("/tmp/pkg")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_update_requires_package_flag() {
    let err = Cli::try_parse_from(["rollgate", "update"]).expect_err("package is required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_parses_history_limit_and_completion_shell() {
    match parse(&["rollgate", "history", "--limit", "5"]).command {
        Commands::History { limit } => assert_eq!(limit, Some(5)),
        other => panic!("unexpected command: {other:?}"),
    }
    match parse(&["rollgate", "completions", "powershell"]).command {
        Commands::Completions { shell } => assert_eq!(shell, CliCompletionShell::Powershell),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn resolve_root_prefers_flag_then_env() {
    let from_flag = resolve_root(Some(Path::new("/flag")), Some(OsString::from("/env")))
        .expect("must resolve");
    assert_eq!(from_flag, PathBuf::from("/flag"));

    let from_env = resolve_root(None, Some(OsString::from("/env"))).expect("must resolve");
    assert_eq!(from_env, PathBuf::from("/env"));
}

#[test]
fn resolve_root_ignores_empty_env_value() {
    let resolved = resolve_root(None, Some(OsString::new()));
    if let Ok(root) = resolved {
        assert_ne!(root, PathBuf::new());
    }
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "activated 1.2.0"),
        "activated 1.2.0"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "activated 1.2.0"),
        "[OK] activated 1.2.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "hook failed"),
        "[WARN] hook failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "info", "no update lock present"),
        "[..] no update lock present"
    );
}

#[test]
fn output_style_is_plain_without_terminal_or_with_no_color() {
    assert_eq!(output_style_for(true, false), OutputStyle::Rich);
    assert_eq!(output_style_for(false, false), OutputStyle::Plain);
    assert_eq!(output_style_for(true, true), OutputStyle::Plain);
}

#[test]
fn format_elapsed_pads_milliseconds() {
    assert_eq!(format_elapsed(Duration::from_millis(2_045)), "2.045s");
    assert_eq!(format_elapsed(Duration::from_millis(7)), "0.007s");
}

#[test]
fn format_update_outcome_lines_describe_activation_and_rollback() {
    let activated = UpdateOutcome::Activated {
        version: "1.2.0".to_string(),
        files_copied: 3,
    };
    assert_eq!(
        format_update_outcome_lines(&activated, OutputStyle::Rich),
        vec!["[OK] activated 1.2.0 (3 file(s) deployed)"]
    );

    let restored = UpdateOutcome::RolledBack {
        attempted: "1.2.0".to_string(),
        rollback: RollbackOutcome::Restored {
            version: "1.1.0".to_string(),
        },
    };
    assert_eq!(
        format_update_outcome_lines(&restored, OutputStyle::Plain),
        vec![
            "pre-install hook failed for 1.2.0",
            "active version restored to 1.1.0"
        ]
    );

    let nothing = UpdateOutcome::RolledBack {
        attempted: "1.2.0".to_string(),
        rollback: RollbackOutcome::NothingToRestore,
    };
    let lines = format_update_outcome_lines(&nothing, OutputStyle::Rich);
    assert_eq!(
        lines[1],
        "[WARN] no last known good version recorded; active version left unchanged"
    );
}

#[test]
fn format_status_lines_marks_current_version() {
    let status = RootStatus {
        root: PathBuf::from("/srv/game"),
        current: Some("1.1.0".to_string()),
        last_known_good: Some("1.1.0".to_string()),
        installed: vec!["1.0.0".to_string(), "1.1.0".to_string()],
        lock_holder: Some("pid=42 started_at_unix=1".to_string()),
    };
    assert_eq!(
        format_status_lines(&status),
        vec![
            "root: /srv/game",
            "current: 1.1.0",
            "last known good: 1.1.0",
            "installed versions:",
            "    1.0.0",
            "  * 1.1.0",
            "lock: held (pid=42 started_at_unix=1)",
        ]
    );
}

#[test]
fn format_status_lines_for_fresh_root() {
    let status = RootStatus {
        root: PathBuf::from("/srv/game"),
        current: None,
        last_known_good: None,
        installed: Vec::new(),
        lock_holder: None,
    };
    assert_eq!(
        format_status_lines(&status),
        vec![
            "root: /srv/game",
            "current: (none)",
            "last known good: (none)",
            "installed versions: (none)",
        ]
    );
}

#[test]
fn completions_script_mentions_binary_name() {
    let mut out = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut out).expect("must generate");
    let script = String::from_utf8(out).expect("script must be utf-8");
    assert!(script.contains("rollgate"));
    assert!(script.contains("update"));
}

#[test]
fn run_cli_update_activates_package_and_status_reads_it_back() {
    let base = test_base();
    let root = base.join("root");
    let package = write_package(&base, "1.2.0", None);

    run_cli(parse(&[
        "rollgate",
        "--root",
        root.to_str().expect("utf-8 path"),
        "update",
        "--package",
        package.to_str().expect("utf-8 path"),
    ]))
    .expect("update must succeed");

    let status = read_root_status(&RootLayout::new(&root)).expect("must read status");
    assert_eq!(status.current.as_deref(), Some("1.2.0"));
    assert_eq!(status.last_known_good.as_deref(), Some("1.2.0"));
    assert_eq!(status.installed, vec!["1.2.0"]);
    assert!(status.lock_holder.is_none());

    let history = read_history(&RootLayout::new(&root), None).expect("must read history");
    assert!(history
        .iter()
        .any(|line| line.ends_with("Update successful. Active version: 1.2.0")));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn run_cli_update_hook_failure_is_not_an_error() {
    let base = test_base();
    let root = base.join("root");
    let good = write_package(&base, "1.1.0", None);
    let bad = write_package(&base, "1.2.0", Some("exit 1"));
    let root_arg = root.to_str().expect("utf-8 path");

    run_cli(parse(&[
        "rollgate",
        "--root",
        root_arg,
        "update",
        "--package",
        good.to_str().expect("utf-8 path"),
    ]))
    .expect("first update must succeed");
    run_cli(parse(&[
        "rollgate",
        "--root",
        root_arg,
        "update",
        "--package",
        bad.to_str().expect("utf-8 path"),
    ]))
    .expect("rollback exits cleanly");

    let status = read_root_status(&RootLayout::new(&root)).expect("must read status");
    assert_eq!(status.current.as_deref(), Some("1.1.0"));
    assert_eq!(status.installed, vec!["1.1.0"]);

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn run_cli_update_with_invalid_manifest_fails() {
    let base = test_base();
    let root = base.join("root");
    let package = write_package(&base, "1.0.0", None);
    fs::write(package.join("manifest.json"), "{ \"Version\": \" \" }").expect("must write");

    let err = run_cli(parse(&[
        "rollgate",
        "--root",
        root.to_str().expect("utf-8 path"),
        "update",
        "--package",
        package.to_str().expect("utf-8 path"),
    ]))
    .expect_err("invalid manifest must abort");
    assert!(err.to_string().starts_with("package rejected"));
    assert_eq!(
        rollgate_installer::error_kind(&err),
        Some(rollgate_installer::UpdateErrorKind::ManifestInvalid)
    );

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn run_cli_unlock_removes_stale_lock() {
    let base = test_base();
    let layout = RootLayout::new(base.join("root"));
    layout.ensure_base_dirs().expect("must create dirs");
    fs::write(layout.lock_path(), "pid=1\nstarted_at_unix=1\n").expect("must write lock");

    run_cli(parse(&[
        "rollgate",
        "--root",
        layout.root().to_str().expect("utf-8 path"),
        "unlock",
    ]))
    .expect("unlock must succeed");
    assert!(!layout.lock_path().exists());

    let _ = fs::remove_dir_all(&base);
}
