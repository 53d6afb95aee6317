use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollgate_installer::{
    break_lock, default_user_root, read_history, read_lock_holder, FileAuditLog,
    InstallerConfig, ObservedAuditLog, RollbackOutcome, RootLayout, UpdateController,
    UpdateError, UpdateOutcome, VersionStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod completion;
mod render;

use completion::{write_completions_script, CliCompletionShell};
use render::{OutputStyle, TerminalRenderer};

const ROOT_ENV_VAR: &str = "ROLLGATE_ROOT";

#[derive(Parser, Debug)]
#[command(name = "rollgate")]
#[command(about = "Install versioned update packages with rollback to the last good version", long_about = None)]
struct Cli {
    /// Managed root directory (defaults to $ROLLGATE_ROOT, then ~/.rollgate).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the package at the given path and activate it.
    Update {
        #[arg(long)]
        package: PathBuf,
    },
    /// Point the active version back at the last known good version.
    Rollback,
    Status,
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Remove an update lock left behind by an interrupted attempt.
    Unlock,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RootStatus {
    root: PathBuf,
    current: Option<String>,
    last_known_good: Option<String>,
    installed: Vec<String>,
    lock_holder: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    run_cli(Cli::parse())
}

fn run_cli(cli: Cli) -> Result<()> {
    let root = resolve_root(cli.root.as_deref(), std::env::var_os(ROOT_ENV_VAR))?;
    let layout = RootLayout::new(root);
    tracing::debug!(root = %layout.root().display(), "resolved update root");
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Update { package } => {
            let config = InstallerConfig::load(&layout)?;
            renderer.print_section("update");
            let progress = renderer.start_progress("update");

            let result = {
                let audit = ObservedAuditLog::new(
                    FileAuditLog::for_layout(&layout),
                    |message: &str| progress.println(message),
                );
                let mut controller = UpdateController::new(layout.clone(), config, audit);
                controller.update(&package)
            };

            match result {
                Ok(outcome) => {
                    progress.finish_success();
                    for line in format_update_outcome_lines(&outcome, renderer.style()) {
                        println!("{line}");
                    }
                }
                Err(err) => {
                    progress.finish_abandon();
                    let rejected = err
                        .chain()
                        .find_map(|cause| cause.downcast_ref::<UpdateError>())
                        .is_some_and(UpdateError::is_validation);
                    return Err(err).with_context(|| {
                        if rejected {
                            format!("package rejected: {}", package.display())
                        } else {
                            format!("update aborted for package {}", package.display())
                        }
                    });
                }
            }
        }
        Commands::Rollback => {
            let config = InstallerConfig::load(&layout)?;
            let audit =
                ObservedAuditLog::new(FileAuditLog::for_layout(&layout), |message: &str| {
                    println!("{message}")
                });
            let mut controller = UpdateController::new(layout.clone(), config, audit);
            let outcome = controller.rollback()?;
            println!(
                "{}",
                format_rollback_outcome_line(&outcome, renderer.style())
            );
        }
        Commands::Status => {
            let status = read_root_status(&layout)?;
            renderer.print_lines(&format_status_lines(&status));
        }
        Commands::History { limit } => {
            let lines = read_history(&layout, limit)?;
            if lines.is_empty() {
                println!("No install history recorded at {}", layout.root().display());
            } else {
                renderer.print_lines(&lines);
            }
        }
        Commands::Unlock => {
            let holder = read_lock_holder(&layout).ok().flatten();
            if break_lock(&layout)? {
                let detail = holder
                    .filter(|holder| !holder.is_empty())
                    .map(|holder| format!(" ({holder})"))
                    .unwrap_or_default();
                renderer.print_status("ok", &format!("removed update lock{detail}"));
            } else {
                renderer.print_status("info", "no update lock present");
            }
        }
        Commands::Completions { shell } => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_completions_script(shell, &mut handle)?;
        }
    }

    Ok(())
}

fn resolve_root(cli_root: Option<&Path>, env_root: Option<OsString>) -> Result<PathBuf> {
    if let Some(root) = cli_root {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = env_root.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    default_user_root()
}

fn read_root_status(layout: &RootLayout) -> Result<RootStatus> {
    let store = VersionStore::new(layout.clone());
    Ok(RootStatus {
        root: layout.root().to_path_buf(),
        current: store.get_current()?,
        last_known_good: store.get_last_known_good()?,
        installed: store.installed_versions()?,
        lock_holder: read_lock_holder(layout)?,
    })
}

fn format_status_lines(status: &RootStatus) -> Vec<String> {
    let none = "(none)".to_string();
    let mut lines = vec![
        format!("root: {}", status.root.display()),
        format!("current: {}", status.current.as_ref().unwrap_or(&none)),
        format!(
            "last known good: {}",
            status.last_known_good.as_ref().unwrap_or(&none)
        ),
    ];

    if status.installed.is_empty() {
        lines.push("installed versions: (none)".to_string());
    } else {
        lines.push("installed versions:".to_string());
        for version in &status.installed {
            let marker = if status.current.as_deref() == Some(version.as_str()) {
                "*"
            } else {
                " "
            };
            lines.push(format!("  {marker} {version}"));
        }
    }

    if let Some(holder) = &status.lock_holder {
        lines.push(format!("lock: held ({holder})"));
    }
    lines
}

fn format_update_outcome_lines(outcome: &UpdateOutcome, style: OutputStyle) -> Vec<String> {
    match outcome {
        UpdateOutcome::Activated {
            version,
            files_copied,
        } => vec![render::render_status_line(
            style,
            "ok",
            &format!("activated {version} ({files_copied} file(s) deployed)"),
        )],
        UpdateOutcome::RolledBack {
            attempted,
            rollback,
        } => vec![
            render::render_status_line(
                style,
                "warn",
                &format!("pre-install hook failed for {attempted}"),
            ),
            format_rollback_outcome_line(rollback, style),
        ],
    }
}

fn format_rollback_outcome_line(outcome: &RollbackOutcome, style: OutputStyle) -> String {
    match outcome {
        RollbackOutcome::Restored { version } => {
            render::render_status_line(style, "ok", &format!("active version restored to {version}"))
        }
        RollbackOutcome::NothingToRestore => render::render_status_line(
            style,
            "warn",
            "no last known good version recorded; active version left unchanged",
        ),
    }
}

#[cfg(test)]
mod tests;
