//! Takeoff Application
//!
//! Command-line shell around the takeoff engine: prints legends of project
//! files and replays scripted drafting input against them.

mod project;
mod replay;
mod report;
mod shortcuts;

pub use project::{PageSpec, Project, ProjectRenderer};
pub use replay::{ReplayOutcome, Replayer, STEP_MS, Step, load_script};
pub use shortcuts::{Shortcut, ShortcutRegistry};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use takeoff_core::{FileStore, NotificationLevel, PageNumber};

#[derive(Debug, Parser)]
#[command(name = "takeoff", about = "Quantity takeoff on construction plans")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the quantity legend of a project
    Legend {
        project: PathBuf,
        /// Only this page
        #[arg(long)]
        page: Option<PageNumber>,
        #[arg(long)]
        json: bool,
    },
    /// Replay a JSON input script against a project
    Replay {
        project: PathBuf,
        script: PathBuf,
        /// Write the updated project here
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write items back to a record store in this directory
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List keyboard shortcuts
    Shortcuts,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let stdout = std::io::stdout();
    run_with_output(args, &mut stdout.lock())
}

pub fn run_with_output<I, T, W>(args: I, out: &mut W) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let cli = Cli::parse_from(args);
    match cli.command {
        Commands::Legend {
            project,
            page,
            json,
        } => {
            let project = Project::load(&project)?;
            let session = project.session()?;
            write_legend(out, &session, page, json)
        }
        Commands::Replay {
            project,
            script,
            output,
            store,
            json,
        } => replay(out, &project, &script, output, store, json),
        Commands::Shortcuts => {
            for shortcut in ShortcutRegistry::all() {
                writeln!(out, "  {:20} {}", shortcut.format(), shortcut.description)?;
            }
            Ok(())
        }
    }
}

fn write_legend<W: Write>(
    out: &mut W,
    session: &takeoff_core::TakeoffSession,
    page: Option<PageNumber>,
    json: bool,
) -> Result<()> {
    let text = match (page, json) {
        (Some(page), true) => session.legend(page).to_json()?,
        (Some(page), false) => report::format_page(&session.legend(page)),
        (None, true) => session.document_legend().to_json()?,
        (None, false) => report::format_document(&session.document_legend()),
    };
    writeln!(out, "{}", text.trim_end())?;
    Ok(())
}

fn replay<W: Write>(
    out: &mut W,
    project_path: &Path,
    script_path: &Path,
    output: Option<PathBuf>,
    store: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut project = Project::load(project_path)?;
    let steps = load_script(script_path)?;
    if steps.is_empty() {
        bail!("script {} has no steps", script_path.display());
    }

    let store = store
        .map(|dir| {
            FileStore::new(dir.clone())
                .map(Arc::new)
                .with_context(|| format!("failed to open store {}", dir.display()))
        })
        .transpose()?;
    let (session, outcome) = Replayer::new(&project, store)?.run(&steps);
    log::info!(
        "Replayed {} steps with {} write-backs",
        outcome.steps,
        outcome.flushes
    );

    for notification in &outcome.notifications {
        let level = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        writeln!(out, "[{}] {}", level, notification.message)?;
    }
    write_legend(out, &session, None, json)?;

    if let Some(path) = output {
        project.update_from(&session);
        project.save(&path)?;
        log::info!("Saved project to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use takeoff_core::{Count, Geometry, ItemStyle, TakeoffItem};
    use tempfile::tempdir;

    fn run_to_string(args: &[&str]) -> Result<String> {
        let mut out = Vec::new();
        run_with_output(args.iter().copied(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn write_project(dir: &Path) -> PathBuf {
        let mut project = Project::new("plans");
        project.pages.insert(
            1,
            PageSpec {
                width: 1000.0,
                height: 1000.0,
                edges: Vec::new(),
            },
        );
        project.items.push(TakeoffItem::new(
            1,
            Geometry::Count(Count::new(kurbo::Point::new(500.0, 500.0))),
            ItemStyle::new("green"),
        ));
        let path = dir.join("plans.json");
        project.save(&path).unwrap();
        path
    }

    #[test]
    fn test_legend_command() {
        let dir = tempdir().unwrap();
        let path = write_project(dir.path());
        let text = run_to_string(&["takeoff", "legend", path.to_str().unwrap()]).unwrap();
        assert!(text.starts_with("Page 1 (uncalibrated)"));
        assert!(text.contains("1.00 ea"));
    }

    #[test]
    fn test_legend_json_for_page() {
        let dir = tempdir().unwrap();
        let path = write_project(dir.path());
        let text = run_to_string(&[
            "takeoff",
            "legend",
            path.to_str().unwrap(),
            "--page",
            "1",
            "--json",
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["page"], 1);
        assert_eq!(value["rows"][0]["item_count"], 1);
    }

    #[test]
    fn test_missing_project_has_context() {
        let err = run_to_string(&["takeoff", "legend", "/nonexistent/plans.json"]).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read project"));
    }

    #[test]
    fn test_replay_draws_area_and_saves() {
        let dir = tempdir().unwrap();
        let path = write_project(dir.path());
        let script = dir.path().join("script.json");
        fs::write(
            &script,
            r#"[
                {"action":"tool","tool":"Area"},
                {"action":"click","x":0.0,"y":0.0},
                {"action":"click","x":100.0,"y":0.0},
                {"action":"click","x":100.0,"y":100.0},
                {"action":"key","event":{"key":"Enter"}}
            ]"#,
        )
        .unwrap();
        let output = dir.path().join("out").join("plans.json");
        let store = dir.path().join("store");

        let text = run_to_string(&[
            "takeoff",
            "replay",
            path.to_str().unwrap(),
            script.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--store",
            store.to_str().unwrap(),
        ])
        .unwrap();
        assert!(text.contains("5000.00 px²"));

        let saved = Project::load(&output).unwrap();
        assert_eq!(saved.items.len(), 2);
        let stored = FileStore::new(store).unwrap().read_document("plans").unwrap();
        assert_eq!(stored.items.len(), 2);
    }

    #[test]
    fn test_empty_script_is_an_error() {
        let dir = tempdir().unwrap();
        let path = write_project(dir.path());
        let script = dir.path().join("empty.json");
        fs::write(&script, "[]").unwrap();
        let err = run_to_string(&[
            "takeoff",
            "replay",
            path.to_str().unwrap(),
            script.to_str().unwrap(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_shortcuts_command() {
        let text = run_to_string(&["takeoff", "shortcuts"]).unwrap();
        assert!(text.contains("Ctrl+Shift+Z"));
    }
}
