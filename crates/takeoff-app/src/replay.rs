//! Replay of scripted input against a project.
//!
//! A script is a JSON array of steps. Steps run on a virtual clock that
//! advances by [`STEP_MS`] per step unless a pointer step pins its own time.

use crate::project::Project;
use anyhow::{Context, Result};
use kurbo::Point;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use takeoff_core::{
    DisplayUnit, ItemKind, KeyEvent, Modifiers, Notification, PageNumber, PersistencePort,
    PointerEvent, TakeoffError, TakeoffResult, TakeoffSession, ToolKind, WriteBack,
};

/// Virtual time between consecutive steps.
pub const STEP_MS: u64 = 200;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Raw pointer event in screen pixels.
    Pointer {
        event: PointerEvent,
        /// Milliseconds since the start of the script.
        #[serde(default)]
        at_ms: Option<u64>,
    },
    /// Press and release at one screen point.
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        shift: bool,
    },
    Key {
        event: KeyEvent,
    },
    Tool {
        tool: ToolKind,
    },
    Page {
        page: PageNumber,
    },
    Rotate,
    Zoom {
        x: f64,
        y: f64,
        factor: f64,
    },
    Ortho {
        enabled: bool,
    },
    /// Real length of the pending Scale line, e.g. `"12' 6\""` or `"3.5 m"`.
    Calibrate {
        length: String,
        #[serde(default)]
        unit: DisplayUnit,
    },
    ClearCalibration {
        page: PageNumber,
    },
    Template {
        name: String,
        kind: ItemKind,
        #[serde(default)]
        activate: bool,
    },
    ClearPage {
        page: PageNumber,
    },
    Undo,
    Redo,
    Wait {
        ms: u64,
    },
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse script {}", path.display()))
}

/// What a replay did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub steps: usize,
    /// Write-backs that reached storage.
    pub flushes: usize,
    pub notifications: Vec<Notification>,
}

/// Runs steps against a session, writing back through an optional store.
pub struct Replayer<'a, S: PersistencePort> {
    project: &'a Project,
    session: TakeoffSession,
    writeback: Option<WriteBack<S>>,
    start: Instant,
    elapsed: Duration,
    revision: u64,
    flushes: usize,
}

impl<'a, S: PersistencePort> Replayer<'a, S> {
    pub fn new(project: &'a Project, store: Option<Arc<S>>) -> Result<Self> {
        let mut session = project.session()?;
        if let Err(e) = session.load_page_from(&project.renderer()) {
            log::warn!("Replaying without a rendered page: {}", e);
        }
        let writeback = store.map(|store| {
            WriteBack::with_delay(
                store,
                project.document_id.clone(),
                project.config.write_back_delay(),
            )
        });
        Ok(Self {
            project,
            revision: session.revision(),
            session,
            writeback,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            flushes: 0,
        })
    }

    pub fn session(&self) -> &TakeoffSession {
        &self.session
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    /// Run every step, then flush anything still pending.
    pub fn run(mut self, steps: &[Step]) -> (TakeoffSession, ReplayOutcome) {
        for (index, step) in steps.iter().enumerate() {
            self.step(index, step);
        }
        self.finish();
        let notifications = self.session.take_notifications();
        let outcome = ReplayOutcome {
            steps: steps.len(),
            flushes: self.flushes,
            notifications,
        };
        (self.session, outcome)
    }

    fn step(&mut self, index: usize, step: &Step) {
        match step {
            Step::Pointer {
                at_ms: Some(at_ms), ..
            } => self.elapsed = self.elapsed.max(Duration::from_millis(*at_ms)),
            Step::Wait { ms } => self.elapsed += Duration::from_millis(*ms),
            _ => self.elapsed += Duration::from_millis(STEP_MS),
        }
        let now = self.now();

        // Input routing and page loads queue their own notifications
        let routed = matches!(
            step,
            Step::Pointer { .. }
                | Step::Click { .. }
                | Step::Key { .. }
                | Step::Page { .. }
                | Step::Rotate
                | Step::Wait { .. }
        );
        if let Err(e) = self.apply(step, now) {
            log::debug!("Step {} ({:?}) failed: {}", index, step, e);
            if !routed {
                self.session.report(&e);
            }
        }
        self.write_back(now);
    }

    fn apply(&mut self, step: &Step, now: Instant) -> TakeoffResult<()> {
        let session = &mut self.session;
        match step {
            Step::Pointer { event, .. } => session.handle_pointer(*event, now),
            Step::Click { x, y, shift } => {
                let point = Point::new(*x, *y);
                let modifiers = if *shift {
                    Modifiers::shift()
                } else {
                    Modifiers::NONE
                };
                session.handle_pointer(PointerEvent::down(point).with_modifiers(modifiers), now)?;
                session.handle_pointer(PointerEvent::up(point).with_modifiers(modifiers), now)
            }
            Step::Key { event } => session.handle_key(*event),
            Step::Tool { tool } => {
                session.set_tool(*tool);
                Ok(())
            }
            Step::Page { page } => {
                session.set_page(*page);
                session.load_page_from(&self.project.renderer())
            }
            Step::Rotate => {
                session.rotate_cw();
                session.load_page_from(&self.project.renderer())
            }
            Step::Zoom { x, y, factor } => {
                session.zoom_at(Point::new(*x, *y), *factor, now);
                Ok(())
            }
            Step::Ortho { enabled } => {
                session.set_ortho(*enabled);
                Ok(())
            }
            Step::Calibrate { length, unit } => session.apply_calibration_text(length, *unit),
            Step::ClearCalibration { page } => {
                session.clear_calibration(*page);
                Ok(())
            }
            Step::Template {
                name,
                kind,
                activate,
            } => {
                let id = session.create_template(name, *kind)?;
                if *activate {
                    session.set_active_template(Some(id))?;
                }
                Ok(())
            }
            Step::ClearPage { page } => session.clear_page(*page).map(|_| ()),
            Step::Undo => {
                session.undo();
                Ok(())
            }
            Step::Redo => {
                session.redo();
                Ok(())
            }
            Step::Wait { .. } => {
                if let Some(scale) = session.poll_rescale(now) {
                    log::debug!("Re-rendering at scale {:.2}", scale);
                    session.load_page_from(&self.project.renderer())?;
                }
                Ok(())
            }
        }
    }

    fn write_back(&mut self, now: Instant) {
        let Some(writeback) = self.writeback.as_mut() else {
            return;
        };
        let revision = self.session.revision();
        if revision != self.revision {
            self.revision = revision;
            writeback.mark_dirty(self.session.snapshot(), now);
        }
        match pollster::block_on(writeback.maybe_flush(now)) {
            Ok(true) => self.flushes += 1,
            Ok(false) => {}
            Err(e) => self.session.report(&TakeoffError::Persistence(e)),
        }
    }

    fn finish(&mut self) {
        let now = self.now();
        let Some(writeback) = self.writeback.as_mut() else {
            return;
        };
        let revision = self.session.revision();
        if revision != self.revision {
            self.revision = revision;
            writeback.mark_dirty(self.session.snapshot(), now);
        }
        match pollster::block_on(writeback.flush(now)) {
            Ok(true) => self.flushes += 1,
            Ok(false) => {}
            Err(e) => self.session.report(&TakeoffError::Persistence(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::PageSpec;
    use takeoff_core::{Key, MemoryStore};

    fn project() -> Project {
        let mut project = Project::new("plans");
        project.pages.insert(
            1,
            PageSpec {
                width: 1000.0,
                height: 1000.0,
                edges: Vec::new(),
            },
        );
        project
    }

    fn click(x: f64, y: f64) -> Step {
        Step::Click { x, y, shift: false }
    }

    #[test]
    fn test_parse_steps() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[
                {"action":"tool","tool":"Line"},
                {"action":"click","x":10.0,"y":20.0},
                {"action":"key","event":{"key":"Enter"}},
                {"action":"calibrate","length":"10 ft"},
                {"action":"pointer","event":{"type":"Move","position":{"x":1.0,"y":2.0}},"at_ms":900},
                {"action":"undo"}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0], Step::Tool { tool: ToolKind::Line });
        assert_eq!(
            steps[3],
            Step::Calibrate {
                length: "10 ft".to_string(),
                unit: DisplayUnit::Feet
            }
        );
    }

    #[test]
    fn test_replay_draws_and_writes_back() {
        let project = project();
        let store = Arc::new(MemoryStore::new());
        let replayer = Replayer::new(&project, Some(store.clone())).unwrap();
        let steps = vec![
            Step::Tool { tool: ToolKind::Line },
            click(0.0, 0.0),
            click(100.0, 0.0),
            Step::Key {
                event: KeyEvent::new(Key::Enter),
            },
        ];

        let (session, outcome) = replayer.run(&steps);
        assert_eq!(session.items().len(), 1);
        assert!(outcome.flushes >= 1);
        assert!(outcome.notifications.is_empty());

        let stored = pollster::block_on(store.load_items("plans")).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_scale_then_calibrate() {
        let project = project();
        let replayer = Replayer::<MemoryStore>::new(&project, None).unwrap();
        let steps = vec![
            Step::Tool { tool: ToolKind::Scale },
            click(0.0, 0.0),
            click(120.0, 0.0),
            Step::Calibrate {
                length: "10'".to_string(),
                unit: DisplayUnit::Feet,
            },
        ];

        let (session, outcome) = replayer.run(&steps);
        let calibration = session.calibration(1).unwrap();
        assert_eq!(calibration.display_unit, DisplayUnit::Feet);
        assert!((calibration.length(120.0) - 10.0).abs() < 1e-9);
        // Only the prompt for the reference length
        assert_eq!(outcome.notifications.len(), 1);
    }

    #[test]
    fn test_failed_steps_become_notifications() {
        let project = project();
        let replayer = Replayer::<MemoryStore>::new(&project, None).unwrap();
        let steps = vec![
            Step::Calibrate {
                length: "5 m".to_string(),
                unit: DisplayUnit::Meters,
            },
            Step::Page { page: 7 },
        ];

        let (_, outcome) = replayer.run(&steps);
        assert_eq!(outcome.notifications.len(), 2);
    }
}
