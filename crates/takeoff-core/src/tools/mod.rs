//! Drafting tools and their per-tool state machines.

mod ortho;

pub use ortho::{Axis, constrain};

use crate::calibration::PendingCalibration;
use crate::config::EngineConfig;
use crate::error::{RejectReason, TakeoffResult};
use crate::items::{
    Area, Count, GEOMETRY_EPSILON, Geometry, ItemGeometry, Line as LineGeometry, Measure,
    PageNumber,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    Measure,
    Scale,
    Line,
    Area,
    Count,
}

impl ToolKind {
    /// Whether the tool produces geometry through the drafting machine.
    pub fn is_drafting(self) -> bool {
        !matches!(self, ToolKind::Select | ToolKind::Pan)
    }
}

/// Progress of the active draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    Idle,
    FirstPoint,
    Accumulating,
}

/// Pointer position handed to the drafting machine.
#[derive(Debug, Clone, Copy)]
pub struct DraftInput {
    /// Document point, already ortho-constrained and snapped.
    pub point: Point,
    /// Document point before the ortho lock. Closing an area tests this one.
    pub unconstrained: Point,
    /// Raw screen position, used for the drag threshold.
    pub screen: Point,
    /// Close tolerance in document pixels.
    pub tolerance: f64,
    pub double_click: bool,
}

impl DraftInput {
    pub fn new(point: Point, screen: Point, tolerance: f64) -> Self {
        Self {
            point,
            unconstrained: point,
            screen,
            tolerance,
            double_click: false,
        }
    }

    pub fn with_unconstrained(mut self, unconstrained: Point) -> Self {
        self.unconstrained = unconstrained;
        self
    }

    pub fn with_double_click(mut self, double_click: bool) -> Self {
        self.double_click = double_click;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Press {
    screen_origin: Point,
    /// The press placed the draft's first point.
    fresh: bool,
    dragged: bool,
    ortho_suppressed: bool,
}

/// Transient in-progress geometry. Never persisted.
#[derive(Debug, Clone)]
pub struct Draft {
    pub tool: ToolKind,
    pub page: PageNumber,
    /// Committed vertices.
    pub points: Vec<Point>,
    /// Live pointer position for the preview.
    pub cursor: Option<Point>,
    press: Option<Press>,
}

impl Draft {
    fn new(tool: ToolKind, page: PageNumber) -> Self {
        Self {
            tool,
            page,
            points: Vec::new(),
            cursor: None,
            press: None,
        }
    }

    pub fn phase(&self) -> DraftPhase {
        match self.points.len() {
            0 => DraftPhase::Idle,
            1 => DraftPhase::FirstPoint,
            _ => DraftPhase::Accumulating,
        }
    }

    /// Whether an Area press is currently being dragged out as a rectangle.
    pub fn is_rectangle_drag(&self) -> bool {
        self.tool == ToolKind::Area
            && self.points.len() == 1
            && self.press.is_some_and(|p| p.fresh && p.dragged)
    }

    /// Points to draw for the preview, including the live cursor.
    pub fn preview_points(&self) -> Vec<Point> {
        if self.is_rectangle_drag() {
            if let (Some(&start), Some(cursor)) = (self.points.first(), self.cursor) {
                return Area::rectangle(start, cursor).points;
            }
        }
        let mut points = self.points.clone();
        if let Some(cursor) = self.cursor {
            if points.last() != Some(&cursor) {
                points.push(cursor);
            }
        }
        points
    }
}

/// What a drafting event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftOutcome {
    /// State updated, nothing to commit yet.
    Pending,
    /// Geometry to create, as one history entry.
    Commit(Vec<Geometry>),
    /// A Scale draft finished and needs its real-world length.
    Calibrate(PendingCalibration),
    /// The draft was discarded.
    Cancelled,
}

/// Manages the current tool and its draft.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Lock new segments to horizontal or vertical.
    pub ortho: bool,
    /// Screen travel that turns an Area press into a rectangle drag.
    pub drag_threshold_px: f64,
    draft: Option<Draft>,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ToolManager {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            current_tool: ToolKind::default(),
            ortho: config.ortho_default,
            drag_threshold_px: config.area_drag_threshold_px,
            draft: None,
        }
    }

    /// Set the current tool, discarding any draft.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.draft.take().is_some() {
            log::debug!("Discarded {:?} draft on tool change", self.current_tool);
        }
        self.current_tool = tool;
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn phase(&self) -> DraftPhase {
        self.draft.as_ref().map_or(DraftPhase::Idle, Draft::phase)
    }

    pub fn is_drafting(&self) -> bool {
        self.draft.is_some()
    }

    /// Point the next vertex is ortho-locked against, if any.
    pub fn ortho_anchor(&self) -> Option<Point> {
        let draft = self.draft.as_ref()?;
        if draft.tool == ToolKind::Area && draft.press.is_some_and(|p| p.fresh) {
            return None;
        }
        draft.points.last().copied()
    }

    /// Whether the gesture in progress was started with ortho suppressed.
    pub fn ortho_suppressed(&self) -> bool {
        self.draft
            .as_ref()
            .and_then(|d| d.press)
            .is_some_and(|p| p.ortho_suppressed)
    }

    /// Discard the draft.
    pub fn cancel(&mut self) -> DraftOutcome {
        match self.draft.take() {
            Some(_) => DraftOutcome::Cancelled,
            None => DraftOutcome::Pending,
        }
    }

    /// Remove the most recent vertex. Returns false if there was none.
    pub fn remove_last_point(&mut self) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let removed = draft.points.pop().is_some();
        if draft.points.is_empty() {
            self.draft = None;
        }
        removed
    }

    fn draft_for(&mut self, page: PageNumber) -> &mut Draft {
        let tool = self.current_tool;
        let stale = self
            .draft
            .as_ref()
            .is_some_and(|d| d.page != page || d.tool != tool);
        if stale {
            self.draft = None;
        }
        self.draft.get_or_insert_with(|| Draft::new(tool, page))
    }

    /// Handle a pointer press.
    pub fn pointer_down(
        &mut self,
        page: PageNumber,
        input: DraftInput,
        suppress_ortho: bool,
    ) -> TakeoffResult<DraftOutcome> {
        let point = input.point;
        match self.current_tool {
            ToolKind::Select | ToolKind::Pan => Ok(DraftOutcome::Pending),
            ToolKind::Count => Ok(DraftOutcome::Commit(vec![Geometry::Count(Count::new(point))])),
            ToolKind::Measure | ToolKind::Scale => {
                let draft = self.draft_for(page);
                let fresh = draft.points.is_empty();
                if fresh {
                    draft.points.push(point);
                }
                draft.cursor = Some(point);
                draft.press = Some(Press {
                    screen_origin: input.screen,
                    fresh,
                    dragged: false,
                    ortho_suppressed: suppress_ortho,
                });
                Ok(DraftOutcome::Pending)
            }
            ToolKind::Line | ToolKind::Area => {
                let tool = self.current_tool;
                let has_points = self.draft.as_ref().is_some_and(|d| !d.points.is_empty());
                if input.double_click && has_points {
                    return self.finish();
                }
                if tool == ToolKind::Area {
                    let closes = self.draft.as_ref().is_some_and(|d| {
                        d.points.len() >= 3
                            && d.points[0].distance(input.unconstrained) <= input.tolerance
                    });
                    if closes {
                        return self.finish();
                    }
                }

                let draft = self.draft_for(page);
                let fresh = draft.points.is_empty();
                if draft.points.last() != Some(&point) {
                    draft.points.push(point);
                }
                draft.cursor = Some(point);
                draft.press = Some(Press {
                    screen_origin: input.screen,
                    fresh,
                    dragged: false,
                    ortho_suppressed: suppress_ortho,
                });
                Ok(DraftOutcome::Pending)
            }
        }
    }

    /// Handle pointer movement.
    pub fn pointer_move(&mut self, input: DraftInput) {
        let threshold = self.drag_threshold_px;
        if let Some(draft) = self.draft.as_mut() {
            draft.cursor = Some(input.point);
            if let Some(press) = draft.press.as_mut() {
                if input.screen.distance(press.screen_origin) > threshold {
                    press.dragged = true;
                }
            }
        }
    }

    /// Handle a pointer release.
    pub fn pointer_up(&mut self, input: DraftInput) -> TakeoffResult<DraftOutcome> {
        let Some(draft) = self.draft.as_mut() else {
            return Ok(DraftOutcome::Pending);
        };
        draft.cursor = Some(input.point);
        let Some(press) = draft.press.take() else {
            return Ok(DraftOutcome::Pending);
        };

        let tool = draft.tool;
        match tool {
            ToolKind::Measure | ToolKind::Scale => {
                if press.fresh && !press.dragged {
                    return Ok(DraftOutcome::Pending);
                }
                self.complete_two_point(input.point)
            }
            ToolKind::Area => {
                if !(press.fresh && press.dragged && draft.points.len() == 1) {
                    return Ok(DraftOutcome::Pending);
                }
                let area = Area::rectangle(draft.points[0], input.point);
                if let Err(reason) = area.validate() {
                    log::warn!("Rejected rectangle area: {}", reason);
                    return Err(reason.into());
                }
                self.draft = None;
                Ok(DraftOutcome::Commit(vec![Geometry::Area(area)]))
            }
            _ => Ok(DraftOutcome::Pending),
        }
    }

    fn complete_two_point(&mut self, end: Point) -> TakeoffResult<DraftOutcome> {
        let Some(draft) = self.draft.as_mut() else {
            return Ok(DraftOutcome::Pending);
        };
        let Some(&start) = draft.points.first() else {
            return Ok(DraftOutcome::Pending);
        };
        if start.distance(end) < GEOMETRY_EPSILON {
            log::warn!("Rejected zero-length {:?}", draft.tool);
            return Err(RejectReason::ZeroLengthSegment.into());
        }

        let outcome = match draft.tool {
            ToolKind::Scale => DraftOutcome::Calibrate(PendingCalibration {
                page: draft.page,
                start,
                end,
            }),
            _ => DraftOutcome::Commit(vec![Geometry::Measure(Measure::new(start, end))]),
        };
        self.draft = None;
        Ok(outcome)
    }

    /// Finish a Line or Area draft (double-click or Enter).
    ///
    /// On rejection the draft is kept so the user can keep editing it.
    pub fn finish(&mut self) -> TakeoffResult<DraftOutcome> {
        let Some(draft) = self.draft.as_ref() else {
            return Ok(DraftOutcome::Pending);
        };
        let mut points = draft.points.clone();
        points.dedup_by(|a, b| a.distance(*b) < GEOMETRY_EPSILON);

        let outcome = match draft.tool {
            ToolKind::Line => {
                if points.len() < 2 {
                    log::warn!("Rejected line with {} distinct points", points.len());
                    return Err(RejectReason::PointCount {
                        kind: "Line",
                        expected: "at least 2",
                        got: points.len(),
                    }
                    .into());
                }
                let segments = points
                    .windows(2)
                    .map(|w| Geometry::Line(LineGeometry::segment(w[0], w[1])))
                    .collect();
                DraftOutcome::Commit(segments)
            }
            ToolKind::Area => {
                if points.len() > 1
                    && points[0].distance(points[points.len() - 1]) < GEOMETRY_EPSILON
                {
                    points.pop();
                }
                let area = Geometry::Area(Area::new(points));
                if let Err(reason) = area.validate() {
                    log::warn!("Rejected area: {}", reason);
                    return Err(reason.into());
                }
                DraftOutcome::Commit(vec![area])
            }
            _ => return Ok(DraftOutcome::Pending),
        };
        self.draft = None;
        Ok(outcome)
    }
}
