//! Session state container.
//!
//! A [`TakeoffSession`] owns everything the user can change on one document:
//! items, templates, calibrations, the viewport and the active tool. Input
//! arrives through transition functions per event type and the UI reads a
//! derived [`SessionView`].

use crate::calibration::{Calibration, DisplayUnit, PendingCalibration, parse_length};
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::edges::{EdgeCache, EdgeSnapshot, EdgeSnapshotKey, RenderPort};
use crate::error::{RejectReason, TakeoffError, TakeoffResult};
use crate::history::History;
use crate::input::{ClickTracker, Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
use crate::items::{Geometry, ItemId, ItemKind, ItemPatch, ItemStyle, PageNumber, TakeoffItem};
use crate::legend::{DocumentLegend, PageLegend, document_legend, page_legend};
use crate::merge::{apply_merge, plan_merge};
use crate::palette::{MarkerShape, next_color_token};
use crate::selection::{DragMode, DragState, hit_test};
use crate::snap::{SnapContext, SnapEngine, SnapResult};
use crate::storage::{PersistencePort, SessionSnapshot, ViewerState};
use crate::template::{Template, TemplateCatalog, TemplateId};
use crate::tools::{Axis, DraftInput, DraftOutcome, DraftPhase, ToolKind, ToolManager};
use crate::viewport::{Rotation, Viewport};
use kurbo::{Point, Size, Vec2};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Zoom factor per wheel notch.
const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Arrow nudges with Shift held move this many times further.
const LARGE_NUDGE_MULTIPLIER: f64 = 10.0;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Message queued for the UI shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }
}

/// In-progress draft as the UI draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftView {
    pub tool: ToolKind,
    pub phase: DraftPhase,
    /// Committed vertices followed by the live cursor.
    pub points: Vec<Point>,
    /// The points outline a rectangle being dragged out.
    pub rectangle: bool,
}

/// Everything the UI shell needs to draw the interaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub page: PageNumber,
    pub tool: ToolKind,
    pub ortho: bool,
    pub selection: Option<ItemId>,
    pub draft: Option<DraftView>,
    pub dragging: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Last snap result, for the cursor indicator.
    pub snap: Option<SnapResult>,
    pub pending_calibration: Option<PendingCalibration>,
    pub uncalibrated: bool,
    pub zoom: f64,
    pub rotation: Rotation,
    pub notifications: Vec<Notification>,
}

/// Tool that drafts items of `kind`.
fn tool_for(kind: ItemKind) -> ToolKind {
    match kind {
        ItemKind::Measure => ToolKind::Measure,
        ItemKind::Line => ToolKind::Line,
        ItemKind::Area => ToolKind::Area,
        ItemKind::Count => ToolKind::Count,
    }
}

/// State of one open document.
pub struct TakeoffSession {
    document_id: String,
    config: EngineConfig,
    page: PageNumber,
    items: Vec<TakeoffItem>,
    history: History<TakeoffItem>,
    templates: TemplateCatalog,
    calibrations: HashMap<PageNumber, Calibration>,
    viewport: Viewport,
    device_pixel_ratio: f64,
    tools: ToolManager,
    snap: SnapEngine,
    edges: EdgeCache,
    drag: Option<DragState>,
    /// Last screen position of an active pan gesture.
    pan_anchor: Option<Point>,
    selection: Option<ItemId>,
    active_template: Option<TemplateId>,
    clicks: ClickTracker,
    last_snap: Option<SnapResult>,
    pending_calibration: Option<PendingCalibration>,
    notifications: Vec<Notification>,
    colors_issued: usize,
    shapes_issued: usize,
    rescale: Debouncer<(PageNumber, Rotation), f64>,
    /// Bumped on every change that needs writing back.
    revision: u64,
}

impl TakeoffSession {
    /// Open a session on page 1 of `document_id`.
    pub fn new(document_id: impl Into<String>, config: EngineConfig) -> TakeoffResult<Self> {
        config.validate()?;
        let mut session = Self {
            document_id: document_id.into(),
            page: 1,
            items: Vec::new(),
            history: History::new(config.history_capacity),
            templates: TemplateCatalog::new(),
            calibrations: HashMap::new(),
            viewport: Viewport::from_config(&config),
            device_pixel_ratio: 1.0,
            tools: ToolManager::from_config(&config),
            snap: SnapEngine::from_config(&config),
            edges: EdgeCache::new(),
            drag: None,
            pan_anchor: None,
            selection: None,
            active_template: None,
            clicks: ClickTracker::new(config.double_click_window(), config.double_click_distance_px),
            last_snap: None,
            pending_calibration: None,
            notifications: Vec::new(),
            colors_issued: 0,
            shapes_issued: 0,
            rescale: Debouncer::new(config.rescale_delay()),
            revision: 0,
            config,
        };
        session.edges.expect(session.edge_key());
        Ok(session)
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    pub fn items(&self) -> &[TakeoffItem] {
        &self.items
    }

    pub fn items_on_page(&self, page: PageNumber) -> impl Iterator<Item = &TakeoffItem> {
        self.items.iter().filter(move |item| item.page == page)
    }

    pub fn item(&self, id: ItemId) -> Option<&TakeoffItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> Option<ItemId> {
        self.selection
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.current_tool
    }

    pub fn active_template(&self) -> Option<TemplateId> {
        self.active_template
    }

    pub fn pending_calibration(&self) -> Option<&PendingCalibration> {
        self.pending_calibration.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Counter that changes whenever persisted state changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn edge_key(&self) -> EdgeSnapshotKey {
        EdgeSnapshotKey::new(self.document_id.clone(), self.page, self.viewport.rotation)
    }

    fn index_of(&self, id: ItemId) -> TakeoffResult<usize> {
        self.items
            .iter()
            .position(|item| item.id() == id)
            .ok_or(TakeoffError::ItemNotFound(id))
    }

    // --- Item model ---

    /// Replace the item array through history. Every item mutation goes here.
    fn commit(
        &mut self,
        mutator: impl FnOnce(&[TakeoffItem]) -> TakeoffResult<Vec<TakeoffItem>>,
    ) -> TakeoffResult<bool> {
        // A drag preview must never reach history
        self.cancel_drag();
        let changed = self.history.commit(&mut self.items, mutator)?;
        if changed {
            self.revision += 1;
            log::debug!(
                "Committed {} items ({} undo steps)",
                self.items.len(),
                self.history.undo_len()
            );
        }
        if let Some(id) = self.selection {
            if self.item(id).is_none() {
                self.selection = None;
            }
        }
        Ok(changed)
    }

    /// Style for a new item: the template's, else the next palette token.
    fn allocate_style(&mut self, kind: ItemKind, template: Option<&Template>) -> ItemStyle {
        if let Some(template) = template {
            return template.style.clone();
        }
        let in_use = self
            .items
            .iter()
            .map(|item| item.style.color_token.as_str())
            .chain(self.templates.iter().map(|t| t.style.color_token.as_str()));
        let token = next_color_token(in_use, self.colors_issued);
        self.colors_issued += 1;
        let style = ItemStyle::new(token);
        if kind == ItemKind::Count {
            let shape = MarkerShape::nth(self.shapes_issued);
            self.shapes_issued += 1;
            return style.with_shape(shape);
        }
        style
    }

    /// Create items sharing one style as a single history entry.
    fn push_items(
        &mut self,
        page: PageNumber,
        geometries: Vec<Geometry>,
        template: Option<Template>,
    ) -> TakeoffResult<Vec<ItemId>> {
        let Some(kind) = geometries.first().map(Geometry::kind) else {
            return Ok(Vec::new());
        };
        for geometry in &geometries {
            if geometry.kind() != kind {
                return Err(RejectReason::KindMismatch.into());
            }
            geometry.validate()?;
        }

        let style = self.allocate_style(kind, template.as_ref());
        let created: Vec<TakeoffItem> = geometries
            .into_iter()
            .map(|geometry| {
                let item = TakeoffItem::new(page, geometry, style.clone());
                match &template {
                    Some(template) => item.with_template(template.link()),
                    None => item,
                }
            })
            .collect();
        let ids: Vec<ItemId> = created.iter().map(TakeoffItem::id).collect();

        self.commit(move |items| {
            let mut next = items.to_vec();
            next.extend(created);
            Ok(next)
        })?;
        log::debug!("Created {} {} item(s) on page {}", ids.len(), kind.label(), page);
        Ok(ids)
    }

    /// Create one item, optionally tagged with a template.
    pub fn create_item(
        &mut self,
        page: PageNumber,
        geometry: Geometry,
        template: Option<TemplateId>,
    ) -> TakeoffResult<ItemId> {
        let template = match template {
            Some(id) => {
                let template = self.templates.require(id)?;
                if template.kind != geometry.kind() {
                    return Err(TakeoffError::InvalidTemplate(format!(
                        "template {:?} is for {} items, not {}",
                        template.name,
                        template.kind.label(),
                        geometry.kind().label()
                    )));
                }
                Some(template.clone())
            }
            None => None,
        };
        let kind = geometry.kind();
        let mut ids = self.push_items(page, vec![geometry], template)?;
        ids.pop().ok_or_else(|| {
            RejectReason::PointCount {
                kind: kind.label(),
                expected: "1",
                got: 0,
            }
            .into()
        })
    }

    /// Commit geometry produced by the drafting machine on the current page.
    fn commit_geometries(&mut self, geometries: Vec<Geometry>) -> TakeoffResult<Vec<ItemId>> {
        let kind = geometries.first().map(Geometry::kind);
        let template = self
            .active_template
            .and_then(|id| self.templates.get(id))
            .filter(|template| Some(template.kind) == kind)
            .cloned();
        self.push_items(self.page, geometries, template)
    }

    /// Apply the fields present in `patch` to one item.
    pub fn update_item(&mut self, id: ItemId, patch: &ItemPatch) -> TakeoffResult<()> {
        self.cancel_drag();
        let index = self.index_of(id)?;
        let next = self.items[index].patched(patch).inspect_err(|e| {
            log::warn!("Rejected update of item {}: {}", id, e);
        })?;
        self.commit(move |items| {
            let mut items = items.to_vec();
            items[index] = next;
            Ok(items)
        })?;
        Ok(())
    }

    pub fn delete_item(&mut self, id: ItemId) -> TakeoffResult<TakeoffItem> {
        self.cancel_drag();
        let index = self.index_of(id)?;
        let removed = self.items[index].clone();
        self.commit(|items| {
            let mut items = items.to_vec();
            items.remove(index);
            Ok(items)
        })?;
        Ok(removed)
    }

    /// Delete the selected item. Returns false when nothing is selected.
    pub fn delete_selected(&mut self) -> TakeoffResult<bool> {
        let Some(id) = self.selection.take() else {
            return Ok(false);
        };
        self.delete_item(id)?;
        Ok(true)
    }

    /// Remove every item on `page`. Returns how many were removed.
    pub fn clear_page(&mut self, page: PageNumber) -> TakeoffResult<usize> {
        let count = self.items_on_page(page).count();
        self.commit(|items| {
            Ok(items
                .iter()
                .filter(|item| item.page != page)
                .cloned()
                .collect())
        })?;
        if count > 0 {
            log::info!("Cleared {} items from page {}", count, page);
        }
        Ok(count)
    }

    /// Move the selected item by `direction` nudge steps.
    pub fn nudge_selected(&mut self, direction: Vec2, large: bool) -> TakeoffResult<bool> {
        let Some(id) = self.selection else {
            return Ok(false);
        };
        let mut step = self.viewport.tolerance_to_document(self.config.nudge_px);
        if large {
            step *= LARGE_NUDGE_MULTIPLIER;
        }
        let index = self.index_of(id)?;
        self.commit(|items| {
            let mut items = items.to_vec();
            items[index].geometry.translate(direction * step);
            Ok(items)
        })
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        self.cancel_drag();
        let changed = self.history.undo(&mut self.items);
        if changed {
            self.selection = None;
            self.revision += 1;
            log::debug!("Undo ({} steps left)", self.history.undo_len());
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_drag();
        let changed = self.history.redo(&mut self.items);
        if changed {
            self.selection = None;
            self.revision += 1;
            log::debug!("Redo");
        }
        changed
    }

    // --- Selection ---

    /// Select an item on the current page, or clear the selection.
    ///
    /// Selecting a two-point line merges it with its connected segments when
    /// merging on select is enabled; the merged line is selected instead.
    pub fn select(&mut self, id: Option<ItemId>) -> TakeoffResult<Option<ItemId>> {
        let Some(id) = id else {
            self.selection = None;
            return Ok(None);
        };
        let segment = match self.item(id) {
            Some(item) if item.page == self.page => item.geometry.is_segment(),
            _ => return Err(TakeoffError::ItemNotFound(id)),
        };

        let mut selected = id;
        if segment && self.config.merge_on_select {
            if let Some(plan) = plan_merge(&self.items, id, self.config.merge_quantization) {
                selected = plan.merged.id();
                let retired = plan.retired.len();
                self.commit(|items| Ok(apply_merge(items, &plan)))?;
                log::debug!("Merged {} segments into line {}", retired, selected);
            }
        }
        self.selection = Some(selected);
        Ok(Some(selected))
    }

    // --- Tools and navigation ---

    /// Switch tools, discarding any draft or drag.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.cancel_drag();
        self.pan_anchor = None;
        self.last_snap = None;
        self.tools.set_tool(tool);
        if tool != ToolKind::Select {
            self.selection = None;
        }
    }

    pub fn set_ortho(&mut self, ortho: bool) {
        self.tools.ortho = ortho;
    }

    pub fn ortho(&self) -> bool {
        self.tools.ortho
    }

    /// Show another page. The page must be rendered again before snapping works.
    pub fn set_page(&mut self, page: PageNumber) {
        if page == self.page {
            return;
        }
        self.cancel_drag();
        self.tools.cancel();
        self.selection = None;
        self.last_snap = None;
        self.pending_calibration = None;
        self.page = page;
        self.viewport.page_size = Size::ZERO;
        self.rescale.cancel();
        self.edges.expect(self.edge_key());
        self.revision += 1;
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        if rotation == self.viewport.rotation {
            return;
        }
        self.cancel_drag();
        self.tools.cancel();
        self.last_snap = None;
        self.viewport.set_rotation(rotation);
        self.rescale.cancel();
        self.edges.expect(self.edge_key());
        self.revision += 1;
    }

    pub fn rotate_cw(&mut self) {
        self.set_rotation(self.viewport.rotation.clockwise());
    }

    /// Set the unrotated size of the current page in document pixels.
    pub fn set_page_size(&mut self, size: Size) {
        self.viewport.page_size = size;
    }

    /// Place the page's scroll container on screen.
    pub fn set_viewport_origin(&mut self, origin: Point) {
        self.viewport.origin = origin;
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio > 0.0 {
            self.device_pixel_ratio = ratio;
        }
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.viewport.pan(delta);
    }

    /// Zoom around a screen point and schedule a re-rasterization.
    pub fn zoom_at(&mut self, pivot: Point, factor: f64, now: Instant) {
        let before = self.viewport.zoom;
        self.viewport.zoom_at(pivot, factor);
        if self.viewport.zoom == before {
            return;
        }
        self.revision += 1;
        let target = self.viewport.target_render_scale(self.device_pixel_ratio);
        if (target - self.viewport.render_scale).abs() > f64::EPSILON {
            self.rescale
                .schedule((self.page, self.viewport.rotation), target, now);
        } else {
            self.rescale.cancel();
        }
    }

    /// Apply a settled render scale. Returns it when the page should be re-rendered.
    pub fn poll_rescale(&mut self, now: Instant) -> Option<f64> {
        let ((page, rotation), scale) = self.rescale.poll(now)?;
        if page != self.page || rotation != self.viewport.rotation {
            return None;
        }
        log::debug!("Render scale settled at {:.3} for page {}", scale, page);
        self.viewport.render_scale = scale;
        Some(scale)
    }

    // --- Rendering collaborators ---

    /// Render the current page and pick up its vector edges.
    pub fn load_page_from(&mut self, renderer: &dyn RenderPort) -> TakeoffResult<()> {
        let rotation = self.viewport.rotation;
        match renderer.render_page(self.page, rotation, self.viewport.render_scale) {
            Ok(size) => self.viewport.page_size = size,
            Err(e) => {
                self.viewport.page_size = Size::ZERO;
                self.report(&e);
                return Err(e);
            }
        }
        if let Some(edges) = renderer.vector_edges(self.page, rotation) {
            self.deliver_edges(EdgeSnapshot::new(self.edge_key(), edges));
        }
        Ok(())
    }

    /// Install a vector edge snapshot. Returns false if it was stale.
    pub fn deliver_edges(&mut self, snapshot: EdgeSnapshot) -> bool {
        self.edges.accept(snapshot).is_ok()
    }

    pub fn has_vector_edges(&self) -> bool {
        self.edges.is_available()
    }

    // --- Calibration ---

    pub fn calibration(&self, page: PageNumber) -> Option<&Calibration> {
        self.calibrations.get(&page)
    }

    pub fn calibrations(&self) -> &HashMap<PageNumber, Calibration> {
        &self.calibrations
    }

    pub fn set_calibration(&mut self, page: PageNumber, calibration: Calibration) {
        log::info!(
            "Calibrated page {} at {} m/px",
            page,
            calibration.meters_per_document_pixel
        );
        self.calibrations.insert(page, calibration);
        self.revision += 1;
    }

    pub fn clear_calibration(&mut self, page: PageNumber) -> Option<Calibration> {
        let removed = self.calibrations.remove(&page);
        if removed.is_some() {
            log::info!("Cleared calibration of page {}", page);
            self.revision += 1;
        }
        removed
    }

    /// Complete the pending Scale measurement with its real length.
    ///
    /// On rejection the measurement stays pending so another value can be tried.
    pub fn apply_calibration(&mut self, real_length: f64, unit: DisplayUnit) -> TakeoffResult<()> {
        let pending = self
            .pending_calibration
            .as_ref()
            .ok_or(RejectReason::NoPendingCalibration)?;
        let calibration = pending.resolve(real_length, unit).inspect_err(|e| {
            log::warn!("Rejected calibration: {}", e);
        })?;
        let page = pending.page;
        self.pending_calibration = None;
        self.set_calibration(page, calibration);
        Ok(())
    }

    /// Like [`apply_calibration`](Self::apply_calibration) with typed input such as `12' 6"`.
    pub fn apply_calibration_text(
        &mut self,
        input: &str,
        default_unit: DisplayUnit,
    ) -> TakeoffResult<()> {
        let (value, unit) = parse_length(input, default_unit)?;
        self.apply_calibration(value, unit)
    }

    pub fn cancel_calibration(&mut self) -> Option<PendingCalibration> {
        self.pending_calibration.take()
    }

    // --- Templates ---

    /// Create a template with a fresh palette style.
    pub fn create_template(&mut self, name: &str, kind: ItemKind) -> TakeoffResult<TemplateId> {
        let style = self.allocate_style(kind, None);
        let template = Template::new(name, kind, style)?;
        Ok(self.add_template(template))
    }

    pub fn add_template(&mut self, template: Template) -> TemplateId {
        log::debug!("Added template {:?}", template.name);
        self.templates.insert(template)
    }

    /// Rename a template and every item linked to it.
    pub fn rename_template(&mut self, id: TemplateId, name: &str) -> TakeoffResult<()> {
        let name = self.templates.rename(id, name)?;
        self.commit(|items| {
            Ok(items
                .iter()
                .map(|item| {
                    let mut item = item.clone();
                    if let Some(link) = item
                        .template
                        .as_mut()
                        .filter(|link| link.template_id == Some(id))
                    {
                        link.template_name = name.clone();
                    }
                    item
                })
                .collect())
        })?;
        Ok(())
    }

    /// Delete a template. Linked items keep their link fields.
    pub fn delete_template(&mut self, id: TemplateId) -> TakeoffResult<Template> {
        let removed = self.templates.remove(id)?;
        if self.active_template == Some(id) {
            self.active_template = None;
        }
        Ok(removed)
    }

    /// Draft new items with a template, switching to the tool for its kind.
    pub fn set_active_template(&mut self, id: Option<TemplateId>) -> TakeoffResult<()> {
        if let Some(id) = id {
            let kind = self.templates.require(id)?.kind;
            self.set_tool(tool_for(kind));
        }
        self.active_template = id;
        Ok(())
    }

    /// Link an existing item to a template, taking over its style.
    pub fn tag_item(&mut self, item_id: ItemId, template_id: TemplateId) -> TakeoffResult<()> {
        let template = self.templates.require(template_id)?;
        let kind = self
            .item(item_id)
            .ok_or(TakeoffError::ItemNotFound(item_id))?
            .kind();
        if template.kind != kind {
            return Err(TakeoffError::InvalidTemplate(format!(
                "template {:?} cannot tag a {} item",
                template.name,
                kind.label()
            )));
        }
        let patch = ItemPatch {
            style: Some(template.style.clone()),
            template: Some(Some(template.link())),
            ..Default::default()
        };
        self.update_item(item_id, &patch)
    }

    // --- Aggregation ---

    pub fn legend(&self, page: PageNumber) -> PageLegend {
        page_legend(&self.items, page, self.calibrations.get(&page), &self.templates)
    }

    pub fn document_legend(&self) -> DocumentLegend {
        document_legend(&self.items, &self.calibrations, &self.templates)
    }

    // --- Pointer input ---

    /// Route a pointer event. Rejections are also queued as notifications.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) -> TakeoffResult<()> {
        let result = match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => self.pointer_down(position, button, modifiers, now),
            PointerEvent::Move {
                position,
                modifiers,
            } => {
                self.pointer_move(position, modifiers);
                Ok(())
            }
            PointerEvent::Up {
                position,
                modifiers,
                ..
            } => self.pointer_up(position, modifiers),
            PointerEvent::Scroll {
                position,
                delta,
                modifiers,
            } => {
                if modifiers.command() {
                    let factor = if delta.y < 0.0 {
                        WHEEL_ZOOM_STEP
                    } else {
                        1.0 / WHEEL_ZOOM_STEP
                    };
                    self.zoom_at(position, factor, now);
                } else {
                    self.viewport.pan(-delta);
                }
                Ok(())
            }
        };
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn pointer_down(
        &mut self,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        now: Instant,
    ) -> TakeoffResult<()> {
        if button == MouseButton::Middle || self.tools.current_tool == ToolKind::Pan {
            self.pan_anchor = Some(position);
            return Ok(());
        }
        if button != MouseButton::Left {
            return Ok(());
        }

        let double_click = self.clicks.register(position, now);
        match self.tools.current_tool {
            ToolKind::Select => self.select_press(position),
            ToolKind::Pan => Ok(()),
            _ => {
                let suppress = modifiers.shift;
                let unconstrained = self.viewport.to_document(position);
                let point = self.adjust_draft_point(position, suppress);
                let input = DraftInput::new(point, position, self.close_tolerance())
                    .with_unconstrained(unconstrained)
                    .with_double_click(double_click);
                let outcome = self.tools.pointer_down(self.page, input, suppress)?;
                self.apply_outcome(outcome)
            }
        }
    }

    fn pointer_move(&mut self, position: Point, modifiers: Modifiers) {
        if let Some(anchor) = self.pan_anchor {
            self.viewport.pan(position - anchor);
            self.pan_anchor = Some(position);
            return;
        }
        if self.drag.is_some() {
            self.drag_to(position);
            return;
        }
        if self.tools.current_tool.is_drafting() {
            let suppress = modifiers.shift || self.tools.ortho_suppressed();
            let point = self.adjust_draft_point(position, suppress);
            let input = DraftInput::new(point, position, self.close_tolerance());
            self.tools.pointer_move(input);
        }
    }

    fn pointer_up(&mut self, position: Point, modifiers: Modifiers) -> TakeoffResult<()> {
        if self.pan_anchor.take().is_some() {
            return Ok(());
        }
        if self.drag.is_some() {
            self.drag_to(position);
            return self.finish_drag();
        }
        if self.tools.current_tool.is_drafting() {
            let suppress = modifiers.shift || self.tools.ortho_suppressed();
            let point = self.adjust_draft_point(position, suppress);
            let input = DraftInput::new(point, position, self.close_tolerance());
            let outcome = self.tools.pointer_up(input)?;
            return self.apply_outcome(outcome);
        }
        Ok(())
    }

    fn close_tolerance(&self) -> f64 {
        self.viewport
            .tolerance_to_document(self.config.snap_tolerance_px)
    }

    /// Snap candidates on the current page, plus the draft's own vertices.
    fn snap_context(&self, exclude: Option<ItemId>) -> SnapContext {
        let mut context = SnapContext::from_items(&self.items, self.page, exclude)
            .with_edges(self.edges.edges());
        if let Some(draft) = self.tools.draft() {
            for &point in &draft.points {
                context.push_vertex(point);
            }
        }
        context
    }

    /// Map a screen position to a drafting point: ortho first, then snapping.
    fn adjust_draft_point(&mut self, screen: Point, suppress_ortho: bool) -> Point {
        let raw = self.viewport.to_document(screen);
        let anchor = if self.tools.ortho && !suppress_ortho {
            self.tools.ortho_anchor()
        } else {
            None
        };

        if !self.viewport.is_ready() {
            self.last_snap = None;
            return match anchor {
                Some(anchor) => Axis::dominant(anchor, raw).lock(anchor, raw),
                None => raw,
            };
        }

        let context = self.snap_context(None);
        let zoom = self.viewport.zoom;
        let result = match anchor {
            Some(anchor) => {
                let axis = Axis::dominant(anchor, raw);
                self.snap.snap_on_axis(raw, anchor, axis, &context, zoom)
            }
            None => self.snap.snap(raw, &context, zoom),
        };
        self.last_snap = Some(result);
        result.point
    }

    fn apply_outcome(&mut self, outcome: DraftOutcome) -> TakeoffResult<()> {
        match outcome {
            DraftOutcome::Pending | DraftOutcome::Cancelled => Ok(()),
            DraftOutcome::Commit(geometries) => {
                self.commit_geometries(geometries)?;
                Ok(())
            }
            DraftOutcome::Calibrate(pending) => {
                log::info!(
                    "Reference line of {:.1} px on page {} awaits its real length",
                    pending.pixel_length(),
                    pending.page
                );
                self.pending_calibration = Some(pending);
                self.notifications
                    .push(Notification::info("Enter the real length of the reference line"));
                Ok(())
            }
        }
    }

    // --- Selection and dragging ---

    fn select_press(&mut self, screen: Point) -> TakeoffResult<()> {
        if !self.viewport.is_ready() {
            self.selection = None;
            return Ok(());
        }
        let point = self.viewport.to_document(screen);
        let tolerance = self
            .viewport
            .tolerance_to_document(self.config.hit_tolerance_px);
        let Some(target) = hit_test(&self.items, self.page, point, tolerance) else {
            self.selection = None;
            return Ok(());
        };

        let hit = target.item_id();
        if self.select(Some(hit))? != Some(hit) {
            // Merged into a new line; the hit vertex index no longer applies.
            return Ok(());
        }
        let Some(item) = self.item(hit).cloned() else {
            return Ok(());
        };
        self.drag = Some(DragState::new(
            item,
            target.drag_mode(),
            point,
            self.items.clone(),
        ));
        Ok(())
    }

    /// Update the dragged item's preview. No history is recorded.
    fn drag_to(&mut self, screen: Point) {
        let point = self.viewport.to_document(screen);
        let Some((item_id, mode, target)) = self.drag.as_mut().map(|drag| {
            drag.current_point = point;
            (drag.item_id, drag.mode, drag.target())
        }) else {
            return;
        };

        let placed = match mode {
            DragMode::Handle { .. } if self.viewport.is_ready() => {
                let context = self.snap_context(Some(item_id));
                let result = self.snap.snap(target, &context, self.viewport.zoom);
                self.last_snap = Some(result);
                result.point
            }
            _ => target,
        };
        let Some(preview) = self.drag.as_ref().map(|drag| drag.preview_to(placed)) else {
            return;
        };
        if let Some(slot) = self.items.iter_mut().find(|item| item.id() == item_id) {
            *slot = preview;
        }
    }

    /// End the drag as one history entry, or revert it if the result is invalid.
    fn finish_drag(&mut self) -> TakeoffResult<()> {
        let Some(drag) = self.drag.take() else {
            return Ok(());
        };
        let invalid = self
            .item(drag.item_id)
            .and_then(|item| item.geometry.validate().err());
        if let Some(reason) = invalid {
            log::warn!("Reverted drag of item {}: {}", drag.item_id, reason);
            self.items = drag.before;
            return Err(reason.into());
        }
        if self.history.record(drag.before, &self.items) {
            self.revision += 1;
            log::debug!("Recorded drag of item {}", drag.item_id);
        }
        Ok(())
    }

    /// Abandon an active drag, restoring the item.
    fn cancel_drag(&mut self) -> bool {
        match self.drag.take() {
            Some(drag) => {
                self.items = drag.before;
                true
            }
            None => false,
        }
    }

    // --- Keyboard input ---

    /// Route a key press. Rejections are also queued as notifications.
    pub fn handle_key(&mut self, event: KeyEvent) -> TakeoffResult<()> {
        let result = self.key_down(event);
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn key_down(&mut self, event: KeyEvent) -> TakeoffResult<()> {
        let modifiers = event.modifiers;
        match event.key {
            Key::Escape => {
                if self.cancel_drag() {
                    return Ok(());
                }
                if self.tools.is_drafting() {
                    self.tools.cancel();
                } else if self.pending_calibration.take().is_none() {
                    self.selection = None;
                }
                Ok(())
            }
            Key::Enter => {
                let outcome = self.tools.finish()?;
                self.apply_outcome(outcome)
            }
            Key::Backspace => {
                if self.tools.is_drafting() {
                    self.tools.remove_last_point();
                    return Ok(());
                }
                self.delete_selected().map(|_| ())
            }
            Key::Delete => self.delete_selected().map(|_| ()),
            Key::ArrowLeft | Key::ArrowRight | Key::ArrowUp | Key::ArrowDown => {
                if self.drag.is_some() {
                    return Ok(());
                }
                match event.key.arrow_direction() {
                    Some(direction) => self
                        .nudge_selected(direction, modifiers.shift)
                        .map(|_| ()),
                    None => Ok(()),
                }
            }
            Key::Char(c) if modifiers.command() => {
                match c.to_ascii_lowercase() {
                    'z' if modifiers.shift => {
                        self.redo();
                    }
                    'z' => {
                        self.undo();
                    }
                    'y' => {
                        self.redo();
                    }
                    _ => {}
                }
                Ok(())
            }
            Key::Char(c) => {
                let tool = match c.to_ascii_lowercase() {
                    'v' => ToolKind::Select,
                    'h' => ToolKind::Pan,
                    'm' => ToolKind::Measure,
                    'k' => ToolKind::Scale,
                    'l' => ToolKind::Line,
                    'a' => ToolKind::Area,
                    'c' => ToolKind::Count,
                    'o' => {
                        self.tools.ortho = !self.tools.ortho;
                        return Ok(());
                    }
                    _ => return Ok(()),
                };
                self.set_tool(tool);
                Ok(())
            }
        }
    }

    // --- Notifications and view ---

    /// Queue an error for the UI. Stale results are dropped silently.
    pub fn report(&mut self, error: &TakeoffError) {
        let level = match error {
            TakeoffError::StaleResult(_) => return,
            TakeoffError::Persistence(_) => NotificationLevel::Error,
            _ => NotificationLevel::Warning,
        };
        self.notifications.push(Notification {
            level,
            message: error.to_string(),
        });
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Derive what the UI shell shows.
    pub fn view(&self) -> SessionView {
        let draft = self.tools.draft().map(|draft| DraftView {
            tool: draft.tool,
            phase: draft.phase(),
            points: draft.preview_points(),
            rectangle: draft.is_rectangle_drag(),
        });
        SessionView {
            page: self.page,
            tool: self.tools.current_tool,
            ortho: self.tools.ortho,
            selection: self.selection,
            draft,
            dragging: self.drag.is_some(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            snap: self.last_snap,
            pending_calibration: self.pending_calibration.clone(),
            uncalibrated: !self.calibrations.contains_key(&self.page),
            zoom: self.viewport.zoom,
            rotation: self.viewport.rotation,
            notifications: self.notifications.clone(),
        }
    }

    // --- Persistence ---

    /// Everything write-back stores.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            items: self.items.clone(),
            calibrations: self
                .calibrations
                .iter()
                .map(|(page, calibration)| (*page, calibration.clone()))
                .collect(),
            viewer: ViewerState {
                page: self.page,
                rotation: self.viewport.rotation,
                zoom: self.viewport.zoom,
            },
        }
    }

    /// Replace the session's state with a stored snapshot. History starts empty.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.cancel_drag();
        self.tools.cancel();
        self.history.clear();
        self.selection = None;
        self.pending_calibration = None;
        self.last_snap = None;
        self.items = snapshot.items;
        self.calibrations = snapshot.calibrations.into_iter().collect();
        self.page = snapshot.viewer.page;
        self.viewport.set_rotation(snapshot.viewer.rotation);
        self.viewport.set_zoom(snapshot.viewer.zoom);
        self.edges.expect(self.edge_key());
        log::info!(
            "Restored {} items for document {}",
            self.items.len(),
            self.document_id
        );
    }

    /// Load the document's stored state through `store`.
    ///
    /// Records that no longer describe valid items are skipped with a warning.
    pub async fn load_from<S: PersistencePort + ?Sized>(
        &mut self,
        store: &S,
    ) -> TakeoffResult<SessionSnapshot> {
        let document_id = self.document_id.clone();
        let records = store.load_items(&document_id).await?;
        let calibrations = store.load_calibrations(&document_id).await?;
        let viewer = store.load_viewer_state(&document_id).await?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            match record.to_item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    log::warn!("Skipping stored item {}: {}", record.id(), e);
                    self.report(&e);
                }
            }
        }

        let snapshot = SessionSnapshot {
            items,
            calibrations: calibrations
                .into_iter()
                .map(|record| (record.page, record.calibration))
                .collect(),
            viewer: viewer.unwrap_or_default(),
        };
        self.restore(snapshot.clone());
        Ok(snapshot)
    }
}
