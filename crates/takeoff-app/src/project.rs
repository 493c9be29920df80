//! Project files: a document's pages, templates and takeoff state as JSON.

use anyhow::{Context, Result};
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use takeoff_core::storage::ViewerState;
use takeoff_core::{
    Calibration, EngineConfig, PageNumber, RenderPort, Rotation, Segment, SessionSnapshot,
    TakeoffError, TakeoffItem, TakeoffResult, TakeoffSession, Template,
};

/// One plan page as the renderer reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Unrotated size in document pixels.
    pub width: f64,
    pub height: f64,
    /// Flattened vector edges, in document space.
    #[serde(default)]
    pub edges: Vec<Segment>,
}

/// Everything stored in a project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub document_id: String,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub pages: BTreeMap<PageNumber, PageSpec>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub items: Vec<TakeoffItem>,
    #[serde(default)]
    pub calibrations: BTreeMap<PageNumber, Calibration>,
    #[serde(default)]
    pub viewer: ViewerState,
}

impl Project {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            config: EngineConfig::default(),
            pages: BTreeMap::new(),
            templates: Vec::new(),
            items: Vec::new(),
            calibrations: BTreeMap::new(),
            viewer: ViewerState::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read project {}", path.display()))?;
        let project: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse project {}", path.display()))?;
        project
            .config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(project)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Open a session holding this project's state. The page is not rendered yet.
    pub fn session(&self) -> Result<TakeoffSession> {
        let mut session = TakeoffSession::new(self.document_id.clone(), self.config.clone())?;
        for template in &self.templates {
            session.add_template(template.clone());
        }
        session.restore(SessionSnapshot {
            items: self.items.clone(),
            calibrations: self.calibrations.clone(),
            viewer: self.viewer,
        });
        Ok(session)
    }

    /// Copy a session's state back into the project.
    pub fn update_from(&mut self, session: &TakeoffSession) {
        let snapshot = session.snapshot();
        self.items = snapshot.items;
        self.calibrations = snapshot.calibrations;
        self.viewer = snapshot.viewer;
        self.templates = session.templates().iter().cloned().collect();
    }

    pub fn renderer(&self) -> ProjectRenderer<'_> {
        ProjectRenderer { pages: &self.pages }
    }
}

/// Serves page sizes and edges straight from the project file.
pub struct ProjectRenderer<'a> {
    pages: &'a BTreeMap<PageNumber, PageSpec>,
}

impl RenderPort for ProjectRenderer<'_> {
    fn render_page(&self, page: PageNumber, _rotation: Rotation, _scale: f64) -> TakeoffResult<Size> {
        self.pages
            .get(&page)
            .map(|spec| Size::new(spec.width, spec.height))
            .ok_or(TakeoffError::RenderUnavailable(page))
    }

    fn vector_edges(&self, page: PageNumber, _rotation: Rotation) -> Option<Vec<Segment>> {
        self.pages
            .get(&page)
            .filter(|spec| !spec.edges.is_empty())
            .map(|spec| spec.edges.clone())
    }
}
