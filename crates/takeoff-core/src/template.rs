//! Reusable item templates.

use crate::error::{TakeoffError, TakeoffResult};
use crate::items::{ItemKind, ItemStyle, TemplateLink};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for templates.
pub type TemplateId = Uuid;

/// A named, styled recipe that items can be tagged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub is_markup: bool,
    pub style: ItemStyle,
}

impl Template {
    /// Create a template with the per-kind default unit and category.
    ///
    /// The name is trimmed and must not be empty.
    pub fn new(name: &str, kind: ItemKind, style: ItemStyle) -> TakeoffResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: validate_name(name)?,
            kind,
            category: kind.default_category().to_string(),
            unit: kind.default_unit().to_string(),
            is_markup: false,
            style,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn markup(mut self) -> Self {
        self.is_markup = true;
        self
    }

    /// Link fields copied onto items tagged with this template.
    pub fn link(&self) -> TemplateLink {
        TemplateLink {
            template_id: Some(self.id),
            template_name: self.name.clone(),
            category: self.category.clone(),
            unit: self.unit.clone(),
            is_markup: self.is_markup,
        }
    }
}

fn validate_name(name: &str) -> TakeoffResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TakeoffError::InvalidTemplate(
            "template name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// The templates of a document, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn insert(&mut self, template: Template) -> TemplateId {
        let id = template.id;
        self.templates.retain(|t| t.id != id);
        self.templates.push(template);
        id
    }

    pub fn get(&self, id: TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn require(&self, id: TemplateId) -> TakeoffResult<&Template> {
        self.get(id).ok_or(TakeoffError::TemplateNotFound(id))
    }

    /// Rename a template and return the new trimmed name.
    pub fn rename(&mut self, id: TemplateId, name: &str) -> TakeoffResult<String> {
        let name = validate_name(name)?;
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TakeoffError::TemplateNotFound(id))?;
        template.name = name.clone();
        Ok(name)
    }

    pub fn remove(&mut self, id: TemplateId) -> TakeoffResult<Template> {
        let index = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or(TakeoffError::TemplateNotFound(id))?;
        Ok(self.templates.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn by_kind(&self, kind: ItemKind) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(move |t| t.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let area = Template::new("Slab", ItemKind::Area, ItemStyle::new("blue")).unwrap();
        assert_eq!(area.unit, "sq ft");
        assert_eq!(area.category, "Area");

        let count = Template::new("Outlet", ItemKind::Count, ItemStyle::new("red")).unwrap();
        assert_eq!(count.unit, "ea");
        assert_eq!(count.category, "Count");

        let line = Template::new("Curb", ItemKind::Line, ItemStyle::new("green")).unwrap();
        assert_eq!(line.unit, "ft");
        assert_eq!(line.category, "Linear");
    }

    #[test]
    fn test_name_is_trimmed_and_required() {
        let template = Template::new("  Wall  ", ItemKind::Line, ItemStyle::new("blue")).unwrap();
        assert_eq!(template.name, "Wall");

        let err = Template::new("   ", ItemKind::Line, ItemStyle::new("blue"));
        assert!(matches!(err, Err(TakeoffError::InvalidTemplate(_))));
    }

    #[test]
    fn test_catalog_rename_and_remove() {
        let mut catalog = TemplateCatalog::new();
        let id = catalog.insert(Template::new("Wall", ItemKind::Line, ItemStyle::new("blue")).unwrap());

        assert_eq!(catalog.rename(id, " Partition ").unwrap(), "Partition");
        assert_eq!(catalog.get(id).unwrap().name, "Partition");
        assert!(catalog.rename(id, "").is_err());

        catalog.remove(id).unwrap();
        assert!(catalog.is_empty());
        assert!(matches!(catalog.remove(id), Err(TakeoffError::TemplateNotFound(_))));
    }

    #[test]
    fn test_link_copies_fields() {
        let template = Template::new("Door", ItemKind::Count, ItemStyle::new("red"))
            .unwrap()
            .with_category("Openings")
            .markup();
        let link = template.link();
        assert_eq!(link.template_id, Some(template.id));
        assert_eq!(link.template_name, "Door");
        assert_eq!(link.category, "Openings");
        assert!(link.is_markup);
    }
}
