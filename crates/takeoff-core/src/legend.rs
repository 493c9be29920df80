//! Per-page quantity aggregation for the legend and estimating.

use crate::calibration::Calibration;
use crate::items::{ItemKind, ItemStyle, PageNumber, TakeoffItem};
use crate::template::{TemplateCatalog, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identity of a legend row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKey {
    /// Items tagged with a template that still exists.
    Template(TemplateId),
    /// Untagged items, or items whose template was deleted.
    AdHoc {
        kind: ItemKind,
        name: String,
        style: ItemStyle,
    },
}

impl GroupKey {
    pub fn of(item: &TakeoffItem, templates: &TemplateCatalog) -> Self {
        match item.template_id() {
            Some(id) if templates.get(id).is_some() => GroupKey::Template(id),
            _ => GroupKey::AdHoc {
                kind: item.kind(),
                name: item.display_name().to_string(),
                style: item.style.clone(),
            },
        }
    }
}

/// One aggregated row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendRow {
    pub key: GroupKey,
    pub kind: ItemKind,
    pub name: String,
    pub category: String,
    /// Unit the quantity is expressed in, e.g. `ft`, `m²`, `px` or `ea`.
    pub unit: String,
    pub style: ItemStyle,
    pub quantity: f64,
    pub item_count: usize,
    pub is_markup: bool,
    pub uncalibrated: bool,
}

/// Legend of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLegend {
    pub page: PageNumber,
    /// No calibration is set; linear and area quantities are raw pixels.
    pub uncalibrated: bool,
    pub rows: Vec<LegendRow>,
}

impl PageLegend {
    /// Quantity of one group, if it has items on this page.
    pub fn quantity(&self, key: &GroupKey) -> Option<f64> {
        self.rows.iter().find(|row| &row.key == key).map(|row| row.quantity)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Legend of every page plus document-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLegend {
    pub pages: Vec<PageLegend>,
    /// Rows summed across pages per group and unit.
    pub totals: Vec<LegendRow>,
}

impl DocumentLegend {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn unit_label(kind: ItemKind, calibration: Option<&Calibration>) -> String {
    match (kind, calibration) {
        (ItemKind::Count, _) => "ea".to_string(),
        (ItemKind::Area, Some(c)) => c.display_unit.area_suffix().to_string(),
        (ItemKind::Area, None) => "px²".to_string(),
        (ItemKind::Line | ItemKind::Measure, Some(c)) => c.display_unit.suffix().to_string(),
        (ItemKind::Line | ItemKind::Measure, None) => "px".to_string(),
    }
}

/// Quantity of one item in display units, or raw pixels without calibration.
pub fn item_quantity(item: &TakeoffItem, calibration: Option<&Calibration>) -> f64 {
    let raw = item.geometry.raw_quantity();
    match (item.kind(), calibration) {
        (ItemKind::Count, _) | (_, None) => raw,
        (ItemKind::Area, Some(c)) => c.area(raw),
        (ItemKind::Line | ItemKind::Measure, Some(c)) => c.length(raw),
    }
}

fn new_row(
    key: GroupKey,
    item: &TakeoffItem,
    templates: &TemplateCatalog,
    calibration: Option<&Calibration>,
) -> LegendRow {
    let kind = item.kind();
    let (name, category, style, is_markup) = match &key {
        GroupKey::Template(id) => match templates.get(*id) {
            Some(template) => (
                template.name.clone(),
                template.category.clone(),
                template.style.clone(),
                template.is_markup,
            ),
            None => link_row_fields(item),
        },
        GroupKey::AdHoc { .. } => link_row_fields(item),
    };
    LegendRow {
        key,
        kind,
        name,
        category,
        unit: unit_label(kind, calibration),
        style,
        quantity: 0.0,
        item_count: 0,
        is_markup,
        uncalibrated: calibration.is_none(),
    }
}

/// Row fields taken from the item and its link fields.
fn link_row_fields(item: &TakeoffItem) -> (String, String, ItemStyle, bool) {
    match &item.template {
        Some(link) => (
            link.template_name.clone(),
            link.category.clone(),
            item.style.clone(),
            link.is_markup,
        ),
        None => (
            item.kind().label().to_string(),
            item.kind().default_category().to_string(),
            item.style.clone(),
            false,
        ),
    }
}

fn sort_rows(rows: &mut [LegendRow]) {
    rows.sort_by(|a, b| {
        (&a.category, &a.name, a.kind, &a.key).cmp(&(&b.category, &b.name, b.kind, &b.key))
    });
}

/// Aggregate the items of one page.
pub fn page_legend(
    items: &[TakeoffItem],
    page: PageNumber,
    calibration: Option<&Calibration>,
    templates: &TemplateCatalog,
) -> PageLegend {
    let mut groups: HashMap<GroupKey, LegendRow> = HashMap::new();
    for item in items.iter().filter(|item| item.page == page) {
        let key = GroupKey::of(item, templates);
        let row = groups
            .entry(key.clone())
            .or_insert_with(|| new_row(key, item, templates, calibration));
        row.quantity += item_quantity(item, calibration);
        row.item_count += 1;
    }

    let mut rows: Vec<LegendRow> = groups.into_values().collect();
    sort_rows(&mut rows);
    PageLegend {
        page,
        uncalibrated: calibration.is_none(),
        rows,
    }
}

/// Aggregate every page that has items.
pub fn document_legend(
    items: &[TakeoffItem],
    calibrations: &HashMap<PageNumber, Calibration>,
    templates: &TemplateCatalog,
) -> DocumentLegend {
    let mut pages: Vec<PageNumber> = items.iter().map(|item| item.page).collect();
    pages.sort_unstable();
    pages.dedup();

    let pages: Vec<PageLegend> = pages
        .into_iter()
        .map(|page| page_legend(items, page, calibrations.get(&page), templates))
        .collect();

    let mut totals: BTreeMap<(GroupKey, String), LegendRow> = BTreeMap::new();
    for row in pages.iter().flat_map(|legend| legend.rows.iter()) {
        totals
            .entry((row.key.clone(), row.unit.clone()))
            .and_modify(|total| {
                total.quantity += row.quantity;
                total.item_count += row.item_count;
                total.uncalibrated |= row.uncalibrated;
            })
            .or_insert_with(|| row.clone());
    }
    let mut totals: Vec<LegendRow> = totals.into_values().collect();
    sort_rows(&mut totals);

    DocumentLegend { pages, totals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::DisplayUnit;
    use crate::items::{Area, Count, Geometry, Line, Measure};
    use crate::template::Template;
    use kurbo::Point;

    fn area(page: PageNumber, side: f64) -> TakeoffItem {
        TakeoffItem::new(
            page,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(side, side))),
            ItemStyle::new("blue"),
        )
    }

    fn count(page: PageNumber, value: f64) -> TakeoffItem {
        TakeoffItem::new(
            page,
            Geometry::Count(Count::new(Point::new(1.0, 1.0)).with_value(value)),
            ItemStyle::new("red"),
        )
    }

    #[test]
    fn test_uncalibrated_reports_pixels() {
        let items = vec![area(1, 10.0), area(1, 10.0)];
        let legend = page_legend(&items, 1, None, &TemplateCatalog::new());
        assert!(legend.uncalibrated);
        assert_eq!(legend.rows.len(), 1);
        let row = &legend.rows[0];
        assert!((row.quantity - 200.0).abs() < f64::EPSILON);
        assert_eq!(row.unit, "px²");
        assert_eq!(row.item_count, 2);
        assert!(row.uncalibrated);
    }

    #[test]
    fn test_calibrated_area_uses_squared_factor() {
        let items = vec![area(1, 10.0)];
        let calibration = Calibration::new(0.05, DisplayUnit::Meters).unwrap();
        let legend = page_legend(&items, 1, Some(&calibration), &TemplateCatalog::new());
        assert!(!legend.uncalibrated);
        assert!((legend.rows[0].quantity - 0.25).abs() < 1e-12);
        assert_eq!(legend.rows[0].unit, "m²");
    }

    #[test]
    fn test_counts_sum_values_and_ignore_calibration() {
        let items = vec![count(1, 1.0), count(1, 2.5)];
        let calibration = Calibration::new(0.05, DisplayUnit::Meters).unwrap();
        let legend = page_legend(&items, 1, Some(&calibration), &TemplateCatalog::new());
        assert!((legend.rows[0].quantity - 3.5).abs() < f64::EPSILON);
        assert_eq!(legend.rows[0].unit, "ea");
    }

    #[test]
    fn test_closed_line_includes_closing_edge() {
        let mut line = Line::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]);
        line.closed = true;
        let items = vec![TakeoffItem::new(1, Geometry::Line(line), ItemStyle::new("blue"))];
        let legend = page_legend(&items, 1, None, &TemplateCatalog::new());
        assert!((legend.rows[0].quantity - (20.0 + 200f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_groups_by_template() {
        let mut templates = TemplateCatalog::new();
        let wall = Template::new("Wall", ItemKind::Line, ItemStyle::new("teal")).unwrap();
        let link = wall.link();
        let wall_id = templates.insert(wall);

        let segment = |x: f64| {
            TakeoffItem::new(
                1,
                Geometry::Line(Line::segment(Point::new(x, 0.0), Point::new(x + 5.0, 0.0))),
                ItemStyle::new("blue"),
            )
        };
        let items = vec![
            segment(0.0).with_template(link.clone()),
            segment(10.0).with_template(link),
            segment(20.0),
        ];
        let legend = page_legend(&items, 1, None, &templates);
        assert_eq!(legend.rows.len(), 2);
        let quantity = legend.quantity(&GroupKey::Template(wall_id)).unwrap();
        assert!((quantity - 10.0).abs() < f64::EPSILON);
        let row = legend
            .rows
            .iter()
            .find(|row| row.key == GroupKey::Template(wall_id))
            .unwrap();
        assert_eq!(row.name, "Wall");
        assert_eq!(row.style.color_token, "teal");
    }

    #[test]
    fn test_deleted_template_groups_by_link_name() {
        let wall = Template::new("Wall", ItemKind::Line, ItemStyle::new("teal")).unwrap();
        let item = TakeoffItem::new(
            1,
            Geometry::Line(Line::segment(Point::ZERO, Point::new(3.0, 4.0))),
            ItemStyle::new("teal"),
        )
        .with_template(wall.link());
        let legend = page_legend(&[item], 1, None, &TemplateCatalog::new());
        assert!(matches!(
            &legend.rows[0].key,
            GroupKey::AdHoc { name, .. } if name == "Wall"
        ));
        assert_eq!(legend.rows[0].category, "Linear");
    }

    #[test]
    fn test_rows_sorted_by_category_then_name() {
        let items = vec![
            count(1, 1.0),
            area(1, 1.0),
            TakeoffItem::new(
                1,
                Geometry::Measure(Measure::new(Point::ZERO, Point::new(1.0, 0.0))),
                ItemStyle::new("green"),
            ),
        ];
        let legend = page_legend(&items, 1, None, &TemplateCatalog::new());
        let categories: Vec<&str> = legend.rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["Area", "Count", "Linear"]);
    }

    #[test]
    fn test_empty_page_has_no_rows() {
        let items = vec![area(2, 10.0)];
        assert!(page_legend(&items, 1, None, &TemplateCatalog::new()).rows.is_empty());
    }

    #[test]
    fn test_document_rollup_sums_pages() {
        let items = vec![count(1, 1.0), count(2, 2.0), count(3, 4.0)];
        let legend = document_legend(&items, &HashMap::new(), &TemplateCatalog::new());
        assert_eq!(legend.pages.len(), 3);
        assert_eq!(legend.totals.len(), 1);
        assert!((legend.totals[0].quantity - 7.0).abs() < f64::EPSILON);
        assert_eq!(legend.totals[0].item_count, 3);
    }

    #[test]
    fn test_rollup_keeps_units_apart() {
        let items = vec![area(1, 10.0), area(2, 10.0)];
        let mut calibrations = HashMap::new();
        calibrations.insert(1, Calibration::new(0.05, DisplayUnit::Meters).unwrap());
        let legend = document_legend(&items, &calibrations, &TemplateCatalog::new());
        assert_eq!(legend.totals.len(), 2);
        assert!(legend.to_json().unwrap().contains("\"totals\""));
    }
}
