//! Plain-text legend tables.

use std::fmt::Write;
use takeoff_core::{DocumentLegend, LegendRow, PageLegend, hex_for_token};

fn write_row(out: &mut String, row: &LegendRow) {
    let name = if row.is_markup {
        format!("{} (markup)", row.name)
    } else {
        row.name.clone()
    };
    let color = hex_for_token(&row.style.color_token).unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "  {:<7} {:<12} {:<24} {:>12.2} {:<4} {:>5} items",
        color, row.category, name, row.quantity, row.unit, row.item_count
    );
}

pub fn format_page(legend: &PageLegend) -> String {
    let mut out = String::new();
    if legend.uncalibrated {
        let _ = writeln!(out, "Page {} (uncalibrated)", legend.page);
    } else {
        let _ = writeln!(out, "Page {}", legend.page);
    }
    if legend.rows.is_empty() {
        out.push_str("  no items\n");
    }
    for row in &legend.rows {
        write_row(&mut out, row);
    }
    out
}

pub fn format_document(legend: &DocumentLegend) -> String {
    let mut out = String::new();
    for page in &legend.pages {
        out.push_str(&format_page(page));
    }
    if legend.pages.len() > 1 {
        out.push_str("Totals\n");
        for row in &legend.totals {
            write_row(&mut out, row);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_core::{GroupKey, ItemKind, ItemStyle};

    fn row(name: &str, quantity: f64) -> LegendRow {
        LegendRow {
            key: GroupKey::AdHoc {
                kind: ItemKind::Line,
                name: name.to_string(),
                style: ItemStyle::new("red"),
            },
            kind: ItemKind::Line,
            name: name.to_string(),
            category: "Linear".to_string(),
            unit: "px".to_string(),
            style: ItemStyle::new("red"),
            quantity,
            item_count: 2,
            is_markup: false,
            uncalibrated: true,
        }
    }

    #[test]
    fn test_format_uncalibrated_page() {
        let legend = PageLegend {
            page: 3,
            uncalibrated: true,
            rows: vec![row("Wall", 42.0)],
        };
        let text = format_page(&legend);
        assert!(text.starts_with("Page 3 (uncalibrated)\n"));
        assert!(text.contains("Wall"));
        assert!(text.contains("42.00 px"));
        assert!(text.contains("#dc2626"));
    }

    #[test]
    fn test_totals_only_for_several_pages() {
        let page = PageLegend {
            page: 1,
            uncalibrated: false,
            rows: Vec::new(),
        };
        let single = DocumentLegend {
            pages: vec![page.clone()],
            totals: Vec::new(),
        };
        assert!(!format_document(&single).contains("Totals"));
        assert!(format_document(&single).contains("no items"));

        let double = DocumentLegend {
            pages: vec![page.clone(), PageLegend { page: 2, ..page }],
            totals: vec![row("Wall", 1.0)],
        };
        assert!(format_document(&double).contains("Totals"));
    }
}
