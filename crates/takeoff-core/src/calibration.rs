//! Pixel-to-real-world calibration and unit formatting.
//!
//! A page without a calibration reports raw document pixels.

use crate::error::{RejectReason, TakeoffResult};
use crate::items::PageNumber;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Units quantities can be displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayUnit {
    Meters,
    Centimeters,
    Millimeters,
    #[default]
    Feet,
    Inches,
}

impl DisplayUnit {
    pub const ALL: [DisplayUnit; 5] = [
        DisplayUnit::Meters,
        DisplayUnit::Centimeters,
        DisplayUnit::Millimeters,
        DisplayUnit::Feet,
        DisplayUnit::Inches,
    ];

    pub fn meters_per_unit(self) -> f64 {
        match self {
            DisplayUnit::Meters => 1.0,
            DisplayUnit::Centimeters => 0.01,
            DisplayUnit::Millimeters => 0.001,
            DisplayUnit::Feet => 0.3048,
            DisplayUnit::Inches => 0.0254,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DisplayUnit::Meters => "m",
            DisplayUnit::Centimeters => "cm",
            DisplayUnit::Millimeters => "mm",
            DisplayUnit::Feet => "ft",
            DisplayUnit::Inches => "in",
        }
    }

    pub fn area_suffix(self) -> &'static str {
        match self {
            DisplayUnit::Meters => "m²",
            DisplayUnit::Centimeters => "cm²",
            DisplayUnit::Millimeters => "mm²",
            DisplayUnit::Feet => "ft²",
            DisplayUnit::Inches => "in²",
        }
    }

    /// Parse a unit suffix, case-insensitively.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Some(DisplayUnit::Meters),
            "cm" | "centimeter" | "centimeters" => Some(DisplayUnit::Centimeters),
            "mm" | "millimeter" | "millimeters" => Some(DisplayUnit::Millimeters),
            "ft" | "foot" | "feet" | "'" => Some(DisplayUnit::Feet),
            "in" | "inch" | "inches" | "\"" => Some(DisplayUnit::Inches),
            _ => None,
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: DisplayUnit) -> f64 {
        value * self.meters_per_unit() / target.meters_per_unit()
    }
}

/// Scale of one page: how many meters a document pixel spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub meters_per_document_pixel: f64,
    pub display_unit: DisplayUnit,
    #[serde(default)]
    pub label: Option<String>,
}

impl Calibration {
    pub fn new(meters_per_document_pixel: f64, display_unit: DisplayUnit) -> TakeoffResult<Self> {
        if !(meters_per_document_pixel.is_finite() && meters_per_document_pixel > 0.0) {
            return Err(RejectReason::NonPositiveDistance(meters_per_document_pixel).into());
        }
        Ok(Self {
            meters_per_document_pixel,
            display_unit,
            label: None,
        })
    }

    /// Derive a calibration from a reference line of known real length.
    pub fn from_reference(
        pixel_length: f64,
        real_length: f64,
        unit: DisplayUnit,
    ) -> TakeoffResult<Self> {
        if !(pixel_length.is_finite() && pixel_length > 0.0) {
            return Err(RejectReason::NonPositiveDistance(pixel_length).into());
        }
        if !(real_length.is_finite() && real_length > 0.0) {
            return Err(RejectReason::NonPositiveDistance(real_length).into());
        }
        let calibration = Self::new(real_length * unit.meters_per_unit() / pixel_length, unit)?;
        Ok(calibration.with_label(format_length(real_length, unit)))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Display units per document pixel.
    pub fn linear_factor(&self) -> f64 {
        self.meters_per_document_pixel / self.display_unit.meters_per_unit()
    }

    /// Convert a pixel length into display units.
    pub fn length(&self, pixels: f64) -> f64 {
        pixels * self.linear_factor()
    }

    /// Convert a square-pixel area into square display units.
    pub fn area(&self, square_pixels: f64) -> f64 {
        let factor = self.linear_factor();
        square_pixels * factor * factor
    }
}

/// A completed Scale draft waiting for the user to enter its real length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCalibration {
    pub page: PageNumber,
    pub start: Point,
    pub end: Point,
}

impl PendingCalibration {
    pub fn pixel_length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn resolve(&self, real_length: f64, unit: DisplayUnit) -> TakeoffResult<Calibration> {
        Calibration::from_reference(self.pixel_length(), real_length, unit)
    }
}

/// Format a length with two decimals and its unit suffix, e.g. `12.50 ft`.
pub fn format_length(value: f64, unit: DisplayUnit) -> String {
    format!("{:.2} {}", value, unit.suffix())
}

/// Format an area with two decimals and its squared unit suffix.
pub fn format_area(value: f64, unit: DisplayUnit) -> String {
    format!("{:.2} {}", value, unit.area_suffix())
}

/// Format a length in feet as feet and whole inches, e.g. `3' 6"`.
pub fn format_feet_inches(feet: f64) -> String {
    let total_inches = (feet * 12.0).round() as i64;
    let sign = if total_inches < 0 { "-" } else { "" };
    let total_inches = total_inches.abs();
    format!("{}{}' {}\"", sign, total_inches / 12, total_inches % 12)
}

/// Parse a length such as `12.5 ft`, `300mm`, `4` or `3' 6"`.
///
/// Returns the value in the unit it was written in; a bare number takes
/// `default_unit`. Feet-inches input is returned in feet.
pub fn parse_length(input: &str, default_unit: DisplayUnit) -> TakeoffResult<(f64, DisplayUnit)> {
    let text = input.trim();
    let unparsable = || RejectReason::UnparsableLength(input.to_string());

    if let Some((feet, rest)) = text.split_once('\'') {
        let feet: f64 = feet.trim().parse().map_err(|_| unparsable())?;
        let rest = rest.trim().trim_end_matches('"').trim();
        let rest = rest
            .strip_suffix("in")
            .map(str::trim)
            .unwrap_or(rest);
        let inches: f64 = if rest.is_empty() {
            0.0
        } else {
            rest.parse().map_err(|_| unparsable())?
        };
        if feet.is_nan() || inches.is_nan() {
            return Err(unparsable().into());
        }
        return Ok((feet + inches / 12.0, DisplayUnit::Feet));
    }

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    let value: f64 = number.trim().parse().map_err(|_| unparsable())?;
    let unit = if suffix.trim().is_empty() {
        default_unit
    } else {
        DisplayUnit::from_suffix(suffix).ok_or_else(unparsable)?
    };
    Ok((value, unit))
}
