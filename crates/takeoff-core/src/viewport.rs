//! Viewport module for screen/document transforms.
//!
//! Document space is the page in pixels at a fixed reference scale. It does not
//! change with UI zoom or with the rasterization scale the renderer happens to use.

use crate::config::EngineConfig;
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Page rotation in quarter turns, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Parse a rotation from degrees. Negative and >360 values wrap.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn clockwise(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    /// Whether width and height swap on screen.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Viewport manages the transform between screen pixels and document space.
///
/// Screen points are first offset by the container origin and scroll, divided by
/// the UI zoom, then un-rotated into page orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Unrotated page size in document pixels. Zero until the page is rendered.
    pub page_size: Size,
    /// UI zoom multiplier.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub rotation: Rotation,
    /// Scroll offset of the scroll container, in screen pixels.
    pub scroll: Vec2,
    /// Screen position of the scroll container's top-left corner.
    pub origin: Point,
    /// Scale the page was last rasterized at. Never used for geometry.
    pub render_scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            page_size: Size::ZERO,
            zoom: 1.0,
            min_zoom: 0.1,
            max_zoom: 8.0,
            rotation: Rotation::Deg0,
            scroll: Vec2::ZERO,
            origin: Point::ZERO,
            render_scale: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport for a page of the given document size.
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Create an empty viewport using the zoom bounds from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            ..Default::default()
        }
    }

    /// Whether a rendered page is available to map against.
    pub fn is_ready(&self) -> bool {
        self.page_size.width > 0.0 && self.page_size.height > 0.0
    }

    /// Page size as displayed, with width and height swapped for quarter turns.
    pub fn page_size_at_rotation(&self) -> Size {
        if self.rotation.is_quarter_turn() {
            Size::new(self.page_size.height, self.page_size.width)
        } else {
            self.page_size
        }
    }

    /// Displayed page size in screen pixels.
    pub fn displayed_size(&self) -> Size {
        self.page_size_at_rotation() * self.zoom
    }

    /// Transform from document space into the rotated, unzoomed page.
    fn page_transform(&self) -> Affine {
        let w = self.page_size.width;
        let h = self.page_size.height;
        match self.rotation {
            Rotation::Deg0 => Affine::IDENTITY,
            Rotation::Deg90 => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
            Rotation::Deg180 => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
            Rotation::Deg270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
        }
    }

    /// Get the affine transform from document space to screen space.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.origin.to_vec2() - self.scroll)
            * Affine::scale(self.zoom)
            * self.page_transform()
    }

    /// Get the inverse transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        self.transform().inverse()
    }

    /// Convert a screen point to document coordinates.
    pub fn to_document(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a document point to screen coordinates.
    pub fn to_screen(&self, document_point: Point) -> Point {
        self.transform() * document_point
    }

    /// Convert a length in screen pixels to document pixels.
    pub fn tolerance_to_document(&self, screen_px: f64) -> f64 {
        screen_px / self.zoom
    }

    /// Pan the content by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.scroll -= delta;
    }

    /// Zoom, keeping the document point under `screen_point` fixed.
    ///
    /// The scroll correction is computed in closed form so that zooming in and
    /// back out by reciprocal factors restores the original scroll.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let ratio = new_zoom / self.zoom;
        let local = screen_point.to_vec2() - self.origin.to_vec2() + self.scroll;
        self.scroll += local * (ratio - 1.0);
        self.zoom = new_zoom;
    }

    /// Set the zoom directly, clamped to the allowed range.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn rotate_cw(&mut self) {
        self.rotation = self.rotation.clockwise();
    }

    /// Rasterization scale for the current zoom on a display with the given ratio.
    pub fn target_render_scale(&self, device_pixel_ratio: f64) -> f64 {
        self.zoom * device_pixel_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Viewport {
        Viewport::new(Size::new(100.0, 200.0))
    }

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9, "{:?} != {:?}", a, b);
        assert!((a.y - b.y).abs() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_identity_mapping() {
        let viewport = page();
        let screen = Point::new(12.0, 34.0);
        assert_close(viewport.to_document(screen), screen);
    }

    #[test]
    fn test_scroll_origin_and_zoom() {
        let mut viewport = page();
        viewport.origin = Point::new(10.0, 20.0);
        viewport.scroll = Vec2::new(30.0, 40.0);
        viewport.zoom = 2.0;
        // (50 - 10 + 30) / 2 = 35, (60 - 20 + 40) / 2 = 40
        assert_close(viewport.to_document(Point::new(50.0, 60.0)), Point::new(35.0, 40.0));
    }

    #[test]
    fn test_rotation_90_maps_into_swapped_page() {
        let mut viewport = page();
        viewport.set_rotation(Rotation::Deg90);
        assert_close(viewport.to_screen(Point::new(10.0, 20.0)), Point::new(180.0, 10.0));
        let size = viewport.page_size_at_rotation();
        assert!((size.width - 200.0).abs() < f64::EPSILON);
        assert!((size.height - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_all_rotations() {
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let mut viewport = page();
            viewport.rotation = rotation;
            viewport.zoom = 1.7;
            viewport.scroll = Vec2::new(13.0, -4.0);
            viewport.origin = Point::new(5.0, 9.0);
            let doc = Point::new(33.0, 71.0);
            assert_close(viewport.to_document(viewport.to_screen(doc)), doc);
        }
    }

    #[test]
    fn test_zoom_at_keeps_pivot() {
        let mut viewport = page();
        viewport.scroll = Vec2::new(20.0, 10.0);
        let pivot = Point::new(60.0, 80.0);
        let before = viewport.to_document(pivot);
        viewport.zoom_at(pivot, 2.5);
        assert_close(viewport.to_document(pivot), before);
    }

    #[test]
    fn test_zoom_in_out_does_not_drift() {
        let mut viewport = page();
        viewport.scroll = Vec2::new(17.0, 3.0);
        viewport.origin = Point::new(4.0, 4.0);
        let pivot = Point::new(41.0, 93.0);
        for _ in 0..20 {
            viewport.zoom_at(pivot, 1.1);
            viewport.zoom_at(pivot, 1.0 / 1.1);
        }
        assert!((viewport.scroll.x - 17.0).abs() < 1e-9);
        assert!((viewport.scroll.y - 3.0).abs() < 1e-9);
        assert!((viewport.zoom - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut viewport = page();
        viewport.zoom_at(Point::ZERO, 0.001);
        assert!((viewport.zoom - viewport.min_zoom).abs() < f64::EPSILON);

        viewport.zoom = 1.0;
        viewport.zoom_at(Point::ZERO, 1000.0);
        assert!((viewport.zoom - viewport.max_zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_moves_content_with_pointer() {
        let mut viewport = page();
        let doc = Point::new(10.0, 10.0);
        let before = viewport.to_screen(doc);
        viewport.pan(Vec2::new(5.0, -3.0));
        assert_close(viewport.to_screen(doc), before + Vec2::new(5.0, -3.0));
    }

    #[test]
    fn test_tolerance_scales_with_zoom() {
        let mut viewport = page();
        viewport.zoom = 4.0;
        assert!((viewport.tolerance_to_document(10.0) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rotation_from_degrees_wraps() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Deg270.clockwise(), Rotation::Deg0);
    }

    #[test]
    fn test_not_ready_without_page() {
        assert!(!Viewport::default().is_ready());
        assert!(page().is_ready());
    }
}
