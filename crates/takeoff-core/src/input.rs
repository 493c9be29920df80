//! Pointer and keyboard events as seen by the session.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointerEvent {
    Down {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Up {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Move {
        position: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Wheel scroll; with the command modifier held it zooms.
    Scroll {
        position: Point,
        delta: Vec2,
        #[serde(default)]
        modifiers: Modifiers,
    },
}

impl PointerEvent {
    pub fn down(position: Point) -> Self {
        PointerEvent::Down {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn up(position: Point) -> Self {
        PointerEvent::Up {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn moved(position: Point) -> Self {
        PointerEvent::Move {
            position,
            modifiers: Modifiers::NONE,
        }
    }

    /// Same event with different modifiers.
    pub fn with_modifiers(mut self, new: Modifiers) -> Self {
        match &mut self {
            PointerEvent::Down { modifiers, .. }
            | PointerEvent::Up { modifiers, .. }
            | PointerEvent::Move { modifiers, .. }
            | PointerEvent::Scroll { modifiers, .. } => *modifiers = new,
        }
        self
    }

    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Scroll { position, .. } => *position,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            PointerEvent::Down { modifiers, .. }
            | PointerEvent::Up { modifiers, .. }
            | PointerEvent::Move { modifiers, .. }
            | PointerEvent::Scroll { modifiers, .. } => *modifiers,
        }
    }
}

/// Keys the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Char(char),
}

impl Key {
    /// Unit step of an arrow key, y down.
    pub fn arrow_direction(self) -> Option<Vec2> {
        match self {
            Key::ArrowLeft => Some(Vec2::new(-1.0, 0.0)),
            Key::ArrowRight => Some(Vec2::new(1.0, 0.0)),
            Key::ArrowUp => Some(Vec2::new(0.0, -1.0)),
            Key::ArrowDown => Some(Vec2::new(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Key press with the modifiers held at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Double-click detection constants.
pub const DOUBLE_CLICK_TIME_MS: u64 = 500;
pub const DOUBLE_CLICK_DISTANCE: f64 = 5.0;

/// Detects double clicks from press times and positions.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    window: Duration,
    max_distance: f64,
    last_click: Option<(Instant, Point)>,
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DOUBLE_CLICK_TIME_MS),
            DOUBLE_CLICK_DISTANCE,
        )
    }
}

impl ClickTracker {
    pub fn new(window: Duration, max_distance: f64) -> Self {
        Self {
            window,
            max_distance,
            last_click: None,
        }
    }

    /// Register a press and report whether it completes a double click.
    pub fn register(&mut self, position: Point, now: Instant) -> bool {
        if let Some((last_time, last_position)) = self.last_click {
            let elapsed = now.saturating_duration_since(last_time);
            if elapsed < self.window && position.distance(last_position) < self.max_distance {
                // Reset to prevent triple-click being detected as another double-click
                self.last_click = None;
                return true;
            }
        }
        self.last_click = Some((now, position));
        false
    }

    pub fn reset(&mut self) {
        self.last_click = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_click_detected() {
        let mut clicks = ClickTracker::default();
        let start = Instant::now();
        assert!(!clicks.register(Point::new(10.0, 10.0), start));
        assert!(clicks.register(Point::new(12.0, 11.0), start + Duration::from_millis(200)));
    }

    #[test]
    fn test_triple_click_is_not_two_doubles() {
        let mut clicks = ClickTracker::default();
        let start = Instant::now();
        clicks.register(Point::ZERO, start);
        assert!(clicks.register(Point::ZERO, start + Duration::from_millis(100)));
        assert!(!clicks.register(Point::ZERO, start + Duration::from_millis(200)));
    }

    #[test]
    fn test_slow_or_distant_clicks() {
        let mut clicks = ClickTracker::default();
        let start = Instant::now();
        clicks.register(Point::ZERO, start);
        assert!(!clicks.register(Point::ZERO, start + Duration::from_millis(600)));
        assert!(!clicks.register(Point::new(20.0, 0.0), start + Duration::from_millis(700)));
    }

    #[test]
    fn test_event_json_defaults() {
        let event: PointerEvent =
            serde_json::from_str(r#"{"type":"Down","position":{"x":1.0,"y":2.0}}"#).unwrap();
        assert_eq!(event, PointerEvent::down(Point::new(1.0, 2.0)));

        let key: KeyEvent = serde_json::from_str(r#"{"key":"Escape"}"#).unwrap();
        assert_eq!(key, KeyEvent::new(Key::Escape));
    }

    #[test]
    fn test_with_modifiers() {
        let event = PointerEvent::moved(Point::ZERO).with_modifiers(Modifiers::shift());
        assert!(event.modifiers().shift);
        assert_eq!(event.position(), Point::ZERO);
    }
}
