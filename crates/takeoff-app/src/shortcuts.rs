//! Keyboard shortcut registry and documentation.

use takeoff_core::{Key, KeyEvent, Modifiers};

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: bool,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }

    /// The key event this shortcut sends, if it is a single key press.
    pub fn event(&self) -> Option<KeyEvent> {
        let key = match self.key {
            "Escape" => Key::Escape,
            "Enter" => Key::Enter,
            "Backspace" => Key::Backspace,
            "Delete" => Key::Delete,
            "Left" => Key::ArrowLeft,
            "Right" => Key::ArrowRight,
            "Up" => Key::ArrowUp,
            "Down" => Key::ArrowDown,
            name => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => return None,
                }
            }
        };
        let modifiers = Modifiers {
            ctrl: self.ctrl,
            shift: self.shift,
            ..Modifiers::NONE
        };
        Some(KeyEvent::new(key).with_modifiers(modifiers))
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("V", false, false, "Select tool"),
            Shortcut::new("H", false, false, "Pan tool"),
            Shortcut::new("M", false, false, "Measure tool"),
            Shortcut::new("K", false, false, "Scale tool (calibrate page)"),
            Shortcut::new("L", false, false, "Line tool"),
            Shortcut::new("A", false, false, "Area tool"),
            Shortcut::new("C", false, false, "Count tool"),
            Shortcut::new("O", false, false, "Toggle ortho lock"),
            Shortcut::new("Enter", false, false, "Finish line or area"),
            Shortcut::new("Escape", false, false, "Cancel current action"),
            Shortcut::new("Backspace", false, false, "Remove last point or delete selection"),
            Shortcut::new("Delete", false, false, "Delete selected item"),
            Shortcut::new("Left", false, false, "Nudge selection"),
            Shortcut::new("Left", false, true, "Nudge selection further"),
            Shortcut::new("Z", true, false, "Undo"),
            Shortcut::new("Z", true, true, "Redo"),
            Shortcut::new("Y", true, false, "Redo"),
            Shortcut::new("Shift+Click", false, false, "Place a point without ortho"),
            Shortcut::new("Ctrl+Wheel", false, false, "Zoom at the pointer"),
        ]
    }

    /// Print all shortcuts to console.
    pub fn print_all() {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(), shortcut.description);
        }
        println!();
    }
}
