//! Color palette and Count marker shapes.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named palette color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub token: &'static str,
    pub rgb: (u8, u8, u8),
}

impl PaletteEntry {
    pub fn color(&self) -> Color {
        let (r, g, b) = self.rgb;
        Color::from_rgba8(r, g, b, 255)
    }
}

/// Tokens handed out to new items and templates, in order.
pub static PALETTE: [PaletteEntry; 12] = [
    PaletteEntry { token: "blue", rgb: (37, 99, 235) },
    PaletteEntry { token: "red", rgb: (220, 38, 38) },
    PaletteEntry { token: "green", rgb: (22, 163, 74) },
    PaletteEntry { token: "orange", rgb: (234, 88, 12) },
    PaletteEntry { token: "purple", rgb: (147, 51, 234) },
    PaletteEntry { token: "teal", rgb: (13, 148, 136) },
    PaletteEntry { token: "pink", rgb: (219, 39, 119) },
    PaletteEntry { token: "amber", rgb: (217, 119, 6) },
    PaletteEntry { token: "indigo", rgb: (79, 70, 229) },
    PaletteEntry { token: "lime", rgb: (101, 163, 13) },
    PaletteEntry { token: "cyan", rgb: (8, 145, 178) },
    PaletteEntry { token: "slate", rgb: (71, 85, 105) },
];

/// Look up the display color of a token.
pub fn color_for_token(token: &str) -> Option<Color> {
    PALETTE.iter().find(|e| e.token == token).map(|e| e.color())
}

/// `#rrggbb` of a token, for shells that print or export styles.
pub fn hex_for_token(token: &str) -> Option<String> {
    let rgba = color_for_token(token)?.to_rgba8();
    Some(format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b))
}

/// Pick the color token for a new item.
///
/// The first palette token not in `in_use` wins. Once every token is taken,
/// tokens cycle by `issued`, the number of styles handed out so far.
pub fn next_color_token<'a>(in_use: impl IntoIterator<Item = &'a str>, issued: usize) -> &'static str {
    let in_use: HashSet<&str> = in_use.into_iter().collect();
    PALETTE
        .iter()
        .find(|e| !in_use.contains(e.token))
        .unwrap_or(&PALETTE[issued % PALETTE.len()])
        .token
}

/// Marker drawn for a Count item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Triangle,
    Diamond,
    Cross,
}

impl MarkerShape {
    pub const ALL: [MarkerShape; 5] = [
        MarkerShape::Circle,
        MarkerShape::Square,
        MarkerShape::Triangle,
        MarkerShape::Diamond,
        MarkerShape::Cross,
    ];

    /// Shape for the `n`th Count style issued, cycling through [`MarkerShape::ALL`].
    pub fn nth(n: usize) -> Self {
        Self::ALL[n % Self::ALL.len()]
    }
}
