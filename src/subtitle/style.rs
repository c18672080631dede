//! Burn-in subtitle style and its translation to the transcoder's
//! `force_style` override syntax.
//!
//! The subtitles filter renders through libass, so colors are written as
//! `&HAABBGGRR`: alpha first, then the channels in reverse order.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rgb
// ---------------------------------------------------------------------------

/// Opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from unbounded channel values, clamping each to `0..=255`.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        let c = |v: i64| v.clamp(0, 255) as u8;
        Self::new(c(r), c(g), c(b))
    }

    /// Build from unit-range floats (`0.0..=1.0`), as color pickers report.
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        let c = |v: f32| (v * 255.0).round() as i64;
        Self::clamped(c(r), c(g), c(b))
    }

    /// `&H00BBGGRR`.  The alpha byte is always `00` (opaque).
    pub fn ass_token(self) -> String {
        format!("&H00{:02X}{:02X}{:02X}", self.b, self.g, self.r)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Where subtitles are anchored on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    #[default]
    BottomCenter,
    TopCenter,
    Center,
    BottomLeft,
}

impl Alignment {
    pub const ALL: [Alignment; 4] = [
        Alignment::BottomCenter,
        Alignment::TopCenter,
        Alignment::Center,
        Alignment::BottomLeft,
    ];

    /// libass alignment code (legacy SSA numbering).
    pub fn code(self) -> u8 {
        match self {
            Alignment::BottomCenter => 2,
            Alignment::TopCenter => 6,
            Alignment::Center => 10,
            Alignment::BottomLeft => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Alignment::BottomCenter => "bottom-center",
            Alignment::TopCenter => "top-center",
            Alignment::Center => "center",
            Alignment::BottomLeft => "bottom-left",
        }
    }
}

impl std::str::FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Alignment::ALL
            .into_iter()
            .find(|a| a.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown alignment '{s}' (expected bottom-center, top-center, center or bottom-left)")
            })
    }
}

// ---------------------------------------------------------------------------
// SubtitleStyle
// ---------------------------------------------------------------------------

/// Appearance of burned-in subtitles.
///
/// ```rust
/// use subburn::subtitle::{Alignment, Rgb, SubtitleStyle};
///
/// let style = SubtitleStyle::new(32, 40, Rgb::new(255, 0, 0), Alignment::TopCenter);
/// assert_eq!(
///     style.translate(),
///     "FontSize=32,PrimaryColour=&H000000FF,Alignment=6,MarginV=40,\
///      Outline=1,OutlineColour=&H00000000,BorderStyle=1"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    /// Points, `10..=60`.
    pub font_size: u32,
    /// Vertical margin in pixels, `0..=100`.
    pub margin_v: u32,
    pub alignment: Alignment,
    // Last: serialises as a TOML sub-table.
    pub color: Rgb,
}

impl SubtitleStyle {
    pub const FONT_SIZE_RANGE: (u32, u32) = (10, 60);
    pub const MARGIN_RANGE: (u32, u32) = (0, 100);

    /// Build a style, clamping size and margin into range.
    pub fn new(font_size: u32, margin_v: u32, color: Rgb, alignment: Alignment) -> Self {
        Self {
            font_size,
            margin_v,
            color,
            alignment,
        }
        .clamped()
    }

    /// Copy with size and margin forced into range (e.g. after loading a
    /// hand-edited settings file).
    pub fn clamped(&self) -> Self {
        let (fmin, fmax) = Self::FONT_SIZE_RANGE;
        let (mmin, mmax) = Self::MARGIN_RANGE;
        Self {
            font_size: self.font_size.clamp(fmin, fmax),
            margin_v: self.margin_v.clamp(mmin, mmax),
            ..self.clone()
        }
    }

    /// The `force_style` override for this style.
    pub fn translate(&self) -> String {
        let s = self.clamped();
        format!(
            "FontSize={},PrimaryColour={},Alignment={},MarginV={},\
             Outline=1,OutlineColour=&H00000000,BorderStyle=1",
            s.font_size,
            s.color.ass_token(),
            s.alignment.code(),
            s.margin_v
        )
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_size: 24,
            margin_v: 20,
            color: Rgb::WHITE,
            alignment: Alignment::BottomCenter,
        }
    }
}

// ---------------------------------------------------------------------------
// Path escaping
// ---------------------------------------------------------------------------

/// Escape a path for embedding inside a single-quoted filter argument:
/// every `'` becomes `\'`.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\'', "\\'")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
