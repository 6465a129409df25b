use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::storage;

pub const THEME_KEY: &str = "theme";

const DARK_TEXT: Rgb = Rgb(0x21, 0x25, 0x29);
const LIGHT_TEXT: Rgb = Rgb(0xf5, 0xf5, 0xf5);
const TEXT_LUMINANCE_THRESHOLD: f32 = 170.0;
const TITLE_LUMINANCE_THRESHOLD: f32 = 160.0;
const PALETTE_THUMBNAIL: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Dark => "dark",
            ThemeMode::Light => "light",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }
}

pub fn theme_mode_from_key(key: &str) -> ThemeMode {
    match key.trim().to_ascii_lowercase().as_str() {
        "light" => ThemeMode::Light,
        _ => ThemeMode::Dark,
    }
}

/// Saved mode, or `fallback` when nothing is stored or storage fails.
pub fn load_mode(store: &storage::Store, fallback: ThemeMode) -> ThemeMode {
    match store.get(THEME_KEY) {
        Ok(Some(value)) => theme_mode_from_key(&value),
        Ok(None) => fallback,
        Err(err) => {
            log::warn!("theme: could not read saved theme: {err:#}");
            fallback
        }
    }
}

pub fn save_mode(store: &storage::Store, mode: ThemeMode) -> Result<()> {
    store
        .set(THEME_KEY, mode.as_str())
        .context("theme: persist mode")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn luminance(&self) -> f32 {
        self.0 as f32 * 0.299 + self.1 as f32 * 0.587 + self.2 as f32 * 0.114
    }

    /// Mixes `other` into `self`; `weight` is the share of `self`.
    pub fn blend(&self, other: Rgb, weight: f32) -> Rgb {
        let weight = weight.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 * weight + b as f32 * (1.0 - weight)).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    pub fn color(&self) -> Color {
        Color::Rgb(self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub panel_bg: Color,
    pub panel_selected_bg: Color,
    pub border_idle: Color,
    pub border_focused: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub success: Color,
    pub error: Color,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(30, 30, 46),
            panel_bg: Color::Rgb(24, 24, 36),
            panel_selected_bg: Color::Rgb(69, 71, 90),
            border_idle: Color::Rgb(49, 50, 68),
            border_focused: Color::Rgb(137, 180, 250),
            text_primary: Color::Rgb(205, 214, 244),
            text_secondary: Color::Rgb(166, 173, 200),
            accent: Color::Rgb(137, 180, 250),
            success: Color::Rgb(166, 227, 161),
            error: Color::Rgb(243, 139, 168),
        }
    }

    pub fn light() -> Self {
        Self {
            bg: Color::Rgb(239, 241, 245),
            panel_bg: Color::Rgb(230, 233, 239),
            panel_selected_bg: Color::Rgb(204, 208, 218),
            border_idle: Color::Rgb(188, 192, 204),
            border_focused: Color::Rgb(30, 102, 245),
            text_primary: Color::Rgb(76, 79, 105),
            text_secondary: Color::Rgb(108, 111, 133),
            accent: Color::Rgb(30, 102, 245),
            success: Color::Rgb(64, 160, 43),
            error: Color::Rgb(210, 15, 57),
        }
    }

    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::dark(),
            ThemeMode::Light => Self::light(),
        }
    }

    /// Palette recoloured from a poster's accent colours.
    pub fn with_accent(self, accent: &AccentTheme) -> Self {
        Self {
            bg: accent.background.color(),
            panel_bg: accent.background.color(),
            panel_selected_bg: accent.list_bg.color(),
            border_idle: accent.border.color(),
            border_focused: accent.title_bg.color(),
            text_primary: accent.text.color(),
            text_secondary: accent.text.blend(accent.background, 0.75).color(),
            accent: accent.title_bg.color(),
            ..self
        }
    }
}

/// Colours derived from the dominant colours of a poster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccentTheme {
    pub gradient: [Rgb; 3],
    /// Gradient average under a 50% black overlay.
    pub background: Rgb,
    pub text: Rgb,
    pub title_bg: Rgb,
    pub title_text: Rgb,
    pub list_bg: Rgb,
    pub border: Rgb,
}

impl AccentTheme {
    /// Needs at least two colours. Missing entries repeat the last colour given.
    pub fn from_palette(colors: &[Rgb]) -> Option<Self> {
        if colors.len() < 2 {
            return None;
        }
        let pick = |index: usize| colors[index.min(colors.len() - 1)];
        let gradient = [pick(0), pick(1), pick(2)];

        let average = Rgb(
            ((gradient[0].0 as u16 + gradient[1].0 as u16 + gradient[2].0 as u16) / 3) as u8,
            ((gradient[0].1 as u16 + gradient[1].1 as u16 + gradient[2].1 as u16) / 3) as u8,
            ((gradient[0].2 as u16 + gradient[1].2 as u16 + gradient[2].2 as u16) / 3) as u8,
        );
        let text = if average.luminance() > TEXT_LUMINANCE_THRESHOLD {
            DARK_TEXT
        } else {
            LIGHT_TEXT
        };
        let title_text = if pick(0).luminance() > TITLE_LUMINANCE_THRESHOLD {
            DARK_TEXT
        } else {
            LIGHT_TEXT
        };
        let background = average.blend(Rgb(0, 0, 0), 0.5);

        Some(Self {
            gradient,
            background,
            text,
            title_bg: pick(0),
            title_text,
            list_bg: pick(3).blend(background, 0.3),
            border: pick(0),
        })
    }
}

/// Most common colours of an encoded image, most frequent first.
pub fn extract_palette(bytes: &[u8], count: usize) -> Result<Vec<Rgb>> {
    if bytes.is_empty() {
        bail!("theme: image had no bytes");
    }
    let image = image::load_from_memory(bytes).context("theme: decode image")?;
    let thumb = image
        .thumbnail(PALETTE_THUMBNAIL, PALETTE_THUMBNAIL)
        .to_rgb8();

    // Sum channels per 4-bit bucket so each swatch is the mean of the pixels in it.
    let mut buckets: HashMap<(u8, u8, u8), [u64; 4]> = HashMap::new();
    for pixel in thumb.pixels() {
        let [r, g, b] = pixel.0;
        let entry = buckets.entry((r >> 4, g >> 4, b >> 4)).or_insert([0; 4]);
        entry[0] += r as u64;
        entry[1] += g as u64;
        entry[2] += b as u64;
        entry[3] += 1;
    }

    let mut ranked: Vec<_> = buckets.into_iter().collect();
    ranked.sort_by(|(key_a, a), (key_b, b)| b[3].cmp(&a[3]).then(key_a.cmp(key_b)));

    Ok(ranked
        .into_iter()
        .take(count)
        .map(|(_, [r, g, b, n])| Rgb((r / n) as u8, (g / n) as u8, (b / n) as u8))
        .collect())
}
