//! Window themes: three built-ins plus palette files in `themes/`.
//!
//! A palette file is `themes/<name>.json` with `#rrggbb` colors:
//!
//! ```json
//! { "background": "#1e1e1e", "text": "#d4d4d4", "primary": "#569cd6",
//!   "success": "#6a9955", "danger": "#f44747" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use iced::font::Family;
use iced::theme::Palette;
use iced::{Color, Font, Theme};
use log::warn;
use serde::Deserialize;

use crate::hex;

pub const BUILTIN_THEMES: [&str; 3] = ["default", "light", "dark"];

#[derive(Debug, Deserialize)]
struct PaletteFile {
    background: String,
    text: String,
    primary: String,
    success: String,
    danger: String,
}

pub fn themes_dir() -> PathBuf {
    crate::file::app_dir().join("themes")
}

/// Built-in names followed by the palette files found in `dir`.
pub fn available(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_THEMES.iter().map(|s| s.to_string()).collect();
    if let Ok(entries) = fs::read_dir(dir) {
        let mut external: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|name| !BUILTIN_THEMES.contains(&name.as_str()))
            .collect();
        external.sort();
        names.extend(external);
    }
    names
}

pub fn resolve(name: &str, dir: &Path) -> Theme {
    match name {
        "default" => Theme::Dark,
        "light" => Theme::Light,
        "dark" => Theme::TokyoNightStorm,
        other => load_palette(other, dir).unwrap_or_else(|| {
            warn!("theme `{}` unavailable, using default", other);
            Theme::Dark
        }),
    }
}

fn load_palette(name: &str, dir: &Path) -> Option<Theme> {
    let path = dir.join(format!("{}.json", name));
    let text = fs::read_to_string(&path).ok()?;
    let file: PaletteFile = match serde_json::from_str(&text) {
        Ok(file) => file,
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            return None;
        }
    };
    let palette = Palette {
        background: parse_color(&file.background)?,
        text: parse_color(&file.text)?,
        primary: parse_color(&file.primary)?,
        success: parse_color(&file.success)?,
        danger: parse_color(&file.danger)?,
    };
    Some(Theme::custom(name.to_string(), palette))
}

/// `#rrggbb` or `rrggbb`.
pub fn parse_color(s: &str) -> Option<Color> {
    let digits = s.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    match hex::decode(digits).ok()?.as_slice() {
        [r, g, b] => Some(Color::from_rgb8(*r, *g, *b)),
        _ => None,
    }
}

pub fn font(family: &str) -> Font {
    match family {
        "Sans Serif" => Font::DEFAULT,
        "Serif" => Font {
            family: Family::Serif,
            ..Font::DEFAULT
        },
        _ => Font::MONOSPACE,
    }
}
