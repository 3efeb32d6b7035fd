//! Quick-send snippets and their `<index> <text>` file format.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::ShortcutError;

pub const SHORTCUT_SLOTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcuts {
    slots: Vec<String>,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            slots: vec![String::new(); SHORTCUT_SLOTS],
        }
    }
}

impl Shortcuts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot text by 1-based index.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .map(String::as_str)
    }

    /// Stores the first line of `text` in the slot.
    pub fn set(&mut self, index: usize, text: &str) -> Result<(), ShortcutError> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(ShortcutError::OutOfRange(index))?;
        *slot = text.lines().next().unwrap_or_default().to_string();
        Ok(())
    }

    /// `(index, text)` for every slot, 1-based.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots.iter().enumerate().map(|(i, s)| (i + 1, s.as_str()))
    }

    pub fn export(&self) -> String {
        self.iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(index, text)| format!("{} {}\n", index, text))
            .collect()
    }

    /// Replaces slots from exported text. Nothing changes unless every line
    /// names a known slot.
    pub fn import(&mut self, text: &str) -> Result<(), ShortcutError> {
        let mut slots = vec![String::new(); SHORTCUT_SLOTS];
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (index, value) = line.split_once(' ').unwrap_or((line, ""));
            let slot = index
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| slots.get_mut(i))
                .ok_or_else(|| ShortcutError::UnknownSlot {
                    line: n + 1,
                    index: index.to_string(),
                })?;
            *slot = value.trim_end_matches('\r').to_string();
        }
        self.slots = slots;
        Ok(())
    }

    pub fn export_to(&self, path: &Path) -> Result<(), ShortcutError> {
        fs::write(path, self.export())?;
        info!("exported shortcuts to {}", path.display());
        Ok(())
    }

    pub fn import_from(&mut self, path: &Path) -> Result<(), ShortcutError> {
        let text = fs::read_to_string(path)?;
        self.import(&text)?;
        info!("imported shortcuts from {}", path.display());
        Ok(())
    }
}
