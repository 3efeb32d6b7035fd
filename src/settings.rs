//! Persistent settings.
//!
//! Settings live in `settings.json` beside the executable. The file is a flat
//! JSON object; [`SettingsStore::load_snapshot`] returns it untouched while
//! [`Settings`] is the typed, versioned view the rest of the app uses.
//! Loading is forgiving: a missing or unusable value falls back to its
//! default, and keys this version does not know are carried through saves.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::connection::{ConnectionConfig, DataBits, Parity, StopBits, DEFAULT_BAUD};
use crate::error::SettingsError;
use crate::hex::DataFormat;

pub const SETTINGS_FILE: &str = "settings.json";
pub const SETTINGS_VERSION: u32 = 1;

pub const MIN_AUTO_SEND_MS: u64 = 10;
pub const MIN_AUTOSAVE_SECS: u64 = 5;
pub const FONT_SIZES: RangeInclusive<u16> = 6..=15;
pub const FONT_FAMILIES: [&str; 3] = ["Monospace", "Sans Serif", "Serif"];

pub type Snapshot = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSave {
    pub enabled: bool,
    pub directory: Option<PathBuf>,
    #[serde(deserialize_with = "number")]
    pub interval_secs: u64,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            interval_secs: 60,
        }
    }
}

/// Head/tail sentinels of the packet sniffer, as typed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sniffer {
    pub enabled: bool,
    pub head: String,
    pub tail: String,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self {
            enabled: false,
            head: "5a".to_string(),
            tail: "a5".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub font_family: String,
    #[serde(deserialize_with = "number")]
    pub font_size: u16,
    pub theme: String,
    pub receive_format: DataFormat,
    pub send_format: DataFormat,
    #[serde(deserialize_with = "number")]
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    #[serde(deserialize_with = "number")]
    pub auto_send_ms: u64,
    pub timestamp: bool,
    pub line_ending: bool,
    pub echo_sent: bool,
    pub auto_refresh_ports: bool,
    pub autosave: AutoSave,
    pub sniffer: Sniffer,
    #[serde(flatten)]
    pub extra: Snapshot,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            font_family: FONT_FAMILIES[0].to_string(),
            font_size: 9,
            theme: "default".to_string(),
            receive_format: DataFormat::Hex,
            send_format: DataFormat::Hex,
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            auto_send_ms: 1000,
            timestamp: true,
            line_ending: true,
            echo_sent: false,
            auto_refresh_ports: true,
            autosave: AutoSave::default(),
            sniffer: Sniffer::default(),
            extra: Snapshot::new(),
        }
    }
}

impl Settings {
    /// Builds typed settings from a raw snapshot. Values that do not fit
    /// their field are dropped with a warning; unknown keys end up in `extra`.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        if is_legacy(&snapshot) {
            info!("migrating legacy settings snapshot");
            return migrate_legacy(&snapshot);
        }

        let Ok(Value::Object(mut merged)) = serde_json::to_value(Settings::default()) else {
            return Settings::default();
        };
        for (key, value) in snapshot {
            let previous = merged.insert(key.clone(), value);
            if let Err(e) = serde_json::from_value::<Settings>(Value::Object(merged.clone())) {
                warn!("ignoring setting `{}`: {}", key, e);
                match previous {
                    Some(previous) => merged.insert(key, previous),
                    None => merged.remove(&key),
                };
            }
        }

        let mut settings: Settings =
            serde_json::from_value(Value::Object(merged)).unwrap_or_default();
        settings.validate();
        settings
    }

    /// Resets out-of-range values to their defaults.
    pub fn validate(&mut self) {
        let defaults = Settings::default();
        if self.version != SETTINGS_VERSION {
            info!("upgrading settings from version {} to {}", self.version, SETTINGS_VERSION);
            self.version = SETTINGS_VERSION;
        }
        if !FONT_SIZES.contains(&self.font_size) {
            warn!("font size {} out of range, using {}", self.font_size, defaults.font_size);
            self.font_size = defaults.font_size;
        }
        if self.font_family.trim().is_empty() {
            self.font_family = defaults.font_family;
        }
        if self.theme.trim().is_empty() {
            self.theme = defaults.theme;
        }
        if self.baud_rate == 0 {
            warn!("baud rate 0 is invalid, using {}", defaults.baud_rate);
            self.baud_rate = defaults.baud_rate;
        }
        if self.auto_send_ms < MIN_AUTO_SEND_MS {
            warn!("auto-send period {} ms too short, using {}", self.auto_send_ms, defaults.auto_send_ms);
            self.auto_send_ms = defaults.auto_send_ms;
        }
        if self.autosave.interval_secs < MIN_AUTOSAVE_SECS {
            warn!(
                "auto-save interval {} s too short, using {}",
                self.autosave.interval_secs, defaults.autosave.interval_secs
            );
            self.autosave.interval_secs = defaults.autosave.interval_secs;
        }
    }

    /// Connection parameters for `port` from the current settings.
    pub fn connection(&self, port: &str) -> ConnectionConfig {
        ConnectionConfig {
            port: port.to_string(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            send_format: self.send_format,
            receive_format: self.receive_format,
            line_ending: self.line_ending,
        }
    }
}

/// Accepts both `1000` and `"1000"`.
fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => T::try_from(n).map_err(|_| D::Error::custom(format!("{} is out of range", n))),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("`{}` is not a number", s))),
    }
}

// Older releases wrote one key per form control instead of named fields.
const LEGACY_PREFIXES: [&str; 3] = ["comboBox", "lineEdit", "checkBox"];
const LEGACY_THEMES: [&str; 3] = ["default", "light", "dark"];
const LEGACY_FORMATS: [DataFormat; 2] = [DataFormat::Ascii, DataFormat::Hex];
// Order and values of the old baud combo box, 384000 included.
const LEGACY_BAUDS: [u32; 12] = [
    1200, 2400, 4800, 9600, 19200, 384000, 57600, 115200, 460800, 921600, 230400, 1500000,
];

fn is_legacy(snapshot: &Snapshot) -> bool {
    !snapshot.contains_key("version")
        && snapshot
            .keys()
            .any(|k| LEGACY_PREFIXES.iter().any(|p| k.starts_with(p)))
}

fn legacy_index(snapshot: &Snapshot, key: &str) -> Option<usize> {
    match snapshot.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn legacy_pick<T: Copy>(snapshot: &Snapshot, key: &str, table: &[T]) -> Option<T> {
    legacy_index(snapshot, key).and_then(|i| table.get(i).copied())
}

fn legacy_flag(snapshot: &Snapshot, key: &str) -> Option<bool> {
    snapshot.get(key).and_then(Value::as_bool)
}

fn legacy_text<'a>(snapshot: &'a Snapshot, key: &str) -> Option<&'a str> {
    snapshot
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn migrate_legacy(snapshot: &Snapshot) -> Settings {
    let mut s = Settings::default();

    if let Some(size) = legacy_index(snapshot, "comboBox_2")
        .and_then(|i| u16::try_from(i).ok())
        .and_then(|i| i.checked_add(*FONT_SIZES.start()))
    {
        s.font_size = size;
    }
    if let Some(theme) = legacy_pick(snapshot, "comboBox_9", &LEGACY_THEMES) {
        s.theme = theme.to_string();
    }
    if let Some(format) = legacy_pick(snapshot, "comboBox_3", &LEGACY_FORMATS) {
        s.receive_format = format;
    }
    if let Some(format) = legacy_pick(snapshot, "comboBox_4", &LEGACY_FORMATS) {
        s.send_format = format;
    }
    if let Some(baud) = legacy_pick(snapshot, "comboBox_5", &LEGACY_BAUDS) {
        s.baud_rate = baud;
    }
    if let Some(bits) = legacy_pick(snapshot, "comboBox_6", &DataBits::ALL) {
        s.data_bits = bits;
    }
    if let Some(parity) = legacy_pick(snapshot, "comboBox_7", &Parity::ALL) {
        s.parity = parity;
    }
    if let Some(stop_bits) = legacy_pick(snapshot, "comboBox_8", &StopBits::ALL) {
        s.stop_bits = stop_bits;
    }
    if let Some(ms) = legacy_text(snapshot, "lineEdit_3").and_then(|t| t.parse().ok()) {
        s.auto_send_ms = ms;
    }
    if let Some(dir) = legacy_text(snapshot, "lineEdit") {
        s.autosave.directory = Some(PathBuf::from(dir));
    }
    if let Some(secs) = legacy_text(snapshot, "lineEdit_2").and_then(|t| t.parse().ok()) {
        s.autosave.interval_secs = secs;
    }
    if let Some(on) = legacy_flag(snapshot, "checkBox") {
        s.timestamp = on;
    }
    if let Some(on) = legacy_flag(snapshot, "checkBox_4") {
        s.line_ending = on;
    }
    if let Some(on) = legacy_flag(snapshot, "checkBox_2") {
        s.echo_sent = on;
    }
    s.autosave.enabled = legacy_flag(snapshot, "checkBox_3").unwrap_or(false)
        || legacy_flag(snapshot, "checkBox_5").unwrap_or(false);

    s.validate();
    s
}

/// Reads and writes the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn beside_executable() -> Self {
        Self::new(crate::file::app_dir().join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_snapshot(&self) -> Result<Snapshot, SettingsError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SettingsError::NotFound(self.path.clone()),
            _ => SettingsError::Io(e),
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Overwrites the file with `snapshot`.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), SettingsError> {
        fs::write(&self.path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Settings, SettingsError> {
        Ok(Settings::from_snapshot(self.load_snapshot()?))
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        info!("settings saved to {}", self.path.display());
        Ok(())
    }

    /// Loads settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(SettingsError::NotFound(path)) => {
                info!("no settings at {}, using defaults", path.display());
                Settings::default()
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                Settings::default()
            }
        }
    }
}
