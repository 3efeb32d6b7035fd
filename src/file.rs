use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;
use rfd::AsyncFileDialog;

/// Directory holding the executable; settings and themes live here.
pub fn app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn autosave_file_name(now: DateTime<Local>) -> String {
    format!("{}_autosave.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Writes `contents` into a fresh timestamped file inside `dir`.
pub fn write_autosave(dir: &Path, contents: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(autosave_file_name(Local::now()));
    fs::write(&path, contents)?;
    info!("auto-saved {} chars to {}", contents.chars().count(), path.display());
    Ok(path)
}

pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

pub fn save_text(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)
}

pub async fn pick_file() -> Option<PathBuf> {
    AsyncFileDialog::new()
        .add_filter("Text", &["txt", "log"])
        .pick_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}

pub async fn pick_save_file(default_name: &str) -> Option<PathBuf> {
    AsyncFileDialog::new()
        .set_file_name(default_name)
        .save_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}

pub async fn pick_folder() -> Option<PathBuf> {
    AsyncFileDialog::new()
        .pick_folder()
        .await
        .map(|handle| handle.path().to_path_buf())
}
