//! Embeds the application icon into the Windows executable.

use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=icon.ico");

    let is_windows = std::env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !is_windows || !Path::new("icon.ico").exists() {
        return;
    }

    let mut res = winres::WindowsResource::new();
    res.set_icon("icon.ico");
    if let Err(e) = res.compile() {
        println!("cargo:warning=failed to embed icon.ico: {e}");
    }
}
