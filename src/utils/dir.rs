use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

pub const APPLICATION_DIR: &str = "hourplan";

/// Directory holding the store and logs. `%APPDATA%` on Windows, `$XDG_DATA_HOME` or
/// `$HOME/.local/share` on Linux, `$HOME/Library/Application Support` on macOS.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = platform_data_dir()?;
    path.push(APPLICATION_DIR);

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Couldn't create {path:?}")),
    }
}

fn platform_data_dir() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            env::var("APPDATA")
                .map(PathBuf::from)
                .context("APPDATA should be present on Windows")
        } else if #[cfg(target_os = "macos")] {
            env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .context("Couldn't find HOME")
        } else {
            env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/share")))
                .context("Couldn't find neither XDG_DATA_HOME nor HOME")
        }
    }
}
