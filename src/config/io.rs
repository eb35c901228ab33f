use std::env::current_exe;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{debug, info, warn};

use crate::config::types::Config;
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "midi-pad-remote.json";

// the executable's path with a json extension, e.g. F:\midi-pad-remote.json on a usb stick
fn portable_config_path() -> Option<PathBuf> {
    let mut path = current_exe()
        .map_err(|err| warn!("failed to get current exe path: {:?}", err))
        .ok()?;

    if !path.set_extension("json") {
        warn!("current exe has no filename: {}", path.to_string_lossy());
        return None;
    }
    Some(path)
}

// the per-user config directory, such as %AppData% on windows
fn local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "midi-pad-remote", "midi-pad-remote")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// An explicit path wins. Otherwise a portable file next to the executable is used when it
/// exists, falling back to the per-user directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = portable_config_path() {
        match std::fs::metadata(&path) {
            Ok(attr) if attr.is_file() => return Ok(path),
            Ok(_) => debug!("{} is not a file", path.to_string_lossy()),
            Err(err) => info!("No portable config at {} ({:?})", path.to_string_lossy(), err),
        }
    }

    local_config_path().ok_or(ConfigError::NoConfigPath)
}

/// Exclusive lock on the config file. Holding it keeps a second instance from driving the
/// same peripheral.
pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

/// The config file. It is only read; nothing is ever written back.
#[derive(Debug, Clone)]
pub struct ConfigIO {
    path: PathBuf,
}

impl ConfigIO {
    /// Resolves the config path and makes sure the file exists, so that it can be locked.
    pub fn new_sync(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_config_path(explicit)?;
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(directory)?;
        }
        OpenOptions::new().write(true).create(true).truncate(false).open(&path)?;

        Ok(ConfigIO { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        Ok(ConfigIOLocker { rw_lock: RwLock::new(file) })
    }

    pub async fn read(&self) -> Result<Config, ConfigError> {
        info!("Reading config file");
        let content = tokio::fs::read(&self.path).await?;
        parse(&content)
    }
}

fn parse(content: &[u8]) -> Result<Config, ConfigError> {
    // a freshly created file
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Config::default());
    }

    let content = str::from_utf8(content)?;
    Ok(serde_json::from_str(content)?)
}
