use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tablero_shared::{DisplayedMap, SongPriority};
use tracing::{info, warn};

use crate::config::{CURRENT_MAP_FILE, MAPS_IMAGES_DIR, MUSIC_DIR, SETTINGS_FILE};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub song_priority: SongPriority,
}

/// Files under the application-data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the data directory layout on first run.
    pub fn init(&self) -> Result<(), StoreError> {
        for dir in [
            self.root.clone(),
            self.maps_images_dir(),
            self.root.join(MUSIC_DIR),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir, source })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_map_path(&self) -> PathBuf {
        self.root.join(CURRENT_MAP_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn maps_images_dir(&self) -> PathBuf {
        self.root.join(MAPS_IMAGES_DIR)
    }

    /// Removes `file_name` from the maps image directory. Returns `false`
    /// when there was no such file. The name must be a bare file name.
    pub async fn delete_map_image(&self, file_name: &str) -> Result<bool, StoreError> {
        let path = self.maps_images_dir().join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = file_name, "map image deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Last map written, or `None` when absent or unreadable.
    pub fn load_current_map(&self) -> Option<DisplayedMap> {
        let path = self.current_map_path();
        match read_json::<DisplayedMap>(&path) {
            Ok(Some(map)) => {
                info!(map_id = %map.id, "restored current map");
                Some(map)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load current map");
                None
            }
        }
    }

    pub async fn save_current_map(&self, map: &DisplayedMap) -> Result<(), StoreError> {
        write_json(&self.current_map_path(), map).await
    }

    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        match read_json::<Settings>(&path) {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load settings");
                Settings::default()
            }
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        write_json(&self.settings_path(), settings).await
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// Writes through a sibling temp file and renames it into place, so a
/// reader never sees a half-written document.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(value)?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, body)
        .await
        .map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
