use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// The single on-disk model artifact. Every save overwrites it.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModelStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load<M: DeserializeOwned>(&self) -> Result<M> {
        let bytes = std::fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?;
        bincode::deserialize(&bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Writes to a sibling temp file and renames it over the artifact, so a
    /// crash mid-write never leaves a truncated model behind.
    pub fn save<M: Serialize>(&self, model: &M) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let bytes = bincode::serialize(model).map_err(|e| Error::Encode(e.to_string()))?;

        let tmp = self.tmp_path();
        std::fs::write(&tmp, bytes).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
