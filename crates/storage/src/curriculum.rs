//! Content provider adapters.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use learn_core::model::Module;
use serde::Deserialize;

use crate::repository::{ContentProvider, StorageError};

/// On-disk curriculum document.
#[derive(Debug, Deserialize)]
struct CurriculumDocument {
    #[serde(default)]
    modules: Vec<Module>,
}

/// Parse a curriculum JSON document (`{"modules": [...]}`).
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the document is not valid.
pub fn parse_modules(json: &str) -> Result<Vec<Module>, StorageError> {
    let document: CurriculumDocument =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(document.modules)
}

/// Curriculum loaded from a JSON file every time it is requested.
#[derive(Debug, Clone)]
pub struct JsonCurriculum {
    path: PathBuf,
}

impl JsonCurriculum {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentProvider for JsonCurriculum {
    async fn modules(&self) -> Result<Vec<Module>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound);
            }
            Err(err) => return Err(err.into()),
        };
        let modules = parse_modules(&raw)?;
        tracing::debug!(
            path = %self.path.display(),
            modules = modules.len(),
            "loaded curriculum"
        );
        Ok(modules)
    }
}

/// Fixed, in-memory curriculum.
#[derive(Debug, Clone, Default)]
pub struct StaticCurriculum {
    modules: Vec<Module>,
}

impl StaticCurriculum {
    #[must_use]
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl ContentProvider for StaticCurriculum {
    async fn modules(&self) -> Result<Vec<Module>, StorageError> {
        Ok(self.modules.clone())
    }
}
