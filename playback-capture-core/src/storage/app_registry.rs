use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::traits::selector_resolver::SelectorResolver;

/// An installed application as reported by the device's package registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub package: String,
    /// Stream selector assigned to the package, if the registry could report it.
    #[serde(default)]
    pub uid: Option<u32>,
}

/// Snapshot of the installed-application registry.
///
/// JSON form: `[{ "package": "com.example.player", "uid": 10123 }, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppRegistry {
    apps: Vec<InstalledApp>,
}

impl AppRegistry {
    pub fn new(apps: Vec<InstalledApp>) -> Self {
        Self { apps }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let apps: Vec<InstalledApp> = serde_json::from_str(json)
            .map_err(|e| CaptureError::StorageError(format!("failed to parse app registry: {}", e)))?;
        Ok(Self::new(apps))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path)
            .map_err(|e| CaptureError::StorageError(format!("failed to read app registry: {}", e)))?;
        Self::from_json_str(&json)
    }

    pub fn apps(&self) -> &[InstalledApp] {
        &self.apps
    }

    /// Selector currently assigned to `package`.
    pub fn lookup(&self, package: &str) -> Result<u32, CaptureError> {
        let app = self
            .apps
            .iter()
            .find(|app| app.package == package)
            .ok_or_else(|| CaptureError::StorageError(format!("package '{}' is not installed", package)))?;
        app.uid
            .ok_or_else(|| CaptureError::StorageError(format!("no uid recorded for package '{}'", package)))
    }
}

impl SelectorResolver for AppRegistry {
    /// One selector per requested package, in request order; unresolvable
    /// packages are skipped.
    fn resolve(&self, app_ids: &[String]) -> Vec<u32> {
        let mut selectors = Vec::with_capacity(app_ids.len());
        for package in app_ids {
            match self.lookup(package) {
                Ok(uid) if !selectors.contains(&uid) => selectors.push(uid),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping selector lookup: {}", e),
            }
        }
        selectors
    }
}
