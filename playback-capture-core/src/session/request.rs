use std::path::PathBuf;

use crate::models::error::CaptureError;

/// A start request as delivered by the host's launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Application ids to scope the capture to; empty for unscoped capture.
    pub packages: Vec<String>,
    /// Destination, possibly relative to the storage root.
    pub file_name: PathBuf,
}

impl SessionRequest {
    /// Parse `packages` (comma separated) and `filename` parameters.
    pub fn from_params(packages: Option<&str>, filename: Option<&str>) -> Result<Self, CaptureError> {
        let file_name = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CaptureError::ConfigurationFailed("the destination file name must be set".into()))?;

        let packages = packages
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|package| !package.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            packages,
            file_name: PathBuf::from(file_name),
        })
    }
}
