use std::collections::BTreeSet;

use super::authorization::CaptureAuthorization;
use super::error::CaptureError;
use super::format::AudioFormat;
use super::selectors::{SelectorSet, UsageClass};

/// Filter describing which playback streams may be intercepted, bound to the
/// authorization that permits it.
///
/// Built once per session and consumed by
/// [`CaptureProvider::open`](crate::traits::capture_provider::CaptureProvider::open).
#[derive(Debug)]
pub struct CaptureConfiguration {
    authorization: CaptureAuthorization,
    selectors: SelectorSet,
    format: AudioFormat,
}

impl CaptureConfiguration {
    /// Combine an authorization with the selector filter.
    ///
    /// A missing authorization is a `ConfigurationFailed` error. A degraded
    /// selector set is accepted here; reporting it is the caller's job.
    pub fn build(
        authorization: Option<CaptureAuthorization>,
        selectors: SelectorSet,
    ) -> Result<Self, CaptureError> {
        let authorization = authorization
            .ok_or_else(|| CaptureError::ConfigurationFailed("capture authorization is missing".into()))?;

        Ok(Self {
            authorization,
            selectors,
            format: AudioFormat::PLAYBACK_CAPTURE,
        })
    }

    pub fn authorization(&self) -> &CaptureAuthorization {
        &self.authorization
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn selector_set(&self) -> &SelectorSet {
        &self.selectors
    }

    /// Selectors capture is restricted to. Empty means no restriction.
    pub fn matching_selectors(&self) -> BTreeSet<u32> {
        self.selectors.selectors().iter().copied().collect()
    }

    /// Usage classes applied to each matching selector.
    pub fn matching_usages(&self) -> &BTreeSet<UsageClass> {
        self.selectors.usages()
    }

    pub fn is_scoped(&self) -> bool {
        self.selectors.is_scoped()
    }

    /// Whether a stream played by `selector` with `usage` is captured.
    pub fn matches(&self, selector: u32, usage: UsageClass) -> bool {
        if !self.is_scoped() {
            return true;
        }
        self.selectors.selectors().contains(&selector) && self.selectors.usages().contains(&usage)
    }
}
