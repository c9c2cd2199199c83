use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::traits::selector_resolver::SelectorResolver;

/// Purpose tag of an audio stream, used as the secondary capture filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageClass {
    Unknown,
    Game,
    Media,
}

impl UsageClass {
    /// Usage classes matched for every selector of a scoped capture.
    pub const CAPTURED: [UsageClass; 3] = [UsageClass::Unknown, UsageClass::Game, UsageClass::Media];
}

/// Numeric stream selectors for the target applications.
///
/// Keeps the application identifiers that were asked for alongside the
/// selectors they resolved to, so a request that resolved to nothing can be
/// told apart from an intentionally unscoped one. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorSet {
    requested: Vec<String>,
    selectors: Vec<u32>,
    usages: BTreeSet<UsageClass>,
}

impl SelectorSet {
    /// No restriction: capture everything the device plays.
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Selectors given directly, one per target application, in order.
    /// Duplicates are dropped.
    pub fn from_selectors(selectors: impl IntoIterator<Item = u32>) -> Self {
        Self::with_requested(Vec::new(), selectors)
    }

    /// Resolve `app_ids` once through `resolver`.
    pub fn resolve<R: SelectorResolver + ?Sized>(resolver: &R, app_ids: &[String]) -> Self {
        let selectors = if app_ids.is_empty() {
            Vec::new()
        } else {
            resolver.resolve(app_ids)
        };
        Self::with_requested(app_ids.to_vec(), selectors)
    }

    fn with_requested(requested: Vec<String>, selectors: impl IntoIterator<Item = u32>) -> Self {
        let mut ordered = Vec::new();
        for selector in selectors {
            if !ordered.contains(&selector) {
                ordered.push(selector);
            }
        }
        let usages = if ordered.is_empty() {
            BTreeSet::new()
        } else {
            UsageClass::CAPTURED.into_iter().collect()
        };
        Self {
            requested,
            selectors: ordered,
            usages,
        }
    }

    pub fn selectors(&self) -> &[u32] {
        &self.selectors
    }

    pub fn usages(&self) -> &BTreeSet<UsageClass> {
        &self.usages
    }

    /// Application identifiers this set was resolved from.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn is_scoped(&self) -> bool {
        !self.selectors.is_empty()
    }

    /// Applications were requested but none resolved; capture runs unscoped.
    pub fn is_degraded(&self) -> bool {
        !self.requested.is_empty() && self.selectors.is_empty()
    }
}
