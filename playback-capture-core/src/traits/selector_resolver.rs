/// Maps application identifiers to the numeric stream selectors the audio
/// subsystem assigns them.
///
/// Called once per session start. Identifiers that cannot be resolved are
/// skipped; a failure for one identifier never fails the whole resolution.
pub trait SelectorResolver: Send + Sync {
    fn resolve(&self, app_ids: &[String]) -> Vec<u32>;
}
