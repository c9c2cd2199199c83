/// Capture session state machine.
///
/// ```text
/// idle --start--> recording --stop--> idle
/// ```
///
/// `start` while recording tears the running session down first; sessions
/// are never layered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
}

impl From<bool> for SessionState {
    fn from(recording: bool) -> Self {
        if recording {
            Self::Recording
        } else {
            Self::Idle
        }
    }
}
