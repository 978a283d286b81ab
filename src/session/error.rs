/// Errors surfaced by the recording session manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Audio input unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("A recording session is already active")]
    SessionAlreadyActive,

    #[error("Recording session manager has shut down")]
    ManagerClosed,
}
