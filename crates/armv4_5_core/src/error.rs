use std::fmt;

/// Every externally visible error code this core can produce.
///
/// Mirrors the `ERROR_*` family the source reports to its caller: precondition
/// failures, argument failures, transport failures and timeouts each get their
/// own variant so callers can match on them instead of string-sniffing.
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    /// The target was not halted when a register or algorithm operation required it.
    #[error("target is not halted")]
    NotHalted,

    /// A register name, size, or instruction-set state was invalid or unsupported.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The call arrived against a target that isn't an ARMv4/5 core, or whose
    /// configuration (e.g. mode index) is out of range.
    #[error("target is not a valid ARMv4/5 target: {0}")]
    TargetInvalid(String),

    /// An algorithm run neither reached its exit breakpoint nor halted in time.
    #[error("target timed out")]
    TargetTimeout,

    /// The back-end reported a failure that isn't a timeout (e.g. it could not
    /// install the terminating breakpoint).
    #[error("target failure: {0}")]
    TargetFailure(String),

    /// A back-end transport error, propagated unchanged from `CoreBackend`.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A condition that should be impossible if the caller holds up its end of
    /// the contract (bad mode index, corrupt internal table). Logged as BUG.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ArmResult<T> = Result<T, ArmError>;

impl ArmError {
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ArmError::Transport(Box::new(err))
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("invalid arguments: {msg}");
        ArmError::InvalidArguments(msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("BUG: {msg}");
        ArmError::Internal(msg)
    }
}

/// The generic two-valued command status used by the §4.7 introspection
/// surface, distinct from the richer [`ArmError`] used by the library API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Fail,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Ok => write!(f, "OK"),
            CommandStatus::Fail => write!(f, "FAIL"),
        }
    }
}
