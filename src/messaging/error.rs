use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessagingErrorCode {
    Unsupported,
    PermissionBlocked,
    PermissionRequired,
    TokenAcquireExhausted,
    AcquireSuperseded,
    BackendUnavailable,
    BackendRejected,
    WorkerUnavailable,
    InvalidArgument,
    Internal,
}

impl MessagingErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagingErrorCode::Unsupported => "push/unsupported-environment",
            MessagingErrorCode::PermissionBlocked => "push/permission-blocked",
            MessagingErrorCode::PermissionRequired => "push/permission-required",
            MessagingErrorCode::TokenAcquireExhausted => "push/token-acquire-exhausted",
            MessagingErrorCode::AcquireSuperseded => "push/acquire-superseded",
            MessagingErrorCode::BackendUnavailable => "push/backend-unavailable",
            MessagingErrorCode::BackendRejected => "push/backend-rejected",
            MessagingErrorCode::WorkerUnavailable => "push/worker-unavailable",
            MessagingErrorCode::InvalidArgument => "push/invalid-argument",
            MessagingErrorCode::Internal => "push/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessagingError {
    pub code: MessagingErrorCode,
    message: String,
}

impl MessagingError {
    pub fn new(code: MessagingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// True for failures worth retrying later (transport-level trouble as
    /// opposed to a terminal state like a blocked permission).
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            MessagingErrorCode::BackendUnavailable | MessagingErrorCode::TokenAcquireExhausted
        )
    }
}

impl Display for MessagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for MessagingError {}

pub type MessagingResult<T> = Result<T, MessagingError>;

pub fn unsupported_environment(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::Unsupported, message)
}

pub fn permission_blocked(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::PermissionBlocked, message)
}

pub fn permission_required(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::PermissionRequired, message)
}

pub fn token_acquire_exhausted(attempts: u32) -> MessagingError {
    MessagingError::new(
        MessagingErrorCode::TokenAcquireExhausted,
        format!("provider returned no token after {attempts} attempt(s)"),
    )
}

pub fn acquire_superseded() -> MessagingError {
    MessagingError::new(
        MessagingErrorCode::AcquireSuperseded,
        "token acquisition was superseded by a release",
    )
}

pub fn backend_unavailable(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::BackendUnavailable, message)
}

pub fn backend_rejected(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::BackendRejected, message)
}

pub fn worker_unavailable(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::WorkerUnavailable, message)
}

pub fn invalid_argument(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::Internal, message)
}
