use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerErrorCode {
    InstallFailed,
    InvalidScope,
    InvalidTransition,
}

impl WorkerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerErrorCode::InstallFailed => "worker/install-failed",
            WorkerErrorCode::InvalidScope => "worker/invalid-scope",
            WorkerErrorCode::InvalidTransition => "worker/invalid-transition",
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkerError {
    pub code: WorkerErrorCode,
    message: String,
}

impl WorkerError {
    pub fn new(code: WorkerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for WorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for WorkerError {}

pub type WorkerResult<T> = Result<T, WorkerError>;

pub fn install_failed(message: impl Into<String>) -> WorkerError {
    WorkerError::new(WorkerErrorCode::InstallFailed, message)
}

pub fn invalid_scope(message: impl Into<String>) -> WorkerError {
    WorkerError::new(WorkerErrorCode::InvalidScope, message)
}

pub fn invalid_transition(message: impl Into<String>) -> WorkerError {
    WorkerError::new(WorkerErrorCode::InvalidTransition, message)
}
