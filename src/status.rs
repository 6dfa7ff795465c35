use crate::error::{HandlerError, Result};

/// Severity of a check result, as encoded by the exit code of the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckStatus {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(CheckStatus::Ok),
            1 => Ok(CheckStatus::Warning),
            2 => Ok(CheckStatus::Critical),
            3 => Ok(CheckStatus::Unknown),
            _ => Err(HandlerError::UnknownStatus(code)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Ok       => "OK",
            CheckStatus::Warning  => "WARNING",
            CheckStatus::Critical => "CRITICAL",
            CheckStatus::Unknown  => "UNKNOWN",
        }
    }

    /// Attachment sidebar color.
    pub fn color(&self) -> &'static str {
        match self {
            CheckStatus::Ok       => "#36a64f",
            CheckStatus::Warning  => "#FFCC00",
            CheckStatus::Critical => "#FF0000",
            CheckStatus::Unknown  => "#6600CC",
        }
    }
}
