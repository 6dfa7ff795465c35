use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unknown check status code {0} (expected 0, 1, 2 or 3)")]
    UnknownStatus(i64),

    #[error("Custom field `{key}` does not resolve against the check record")]
    MissingCustomField { key: String },

    #[error("Delivery to {} failed{}: {detail}", channel_label(.channel), status_label(.status))]
    Delivery {
        channel: Option<String>,
        status:  Option<u16>,
        detail:  String,
    },
}

impl HandlerError {
    /// HTTP status of a failed delivery, if the endpoint answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            HandlerError::Delivery { status, .. } => *status,
            _ => None,
        }
    }
}

fn channel_label(channel: &Option<String>) -> String {
    match channel {
        Some(c) => c.clone(),
        None    => "default channel".to_string(),
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" with HTTP {}", s),
        None    => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, HandlerError>;
