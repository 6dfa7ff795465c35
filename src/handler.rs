use crate::config::Settings;
use crate::delivery::WebhookClient;
use crate::error::{HandlerError, Result};
use crate::event::MonitoringEvent;
use crate::payload::{self, MessagePayload};
use crate::status::CheckStatus;
use tracing::{error, info, warn};

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Channels that accepted the message, in send order. `None` is the webhook default.
    pub delivered: Vec<Option<String>>,
}

/// Build every payload without sending anything.
pub fn preview(event: &MonitoringEvent, settings: &Settings) -> Result<Vec<MessagePayload>> {
    CheckStatus::from_code(event.check.status)?;
    payload::resolve_channels(event, settings)
        .iter()
        .map(|channel| payload::build(event, settings, channel.as_deref()))
        .collect()
}

/// Render the event once per destination channel and POST each in order.
///
/// Settings and status are checked before any network traffic. With
/// `fail_fast` the first failing channel ends the invocation; otherwise the
/// remaining channels are still attempted and the first error is returned.
pub fn handle(event: &MonitoringEvent, settings: &Settings) -> Result<Report> {
    settings.validate()?;
    CheckStatus::from_code(event.check.status)?;

    let client = WebhookClient::new(settings)?;
    let channels = payload::resolve_channels(event, settings);
    let incident = event.incident_key();

    info!(incident = %incident, host = client.url().host_str().unwrap_or(""), targets = channels.len(), "Dispatching event");

    let mut delivered = Vec::new();
    let mut first_error: Option<HandlerError> = None;

    for channel in channels {
        let label = channel.as_deref().unwrap_or("(default)");
        let result = payload::build(event, settings, channel.as_deref())
            .and_then(|p| client.deliver(&p));

        match result {
            Ok(()) => {
                info!(incident = %incident, channel = label, "Delivered");
                delivered.push(channel);
            }
            Err(e) => {
                error!(incident = %incident, channel = label, http_status = e.http_status(), "{}", e);
                if settings.fail_fast {
                    return Err(e);
                }
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => {
            warn!(incident = %incident, delivered = delivered.len(), "Some channels were not delivered");
            Err(e)
        }
        None => Ok(Report { delivered }),
    }
}
