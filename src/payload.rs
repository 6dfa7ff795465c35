use crate::config::Settings;
use crate::error::{HandlerError, Result};
use crate::event::MonitoringEvent;
use crate::status::CheckStatus;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Body of one incoming-webhook POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub icon_url: String,
    pub parse: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub color: &'static str,
    pub fallback: String,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn_in: Option<Vec<&'static str>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<bool>,
}

impl Field {
    fn long(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self { title: title.into(), value: value.into(), short: None }
    }

    fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self { title: title.into(), value: value.into(), short: Some(true) }
    }
}

/// Wrap text in a preformatted block.
pub fn tick(text: &str) -> String {
    format!("```{}```", text)
}

/// Render epoch seconds with the configured pattern, in UTC unless `local_time` is set.
/// Out-of-range timestamps fall back to the raw number.
pub fn format_timestamp(epoch: i64, settings: &Settings) -> String {
    let Some(utc) = DateTime::from_timestamp(epoch, 0) else {
        return epoch.to_string();
    };
    let mut out = String::new();
    let written = if settings.local_time {
        write!(out, "{}", utc.with_timezone(&Local).format(&settings.time_format))
    } else {
        write!(out, "{}", utc.format(&settings.time_format))
    };
    match written {
        Ok(())  => out,
        Err(_)  => utc.to_rfc3339(),
    }
}

/// Strings render bare, everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other            => other.to_string(),
    }
}

fn admin_link(settings: &Settings) -> String {
    format!("[ <{}|{}> ]", settings.admin_url, settings.admin_text)
}

/// Build the payload for one destination. `channel = None` leaves the
/// webhook's own default channel in charge.
pub fn build(event: &MonitoringEvent, settings: &Settings, channel: Option<&str>) -> Result<MessagePayload> {
    let incident_key = event.incident_key();
    let status = CheckStatus::from_code(event.check.status)?;
    let summary = format!("{} is {}", incident_key, status.label());

    let mut fields = vec![
        Field::long(event.action.label(), summary.clone()),
        Field::long("Details", tick(&event.check.output)),
    ];

    if settings.show_command {
        fields.push(Field::long("Command", tick(&event.check.command)));
    }
    if settings.show_address {
        fields.push(Field::short("Address", event.client.address.clone()));
    }
    if settings.show_timestamp {
        fields.push(Field::short("Timestamp", format_timestamp(event.check.issued, settings)));
    }
    if settings.show_occurrences {
        fields.push(Field::short("Occurrences", event.occurrences.to_string()));
    }
    if settings.show_subscriptions {
        fields.push(Field::short("Subscriptions", event.client.subscriptions.join(", ")));
    }
    for custom in &settings.custom_values {
        let value = event.check_value(&custom.key)
            .ok_or_else(|| HandlerError::MissingCustomField { key: custom.key.clone() })?;
        fields.push(Field {
            title: custom.title().to_string(),
            value: render_value(value),
            short: Some(custom.short()),
        });
    }
    if settings.show_admin_link {
        fields.push(Field::long("", admin_link(settings)));
    }

    Ok(MessagePayload {
        icon_url: settings.icon_url.clone(),
        parse:    "none",
        channel:  channel.map(str::to_string),
        username: settings.bot_name.clone(),
        attachments: vec![Attachment {
            color:     status.color(),
            fallback:  summary,
            fields,
            mrkdwn_in: settings.markdown_enabled.then(|| vec!["fields", "text"]),
        }],
    })
}

/// Ordered destinations for this event.
///
/// A client-level override wins over a check-level one, which wins over the
/// configured channel list. With none of them set the result is `[None]`:
/// one send to the webhook's default channel.
pub fn resolve_channels(event: &MonitoringEvent, settings: &Settings) -> Vec<Option<String>> {
    let override_channel = [&event.client.channel, &event.check.channel]
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty());
    if let Some(c) = override_channel {
        return vec![Some(c.clone())];
    }

    let configured = settings.channels();
    if configured.is_empty() {
        vec![None]
    } else {
        configured.into_iter().map(Some).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelSetting, CustomField};
    use serde_json::json;

    fn event_with(check: Value) -> MonitoringEvent {
        MonitoringEvent::from_value(json!({
            "client": {
                "name": "web1",
                "address": "10.0.0.5",
                "subscriptions": ["base", "web"]
            },
            "check": check,
            "occurrences": 4,
            "action": "create"
        }))
        .unwrap()
    }

    fn disk_event() -> MonitoringEvent {
        event_with(json!({
            "name": "disk",
            "status": 2,
            "output": "95% full",
            "command": "check_disk",
            "issued": 1700000000
        }))
    }

    fn minimal_settings() -> Settings {
        Settings {
            webhook_url:        Some("https://hooks.example.com/services/x".into()),
            show_command:       false,
            show_address:       false,
            show_timestamp:     false,
            show_occurrences:   false,
            show_subscriptions: false,
            show_admin_link:    false,
            ..Settings::default()
        }
    }

    fn titles(payload: &MessagePayload) -> Vec<&str> {
        payload.attachments[0].fields.iter().map(|f| f.title.as_str()).collect()
    }

    #[test]
    fn critical_event_end_to_end() {
        let settings = Settings {
            channel:          Some(ChannelSetting::One("#ops".into())),
            show_command:     true,
            show_address:     true,
            show_timestamp:   true,
            show_admin_link:  true,
            ..minimal_settings()
        };
        let event = disk_event();
        let channels = resolve_channels(&event, &settings);
        assert_eq!(channels, vec![Some("#ops".to_string())]);

        let payload = build(&event, &settings, channels[0].as_deref()).unwrap();
        assert_eq!(payload.channel.as_deref(), Some("#ops"));
        assert_eq!(payload.parse, "none");
        let att = &payload.attachments[0];
        assert_eq!(att.color, "#FF0000");
        assert_eq!(att.fallback, "web1/disk is CRITICAL");
        assert_eq!(titles(&payload), vec!["ALERT", "Details", "Command", "Address", "Timestamp", ""]);

        assert_eq!(att.fields[0].value, "web1/disk is CRITICAL");
        assert_eq!(att.fields[1].value, "```95% full```");
        assert_eq!(att.fields[2].value, "```check_disk```");
        assert_eq!(att.fields[3].value, "10.0.0.5");
        assert_eq!(att.fields[3].short, Some(true));
        assert_eq!(att.fields[4].value, "2023-11-14 22:13:20 +0000");
        assert_eq!(att.fields[5].value, "[ <http://localhost:8080/#/events|Uchiwa> ]");
    }

    #[test]
    fn all_optional_fields_in_fixed_order() {
        let settings = Settings {
            custom_values: vec![CustomField { key: "output".into(), title: Some("Raw".into()), short: None }],
            ..Settings::default()
        };
        let payload = build(&disk_event(), &settings, None).unwrap();
        assert_eq!(
            titles(&payload),
            vec!["ALERT", "Details", "Command", "Address", "Timestamp", "Occurrences", "Subscriptions", "Raw", ""]
        );
        let fields = &payload.attachments[0].fields;
        assert_eq!(fields[5].value, "4");
        assert_eq!(fields[6].value, "base, web");
        assert_eq!(fields[7].value, "95% full");
        assert_eq!(fields[7].short, Some(false));
    }

    #[test]
    fn base_fields_only_when_everything_disabled() {
        let payload = build(&disk_event(), &minimal_settings(), None).unwrap();
        assert_eq!(titles(&payload), vec!["ALERT", "Details"]);
        assert!(payload.channel.is_none());
        assert!(payload.username.is_none());
    }

    #[test]
    fn resolve_action_and_ok_status() {
        let mut event = event_with(json!({ "name": "disk", "status": 0, "output": "fine" }));
        event.action = crate::event::Action::Resolve;
        let payload = build(&event, &minimal_settings(), None).unwrap();
        let att = &payload.attachments[0];
        assert_eq!(att.color, "#36a64f");
        assert_eq!(att.fields[0].title, "RESOLVED");
        assert_eq!(att.fields[0].value, "web1/disk is OK");
    }

    #[test]
    fn unknown_status_fails() {
        let event = event_with(json!({ "name": "disk", "status": 7 }));
        let err = build(&event, &minimal_settings(), None).unwrap_err();
        assert!(matches!(err, HandlerError::UnknownStatus(7)));
    }

    #[test]
    fn custom_fields_resolve_nested_paths() {
        let event = event_with(json!({ "name": "disk", "status": 1, "a": { "b": 5 } }));
        let settings = Settings {
            custom_values: vec![CustomField { key: "a.b".into(), title: None, short: Some(true) }],
            ..minimal_settings()
        };
        let payload = build(&event, &settings, None).unwrap();
        let field = &payload.attachments[0].fields[2];
        assert_eq!(field.title, "a.b");
        assert_eq!(field.value, "5");
        assert_eq!(field.short, Some(true));
    }

    #[test]
    fn unresolved_custom_field_fails() {
        let event = event_with(json!({ "name": "disk", "status": 1, "a": { "b": 5 } }));
        let settings = Settings {
            custom_values: vec![CustomField { key: "a.c".into(), title: None, short: None }],
            ..minimal_settings()
        };
        match build(&event, &settings, None) {
            Err(HandlerError::MissingCustomField { key }) => assert_eq!(key, "a.c"),
            other => panic!("expected MissingCustomField, got {:?}", other),
        }
    }

    #[test]
    fn username_and_markdown_flags() {
        let settings = Settings { bot_name: Some("sensu".into()), ..minimal_settings() };
        let payload = build(&disk_event(), &settings, None).unwrap();
        assert_eq!(payload.username.as_deref(), Some("sensu"));
        assert_eq!(payload.attachments[0].mrkdwn_in, Some(vec!["fields", "text"]));

        let settings = Settings { markdown_enabled: false, ..minimal_settings() };
        let payload = build(&disk_event(), &settings, None).unwrap();
        assert!(payload.attachments[0].mrkdwn_in.is_none());
    }

    #[test]
    fn serialized_shape() {
        let settings = Settings { show_address: true, ..minimal_settings() };
        let payload = build(&disk_event(), &settings, Some("#ops")).unwrap();
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["parse"], "none");
        assert_eq!(body["channel"], "#ops");
        assert_eq!(body["icon_url"], crate::config::DEFAULT_ICON_URL);
        assert!(body.get("username").is_none());
        assert_eq!(body["attachments"][0]["mrkdwn_in"], json!(["fields", "text"]));
        assert_eq!(body["attachments"][0]["fields"][0], json!({ "title": "ALERT", "value": "web1/disk is CRITICAL" }));
        assert_eq!(body["attachments"][0]["fields"][2]["short"], true);
    }

    #[test]
    fn custom_time_format() {
        let settings = Settings { time_format: "%d/%m/%Y".into(), ..Settings::default() };
        assert_eq!(format_timestamp(1_700_000_000, &settings), "14/11/2023");
    }

    #[test]
    fn channel_precedence() {
        let configured = Settings {
            channel: Some(ChannelSetting::Many(vec!["#a".into(), "#b".into()])),
            ..minimal_settings()
        };

        let mut event = disk_event();
        assert_eq!(resolve_channels(&event, &minimal_settings()), vec![None]);
        assert_eq!(
            resolve_channels(&event, &configured),
            vec![Some("#a".to_string()), Some("#b".to_string())]
        );

        event.check.channel = Some("#check".into());
        assert_eq!(resolve_channels(&event, &configured), vec![Some("#check".to_string())]);

        event.client.channel = Some("#client".into());
        assert_eq!(resolve_channels(&event, &configured), vec![Some("#client".to_string())]);

        event.check.channel = None;
        assert_eq!(resolve_channels(&event, &minimal_settings()), vec![Some("#client".to_string())]);
    }

    #[test]
    fn blank_override_is_ignored() {
        let settings = Settings { channel: Some(ChannelSetting::One("#ops".into())), ..minimal_settings() };
        let mut event = disk_event();
        event.client.channel = Some("  ".into());
        assert_eq!(resolve_channels(&event, &settings), vec![Some("#ops".to_string())]);
    }
}
