use serde::Deserialize;
use serde_json::Value;

/// A single check result as emitted by the monitoring pipeline.
#[derive(Debug, Clone)]
pub struct MonitoringEvent {
    pub client:      Client,
    pub check:       Check,
    pub occurrences: u64,
    pub action:      Action,
    /// The check object exactly as received, for custom-field lookups.
    check_record:    Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Per-client channel override.
    #[serde(default, alias = "slack_channel")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: i64,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub command: String,
    /// Epoch seconds at which the check was issued.
    #[serde(default)]
    pub issued: i64,
    /// Per-check channel override.
    #[serde(default, alias = "slack_channel")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Create,
    Resolve,
    Flapping,
    #[serde(other)]
    Other,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Resolve => "RESOLVED",
            _               => "ALERT",
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    client: Client,
    check: Value,
    #[serde(default)]
    occurrences: u64,
    #[serde(default)]
    action: Action,
}

impl MonitoringEvent {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let raw: RawEvent = serde_json::from_value(value)?;
        let check: Check = serde_json::from_value(raw.check.clone())?;
        Ok(Self {
            client:       raw.client,
            check,
            occurrences:  raw.occurrences,
            action:       raw.action,
            check_record: raw.check,
        })
    }

    /// `<client>/<check>`, stable across occurrences of the same problem.
    pub fn incident_key(&self) -> String {
        format!("{}/{}", self.client.name, self.check.name)
    }

    /// Resolve a dotted key path (`"a.b.c"`) against the check record.
    pub fn check_value(&self, path: &str) -> Option<&Value> {
        lookup(&self.check_record, path)
    }
}

/// Walk `path` one dotted segment at a time. Any absent key, a non-object
/// intermediate, or a null leaf yields `None`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None               => (path, None),
    };
    let next = record.as_object()?.get(head)?;
    match rest {
        Some(rest)                  => lookup(next, rest),
        None if next.is_null()      => None,
        None                        => Some(next),
    }
}
