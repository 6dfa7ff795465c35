use crate::error::{HandlerError, Result};
use chrono::format::{Item, StrftimeItems};
use reqwest::Url;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One named settings block, e.g. the `[slack]` table of the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Slack incoming-webhook URL. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Default destination: a single channel or a list of channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    pub icon_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_addr: Option<String>,
    #[serde(deserialize_with = "port_from_number_or_text", skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,

    pub markdown_enabled: bool,
    pub admin_url: String,
    pub admin_text: String,

    pub show_command: bool,
    pub show_address: bool,
    pub show_timestamp: bool,
    pub show_occurrences: bool,
    pub show_subscriptions: bool,
    pub show_admin_link: bool,

    /// strftime-style pattern for the Timestamp field.
    pub time_format: String,
    /// Render timestamps in the host's local zone instead of UTC.
    pub local_time: bool,

    pub custom_values: Vec<CustomField>,

    /// Whole-request timeout for each webhook POST.
    pub timeout_secs: u64,
    /// Permit plain-http webhook and proxy targets.
    pub allow_insecure: bool,
    /// Stop at the first failed channel instead of attempting the rest.
    pub fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelSetting {
    One(String),
    Many(Vec<String>),
}

impl ChannelSetting {
    pub fn to_list(&self) -> Vec<String> {
        match self {
            ChannelSetting::One(c)   => vec![c.clone()],
            ChannelSetting::Many(cs) => cs.clone(),
        }
    }
}

/// An extra attachment field pulled out of the check record.
///
/// ```toml
/// [[slack.custom_values]]
/// key   = "runbook.url"   # dotted path into the check
/// title = "Runbook"       # defaults to the key
/// short = true            # defaults to false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<bool>,
}

impl CustomField {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.key)
    }

    pub fn short(&self) -> bool {
        self.short.unwrap_or(false)
    }
}

// ── Defaults ─────────────────────────────────────────────────────────

pub const DEFAULT_ICON_URL: &str = "http://sensuapp.org/img/sensu_logo_large-c92d73db.png";
pub const DEFAULT_ADMIN_URL: &str = "http://localhost:8080/#/events";
pub const DEFAULT_ADMIN_TEXT: &str = "Uchiwa";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url:        None,
            channel:            None,
            bot_name:           None,
            icon_url:           DEFAULT_ICON_URL.into(),
            proxy_addr:         None,
            proxy_port:         None,
            markdown_enabled:   true,
            admin_url:          DEFAULT_ADMIN_URL.into(),
            admin_text:         DEFAULT_ADMIN_TEXT.into(),
            show_command:       true,
            show_address:       true,
            show_timestamp:     true,
            show_occurrences:   true,
            show_subscriptions: true,
            show_admin_link:    true,
            time_format:        DEFAULT_TIME_FORMAT.into(),
            local_time:         false,
            custom_values:      Vec::new(),
            timeout_secs:       10,
            allow_insecure:     false,
            fail_fast:          true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

fn port_from_number_or_text<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PortValue>::deserialize(deserializer)? {
        None                        => Ok(None),
        Some(PortValue::Number(n))  => Ok(Some(n)),
        Some(PortValue::Text(s))    => s.trim().parse().map(Some).map_err(|_| {
            de::Error::custom(format!("proxy_port `{}` is not a valid port number", s))
        }),
    }
}

// ── Accessors / validation ───────────────────────────────────────────

impl Settings {
    /// The parsed webhook URL. Missing, blank or unparseable is a configuration error.
    pub fn webhook_url(&self) -> Result<Url> {
        let raw = self.webhook_url.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(HandlerError::Configuration("webhook_url is not set".into()));
        }
        Url::parse(raw).map_err(|e| {
            HandlerError::Configuration(format!("webhook_url `{}` is not a valid URL: {}", raw, e))
        })
    }

    /// `(address, port)` when a proxy is configured. A blank address counts as unset.
    pub fn proxy(&self) -> Result<Option<(String, u16)>> {
        let addr = match self.proxy_addr.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ => return Ok(None),
        };
        match self.proxy_port {
            Some(port) => Ok(Some((addr.to_string(), port))),
            None => Err(HandlerError::Configuration(format!(
                "proxy_addr `{}` is set but proxy_port is missing", addr
            ))),
        }
    }

    /// Configured default channels, blanks dropped, in declaration order.
    pub fn channels(&self) -> Vec<String> {
        self.channel.as_ref()
            .map(|c| c.to_list())
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.webhook_url()?;
        self.proxy()?;
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(HandlerError::Configuration(format!(
                "time_format `{}` is not a valid strftime pattern", self.time_format
            )));
        }
        Ok(())
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Settings {
    /// Load the block called `name` from the settings file at `path`.
    /// `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            HandlerError::Configuration(format!("cannot read settings file {}: {}", path.display(), e))
        })?;
        let is_json = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text, name)
        } else {
            Self::from_toml_str(&text, name)
        }
    }

    pub fn from_toml_str(text: &str, name: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)
            .map_err(|e| HandlerError::Configuration(format!("invalid TOML settings: {}", e)))?;
        let block = table.get(name).cloned().ok_or_else(|| missing_block(name))?;
        block.try_into::<Settings>()
            .map_err(|e| HandlerError::Configuration(format!("invalid `{}` settings: {}", name, e)))
    }

    pub fn from_json_str(text: &str, name: &str) -> Result<Self> {
        let mut root: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| HandlerError::Configuration(format!("invalid JSON settings: {}", e)))?;
        let block = root.get_mut(name).map(serde_json::Value::take).ok_or_else(|| missing_block(name))?;
        serde_json::from_value(block)
            .map_err(|e| HandlerError::Configuration(format!("invalid `{}` settings: {}", name, e)))
    }

    /// `$SLACKHOOK_SETTINGS`, else `<config dir>/slackhook/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(p) = std::env::var_os("SLACKHOOK_SETTINGS") {
            return Some(PathBuf::from(p));
        }
        dirs::config_dir().map(|p| p.join("slackhook").join("settings.toml"))
    }
}

fn missing_block(name: &str) -> HandlerError {
    HandlerError::Configuration(format!("settings block `{}` not found", name))
}
