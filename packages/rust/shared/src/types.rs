//! Core domain types: source campaigns, schedules, variations, credentials.
//!
//! These types are the decoded, platform-neutral view of a source document.
//! They are immutable inputs to the transformation engine.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MigrationId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one migration request (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(pub Uuid);

impl MigrationId {
    /// Generate a new time-sortable migration identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MigrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MigrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MigrationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Source channel of a migration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    Push,
    Sms,
    ContentBlock,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::ContentBlock => "content-block",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            "sms" => Ok(Self::Sms),
            "content-block" | "contentblock" => Ok(Self::ContentBlock),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A point in time as the source expressed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceInstant {
    /// Unix epoch seconds.
    Epoch(i64),
    /// A wall-clock time with no zone attached.
    WallClock(NaiveDateTime),
}

/// Recurrence unit of a recurring schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// Anything else, kept upper-cased as the source spelled it.
    Other(String),
}

impl Frequency {
    /// Parse a source frequency label (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Other(s) => s,
        }
    }
}

/// A periodic delivery schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringSchedule {
    /// First delivery; `None` means "now".
    pub start_at: Option<SourceInstant>,
    /// Expiry; `None` means one year after start.
    pub end_at: Option<SourceInstant>,
    pub frequency: Frequency,
    /// Repeat every `interval` units of `frequency`.
    pub interval: u32,
    /// Weekday name → active flag (weekly only).
    pub weekdays: BTreeMap<String, bool>,
    /// Explicit day of month (monthly only).
    pub day_of_month: Option<u32>,
}

/// An action-triggered schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredSchedule {
    pub delay_seconds: u64,
    pub window_start: Option<SourceInstant>,
    pub window_end: Option<SourceInstant>,
}

/// When a campaign is delivered. Exactly one variant per campaign.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScheduleDescriptor {
    #[default]
    Immediate,
    OneTime {
        start_at: Option<SourceInstant>,
    },
    Recurring(RecurringSchedule),
    Triggered(TriggeredSchedule),
}

impl ScheduleDescriptor {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered(_))
    }
}

// ---------------------------------------------------------------------------
// Conversion behaviors
// ---------------------------------------------------------------------------

/// The behavior a conversion is counted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionEventType {
    Purchase,
    AppOpen,
    CustomEvent,
    AppVersionUpgrade,
    Other,
}

/// One source conversion definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionBehavior {
    pub event_type: ConversionEventType,
    pub custom_event_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

/// A named segment reference from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub id: String,
    pub name: String,
}

/// The source audience definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudienceFilters {
    /// Segment references that can be carried over by id/name.
    pub segments: Vec<SegmentRef>,
    /// Raw filter objects, kept for inspection but not translated.
    pub filters: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Messaging variations
// ---------------------------------------------------------------------------

/// One email message variation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub preheader: Option<String>,
    #[serde(default)]
    pub email_body: Option<String>,
    #[serde(default)]
    pub from_display_name: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub reply_to_address: Option<String>,
}

/// One SMS message variation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SmsMessage {
    #[serde(default)]
    pub body: Option<String>,
}

/// A push action button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushButton {
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Android push content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AndroidPushMessage {
    #[serde(default)]
    pub android_title: Option<String>,
    #[serde(default)]
    pub android_push_message: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub android_push_buttons: Vec<PushButton>,
    #[serde(default)]
    pub android_custom_uri: Option<String>,
}

/// The iOS alert block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IosAlert {
    #[serde(default)]
    pub title: Option<String>,
}

/// iOS push content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IosPushMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ios_alert_hash: IosAlert,
    #[serde(default)]
    pub ios_push_message: Option<String>,
    #[serde(default)]
    pub ios_image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ios_push_buttons: Vec<PushButton>,
    #[serde(default)]
    pub ios_uri: Option<String>,
}

/// Web push content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebPushMessage {
    #[serde(default)]
    pub web_title: Option<String>,
    #[serde(default)]
    pub web_push_message: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_push_buttons: Vec<PushButton>,
    #[serde(default)]
    pub web_custom_uri: Option<String>,
}

/// Channel-specific content of one variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariationContent {
    Email(EmailMessage),
    Sms(SmsMessage),
    AndroidPush(AndroidPushMessage),
    IosPush(IosPushMessage),
    WebPush(WebPushMessage),
    /// A message type this engine does not migrate.
    Unsupported { message_type: String },
}

/// One alternative version of a message within a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingVariation {
    /// Holdout variants are never migrated.
    pub is_control: bool,
    pub content: VariationContent,
}

// ---------------------------------------------------------------------------
// Source documents
// ---------------------------------------------------------------------------

/// A decoded source campaign. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCampaign {
    pub id: Option<String>,
    pub name: Option<String>,
    pub channel: Channel,
    pub schedule: ScheduleDescriptor,
    pub audience: AudienceFilters,
    pub conversion_behaviors: Vec<ConversionBehavior>,
    pub variations: Vec<MessagingVariation>,
}

/// A reusable snippet of templated markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContentBlock {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Default target dashboard origin.
pub const DEFAULT_TARGET_ORIGIN: &str = "https://dashboard-01.moengage.com";

/// Default target draft-creation endpoint.
pub const DEFAULT_DRAFT_URL: &str = "https://dashboard-01.moengage.com/v1.0/campaigns/draft";

/// Default target content-block endpoint.
pub const DEFAULT_CONTENT_BLOCK_URL: &str =
    "https://api-01.moengage.com/v1/external/campaigns/content-blocks";

/// Credentials and endpoints for the target platform.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetCredentials {
    pub bearer_token: String,
    pub refresh_token: String,
    /// Dashboard origin; the upload endpoint is derived from it.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Write endpoint for drafts or content blocks.
    #[serde(default = "default_draft_url")]
    pub api_url: String,
    /// App key for basic-auth endpoints (content blocks).
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default)]
    pub app_secret: Option<String>,
    /// Author recorded on created content blocks.
    #[serde(default)]
    pub created_by_email: Option<String>,
}

fn default_origin() -> String {
    DEFAULT_TARGET_ORIGIN.into()
}
fn default_draft_url() -> String {
    DEFAULT_DRAFT_URL.into()
}

impl TargetCredentials {
    /// Bearer-token credentials against the default origin and draft endpoint.
    pub fn bearer(bearer_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            refresh_token: refresh_token.into(),
            origin: default_origin(),
            api_url: default_draft_url(),
            app_key: None,
            app_secret: None,
            created_by_email: None,
        }
    }

    /// The origin with any trailing slash removed.
    pub fn origin_trimmed(&self) -> &str {
        self.origin.trim_end_matches('/')
    }
}

impl std::fmt::Debug for TargetCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetCredentials")
            .field("bearer_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("origin", &self.origin)
            .field("api_url", &self.api_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("created_by_email", &self.created_by_email)
            .finish()
    }
}

/// Session credentials for the source dashboard read API.
#[derive(Clone)]
pub struct SourceCredentials {
    /// Dashboard URL; only its scheme and host are used.
    pub dashboard_url: String,
    pub session_id: String,
    pub app_group_id: String,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("dashboard_url", &self.dashboard_url)
            .field("session_id", &"<redacted>")
            .field("app_group_id", &self.app_group_id)
            .finish()
    }
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_id_roundtrip() {
        let id = MigrationId::new();
        let parsed: MigrationId = id.to_string().parse().expect("parse MigrationId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn channel_parsing() {
        assert_eq!("EMAIL".parse::<Channel>().unwrap(), Channel::Email);
        assert_eq!("content_block".parse::<Channel>().unwrap(), Channel::ContentBlock);
        assert!("fax".parse::<Channel>().is_err());
    }

    #[test]
    fn frequency_parsing_is_case_insensitive() {
        assert_eq!(Frequency::parse("weekly"), Frequency::Weekly);
        assert_eq!(Frequency::parse("hourly"), Frequency::Other("HOURLY".into()));
        assert_eq!(Frequency::parse("hourly").as_str(), "HOURLY");
    }

    #[test]
    fn null_fields_deserialize_as_defaults() {
        let json = serde_json::json!({
            "ios_alert_hash": null,
            "ios_push_message": "hi",
            "ios_push_buttons": null,
        });
        let msg: IosPushMessage = serde_json::from_value(json).expect("deserialize");
        assert_eq!(msg.ios_alert_hash.title, None);
        assert!(msg.ios_push_buttons.is_empty());
        assert_eq!(msg.ios_push_message.as_deref(), Some("hi"));
    }

    #[test]
    fn credentials_debug_redacts_tokens() {
        let creds = TargetCredentials::bearer("secret-bearer", "secret-refresh");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("secret-bearer"));
        assert!(!dbg.contains("secret-refresh"));
        assert!(dbg.contains(DEFAULT_TARGET_ORIGIN));
    }

    #[test]
    fn credentials_fill_endpoint_defaults() {
        let creds: TargetCredentials = serde_json::from_value(serde_json::json!({
            "bearer_token": "b",
            "refresh_token": "r",
            "origin": "https://dashboard-02.moengage.com/",
        }))
        .expect("deserialize");
        assert_eq!(creds.api_url, DEFAULT_DRAFT_URL);
        assert_eq!(creds.origin_trimmed(), "https://dashboard-02.moengage.com");
    }
}
