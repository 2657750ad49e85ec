//! Decoding of raw source-platform JSON into the domain model.
//!
//! The source API returns loosely typed documents: fields may be absent,
//! `null`, or carry numbers as strings. Decoding is forgiving for content
//! and strict for timestamps, where a value that is present but unreadable
//! is a validation error.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::{MigratorError, Result};
use crate::types::{
    AudienceFilters, Channel, ConversionBehavior, ConversionEventType, Frequency,
    MessagingVariation, RecurringSchedule, ScheduleDescriptor, SegmentRef, SourceCampaign,
    SourceContentBlock, SourceInstant, TriggeredSchedule, VariationContent,
};

/// Naive timestamp layouts accepted besides RFC 3339.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Decode a source campaign document for `channel`.
///
/// A top-level `{"campaign": {...}}` wrapper is unwrapped.
pub fn decode_campaign(doc: &Value, channel: Channel) -> Result<SourceCampaign> {
    let obj = unwrap_campaign(doc)?;

    let campaign = SourceCampaign {
        id: string_field(obj, "id").or_else(|| string_field(obj, "campaign_id")),
        name: string_field(obj, "name").or_else(|| string_field(obj, "campaign_name")),
        channel,
        schedule: decode_schedule(obj)?,
        audience: decode_audience(obj),
        conversion_behaviors: decode_conversion_behaviors(obj, channel),
        variations: decode_variations(obj),
    };

    tracing::debug!(
        channel = %channel,
        variations = campaign.variations.len(),
        behaviors = campaign.conversion_behaviors.len(),
        "decoded source campaign"
    );

    Ok(campaign)
}

/// Decode a source content-block document.
pub fn decode_content_block(doc: &Value) -> Result<SourceContentBlock> {
    let block: SourceContentBlock = serde_json::from_value(doc.clone())?;
    Ok(block)
}

fn unwrap_campaign(doc: &Value) -> Result<&Map<String, Value>> {
    let obj = doc
        .as_object()
        .ok_or_else(|| MigratorError::validation("campaign document must be a JSON object"))?;

    match obj.get("campaign") {
        Some(Value::Object(inner)) => Ok(inner),
        _ => Ok(obj),
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

fn decode_schedule(obj: &Map<String, Value>) -> Result<ScheduleDescriptor> {
    let schedule_type = obj
        .get("schedule_type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match schedule_type {
        "action_based" => {
            let data = object_field(obj, "trigger_schedule_data");
            let delay = match data.and_then(|d| d.get("trigger_delay_in_seconds")) {
                None | Some(Value::Null) => 0,
                Some(v) => parse_delay(v)?,
            };
            Ok(ScheduleDescriptor::Triggered(TriggeredSchedule {
                delay_seconds: delay,
                window_start: instant_field(data, "start_time")?,
                window_end: instant_field(data, "end_time")?,
            }))
        }
        "time_based" => {
            let data = object_field(obj, "schedule_data");
            let recurring = data
                .and_then(|d| d.get("recurring"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let start_at = instant_field(data, "start_date_time")?;

            if !recurring {
                return Ok(ScheduleDescriptor::OneTime { start_at });
            }

            let frequency = data
                .and_then(|d| d.get("frequency"))
                .and_then(Value::as_str)
                .map(Frequency::parse)
                .unwrap_or(Frequency::Daily);
            let interval = data
                .and_then(|d| d.get("repeat_interval"))
                .and_then(value_as_u64)
                .map(|n| n.max(1) as u32)
                .unwrap_or(1);
            let weekdays = data
                .and_then(|d| d.get("weekdays"))
                .and_then(Value::as_object)
                .map(|days| {
                    days.iter()
                        .map(|(name, active)| (name.clone(), truthy(active)))
                        .collect::<BTreeMap<_, _>>()
                })
                .unwrap_or_default();
            let day_of_month = data
                .and_then(|d| d.get("day_of_month"))
                .and_then(value_as_u64)
                .filter(|d| (1..=31).contains(d))
                .map(|d| d as u32);

            Ok(ScheduleDescriptor::Recurring(RecurringSchedule {
                start_at,
                end_at: instant_field(data, "end_date_time")?,
                frequency,
                interval,
                weekdays,
                day_of_month,
            }))
        }
        _ => Ok(ScheduleDescriptor::Immediate),
    }
}

fn parse_delay(value: &Value) -> Result<u64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite() && *s >= 0.0)
    .ok_or_else(|| MigratorError::validation(format!("invalid trigger delay: {value}")))?;

    Ok(seconds.round() as u64)
}

/// Read an optional timestamp field. Present but unreadable is an error.
fn instant_field(obj: Option<&Map<String, Value>>, key: &str) -> Result<Option<SourceInstant>> {
    match obj.and_then(|o| o.get(key)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => parse_instant(v)
            .map(Some)
            .ok_or_else(|| MigratorError::validation(format!("malformed {key}: {v}"))),
    }
}

/// Parse an epoch number, epoch string, RFC 3339 string, or naive timestamp.
pub fn parse_instant(value: &Value) -> Option<SourceInstant> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(SourceInstant::Epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(epoch) = s.parse::<i64>() {
                return Some(SourceInstant::Epoch(epoch));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(SourceInstant::WallClock(dt.naive_local()));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(SourceInstant::WallClock)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Conversion behaviors
// ---------------------------------------------------------------------------

fn decode_conversion_behaviors(obj: &Map<String, Value>, channel: Channel) -> Vec<ConversionBehavior> {
    let Some(items) = obj.get("conversion_behaviors").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let event_type = string_field(item, "event_type");
            let kind = string_field(item, "type");
            // `type` qualifies `event_type` when both are present.
            let (raw_type, qualifier) = match event_type {
                Some(event_type) => (event_type, kind),
                None => (kind.unwrap_or_default(), None),
            };
            ConversionBehavior {
                event_type: classify_event_type(&raw_type, qualifier.as_deref(), channel),
                custom_event_name: string_field(item, "custom_event_name"),
            }
        })
        .collect()
}

/// Classify a behavior type. Outside SMS, app usage only counts as an app
/// open when qualified as `open`.
fn classify_event_type(raw: &str, qualifier: Option<&str>, channel: Channel) -> ConversionEventType {
    let suffix = raw.rsplit("::").next().unwrap_or(raw);
    match suffix {
        "MadeAnyPurchase" | "MadeSpecificPurchase" | "purchase" => ConversionEventType::Purchase,
        "UsedApp" if channel == Channel::Sms || qualifier == Some("open") => {
            ConversionEventType::AppOpen
        }
        "app_open" | "open" => ConversionEventType::AppOpen,
        "PerformedCustomEvent" | "custom_event" => ConversionEventType::CustomEvent,
        "UpgradedAppVersion" | "upgrade" => ConversionEventType::AppVersionUpgrade,
        _ => ConversionEventType::Other,
    }
}

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

fn decode_audience(obj: &Map<String, Value>) -> AudienceFilters {
    let segments = obj
        .get("segments")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|s| {
                    Some(SegmentRef {
                        id: string_field(s, "id")?,
                        name: string_field(s, "name")?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let filters = obj
        .get("filters")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    AudienceFilters { segments, filters }
}

// ---------------------------------------------------------------------------
// Variations
// ---------------------------------------------------------------------------

fn decode_variations(obj: &Map<String, Value>) -> Vec<MessagingVariation> {
    let Some(actions) = obj.get("messaging_actions").and_then(Value::as_array) else {
        return Vec::new();
    };

    actions
        .iter()
        .filter_map(|action| {
            let action_obj = action.as_object()?;
            let message_type = string_field(action_obj, "message_type").unwrap_or_default();
            let is_control = action_obj
                .get("is_control")
                .map(truthy)
                .unwrap_or(false);

            let content = match decode_content(&message_type, action) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(message_type, error = %e, "skipping undecodable variation");
                    return None;
                }
            };

            Some(MessagingVariation {
                is_control,
                content,
            })
        })
        .collect()
}

fn decode_content(message_type: &str, action: &Value) -> Result<VariationContent> {
    let content = match message_type {
        "email" => VariationContent::Email(serde_json::from_value(action.clone())?),
        "sms" => VariationContent::Sms(serde_json::from_value(action.clone())?),
        "androidPush" => VariationContent::AndroidPush(serde_json::from_value(action.clone())?),
        "iosPush" => VariationContent::IosPush(serde_json::from_value(action.clone())?),
        "webPush" => VariationContent::WebPush(serde_json::from_value(action.clone())?),
        other => VariationContent::Unsupported {
            message_type: other.to_string(),
        },
    };
    Ok(content)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn object_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key).and_then(Value::as_object)
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn missing_schedule_defaults_to_immediate() {
        let campaign = decode_campaign(&json!({"name": "Welcome"}), Channel::Email).unwrap();
        assert_eq!(campaign.schedule, ScheduleDescriptor::Immediate);
        assert_eq!(campaign.name.as_deref(), Some("Welcome"));
        assert!(campaign.variations.is_empty());
    }

    #[test]
    fn campaign_wrapper_is_unwrapped() {
        let doc = json!({"campaign": {"id": "abc", "name": "Wrapped"}});
        let campaign = decode_campaign(&doc, Channel::Sms).unwrap();
        assert_eq!(campaign.id.as_deref(), Some("abc"));
        assert_eq!(campaign.name.as_deref(), Some("Wrapped"));
    }

    #[test]
    fn action_based_schedule_decodes_trigger() {
        let doc = json!({
            "schedule_type": "action_based",
            "trigger_schedule_data": {
                "trigger_delay_in_seconds": 600,
                "start_time": 1_700_000_000,
                "end_time": null
            }
        });
        let campaign = decode_campaign(&doc, Channel::Push).unwrap();
        assert_eq!(
            campaign.schedule,
            ScheduleDescriptor::Triggered(TriggeredSchedule {
                delay_seconds: 600,
                window_start: Some(SourceInstant::Epoch(1_700_000_000)),
                window_end: None,
            })
        );
    }

    #[test]
    fn recurring_schedule_decodes_weekdays() {
        let doc = json!({
            "schedule_type": "time_based",
            "schedule_data": {
                "recurring": true,
                "frequency": "weekly",
                "repeat_interval": 2,
                "start_date_time": "2024-03-04T09:30:00.000Z",
                "weekdays": {"wednesday": true, "monday": true, "friday": false}
            }
        });
        let campaign = decode_campaign(&doc, Channel::Email).unwrap();
        let ScheduleDescriptor::Recurring(rec) = campaign.schedule else {
            panic!("expected recurring schedule");
        };
        assert_eq!(rec.frequency, Frequency::Weekly);
        assert_eq!(rec.interval, 2);
        assert_eq!(rec.weekdays.get("monday"), Some(&true));
        assert_eq!(rec.weekdays.get("friday"), Some(&false));
        let expected = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(rec.start_at, Some(SourceInstant::WallClock(expected)));
    }

    #[test]
    fn malformed_timestamp_is_validation_error() {
        let doc = json!({
            "schedule_type": "time_based",
            "schedule_data": {"recurring": false, "start_date_time": "next tuesday"}
        });
        let err = decode_campaign(&doc, Channel::Email).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("start_date_time"));
    }

    #[test]
    fn negative_delay_is_validation_error() {
        let doc = json!({
            "schedule_type": "action_based",
            "trigger_schedule_data": {"trigger_delay_in_seconds": -5}
        });
        assert!(decode_campaign(&doc, Channel::Sms).unwrap_err().is_validation());
    }

    #[test]
    fn conversion_behaviors_are_classified() {
        let doc = json!({
            "conversion_behaviors": [
                {"type": "TrackedUserBehavior::MadeAnyPurchase"},
                {"type": "TrackedUserBehavior::PerformedCustomEvent", "custom_event_name": "signup"},
                {"type": "TrackedUserBehavior::UpgradedAppVersion"},
                {"type": "TrackedUserBehavior::Mystery"}
            ]
        });
        let campaign = decode_campaign(&doc, Channel::Push).unwrap();
        let kinds: Vec<_> = campaign
            .conversion_behaviors
            .iter()
            .map(|b| b.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ConversionEventType::Purchase,
                ConversionEventType::CustomEvent,
                ConversionEventType::AppVersionUpgrade,
                ConversionEventType::Other,
            ]
        );
        assert_eq!(
            campaign.conversion_behaviors[1].custom_event_name.as_deref(),
            Some("signup")
        );
    }

    #[test]
    fn app_usage_needs_open_qualifier_outside_sms() {
        let doc = json!({
            "conversion_behaviors": [
                {"event_type": "TrackedUserBehavior::UsedApp", "type": "open"},
                {"event_type": "TrackedUserBehavior::UsedApp", "type": "session"},
                {"event_type": "TrackedUserBehavior::UsedApp"}
            ]
        });
        let kinds = |channel| -> Vec<ConversionEventType> {
            decode_campaign(&doc, channel)
                .unwrap()
                .conversion_behaviors
                .iter()
                .map(|b| b.event_type)
                .collect()
        };

        for channel in [Channel::Email, Channel::Push] {
            assert_eq!(
                kinds(channel),
                vec![
                    ConversionEventType::AppOpen,
                    ConversionEventType::Other,
                    ConversionEventType::Other,
                ]
            );
        }
        assert_eq!(kinds(Channel::Sms), vec![ConversionEventType::AppOpen; 3]);
    }

    #[test]
    fn variations_decode_by_message_type() {
        let doc = json!({
            "messaging_actions": [
                {"message_type": "email", "email_subject": "Hi", "email_body": "<p>x</p>"},
                {"message_type": "email", "is_control": true},
                {"message_type": "androidPush", "android_title": "T", "android_push_buttons": null},
                {"message_type": "contentCard"}
            ]
        });
        let campaign = decode_campaign(&doc, Channel::Email).unwrap();
        assert_eq!(campaign.variations.len(), 4);
        assert!(campaign.variations[1].is_control);
        assert!(matches!(
            &campaign.variations[0].content,
            VariationContent::Email(e) if e.email_subject.as_deref() == Some("Hi")
        ));
        assert!(matches!(
            &campaign.variations[3].content,
            VariationContent::Unsupported { message_type } if message_type == "contentCard"
        ));
    }

    #[test]
    fn segments_with_id_and_name_are_kept() {
        let doc = json!({
            "segments": [{"id": "s1", "name": "VIPs"}, {"name": "no id"}],
            "filters": [{"custom_attribute": "tier"}]
        });
        let campaign = decode_campaign(&doc, Channel::Email).unwrap();
        assert_eq!(campaign.audience.segments.len(), 1);
        assert_eq!(campaign.audience.segments[0].name, "VIPs");
        assert_eq!(campaign.audience.filters.len(), 1);
    }

    #[test]
    fn content_block_decodes_with_null_content() {
        let block = decode_content_block(&json!({"name": "Footer", "content": null})).unwrap();
        assert_eq!(block.name.as_deref(), Some("Footer"));
        assert!(block.content.is_empty());
    }
}
