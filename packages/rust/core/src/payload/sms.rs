//! SMS campaign draft and sender connector.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use migrator_transform::{TargetGoalSet, VariantSplit};

use super::email::FlatConversion;
use super::{DraftCommon, WeightMap, with_control_slot};

/// Weight-map key for SMS variants.
pub const SMS_WEIGHT_KEY: &str = "sms";
/// Slot prefix for numbered SMS variants.
pub const SMS_SLOT: &str = "SMS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsContent {
    pub message: String,
    pub message_html: String,
}

impl SmsContent {
    pub fn new(body: String) -> Self {
        Self {
            message_html: body.clone(),
            message: body,
        }
    }
}

/// Default sender and connector, read from the target's SMS settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsConnector {
    pub sender_id: Value,
    pub name: String,
    pub setting_sender_id: String,
    pub connector_id: Value,
    pub connector_type: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "unSubText")]
    pub unsub_text: Option<String>,
    #[serde(rename = "moCallbackURL")]
    pub mo_callback_url: Option<String>,
    pub connector_name: String,
    #[serde(rename = "deliveryEnabled")]
    pub delivery_enabled: bool,
    #[serde(rename = "senderType")]
    pub sender_type: String,
}

impl SmsConnector {
    /// Build from the `generalSettings` object. Missing keys take defaults.
    pub fn from_settings(settings: &Value) -> Self {
        let text = |key: &str, default: &str| {
            settings
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let sender_name = text("default_sender_v2", "DefaultSender");
        let sender_type = capitalize(&text("default_sender_type", "promotional"));
        let connector_type = text("default_connector_v2", "Custom_Connector").replace('_', " ");

        Self {
            sender_id: settings.get("default_sender_v2_id").cloned().unwrap_or(Value::Null),
            name: sender_name.clone(),
            setting_sender_id: String::new(),
            connector_id: settings
                .get("default_connector_v2_id")
                .cloned()
                .unwrap_or(Value::Null),
            connector_type,
            display_name: sender_name.clone(),
            unsub_text: None,
            mo_callback_url: None,
            connector_name: sender_name,
            delivery_enabled: false,
            sender_type,
        }
    }
}

impl Default for SmsConnector {
    fn default() -> Self {
        Self::from_settings(&Value::Null)
    }
}

/// First letter upper, rest lower.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// SMS draft. A single variant fills `message`/`message_html`; several fill
/// `SMS_1..N` and leave them out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsDraft {
    #[serde(flatten)]
    pub common: DraftCommon,
    pub is_jinja: bool,
    pub bypass_dnd: bool,
    pub sms_dlt_template_id: String,
    pub conversion: FlatConversion,
    pub var_p: WeightMap,
    #[serde(rename = "selectedConnector")]
    pub selected_connector: SmsConnector,
    #[serde(flatten)]
    pub content: Option<SmsContent>,
    #[serde(flatten)]
    pub variants: BTreeMap<String, SmsContent>,
}

impl SmsDraft {
    pub fn new(
        common: DraftCommon,
        goals: TargetGoalSet,
        connector: SmsConnector,
        split: VariantSplit<SmsContent>,
    ) -> Self {
        let var_p = BTreeMap::from([(
            SMS_WEIGHT_KEY.to_string(),
            with_control_slot(split.weights()),
        )]);

        let (content, variants) = match split {
            VariantSplit::Single(content) => (Some(content), BTreeMap::new()),
            numbered @ VariantSplit::Numbered(_) => (
                None,
                numbered
                    .into_slots(SMS_SLOT)
                    .into_iter()
                    .map(|(slot, weighted)| (slot, weighted.content))
                    .collect(),
            ),
        };

        Self {
            common,
            is_jinja: true,
            bypass_dnd: false,
            sms_dlt_template_id: String::new(),
            conversion: FlatConversion {
                conversion_goals: goals,
            },
            var_p,
            selected_connector: connector,
            content,
            variants,
        }
    }
}
