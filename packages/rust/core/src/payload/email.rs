//! Email campaign draft.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use migrator_transform::{TargetGoalSet, VariantSplit};

use super::{DraftCommon, Segmentation, WeightMap, with_control_slot};

/// Weight-map and slot key for email variants.
pub const EMAIL_SLOT: &str = "EMAIL";

/// Single-variant marker.
const SINGLE_VARIANT: &str = "SMV";
/// Multi-variant marker.
const MULTI_VARIANT: &str = "MMV";

/// Processed content of one email variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailContent {
    pub email_subject: String,
    pub email_subject_html: String,
    pub email_preview_text: String,
    pub email_preview_text_html: String,
    pub email_content: String,
    pub email_sender_name: Option<String>,
    pub email_from_id: Option<String>,
    /// Falls back to the from address.
    pub email_reply_id: Option<String>,
    #[serde(rename = "extraData")]
    pub extra_data: EmailExtraData,
}

impl EmailContent {
    pub fn new(
        subject: String,
        preheader: String,
        html: String,
        sender_name: Option<String>,
        from: Option<String>,
        reply_to: Option<String>,
    ) -> Self {
        let reply = reply_to.filter(|r| !r.is_empty()).or_else(|| from.clone());
        Self {
            email_subject: subject.clone(),
            email_subject_html: subject,
            email_preview_text: preheader.clone(),
            email_preview_text_html: preheader,
            email_content: html,
            extra_data: EmailExtraData {
                email_sender_name_html: sender_name.clone(),
                email_reply_id_html: reply.clone(),
            },
            email_sender_name: sender_name,
            email_from_id: from,
            email_reply_id: reply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailExtraData {
    pub email_sender_name_html: Option<String>,
    pub email_reply_id_html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtmParam {
    pub utm_name: String,
    pub is_enabled: bool,
    pub utm_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailConnector {
    #[serde(rename = "readableName")]
    pub readable_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for EmailConnector {
    fn default() -> Self {
        Self {
            readable_name: "Sendgrid (default)".into(),
            name: "default".into(),
            kind: "Sendgrid".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiVariantData {
    pub m_v_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatConversion {
    pub conversion_goals: TargetGoalSet,
}

/// Email draft. A single variant fills the top-level content fields;
/// several variants fill `EMAIL_1..N` and leave them out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailDraft {
    #[serde(flatten)]
    pub common: DraftCommon,
    #[serde(rename = "contentApi")]
    pub content_api: Value,
    pub utm_params: BTreeMap<String, UtmParam>,
    pub var_p: WeightMap,
    pub locales: Map<String, Value>,
    #[serde(rename = "variateType")]
    pub variate_type: String,
    pub m_v_type: String,
    pub m_v_data: MultiVariantData,
    pub email_builder: bool,
    pub attachments: Vec<Value>,
    pub email_editor: String,
    pub connector: EmailConnector,
    pub campaign_content_type: String,
    pub conversion: FlatConversion,
    pub campaigntype: String,
    #[serde(rename = "selectedTargetaudience")]
    pub selected_target_audience: String,
    pub subscription_category_name: String,
    pub c_at_trigger_seg_v2: Segmentation,
    #[serde(flatten)]
    pub content: Option<EmailContent>,
    #[serde(flatten)]
    pub variants: BTreeMap<String, EmailContent>,
}

impl EmailDraft {
    pub fn new(
        common: DraftCommon,
        goals: TargetGoalSet,
        trigger_segmentation: Segmentation,
        split: VariantSplit<EmailContent>,
    ) -> Self {
        let marker = if split.is_multi() {
            MULTI_VARIANT
        } else {
            SINGLE_VARIANT
        };
        let var_p = BTreeMap::from([(EMAIL_SLOT.to_string(), with_control_slot(split.weights()))]);

        let (content, variants) = match split {
            VariantSplit::Single(content) => (Some(content), BTreeMap::new()),
            numbered @ VariantSplit::Numbered(_) => (
                None,
                numbered
                    .into_slots(EMAIL_SLOT)
                    .into_iter()
                    .map(|(slot, weighted)| (slot, weighted.content))
                    .collect(),
            ),
        };

        Self {
            common,
            content_api: serde_json::json!({ "params": {} }),
            utm_params: default_utm_params(),
            var_p,
            locales: Map::new(),
            variate_type: marker.into(),
            m_v_type: marker.into(),
            m_v_data: MultiVariantData {
                m_v_type: marker.into(),
                kind: marker.into(),
                data: Map::new(),
            },
            email_builder: false,
            attachments: Vec::new(),
            email_editor: "Froala Editor".into(),
            connector: EmailConnector::default(),
            campaign_content_type: "Promotional".into(),
            conversion: FlatConversion {
                conversion_goals: goals,
            },
            campaigntype: "email".into(),
            selected_target_audience: "custom_filters".into(),
            subscription_category_name: "allEmails".into(),
            c_at_trigger_seg_v2: trigger_segmentation,
            content,
            variants,
        }
    }
}

fn default_utm_params() -> BTreeMap<String, UtmParam> {
    [
        ("utm_source", "MoEngage"),
        ("utm_medium", "{{Campaign Channel}}"),
        ("utm_campaign", "{{Campaign Name}}"),
    ]
    .into_iter()
    .map(|(name, value)| {
        (
            name.to_string(),
            UtmParam {
                utm_name: name.into(),
                is_enabled: true,
                utm_value: value.into(),
            },
        )
    })
    .collect()
}
