//! Strongly-typed target documents.
//!
//! Each channel has its own draft struct; [`TargetPayload`] is the tagged
//! union over them. Drafts are built once by the assembler and never
//! patched afterwards.

pub mod content_block;
pub mod email;
pub mod push;
pub mod sms;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use migrator_shared::{Channel, Result};
use migrator_transform::{GoalAttributes, TargetScheduleFields};

pub use content_block::{ContentBlockDraft, sanitize_block_name};
pub use email::{EmailContent, EmailDraft, EmailExtraData};
pub use push::{
    AndroidAction, AndroidContent, ImageWidget, IosAction, IosContent, Platform, PlatformContent,
    PushDraft, WebButton, WebContent,
};
pub use sms::{SmsConnector, SmsContent, SmsDraft};

/// Action the target uses for "opened the app".
pub const APP_OPEN_ACTION: &str = "MOE_APP_OPENED";

/// Weight-map key reserved for the control group.
pub const CONTROL_VARIANT_KEY: &str = "9";

// ---------------------------------------------------------------------------
// TargetPayload
// ---------------------------------------------------------------------------

/// Campaign drafts are wrapped in a `campaign_data` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDocument<T> {
    pub campaign_data: T,
}

impl<T> CampaignDocument<T> {
    pub fn new(campaign_data: T) -> Self {
        Self { campaign_data }
    }
}

/// The channel-specific output document of one migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetPayload {
    Email(CampaignDocument<EmailDraft>),
    Push(CampaignDocument<PushDraft>),
    Sms(CampaignDocument<SmsDraft>),
    ContentBlock(ContentBlockDraft),
}

impl TargetPayload {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Email(_) => Channel::Email,
            Self::Push(_) => Channel::Push,
            Self::Sms(_) => Channel::Sms,
            Self::ContentBlock(_) => Channel::ContentBlock,
        }
    }

    /// Campaign or block name as it will appear on the target.
    pub fn name(&self) -> &str {
        match self {
            Self::Email(doc) => &doc.campaign_data.common.campaign_name,
            Self::Push(doc) => &doc.campaign_data.common.campaign_name,
            Self::Sms(doc) => &doc.campaign_data.common.campaign_name,
            Self::ContentBlock(block) => &block.name,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---------------------------------------------------------------------------
// Shared draft pieces
// ---------------------------------------------------------------------------

/// Fields every campaign draft carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftCommon {
    #[serde(rename = "campaignName")]
    pub campaign_name: String,
    #[serde(rename = "campaignType")]
    pub campaign_type: String,
    pub action: String,
    pub c_c_g_v2: bool,
    pub c_s_is_new: bool,
    pub is_react: bool,
    pub global_control_enabled: bool,
    /// `[zone name, offset label]`.
    pub timezone: (String, String),
    #[serde(rename = "timezoneName")]
    pub timezone_name: String,
    #[serde(flatten)]
    pub schedule: TargetScheduleFields,
    pub new_segmentation_data: Segmentation,
}

impl DraftCommon {
    pub fn new(
        campaign_name: impl Into<String>,
        campaign_type: impl Into<String>,
        timezone: (String, String),
        schedule: TargetScheduleFields,
        segmentation: Segmentation,
    ) -> Self {
        let timezone_name = timezone.0.clone();
        Self {
            campaign_name: campaign_name.into(),
            campaign_type: campaign_type.into(),
            action: "create".into(),
            c_c_g_v2: true,
            c_s_is_new: true,
            is_react: true,
            global_control_enabled: false,
            timezone,
            timezone_name,
            schedule,
            new_segmentation_data: segmentation,
        }
    }
}

/// Variant number to traffic share, per channel or platform key.
pub type WeightMap = BTreeMap<String, BTreeMap<String, u32>>;

/// An audience definition: one group of filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
    pub included_filters: FilterGroup,
}

impl Segmentation {
    pub fn new(filter_operator: &str, filters: Vec<AudienceFilter>) -> Self {
        Self {
            included_filters: FilterGroup {
                filter_operator: filter_operator.into(),
                filters,
            },
        }
    }

    pub fn filters(&self) -> &[AudienceFilter] {
        &self.included_filters.filters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGroup {
    pub filter_operator: String,
    pub filters: Vec<AudienceFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
}

impl Execution {
    pub fn at_least(count: u32) -> Self {
        Self {
            kind: "atleast".into(),
            count,
        }
    }
}

/// One audience filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "filter_type", rename_all = "snake_case")]
pub enum AudienceFilter {
    /// Membership in a saved segment.
    CustomSegments { name: String, id: String },
    /// Users who performed an action.
    Actions {
        action_name: String,
        execution: Execution,
        #[serde(skip_serializing_if = "Option::is_none")]
        executed: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        attributes: Option<GoalAttributes>,
    },
}

impl AudienceFilter {
    /// Users who opened the app at least once, with the executed/attributes
    /// block push and SMS drafts expect.
    pub fn app_opened() -> Self {
        Self::Actions {
            action_name: APP_OPEN_ACTION.into(),
            execution: Execution::at_least(1),
            executed: Some(true),
            attributes: Some(GoalAttributes::default()),
        }
    }

    /// The bare app-open action used as an email trigger.
    pub fn app_opened_bare() -> Self {
        Self::Actions {
            action_name: APP_OPEN_ACTION.into(),
            execution: Execution::at_least(1),
            executed: None,
            attributes: None,
        }
    }
}

/// Weights with the control slot pinned to zero.
pub(crate) fn with_control_slot(mut weights: BTreeMap<String, u32>) -> BTreeMap<String, u32> {
    weights.insert(CONTROL_VARIANT_KEY.to_string(), 0);
    weights
}
