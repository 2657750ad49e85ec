//! Push campaign draft with per-platform content.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use migrator_transform::{TargetGoalSet, VariantSplit};

use super::{DraftCommon, Segmentation, WeightMap};

/// Push platform. Serialized as its slot key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Android,
    Ios,
    Web,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Android, Platform::Ios, Platform::Web];

    pub fn slot(&self) -> &'static str {
        match self {
            Self::Android => "ANDROID",
            Self::Ios => "IOS",
            Self::Web => "WEB",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slot())
    }
}

/// Image attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageWidget {
    #[serde(rename = "WidgetName")]
    pub widget_name: String,
    #[serde(rename = "inputImageURL")]
    pub input_image_url: String,
    #[serde(rename = "selectedImageUploadType")]
    pub upload_type: String,
}

impl ImageWidget {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            widget_name: "image".into(),
            input_image_url: url.into(),
            upload_type: "url".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Android
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AndroidAction {
    Deeplinking {
        #[serde(rename = "ndANDROIDDeeplinking")]
        extras: Vec<Value>,
        #[serde(rename = "deeplinkingURL")]
        url: String,
        #[serde(rename = "btnName", skip_serializing_if = "Option::is_none")]
        button_name: Option<String>,
    },
    Richlanding {
        #[serde(rename = "ndANDROIDRichlanding")]
        extras: Vec<Value>,
        #[serde(rename = "richLandingURL")]
        url: String,
        #[serde(rename = "btnName", skip_serializing_if = "Option::is_none")]
        button_name: Option<String>,
    },
}

impl AndroidAction {
    pub fn deep_link(url: impl Into<String>, button_name: Option<String>) -> Self {
        Self::Deeplinking {
            extras: Vec::new(),
            url: url.into(),
            button_name,
        }
    }

    pub fn rich_landing(url: impl Into<String>, button_name: Option<String>) -> Self {
        Self::Richlanding {
            extras: Vec::new(),
            url: url.into(),
            button_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidContent {
    #[serde(rename = "sendWithPriority")]
    pub send_with_priority: String,
    pub channel_id: String,
    pub msgtitle: String,
    pub msg: String,
    #[serde(rename = "actionArray")]
    pub actions: Vec<AndroidAction>,
    #[serde(rename = "widgetArray")]
    pub widgets: Vec<ImageWidget>,
}

impl AndroidContent {
    pub fn new(title: String, message: String) -> Self {
        Self {
            send_with_priority: "normal".into(),
            channel_id: "moe_default_channel".into(),
            msgtitle: title,
            msg: message,
            actions: Vec::new(),
            widgets: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// iOS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum IosAction {
    /// Buttons are carried by the app's notification category.
    #[serde(rename = "INVITE_CATEGORY")]
    InviteCategory,
    #[serde(rename = "deeplinking")]
    Deeplinking {
        #[serde(rename = "actionKVPairs")]
        key_values: Vec<Value>,
        #[serde(rename = "deeplinkingURL")]
        url: String,
    },
}

impl IosAction {
    pub fn deep_link(url: impl Into<String>) -> Self {
        Self::Deeplinking {
            key_values: Vec::new(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IosContent {
    #[serde(rename = "interruption-level")]
    pub interruption_level: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "actionArray")]
    pub actions: Vec<IosAction>,
    #[serde(rename = "widgetArray")]
    pub widgets: Vec<ImageWidget>,
}

impl IosContent {
    pub fn new(title: String, body: String) -> Self {
        Self {
            interruption_level: "active".into(),
            title,
            body,
            actions: Vec::new(),
            widgets: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Web
// ---------------------------------------------------------------------------

/// Web button. The first entry of a button list is always empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebButton {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebContent {
    pub msgtitle: String,
    pub msg: String,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(rename = "widgetArray")]
    pub widgets: Vec<ImageWidget>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "actionArray", skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<WebButton>,
}

impl WebContent {
    pub fn new(title: String, message: String) -> Self {
        Self {
            msgtitle: title,
            msg: message,
            redirect_url: String::new(),
            widgets: Vec::new(),
            image_url: None,
            buttons: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PlatformContent {
    Android(AndroidContent),
    Ios(IosContent),
    Web(WebContent),
}

/// Push draft. Only platforms with at least one variant appear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushDraft {
    #[serde(flatten)]
    pub common: DraftCommon,
    #[serde(rename = "stepStatus")]
    pub step_status: bool,
    pub is_jinja: bool,
    #[serde(rename = "selectedTargetaudience")]
    pub selected_target_audience: String,
    pub c_at_trigger_seg_v2: Segmentation,
    pub c_at_act_seg_v2: Segmentation,
    #[serde(rename = "timeValue")]
    pub time_value: u32,
    pub multiplier: u32,
    #[serde(rename = "triggerRelation")]
    pub trigger_relation: String,
    #[serde(rename = "triggerAttr")]
    pub trigger_attr: String,
    #[serde(rename = "selectedPlatform")]
    pub selected_platform: Vec<Platform>,
    #[serde(rename = "selectedPlatformName")]
    pub selected_platform_name: Vec<Platform>,
    pub tag_ids: Vec<String>,
    pub ttl: String,
    pub ttl_type: String,
    pub is_bts_campaign: bool,
    pub tz_f: bool,
    pub bypass_dnd: bool,
    pub conversion: TargetGoalSet,
    pub var_p: WeightMap,
    /// `ANDROID`, `IOS_2`, ...
    #[serde(flatten)]
    pub platforms: BTreeMap<String, PlatformContent>,
}

impl PushDraft {
    /// Build from the active platforms' splits, in platform order.
    pub fn new(
        common: DraftCommon,
        goals: TargetGoalSet,
        trigger_segmentation: Segmentation,
        splits: Vec<(Platform, VariantSplit<PlatformContent>)>,
    ) -> Self {
        let mut selected = Vec::with_capacity(splits.len());
        let mut var_p = WeightMap::new();
        let mut platforms = BTreeMap::new();

        for (platform, split) in splits {
            selected.push(platform);
            var_p.insert(platform.slot().to_string(), split.weights());
            for (slot, weighted) in split.into_slots(platform.slot()) {
                platforms.insert(slot, weighted.content);
            }
        }

        Self {
            common,
            step_status: true,
            is_jinja: true,
            selected_target_audience: "custom_filters".into(),
            c_at_trigger_seg_v2: trigger_segmentation,
            c_at_act_seg_v2: Segmentation::new("and", Vec::new()),
            time_value: 0,
            multiplier: 1,
            trigger_relation: "after".into(),
            trigger_attr: "If Action".into(),
            selected_platform_name: selected.clone(),
            selected_platform: selected,
            tag_ids: Vec::new(),
            ttl: "36".into(),
            ttl_type: "hour".into(),
            is_bts_campaign: false,
            tz_f: false,
            bypass_dnd: false,
            conversion: goals,
            var_p,
            platforms,
        }
    }
}
