//! Conversion-goal mapping.
//!
//! Push drafts carry a ranked goal set (one primary, the rest secondary) and
//! always need at least one goal. Email and SMS drafts carry a flat list and
//! drop behaviors that have no target equivalent.

use serde::Serialize;

use migrator_shared::{ConversionBehavior, ConversionEventType};

const APP_OPEN_ACTION: &str = "MOE_APP_OPENED";
const PURCHASE_ACTION: &str = "PURCHASE";
const UPGRADE_ACTION: &str = "APP_VERSION_UPDATED";
const UNNAMED_CUSTOM_EVENT: &str = "CUSTOM_EVENT";

/// Which goal shape a channel expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStyle {
    /// Flat list; unmapped behaviors are omitted.
    Flat,
    /// Primary plus secondaries; never empty.
    Ranked,
}

/// A goal in a flat goal list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatGoal {
    pub name: String,
    pub event_name: String,
    pub revenue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalAttributes {
    pub filter_operator: String,
    pub filters: Vec<serde_json::Value>,
}

impl Default for GoalAttributes {
    fn default() -> Self {
        Self {
            filter_operator: "and".into(),
            filters: Vec::new(),
        }
    }
}

/// A goal in a ranked goal set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedGoal {
    pub action: String,
    pub goal_name: String,
    pub attributes: GoalAttributes,
    pub filter_type: String,
}

impl RankedGoal {
    fn new(action: impl Into<String>, goal_name: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            goal_name: goal_name.into(),
            attributes: GoalAttributes::default(),
            filter_type: "actions".into(),
        }
    }

    fn app_open() -> Self {
        Self::new(APP_OPEN_ACTION, "App Open")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedGoals {
    pub primary: RankedGoal,
    pub secondary: Vec<RankedGoal>,
}

/// Mapped goals in the shape the channel expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TargetGoalSet {
    Flat(Vec<FlatGoal>),
    Ranked(RankedGoals),
}

impl TargetGoalSet {
    /// Number of goals in the set.
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(goals) => goals.len(),
            Self::Ranked(ranked) => 1 + ranked.secondary.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map source conversion behaviors to target goals.
pub fn map_goals(behaviors: &[ConversionBehavior], style: GoalStyle) -> TargetGoalSet {
    match style {
        GoalStyle::Flat => TargetGoalSet::Flat(behaviors.iter().filter_map(flat_goal).collect()),
        GoalStyle::Ranked => {
            let mut goals = behaviors.iter().map(ranked_goal);
            let primary = goals.next().unwrap_or_else(RankedGoal::app_open);
            TargetGoalSet::Ranked(RankedGoals {
                primary,
                secondary: goals.collect(),
            })
        }
    }
}

fn custom_event_name(behavior: &ConversionBehavior) -> &str {
    behavior
        .custom_event_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(UNNAMED_CUSTOM_EVENT)
}

fn flat_goal(behavior: &ConversionBehavior) -> Option<FlatGoal> {
    let (name, event_name, revenue) = match behavior.event_type {
        ConversionEventType::Purchase => ("Any Purchase".to_string(), "Purchase".to_string(), true),
        ConversionEventType::AppOpen => ("App/Site Open".into(), "App/Site Open".into(), false),
        ConversionEventType::AppVersionUpgrade => {
            ("App Version Upgrade".into(), UPGRADE_ACTION.into(), false)
        }
        ConversionEventType::CustomEvent => {
            let event = custom_event_name(behavior);
            (format!("Performed '{event}'"), event.to_string(), false)
        }
        ConversionEventType::Other => return None,
    };

    Some(FlatGoal {
        name,
        event_name,
        revenue,
    })
}

fn ranked_goal(behavior: &ConversionBehavior) -> RankedGoal {
    match behavior.event_type {
        ConversionEventType::Purchase => RankedGoal::new(PURCHASE_ACTION, "Purchase Conversion"),
        ConversionEventType::AppOpen => RankedGoal::app_open(),
        ConversionEventType::AppVersionUpgrade => {
            RankedGoal::new(UPGRADE_ACTION, "App Version Upgrade")
        }
        ConversionEventType::CustomEvent => {
            let event = custom_event_name(behavior);
            RankedGoal::new(event, format!("Custom Event: {event}"))
        }
        ConversionEventType::Other => RankedGoal::new(APP_OPEN_ACTION, "App Engagement"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn behavior(event_type: ConversionEventType, name: Option<&str>) -> ConversionBehavior {
        ConversionBehavior {
            event_type,
            custom_event_name: name.map(String::from),
        }
    }

    #[test]
    fn ranked_first_is_primary() {
        let goals = map_goals(
            &[
                behavior(ConversionEventType::Purchase, None),
                behavior(ConversionEventType::CustomEvent, Some("signup")),
                behavior(ConversionEventType::Other, None),
            ],
            GoalStyle::Ranked,
        );
        let TargetGoalSet::Ranked(ranked) = goals else {
            panic!("expected ranked goals");
        };
        assert_eq!(ranked.primary.action, "PURCHASE");
        assert_eq!(ranked.primary.goal_name, "Purchase Conversion");
        assert_eq!(ranked.secondary.len(), 2);
        assert_eq!(ranked.secondary[0].goal_name, "Custom Event: signup");
        assert_eq!(ranked.secondary[1].goal_name, "App Engagement");
    }

    #[test]
    fn ranked_empty_defaults_to_app_open() {
        let goals = map_goals(&[], GoalStyle::Ranked);
        assert_eq!(goals.len(), 1);
        let json = serde_json::to_value(&goals).unwrap();
        assert_eq!(json["primary"]["action"], "MOE_APP_OPENED");
        assert_eq!(json["primary"]["filter_type"], "actions");
        assert_eq!(json["primary"]["attributes"]["filter_operator"], "and");
        assert_eq!(json["secondary"], serde_json::json!([]));
    }

    #[test]
    fn flat_omits_unmapped_behaviors() {
        let goals = map_goals(
            &[
                behavior(ConversionEventType::Other, None),
                behavior(ConversionEventType::Purchase, None),
                behavior(ConversionEventType::CustomEvent, Some("checkout")),
            ],
            GoalStyle::Flat,
        );
        let TargetGoalSet::Flat(flat) = goals else {
            panic!("expected flat goals");
        };
        assert_eq!(flat.len(), 2);
        assert!(flat[0].revenue);
        assert_eq!(flat[0].name, "Any Purchase");
        assert_eq!(flat[1].name, "Performed 'checkout'");
        assert_eq!(flat[1].event_name, "checkout");
    }

    #[test]
    fn flat_empty_is_allowed() {
        assert!(map_goals(&[behavior(ConversionEventType::Other, None)], GoalStyle::Flat).is_empty());
    }

    #[test]
    fn unnamed_custom_event_uses_placeholder() {
        let goals = map_goals(
            &[behavior(ConversionEventType::CustomEvent, Some(""))],
            GoalStyle::Ranked,
        );
        let TargetGoalSet::Ranked(ranked) = goals else {
            panic!("expected ranked goals");
        };
        assert_eq!(ranked.primary.action, "CUSTOM_EVENT");
    }
}
