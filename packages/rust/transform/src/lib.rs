//! Pure transformation stages of a campaign migration.
//!
//! - [`schedule`]: source schedule → target delivery fields
//! - [`goals`]: conversion behaviors → target goals
//! - [`variations`]: weighted variant splitting
//! - [`template`]: template-syntax rewriting seam
//! - [`content`]: per-field length bounds

pub mod content;
pub mod goals;
pub mod schedule;
pub mod template;
pub mod variations;

pub use content::{ELLIPSIS, limits, plain_bounded, strip_tags, truncate_with_ellipsis};
pub use goals::{
    FlatGoal, GoalAttributes, GoalStyle, RankedGoal, RankedGoals, TargetGoalSet, map_goals,
};
pub use schedule::{
    Delivery, ScheduleClock, ScheduleInfo, TargetScheduleFields, TriggerDelayType, translate,
};
pub use template::{DollarVariableRewriter, PassthroughRewriter, TemplateRewriter};
pub use variations::{TOTAL_WEIGHT, VariantSplit, WeightedContent, allocate_weights, split};
