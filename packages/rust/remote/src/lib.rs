//! HTTP clients for the source read API and the target write API.
//!
//! Calls are awaited one at a time; neither client issues concurrent requests.

pub mod source;
pub mod target;

pub use source::{CampaignFilter, CampaignSummary, SourceClient};
pub use target::{TargetClient, basic_auth};
