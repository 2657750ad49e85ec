//! Shared types, error model, and configuration for the campaign migrator.
//!
//! This crate is the foundation depended on by all other migrator crates.
//! It provides:
//! - [`MigratorError`]: the unified error type
//! - Domain types ([`SourceCampaign`], [`ScheduleDescriptor`], [`MessagingVariation`], [`MigrationId`])
//! - Source document decoding ([`decode_campaign`], [`decode_content_block`])
//! - Configuration ([`AppConfig`], [`MigrationConfig`], config loading)

pub mod config;
pub mod error;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetSettings, AssetsConfig, DEFAULT_ASSET_USER_AGENT, DefaultsConfig,
    MigrationConfig, SegmentMap, SourceConfig, SourceReadConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, parse_timezone,
};
pub use error::{MigratorError, Result};
pub use source::{decode_campaign, decode_content_block, parse_instant};
pub use types::{
    AndroidPushMessage, AudienceFilters, Channel, ConversionBehavior, ConversionEventType,
    DEFAULT_CONTENT_BLOCK_URL, DEFAULT_DRAFT_URL, DEFAULT_TARGET_ORIGIN, EmailMessage, Frequency,
    IosAlert, IosPushMessage, MessagingVariation, MigrationId, PushButton, RecurringSchedule,
    ScheduleDescriptor, SegmentRef, SmsMessage, SourceCampaign, SourceContentBlock,
    SourceCredentials, SourceInstant, TargetCredentials, TriggeredSchedule, VariationContent,
    WebPushMessage,
};
