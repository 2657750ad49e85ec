//! Migration orchestration for the campaign migrator.
//!
//! This crate ties decoding, the transformation stages, asset re-hosting,
//! and the target write API together into end-to-end migrations
//! (e.g., [`Migrator::migrate_campaign`]).

pub mod assembler;
pub mod audience;
pub mod payload;
pub mod pipeline;

pub use assembler::Assembler;
pub use payload::{CampaignDocument, TargetPayload};
pub use pipeline::{
    BatchReport, BlockOutcome, MigrationFailure, MigrationProgress, MigrationReport, Migrator,
    SilentProgress, select_content_blocks,
};
