//! End-to-end migration: source document → decode → assemble → target write.

use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use migrator_assets::AssetMigrator;
use migrator_remote::TargetClient;
use migrator_shared::{
    Channel, DEFAULT_CONTENT_BLOCK_URL, MigrationConfig, MigrationId, MigratorError, Result,
    SourceContentBlock, TargetCredentials, decode_campaign, decode_content_block,
};
use migrator_transform::{PassthroughRewriter, ScheduleClock, TemplateRewriter};

use crate::assembler::Assembler;
use crate::payload::{SmsConnector, TargetPayload};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A successful migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub migration_id: MigrationId,
    pub channel: Channel,
    /// The document sent (or, on a dry run, that would have been sent).
    pub payload: TargetPayload,
    /// The target's creation response. `None` on a dry run.
    pub response: Option<Value>,
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn to_json(&self) -> Value {
        json!({
            "success": true,
            "migration_id": self.migration_id,
            "channel": self.channel,
            "payload": self.payload,
            "response": self.response,
        })
    }
}

/// A failed migration. Carries the constructed document when assembly
/// got that far, for inspection or retry.
#[derive(Debug, thiserror::Error)]
#[error("migration {migration_id} failed: {error}")]
pub struct MigrationFailure {
    pub migration_id: MigrationId,
    #[source]
    pub error: MigratorError,
    pub payload: Option<TargetPayload>,
}

impl MigrationFailure {
    fn new(migration_id: MigrationId, error: MigratorError) -> Self {
        Self {
            migration_id,
            error,
            payload: None,
        }
    }

    fn with_payload(mut self, payload: TargetPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.error.status_code()
    }

    /// Structured error document, including the target's status and body
    /// when the write itself was rejected.
    pub fn to_json(&self) -> Value {
        let (remote_status, remote_body) = match &self.error {
            MigratorError::RemoteWrite { status, body } => (json!(status), json!(body)),
            _ => (Value::Null, Value::Null),
        };

        json!({
            "success": false,
            "migration_id": self.migration_id,
            "status_code": self.status_code(),
            "error": self.error.to_string(),
            "remote_status": remote_status,
            "remote_body": remote_body,
            "payload": self.payload,
        })
    }
}

/// Result of one block in a batch.
#[derive(Debug)]
pub struct BlockOutcome {
    pub block_id: Option<String>,
    pub block_name: String,
    pub result: std::result::Result<MigrationReport, MigrationFailure>,
}

impl BlockOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of a batch content-block migration, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BlockOutcome>,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    pub fn to_json(&self) -> Value {
        let results: Vec<Value> = self
            .outcomes
            .iter()
            .map(|outcome| {
                let mut entry = match &outcome.result {
                    Ok(report) => report.to_json(),
                    Err(failure) => failure.to_json(),
                };
                entry["block_id"] = json!(outcome.block_id);
                entry["block_name"] = json!(outcome.block_name);
                entry
            })
            .collect();

        json!({
            "total_blocks": self.outcomes.len(),
            "results": results,
            "summary": {
                "successful": self.successful(),
                "failed": self.failed(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting migration status.
pub trait MigrationProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each block of a batch.
    fn block_finished(&self, name: &str, success: bool, current: usize, total: usize);
    /// Called when a single migration succeeds.
    fn done(&self, report: &MigrationReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl MigrationProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn block_finished(&self, _name: &str, _success: bool, _current: usize, _total: usize) {}
    fn done(&self, _report: &MigrationReport) {}
}

// ---------------------------------------------------------------------------
// Migrator
// ---------------------------------------------------------------------------

/// Runs migrations against one target with one configuration.
///
/// Holds no per-request state; each call builds and owns its own documents.
pub struct Migrator {
    config: MigrationConfig,
    assets: AssetMigrator,
    target: TargetClient,
    rewriter: Box<dyn TemplateRewriter>,
    clock: Option<ScheduleClock>,
    content_block_url: String,
    dry_run: bool,
}

impl Migrator {
    pub fn new(config: MigrationConfig) -> Result<Self> {
        Ok(Self {
            assets: AssetMigrator::new(&config.assets)?,
            target: TargetClient::new(config.api_delay)?,
            rewriter: Box::new(PassthroughRewriter),
            clock: None,
            content_block_url: DEFAULT_CONTENT_BLOCK_URL.to_string(),
            dry_run: false,
            config,
        })
    }

    pub fn with_rewriter(mut self, rewriter: impl TemplateRewriter + 'static) -> Self {
        self.rewriter = Box::new(rewriter);
        self
    }

    pub fn with_asset_migrator(mut self, assets: AssetMigrator) -> Self {
        self.assets = assets;
        self
    }

    /// Pin the clock schedules are resolved against. Defaults to the
    /// current time in the configured zone, taken per migration.
    pub fn with_clock(mut self, clock: ScheduleClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_content_block_url(mut self, url: impl Into<String>) -> Self {
        self.content_block_url = url.into();
        self
    }

    /// Assemble without writing to the target.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn clock(&self) -> ScheduleClock {
        self.clock
            .clone()
            .unwrap_or_else(|| ScheduleClock::from_config(&self.config))
    }

    fn assembler<'a>(&'a self, credentials: &'a TargetCredentials) -> Assembler<'a> {
        Assembler::new(&self.assets, self.rewriter.as_ref(), credentials, self.clock())
            .with_segment_map(&self.config.segment_map)
    }

    /// Migrate one source document of `channel`.
    ///
    /// A `ContentBlock` channel expects a content-block document; every other
    /// channel expects a campaign document.
    pub async fn migrate_campaign(
        &self,
        channel: Channel,
        document: &Value,
        credentials: &TargetCredentials,
        progress: &dyn MigrationProgress,
    ) -> std::result::Result<MigrationReport, MigrationFailure> {
        let migration_id = MigrationId::new();
        let report = if channel == Channel::ContentBlock {
            let block = decode_content_block(document)
                .map_err(|e| MigrationFailure::new(migration_id, e))?;
            self.run_content_block(migration_id, &block, credentials, progress)
                .await?
        } else {
            self.run_campaign(migration_id, channel, document, credentials, progress)
                .await?
        };

        progress.done(&report);
        Ok(report)
    }

    /// Migrate an already-decoded content block.
    pub async fn migrate_content_block(
        &self,
        block: &SourceContentBlock,
        credentials: &TargetCredentials,
        progress: &dyn MigrationProgress,
    ) -> std::result::Result<MigrationReport, MigrationFailure> {
        let report = self
            .run_content_block(MigrationId::new(), block, credentials, progress)
            .await?;
        progress.done(&report);
        Ok(report)
    }

    /// Migrate blocks one after another. A failed block never stops the batch.
    #[instrument(skip_all, fields(blocks = blocks.len()))]
    pub async fn migrate_content_blocks(
        &self,
        blocks: &[SourceContentBlock],
        credentials: &TargetCredentials,
        progress: &dyn MigrationProgress,
    ) -> BatchReport {
        let total = blocks.len();
        let mut batch = BatchReport::default();

        for (i, block) in blocks.iter().enumerate() {
            let result = self
                .run_content_block(MigrationId::new(), block, credentials, progress)
                .await;
            let block_name = block.name.clone().unwrap_or_else(|| "Unnamed Block".into());

            if let Err(failure) = &result {
                warn!(block = %block_name, error = %failure.error, "content block migration failed");
            }
            progress.block_finished(&block_name, result.is_ok(), i + 1, total);

            batch.outcomes.push(BlockOutcome {
                block_id: block.id.clone(),
                block_name,
                result,
            });
        }

        info!(
            successful = batch.successful(),
            failed = batch.failed(),
            "content block batch complete"
        );
        batch
    }

    #[instrument(skip_all, fields(migration_id = %migration_id, channel = %channel))]
    async fn run_campaign(
        &self,
        migration_id: MigrationId,
        channel: Channel,
        document: &Value,
        credentials: &TargetCredentials,
        progress: &dyn MigrationProgress,
    ) -> std::result::Result<MigrationReport, MigrationFailure> {
        let start = Instant::now();
        let fail = |error| MigrationFailure::new(migration_id, error);

        // --- Phase 1: Decode ---
        progress.phase("Decoding source campaign");
        let campaign = decode_campaign(document, channel).map_err(fail)?;
        debug!(
            variations = campaign.variations.len(),
            goals = campaign.conversion_behaviors.len(),
            "campaign decoded"
        );

        // --- Phase 2: Sender settings ---
        let mut assembler = self.assembler(credentials);
        if channel == Channel::Sms {
            if self.dry_run {
                debug!("dry run, SMS sender settings not fetched");
            } else {
                progress.phase("Fetching SMS sender settings");
                let settings = self
                    .target
                    .fetch_sms_sender_settings(credentials)
                    .await
                    .map_err(fail)?;
                assembler = assembler.with_sms_connector(SmsConnector::from_settings(&settings));
            }
        }

        // --- Phase 3: Assemble ---
        progress.phase("Assembling target draft");
        let payload = assembler.assemble(&campaign).await.map_err(fail)?;

        // --- Phase 4: Write ---
        let response = if self.dry_run {
            info!("dry run, draft not created");
            None
        } else {
            progress.phase("Creating draft");
            match self.target.create_draft(&payload, credentials).await {
                Ok(response) => Some(response),
                Err(error) => return Err(fail(error).with_payload(payload)),
            }
        };

        let elapsed = start.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, "campaign migrated");

        Ok(MigrationReport {
            migration_id,
            channel,
            payload,
            response,
            elapsed,
        })
    }

    #[instrument(skip_all, fields(migration_id = %migration_id, block_id = block.id.as_deref().unwrap_or("-")))]
    async fn run_content_block(
        &self,
        migration_id: MigrationId,
        block: &SourceContentBlock,
        credentials: &TargetCredentials,
        progress: &dyn MigrationProgress,
    ) -> std::result::Result<MigrationReport, MigrationFailure> {
        let start = Instant::now();

        // --- Phase 1: Assemble ---
        progress.phase("Migrating content block assets");
        let draft = self
            .assembler(credentials)
            .assemble_content_block(block)
            .await;
        let payload = TargetPayload::ContentBlock(draft);

        // --- Phase 2: Write ---
        let response = if self.dry_run {
            info!("dry run, content block not created");
            None
        } else {
            progress.phase("Creating content block");
            match self
                .target
                .create_content_block(&self.content_block_url, &payload, credentials)
                .await
            {
                Ok(response) => Some(response),
                Err(error) => {
                    return Err(MigrationFailure::new(migration_id, error).with_payload(payload));
                }
            }
        };

        let elapsed = start.elapsed();
        info!(name = payload.name(), elapsed_ms = elapsed.as_millis() as u64, "content block migrated");

        Ok(MigrationReport {
            migration_id,
            channel: Channel::ContentBlock,
            payload,
            response,
            elapsed,
        })
    }
}

/// Keep only the blocks whose id is in `ids`, preserving source order.
pub fn select_content_blocks(
    blocks: Vec<SourceContentBlock>,
    ids: &[String],
) -> Result<Vec<SourceContentBlock>> {
    let selected: Vec<_> = blocks
        .into_iter()
        .filter(|b| b.id.as_ref().is_some_and(|id| ids.contains(id)))
        .collect();

    if selected.is_empty() {
        return Err(MigratorError::validation("no matching content blocks found"));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use migrator_remote::basic_auth;
    use migrator_shared::AssetSettings;
    use migrator_transform::DollarVariableRewriter;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DRAFT_PATH: &str = "/v1.0/campaigns/draft";
    const UPLOAD_PATH: &str = "/v1/platform/services/upload-file";
    const BLOCK_PATH: &str = "/content-blocks";

    fn config() -> MigrationConfig {
        let mut assets = AssetSettings::default();
        assets
            .extra_domain_patterns
            .push(r#"http://127\.0\.0\.1:\d+/[^"'\s,<>()\\]+"#.into());
        MigrationConfig {
            timezone: chrono_tz::UTC,
            timezone_offset: "GMT+00:00".into(),
            api_delay: Duration::ZERO,
            assets,
            segment_map: Default::default(),
        }
    }

    fn migrator(server: &MockServer) -> Migrator {
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Migrator::new(config())
            .unwrap()
            .with_rewriter(DollarVariableRewriter)
            .with_clock(ScheduleClock::fixed(chrono_tz::UTC, "GMT+00:00", now))
            .with_content_block_url(format!("{}{BLOCK_PATH}", server.uri()))
    }

    fn credentials(server: &MockServer) -> TargetCredentials {
        let mut creds = TargetCredentials::bearer("tok", "ref");
        creds.origin = server.uri();
        creds.api_url = format!("{}{DRAFT_PATH}", server.uri());
        creds.app_key = Some("key".into());
        creds.app_secret = Some("secret".into());
        creds
    }

    fn email_campaign(body: &str) -> Value {
        json!({
            "campaign": {
                "id": "c-1",
                "campaign_name": "Welcome",
                "messaging_actions": [
                    {"message_type": "email", "email_subject": "Hi {{${first_name}}}", "email_body": body},
                    {"message_type": "email", "is_control": true, "email_subject": "holdout"}
                ]
            }
        })
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        blocks: Mutex<Vec<(String, bool)>>,
    }

    impl MigrationProgress for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn block_finished(&self, name: &str, success: bool, _current: usize, _total: usize) {
            self.blocks.lock().unwrap().push((name.to_string(), success));
        }
        fn done(&self, _report: &MigrationReport) {}
    }

    #[tokio::test]
    async fn email_migration_rehosts_assets_and_creates_draft() {
        let server = MockServer::start().await;
        let image = format!("{}/img/logo.png", server.uri());

        Mock::given(method("GET"))
            .and(path("/img/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"url": "https://cdn.target.test/logo.png"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .and(header("authorization", "Bearer tok"))
            .and(body_string_contains("https://cdn.target.test/logo.png"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "draft-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let progress = RecordingProgress::default();
        let report = migrator(&server)
            .migrate_campaign(
                Channel::Email,
                &email_campaign(&format!("<img src='{image}'>")),
                &credentials(&server),
                &progress,
            )
            .await
            .unwrap();

        assert_eq!(report.response.as_ref().unwrap()["id"], "draft-9");
        let value = report.payload.to_value().unwrap();
        let data = &value["campaign_data"];
        assert_eq!(data["email_content"], "<img src='https://cdn.target.test/logo.png'>");
        assert_eq!(data["email_subject"], "Hi {{ first_name }}");
        assert_eq!(data["var_p"]["EMAIL"]["1"], 100);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec!["Decoding source campaign", "Assembling target draft", "Creating draft"]
        );
    }

    #[tokio::test]
    async fn no_deliverable_variants_fails_before_any_write() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let doc = json!({
            "campaign_name": "Holdout only",
            "messaging_actions": [{"message_type": "email", "is_control": true}]
        });
        let failure = migrator(&server)
            .migrate_campaign(Channel::Email, &doc, &credentials(&server), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, MigratorError::NoVariations { .. }));
        assert!(failure.payload.is_none());
        assert_eq!(failure.to_json()["status_code"], 400);
    }

    #[tokio::test]
    async fn rejected_draft_returns_payload_and_remote_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid segment"))
            .mount(&server)
            .await;

        let failure = migrator(&server)
            .migrate_campaign(
                Channel::Email,
                &email_campaign("<p>plain</p>"),
                &credentials(&server),
                &SilentProgress,
            )
            .await
            .unwrap_err();

        let doc = failure.to_json();
        assert_eq!(doc["success"], false);
        assert_eq!(doc["status_code"], 502);
        assert_eq!(doc["remote_status"], 422);
        assert_eq!(doc["remote_body"], "invalid segment");
        assert_eq!(doc["payload"]["campaign_data"]["campaignName"], "Welcome");
    }

    #[tokio::test]
    async fn failed_asset_keeps_original_url() {
        let server = MockServer::start().await;
        let image = format!("{}/img/missing.png", server.uri());
        Mock::given(method("GET"))
            .and(path("/img/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let body = format!("<img src='{image}'>");
        let report = migrator(&server)
            .migrate_campaign(Channel::Email, &email_campaign(&body), &credentials(&server), &SilentProgress)
            .await
            .unwrap();

        let value = report.payload.to_value().unwrap();
        assert_eq!(value["campaign_data"]["email_content"], body);
    }

    #[tokio::test]
    async fn sms_draft_carries_fetched_sender() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/settings/sms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "generalSettings": {"default_sender_v2": "ACME", "default_connector_v2": "Acme_Gateway"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DRAFT_PATH))
            .and(body_string_contains("\"connector_type\":\"Acme Gateway\""))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "sms-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let doc = json!({
            "campaign_name": "Flash",
            "messaging_actions": [{"message_type": "sms", "body": "50% off"}]
        });
        let report = migrator(&server)
            .migrate_campaign(Channel::Sms, &doc, &credentials(&server), &SilentProgress)
            .await
            .unwrap();

        let value = report.payload.to_value().unwrap();
        assert_eq!(value["campaign_data"]["selectedConnector"]["name"], "ACME");
        assert_eq!(value["campaign_data"]["message"], "50% off");
    }

    #[tokio::test]
    async fn sms_settings_failure_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/settings/sms"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let doc = json!({"messaging_actions": [{"message_type": "sms", "body": "x"}]});
        let failure = migrator(&server)
            .migrate_campaign(Channel::Sms, &doc, &credentials(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, MigratorError::RemoteFetch { .. }));
    }

    #[tokio::test]
    async fn dry_run_skips_target_writes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let doc = json!({
            "messaging_actions": [{"message_type": "webPush", "web_title": "Hello"}]
        });
        let report = migrator(&server)
            .dry_run(true)
            .migrate_campaign(Channel::Push, &doc, &credentials(&server), &SilentProgress)
            .await
            .unwrap();

        assert!(report.response.is_none());
        assert_eq!(report.to_json()["payload"]["campaign_data"]["selectedPlatform"], json!(["WEB"]));
    }

    #[tokio::test]
    async fn content_block_document_is_created_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BLOCK_PATH))
            .and(header("Authorization", basic_auth("key", "secret").as_str()))
            .and(body_string_contains("\"name\":\"Footer_Links\""))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "cb-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let doc = json!({"id": "b1", "name": "Footer Links", "content": "<p>{{${first_name}}}</p>"});
        let report = migrator(&server)
            .migrate_campaign(Channel::ContentBlock, &doc, &credentials(&server), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.channel, Channel::ContentBlock);
        match &report.payload {
            TargetPayload::ContentBlock(draft) => {
                assert_eq!(draft.raw_content, "<p>{{ first_name }}</p>");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_continues_past_failed_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BLOCK_PATH))
            .and(body_string_contains("\"name\":\"Broken\""))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(BLOCK_PATH))
            .and(body_string_contains("\"name\":\"Header\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cb-2"})))
            .mount(&server)
            .await;

        let blocks = vec![
            SourceContentBlock {
                id: Some("1".into()),
                name: Some("Broken".into()),
                ..Default::default()
            },
            SourceContentBlock {
                id: Some("2".into()),
                name: Some("Header".into()),
                ..Default::default()
            },
        ];
        let progress = RecordingProgress::default();
        let batch = migrator(&server)
            .migrate_content_blocks(&blocks, &credentials(&server), &progress)
            .await;

        assert_eq!(batch.successful(), 1);
        assert_eq!(batch.failed(), 1);
        let doc = batch.to_json();
        assert_eq!(doc["total_blocks"], 2);
        assert_eq!(doc["results"][0]["block_name"], "Broken");
        assert_eq!(doc["results"][0]["remote_status"], 500);
        assert_eq!(doc["results"][1]["success"], true);
        assert_eq!(
            *progress.blocks.lock().unwrap(),
            vec![("Broken".to_string(), false), ("Header".to_string(), true)]
        );
    }

    #[test]
    fn select_blocks_by_id() {
        let blocks = vec![
            SourceContentBlock { id: Some("a".into()), ..Default::default() },
            SourceContentBlock { id: Some("b".into()), ..Default::default() },
            SourceContentBlock { id: None, ..Default::default() },
        ];
        let kept = select_content_blocks(blocks.clone(), &["b".into()]).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_deref(), Some("b"));

        let err = select_content_blocks(blocks, &["zzz".into()]).unwrap_err();
        assert!(err.is_validation());
    }
}
