//! Source dashboard read API: paginated lists and per-item detail.
//!
//! Every read failure aborts the whole read with
//! [`MigratorError::RemoteFetch`]; a list is never silently truncated.

use std::collections::BTreeSet;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use migrator_shared::{
    MigratorError, Result, SourceContentBlock, SourceCredentials, SourceReadConfig,
    decode_content_block,
};

const CAMPAIGN_LIST_PATH: &str = "/engagement/campaigns_data_v2";
const CONTENT_BLOCK_LIST_PATH: &str = "/engagement/content_blocks";

// ---------------------------------------------------------------------------
// SourceClient
// ---------------------------------------------------------------------------

/// Session-authenticated client for the source dashboard.
pub struct SourceClient {
    client: Client,
    base_url: String,
    session_id: String,
    app_group_id: String,
    config: SourceReadConfig,
}

impl SourceClient {
    /// Build a client. Only the scheme and host of the dashboard URL are used.
    pub fn new(credentials: &SourceCredentials, config: &SourceReadConfig) -> Result<Self> {
        config.validate()?;

        let parsed = Url::parse(&credentials.dashboard_url).map_err(|e| {
            MigratorError::config(format!(
                "invalid dashboard URL '{}': {e}",
                credentials.dashboard_url
            ))
        })?;
        if parsed.host_str().is_none() {
            return Err(MigratorError::config(format!(
                "dashboard URL '{}' has no host",
                credentials.dashboard_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MigratorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parsed.origin().ascii_serialization(),
            session_id: credentials.session_id.clone(),
            app_group_id: credentials.app_group_id.clone(),
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode JSON. Non-2xx is an error.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "source GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/json")
            .header(
                "Referer",
                format!("{}/engagement/campaigns/campaigns/", self.base_url),
            )
            .header("Cookie", format!("_session_id={};", self.session_id))
            .send()
            .await
            .map_err(|e| MigratorError::remote_fetch(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MigratorError::remote_fetch(&url, format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| MigratorError::remote_fetch(&url, format!("invalid JSON: {e}")))
    }

    /// Check the session by requesting a single campaign.
    pub async fn verify(&self) -> Result<()> {
        let body = self
            .get_json(
                CAMPAIGN_LIST_PATH,
                &[
                    ("limit", "1".into()),
                    ("start", "0".into()),
                    ("app_group_id", self.app_group_id.clone()),
                ],
            )
            .await?;

        if body.get("results").is_none() {
            return Err(MigratorError::remote_fetch(
                format!("{}{CAMPAIGN_LIST_PATH}", self.base_url),
                "authentication check failed: no 'results' in response",
            ));
        }
        Ok(())
    }

    /// Fetch every campaign's metadata, newest edit first.
    #[instrument(skip_all)]
    pub async fn list_campaigns(&self) -> Result<Vec<Value>> {
        let page_size = self.config.campaign_page_size;
        let mut campaigns = Vec::new();
        let mut start = 0u32;

        loop {
            let body = self
                .get_json(
                    CAMPAIGN_LIST_PATH,
                    &[
                        ("limit", page_size.to_string()),
                        ("start", start.to_string()),
                        ("app_group_id", self.app_group_id.clone()),
                        ("sortby", "last_edited".into()),
                        ("sortdir", "-1".into()),
                    ],
                )
                .await?;

            let page = page_items(&body, &["results"]);
            if page.is_empty() {
                break;
            }
            debug!(page = page.len(), total = campaigns.len() + page.len(), "fetched campaign page");
            campaigns.extend(page);
            start += page_size;
            self.pause().await;
        }

        info!(count = campaigns.len(), "campaign list fetched");
        Ok(campaigns)
    }

    /// Fetch one campaign's full document, trying the detail endpoint then the legacy one.
    #[instrument(skip_all, fields(campaign_id = %campaign_id))]
    pub async fn campaign_details(&self, campaign_id: &str) -> Result<Value> {
        let primary = self
            .get_json(
                "/campaigns/details",
                &[
                    ("campaign_id", campaign_id.to_string()),
                    ("app_group_id", self.app_group_id.clone()),
                ],
            )
            .await;

        match primary {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(error = %e, "detail endpoint failed, trying legacy endpoint");
                self.get_json(
                    &format!("/engagement/campaign_data/{campaign_id}"),
                    &[("app_group_id", self.app_group_id.clone())],
                )
                .await
            }
        }
    }

    /// Fetch every content block's metadata (no content).
    #[instrument(skip_all)]
    pub async fn list_content_blocks(&self) -> Result<Vec<Value>> {
        let page_size = self.config.content_block_page_size;
        let mut blocks = Vec::new();
        let mut start = 0u32;

        loop {
            let body = self
                .get_json(
                    CONTENT_BLOCK_LIST_PATH,
                    &[
                        ("limit", page_size.to_string()),
                        ("start", start.to_string()),
                        ("app_group_id", self.app_group_id.clone()),
                    ],
                )
                .await?;

            let page = page_items(&body, &["content_blocks", "results"]);
            if page.is_empty() {
                break;
            }
            blocks.extend(page);
            start += page_size;
            self.pause().await;
        }

        info!(count = blocks.len(), "content block list fetched");
        Ok(blocks)
    }

    /// Fetch one content block's full content.
    pub async fn content_block(&self, block_id: &str) -> Result<Value> {
        self.get_json(&format!("{CONTENT_BLOCK_LIST_PATH}/{block_id}"), &[])
            .await
    }

    /// Fetch every content block together with its content.
    #[instrument(skip_all)]
    pub async fn fetch_content_blocks(&self) -> Result<Vec<SourceContentBlock>> {
        let listed = self.list_content_blocks().await?;
        let mut blocks = Vec::with_capacity(listed.len());

        for (i, meta) in listed.iter().enumerate() {
            let mut block = decode_content_block(meta)?;
            let Some(id) = block.id.clone() else {
                warn!(index = i, "content block without id, content not fetched");
                blocks.push(block);
                continue;
            };

            let detail = self.content_block(&id).await?;
            block.content = detail
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            debug!(block_id = %id, chars = block.content.len(), "content block fetched");
            blocks.push(block);
        }

        Ok(blocks)
    }

    async fn pause(&self) {
        if !self.config.page_delay.is_zero() {
            tokio::time::sleep(self.config.page_delay).await;
        }
    }
}

/// Items under the first non-empty array key.
fn page_items(body: &Value, keys: &[&str]) -> Vec<Value> {
    keys.iter()
        .filter_map(|k| body.get(*k).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .cloned()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Filtering and summaries
// ---------------------------------------------------------------------------

/// Campaign list filter. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub campaign_type: Option<String>,
    pub status: Option<String>,
    /// Case-insensitive substring of the campaign name.
    pub name_contains: Option<String>,
}

impl CampaignFilter {
    pub fn matches(&self, campaign: &Value) -> bool {
        let field = |key: &str| campaign.get(key).and_then(Value::as_str);

        if let Some(kind) = &self.campaign_type {
            if field("campaign_type") != Some(kind.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if field("status") != Some(status.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let name = field("campaign_name").or_else(|| field("name")).unwrap_or_default();
            if !name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, campaigns: Vec<Value>) -> Vec<Value> {
        campaigns.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Readable overview of one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
    pub status: String,
    pub last_edited: String,
    /// Distinct message types, sorted.
    pub message_types: Vec<String>,
    pub variation_count: usize,
}

impl CampaignSummary {
    pub fn from_campaign(campaign: &Value) -> Self {
        let data = campaign
            .get("campaign")
            .filter(|c| c.is_object())
            .unwrap_or(campaign);
        let text = |key: &str, default: &str| match data.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => default.to_string(),
        };

        let actions = data
            .get("messaging_actions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let message_types: BTreeSet<String> = actions
            .iter()
            .filter_map(|a| a.get("message_type").and_then(Value::as_str))
            .map(String::from)
            .collect();

        Self {
            id: text("id", "N/A"),
            name: text("campaign_name", "Unknown"),
            campaign_type: text("campaign_type", "Unknown"),
            status: text("status", "Unknown"),
            last_edited: text("last_edited", "N/A"),
            message_types: message_types.into_iter().collect(),
            variation_count: actions.len(),
        }
    }
}
