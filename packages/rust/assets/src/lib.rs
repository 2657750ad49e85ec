//! Asset migration pipeline: re-host source-CDN images on the target CDN.
//!
//! For every candidate URL found by the [`UrlRuleSet`], the pipeline:
//! 1. fetches the bytes into a transient buffer owned by this call,
//! 2. uploads them as multipart form data to the target upload endpoint,
//! 3. rewrites every occurrence of the exact source URL with the hosted URL,
//! 4. releases the buffer before moving to the next URL.
//!
//! Per-asset failures never escape: the source URL is left untouched and the
//! pipeline carries on. Assets are processed strictly one at a time.

pub mod rules;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use migrator_shared::{AssetSettings, MigratorError, Result, TargetCredentials};

pub use rules::{UrlRuleSet, decode_escapes};

/// Accept header sent with asset downloads.
const IMAGE_ACCEPT: &str = "image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

const DOWNLOAD_LANGUAGE: &str = "en-US,en;q=0.9";

/// Upload path appended to the target origin.
const UPLOAD_PATH: &str = "/v1/platform/services/upload-file";

/// Extension used when neither the URL nor the content type names one.
const FALLBACK_EXTENSION: &str = "jpg";

// ---------------------------------------------------------------------------
// AssetReport
// ---------------------------------------------------------------------------

/// Outcome of one pipeline run over a text.
#[derive(Debug, Clone, Default)]
pub struct AssetReport {
    /// The text with every successfully re-hosted URL rewritten.
    pub text: String,
    /// Re-hosted assets (source URL, target URL).
    pub rehosted: Vec<(String, String)>,
    /// Assets left in place (source URL, reason).
    pub failed: Vec<(String, String)>,
}

/// A downloaded asset. Dropping it releases the bytes.
struct FetchedAsset {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// AssetMigrator
// ---------------------------------------------------------------------------

/// Re-hosts source-CDN assets referenced in markup.
pub struct AssetMigrator {
    client: Client,
    rules: UrlRuleSet,
    settings: AssetSettings,
}

impl AssetMigrator {
    /// Create a migrator using the built-in rules plus configured extra patterns.
    pub fn new(settings: &AssetSettings) -> Result<Self> {
        let rules = UrlRuleSet::from_settings(settings)?;
        Self::with_rules(settings, rules)
    }

    /// Create a migrator with an explicit rule set.
    pub fn with_rules(settings: &AssetSettings, rules: UrlRuleSet) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(|e| MigratorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rules,
            settings: settings.clone(),
        })
    }

    pub fn rules(&self) -> &UrlRuleSet {
        &self.rules
    }

    /// Re-host every source asset in `text` and return the rewritten text.
    ///
    /// Empty input is returned as-is without scanning.
    pub async fn migrate_assets(&self, text: &str, credentials: &TargetCredentials) -> String {
        self.migrate_assets_report(text, credentials).await.text
    }

    /// Like [`migrate_assets`](Self::migrate_assets), also reporting per-asset outcomes.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn migrate_assets_report(
        &self,
        text: &str,
        credentials: &TargetCredentials,
    ) -> AssetReport {
        let mut report = AssetReport {
            text: text.to_string(),
            ..Default::default()
        };
        if text.is_empty() {
            return report;
        }

        let candidates = self.rules.extract(text);
        if candidates.is_empty() {
            debug!("no source asset URLs found");
            return report;
        }
        info!(count = candidates.len(), "found source asset URLs");

        for url in candidates {
            match self.rehost(&url, credentials).await {
                Ok(hosted) => {
                    report.text = rewrite_references(&report.text, &url, &hosted);
                    debug!(url = %url, hosted = %hosted, "rewrote asset references");
                    report.rehosted.push((url, hosted));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "asset not migrated, keeping source URL");
                    report.failed.push((url, e.to_string()));
                }
            }
        }

        info!(
            rehosted = report.rehosted.len(),
            failed = report.failed.len(),
            "asset migration completed"
        );
        report
    }

    /// Re-host a single image URL, returning the original URL on any failure.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn migrate_single_url(&self, url: &str, credentials: &TargetCredentials) -> String {
        if url.trim().is_empty() {
            return String::new();
        }

        match self.rehost(url, credentials).await {
            Ok(hosted) => hosted,
            Err(e) => {
                warn!(error = %e, "image not migrated, keeping source URL");
                url.to_string()
            }
        }
    }

    /// Fetch then upload one asset. The buffer is released before returning.
    async fn rehost(&self, url: &str, credentials: &TargetCredentials) -> Result<String> {
        let asset = self.fetch(url).await?;
        let size = asset.bytes.len();
        let file_name = asset.file_name.clone();

        let uploaded = self.upload(asset, credentials).await;
        debug!(url, file_name, bytes = size, "released asset buffer");

        uploaded
    }

    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let parsed = Url::parse(url).map_err(|e| MigratorError::Asset(format!("{url}: {e}")))?;
        debug!(url, "fetching asset");

        let response = self
            .client
            .get(parsed.as_str())
            .header(ACCEPT, IMAGE_ACCEPT)
            .header(ACCEPT_LANGUAGE, DOWNLOAD_LANGUAGE)
            .send()
            .await
            .map_err(|e| MigratorError::Asset(format!("download failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MigratorError::Asset(format!("download failed: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MigratorError::Asset(format!("download body read failed: {e}")))?
            .to_vec();

        Ok(FetchedAsset {
            file_name: derive_file_name(&parsed, content_type.as_deref()),
            content_type,
            bytes,
        })
    }

    async fn upload(&self, asset: FetchedAsset, credentials: &TargetCredentials) -> Result<String> {
        let endpoint = format!("{}{UPLOAD_PATH}", credentials.origin_trimmed());
        let FetchedAsset {
            file_name,
            content_type,
            bytes,
        } = asset;

        let mut part = Part::bytes(bytes).file_name(file_name);
        if let Some(ct) = content_type.as_deref() {
            part = part
                .mime_str(ct)
                .map_err(|e| MigratorError::Asset(format!("bad content type '{ct}': {e}")))?;
        }
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&endpoint)
            .timeout(self.settings.upload_timeout)
            .header("authorization", format!("Bearer {}", credentials.bearer_token))
            .header("refreshtoken", credentials.refresh_token.as_str())
            .header("origin", credentials.origin.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MigratorError::Asset(format!("upload failed: {e}")))?;

        let status = response.status().as_u16();
        if status != 201 {
            return Err(MigratorError::Asset(format!("upload failed: HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MigratorError::Asset(format!("upload response unreadable: {e}")))?;

        body.get("url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| MigratorError::Asset("upload response has no url".into()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Derive a safe file name from the URL path, or from the content type
/// when the last path segment has no extension.
fn derive_file_name(url: &Url, content_type: Option<&str>) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let name = if last_segment.contains('.') {
        last_segment.to_string()
    } else {
        let digest = Sha256::digest(url.as_str().as_bytes());
        let hash: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
        format!("image_{hash}.{}", extension_for(content_type))
    };

    sanitize_file_name(&name)
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    let ct = content_type.unwrap_or_default();
    if ct.contains("image/jpeg") || ct.contains("image/jpg") {
        "jpg"
    } else if ct.contains("image/png") {
        "png"
    } else if ct.contains("image/gif") {
        "gif"
    } else if ct.contains("image/webp") {
        "webp"
    } else if ct.contains("image/svg") {
        "svg"
    } else {
        FALLBACK_EXTENSION
    }
}

/// Replace anything outside `[A-Za-z0-9_.-]` with `_`.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Replace every whole occurrence of `source` (in any encoded spelling) with `target`.
fn rewrite_references(text: &str, source: &str, target: &str) -> String {
    rules::surface_forms(source)
        .iter()
        .fold(text.to_string(), |acc, form| replace_whole_urls(&acc, form, target))
}

/// Like `str::replace`, but skips matches that are only a prefix of a longer URL.
fn replace_whole_urls(text: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(needle) {
        let end = pos + needle.len();
        out.push_str(&rest[..pos]);
        if rules::ends_url(&rest[end..]) {
            out.push_str(replacement);
        } else {
            out.push_str(needle);
        }
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Migrator whose rules also accept the local mock server's URLs.
    fn test_migrator() -> AssetMigrator {
        let mut settings = AssetSettings::default();
        settings
            .extra_domain_patterns
            .push(r#"http://127\.0\.0\.1:\d+/[^"'\s,<>()\\]+"#.into());
        AssetMigrator::new(&settings).expect("build migrator")
    }

    fn credentials(server: &MockServer) -> TargetCredentials {
        let mut creds = TargetCredentials::bearer("bearer-token", "refresh-token");
        creds.origin = format!("{}/", server.uri());
        creds
    }

    async fn mount_upload(server: &MockServer, hosted: &str) {
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(header("authorization", "Bearer bearer-token"))
            .and(header("refreshtoken", "refresh-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "url": hosted })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn successful_upload_rewrites_every_occurrence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&server)
            .await;
        mount_upload(&server, "https://cdn.example-target.com/a.png").await;

        let source = format!("{}/a.png", server.uri());
        let text = format!("<img src='{source}'><a href=\"{source}\">x</a>");

        let migrator = test_migrator();
        let out = migrator.migrate_assets(&text, &credentials(&server)).await;

        assert_eq!(
            out,
            "<img src='https://cdn.example-target.com/a.png'><a href=\"https://cdn.example-target.com/a.png\">x</a>"
        );
    }

    #[tokio::test]
    async fn failed_fetch_leaves_text_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let text = format!("<img src='{}/a.png'>", server.uri());
        let migrator = test_migrator();
        let report = migrator
            .migrate_assets_report(&text, &credentials(&server))
            .await;

        assert_eq!(report.text, text);
        assert!(report.rehosted.is_empty());
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_affects_only_that_asset() {
        let server = MockServer::start().await;
        for name in ["/good.png", "/bad.png"] {
            Mock::given(method("GET"))
                .and(path(name))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "image/png")
                        .set_body_bytes(name.as_bytes().to_vec()),
                )
                .mount(&server)
                .await;
        }
        // The upload endpoint accepts only the good asset's body.
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(wiremock::matchers::body_string_contains("/good.png"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "url": "https://cdn.example-target.com/good.png" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let good = format!("{}/good.png", server.uri());
        let bad = format!("{}/bad.png", server.uri());
        let text = format!("<img src=\"{good}\"><img src=\"{bad}\">");

        let migrator = test_migrator();
        let report = migrator
            .migrate_assets_report(&text, &credentials(&server))
            .await;

        assert_eq!(
            report.text,
            format!("<img src=\"https://cdn.example-target.com/good.png\"><img src=\"{bad}\">")
        );
        assert_eq!(report.rehosted.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad);
    }

    #[tokio::test]
    async fn failed_asset_sharing_a_prefix_keeps_its_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1, 2, 3]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.png.bak.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_upload(&server, "https://cdn.example-target.com/x.png").await;

        let short = format!("{}/a.png", server.uri());
        let long = format!("{short}.bak.png");
        let text = format!("<img src=\"{short}\"><img src=\"{long}\"><a href='{short}'>");

        let migrator = test_migrator();
        let report = migrator
            .migrate_assets_report(&text, &credentials(&server))
            .await;

        assert_eq!(
            report.text,
            format!(
                "<img src=\"https://cdn.example-target.com/x.png\"><img src=\"{long}\"><a href='https://cdn.example-target.com/x.png'>"
            )
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, long);
    }

    #[test]
    fn rewrite_skips_longer_urls_sharing_the_prefix() {
        let text = r#"["https://cdn.braze.com/a.png", "https://cdn.braze.com/a.png?w=2", "https://cdn.braze.com/a.png"]"#;
        let out = rewrite_references(text, "https://cdn.braze.com/a.png", "https://t.example/a.png");
        assert_eq!(
            out,
            r#"["https://t.example/a.png", "https://cdn.braze.com/a.png?w=2", "https://t.example/a.png"]"#
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/gif")
                    .set_body_bytes(vec![1, 2, 3]),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_upload(&server, "https://cdn.example-target.com/logo.gif").await;

        let text = format!("<img src=\"{}/logo\">", server.uri());
        let migrator = test_migrator();
        let creds = credentials(&server);

        let first = migrator.migrate_assets(&text, &creds).await;
        let second = migrator.migrate_assets(&first, &creds).await;

        assert_eq!(first, "<img src=\"https://cdn.example-target.com/logo.gif\">");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn non_201_upload_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "url": "https://cdn.example-target.com/a.png" })),
            )
            .mount(&server)
            .await;

        let source = format!("{}/a.png", server.uri());
        let migrator = test_migrator();
        let out = migrator
            .migrate_single_url(&source, &credentials(&server))
            .await;
        assert_eq!(out, source);
    }

    #[tokio::test]
    async fn single_url_returns_hosted_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push/banner.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2]))
            .mount(&server)
            .await;
        mount_upload(&server, "https://cdn.example-target.com/banner.jpg").await;

        let migrator = test_migrator();
        let out = migrator
            .migrate_single_url(
                &format!("{}/push/banner.jpg", server.uri()),
                &credentials(&server),
            )
            .await;
        assert_eq!(out, "https://cdn.example-target.com/banner.jpg");
    }

    #[tokio::test]
    async fn empty_text_skips_pipeline() {
        let migrator = test_migrator();
        let creds = TargetCredentials::bearer("b", "r");
        assert_eq!(migrator.migrate_assets("", &creds).await, "");
        assert_eq!(migrator.migrate_single_url("  ", &creds).await, "");
    }

    #[test]
    fn file_name_from_path_or_content_type() {
        let url = Url::parse("https://cdn.braze.com/img/hero%20shot.png?w=2").unwrap();
        assert_eq!(derive_file_name(&url, None), "hero_20shot.png");

        let url = Url::parse("https://cdn.braze.com/img/abc123").unwrap();
        let name = derive_file_name(&url, Some("image/webp"));
        assert!(name.starts_with("image_"));
        assert!(name.ends_with(".webp"));
        assert_eq!(name.len(), "image_".len() + 12 + ".webp".len());

        assert!(derive_file_name(&url, Some("application/octet-stream")).ends_with(".jpg"));
    }

    #[test]
    fn rewrite_covers_encoded_spellings() {
        let text = r#"a https:\/\/cdn.braze.com\/x.png?a=1&amp;b=2 b"#;
        let out = rewrite_references(text, "https://cdn.braze.com/x.png?a=1&b=2", "https://t/x.png");
        assert_eq!(out, "a https://t/x.png b");
    }
}
