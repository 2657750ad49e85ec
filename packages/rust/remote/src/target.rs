//! Target platform write API: drafts, content blocks, SMS sender settings.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use migrator_shared::{MigratorError, Result, TargetCredentials};

/// Per-request timeout for target writes.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

const SMS_SETTINGS_PATH: &str = "/v2/settings/sms?api=1";

/// Client for the target platform's write endpoints.
pub struct TargetClient {
    client: Client,
    api_delay: Duration,
}

impl TargetClient {
    /// `api_delay` is slept before every draft or content-block POST.
    pub fn new(api_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(|e| MigratorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_delay })
    }

    /// Create a campaign draft at `credentials.api_url`.
    #[instrument(skip_all, fields(url = %credentials.api_url))]
    pub async fn create_draft<P: Serialize>(
        &self,
        payload: &P,
        credentials: &TargetCredentials,
    ) -> Result<Value> {
        let request = bearer_headers(self.client.post(&credentials.api_url), credentials)
            .header("content-type", "application/json")
            .json(payload);

        self.send_write(request).await
    }

    /// Create a content block using app key/secret basic auth.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn create_content_block<P: Serialize>(
        &self,
        url: &str,
        payload: &P,
        credentials: &TargetCredentials,
    ) -> Result<Value> {
        let (Some(app_key), Some(app_secret)) = (&credentials.app_key, &credentials.app_secret)
        else {
            return Err(MigratorError::validation(
                "content-block migration requires an app key and app secret",
            ));
        };

        let request = self
            .client
            .post(url)
            .header("Authorization", basic_auth(app_key, app_secret))
            .header("MOE-APPKEY", app_key.as_str())
            .header("content-type", "application/json")
            .json(payload);

        self.send_write(request).await
    }

    /// Read the default SMS sender settings (`generalSettings`).
    #[instrument(skip_all)]
    pub async fn fetch_sms_sender_settings(&self, credentials: &TargetCredentials) -> Result<Value> {
        let url = format!("{}{SMS_SETTINGS_PATH}", credentials.origin_trimmed());

        let response = bearer_headers(self.client.get(&url), credentials)
            .send()
            .await
            .map_err(|e| MigratorError::remote_fetch(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MigratorError::remote_fetch(&url, format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MigratorError::remote_fetch(&url, format!("invalid JSON: {e}")))?;

        match (body.get("status").and_then(Value::as_str), body.get("generalSettings")) {
            (Some("success"), Some(settings)) => {
                debug!("fetched SMS sender settings");
                Ok(settings.clone())
            }
            _ => Err(MigratorError::remote_fetch(
                &url,
                "response has no successful generalSettings",
            )),
        }
    }

    /// Delay, send, and classify a write. 200/201 succeed.
    async fn send_write(&self, request: RequestBuilder) -> Result<Value> {
        if !self.api_delay.is_zero() {
            tokio::time::sleep(self.api_delay).await;
        }

        let response = request
            .send()
            .await
            .map_err(|e| MigratorError::RemoteWrite {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status().as_u16();
        classify_write(status, response.text().await)
    }
}

/// Turn a write's status and body into the creation response. An unreadable
/// body fails the write even on 2xx.
fn classify_write<E: std::fmt::Display>(
    status: u16,
    body: std::result::Result<String, E>,
) -> Result<Value> {
    let body = body.map_err(|e| {
        warn!(status, error = %e, "target write response unreadable");
        MigratorError::RemoteWrite {
            status: Some(status),
            body: format!("response body unreadable: {e}"),
        }
    })?;

    if !matches!(status, 200 | 201) {
        warn!(status, "target rejected write");
        return Err(MigratorError::RemoteWrite {
            status: Some(status),
            body,
        });
    }

    info!(status, "target write succeeded");
    Ok(serde_json::from_str(&body).unwrap_or_else(|_| {
        serde_json::json!({ "status": "created", "raw": body })
    }))
}

fn bearer_headers(request: RequestBuilder, credentials: &TargetCredentials) -> RequestBuilder {
    request
        .header("authorization", format!("Bearer {}", credentials.bearer_token))
        .header("refreshtoken", credentials.refresh_token.as_str())
        .header("origin", credentials.origin.as_str())
}

/// `Basic base64(user:password)`.
pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds(server: &MockServer) -> TargetCredentials {
        let mut creds = TargetCredentials::bearer("tok", "ref");
        creds.origin = server.uri();
        creds.api_url = format!("{}/v1.0/campaigns/draft", server.uri());
        creds
    }

    #[tokio::test]
    async fn draft_created_on_201() {
        let server = MockServer::start().await;
        let payload = json!({"campaign_data": {"campaignName": "X"}});
        Mock::given(method("POST"))
            .and(path("/v1.0/campaigns/draft"))
            .and(header("authorization", "Bearer tok"))
            .and(header("refreshtoken", "ref"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "draft-1"})))
            .mount(&server)
            .await;

        let client = TargetClient::new(Duration::ZERO).unwrap();
        let response = client.create_draft(&payload, &creds(&server)).await.unwrap();
        assert_eq!(response["id"], "draft-1");
    }

    #[tokio::test]
    async fn rejected_draft_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/campaigns/draft"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad segment"))
            .mount(&server)
            .await;

        let client = TargetClient::new(Duration::ZERO).unwrap();
        let err = client
            .create_draft(&json!({}), &creds(&server))
            .await
            .unwrap_err();
        match err {
            MigratorError::RemoteWrite { status, body } => {
                assert_eq!(status, Some(422));
                assert_eq!(body, "bad segment");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_success_body_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/campaigns/draft"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = TargetClient::new(Duration::ZERO).unwrap();
        let response = client.create_draft(&json!({}), &creds(&server)).await.unwrap();
        assert_eq!(response["status"], "created");
        assert_eq!(response["raw"], "ok");
    }

    #[test]
    fn unreadable_success_body_fails_the_write() {
        let err = classify_write(201, Err::<String, _>("connection reset")).unwrap_err();
        match err {
            MigratorError::RemoteWrite { status, body } => {
                assert_eq!(status, Some(201));
                assert!(body.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_block_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content-blocks"))
            .and(header("Authorization", basic_auth("key", "secret").as_str()))
            .and(header("MOE-APPKEY", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let mut creds = creds(&server);
        creds.app_key = Some("key".into());
        creds.app_secret = Some("secret".into());

        let client = TargetClient::new(Duration::ZERO).unwrap();
        let url = format!("{}/content-blocks", server.uri());
        let response = client
            .create_content_block(&url, &json!({"name": "x"}), &creds)
            .await
            .unwrap();
        assert_eq!(response["ok"], true);
    }

    #[tokio::test]
    async fn content_block_without_app_key_is_validation_error() {
        let client = TargetClient::new(Duration::ZERO).unwrap();
        let creds = TargetCredentials::bearer("b", "r");
        let err = client
            .create_content_block("http://127.0.0.1:9/x", &json!({}), &creds)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn sms_settings_return_general_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/settings/sms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "generalSettings": {"default_sender_v2": "ACME"}
            })))
            .mount(&server)
            .await;

        let client = TargetClient::new(Duration::ZERO).unwrap();
        let settings = client.fetch_sms_sender_settings(&creds(&server)).await.unwrap();
        assert_eq!(settings["default_sender_v2"], "ACME");
    }

    #[test]
    fn basic_auth_encodes_credentials() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }
}
