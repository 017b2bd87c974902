use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::error::{SyncError, SyncResult};
use crate::core::mods::config::SyncSettings;

pub const APP_USER_AGENT: &str = "ModSync/0.1.0 (+https://github.com/modsync/modsync)";

/// Client for catalog metadata: JSON accept header, short timeout,
/// redirects followed by reqwest up to the configured cap.
pub fn build_api_client(settings: &SyncSettings) -> SyncResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Ok(Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(default_headers)
        .timeout(Duration::from_secs(settings.api_timeout_secs))
        .redirect(Policy::limited(settings.max_redirects))
        .build()?)
}

/// Client for artifact bodies. Redirects are followed by the fetcher itself
/// so every hop is logged and capped; the wall-clock bound lives there too.
pub fn build_download_client(settings: &SyncSettings) -> SyncResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Ok(Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(default_headers)
        .redirect(Policy::none())
        .build()?)
}

/// Send `request` and decode a JSON body, mapping failures onto the
/// transport / status / parse split the reconciliation reports use.
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> SyncResult<T> {
    debug!("GET {}", url);

    let response = request.send().await.map_err(|e| transport_error(e, url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| transport_error(e, url))?;
    serde_json::from_str(&body).map_err(|source| SyncError::Parse {
        url: url.to_string(),
        source,
    })
}

pub(crate) fn transport_error(error: reqwest::Error, url: &str) -> SyncError {
    if error.is_timeout() {
        SyncError::Timeout {
            url: url.to_string(),
        }
    } else {
        SyncError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Probe {
        ok: bool,
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/probe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = build_api_client(&SyncSettings::default()).unwrap();
        let url = format!("{}/probe", server.uri());
        let probe: Probe = get_json(client.get(&url), &url).await.unwrap();
        assert!(probe.ok);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = build_api_client(&SyncSettings::default()).unwrap();
        let url = format!("{}/anything", server.uri());
        let err = get_json::<Probe>(client.get(&url), &url).await.unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = build_api_client(&SyncSettings::default()).unwrap();
        let url = format!("{}/broken", server.uri());
        let err = get_json::<Probe>(client.get(&url), &url).await.unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }
}
