#![doc = "QRZ.com logbook client: implements the core `LogbookClient` contract over HTTPS."]
//
//! # QRZ Logbook API
//!
//! Each upload is one `POST` of a URL-encoded form to the logbook endpoint:
//!
//! | field    | value                      |
//! |----------|----------------------------|
//! | `KEY`    | logbook API key            |
//! | `ACTION` | `INSERT`                   |
//! | `ADIF`   | the single-line QSO record |
//!
//! The service answers with `&`-separated `KEY=VALUE` pairs, for example
//! `RESULT=OK&LOGID=130877825&COUNT=1` or
//! `RESULT=FAIL&REASON=Unable to add QSO to database: duplicate&COUNT=0`.
//! [`parse_qrz_response`] maps that onto the core [`UploadResult`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qrz_rtlog_core::contract::{LogbookClient, UploadResult};
use qrz_rtlog_core::error::UploadError;

/// Production logbook API endpoint.
pub const QRZ_LOGBOOK_URL: &str = "https://logbook.qrz.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QrzClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    verbose: bool,
}

impl QrzClient {
    pub fn new(
        call: &str,
        api_key: &str,
        verbose: bool,
        url: Option<&str>,
    ) -> Result<Self, UploadError> {
        let user_agent = format!("{}/{} ({call})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                UploadError::Transport(e.to_string())
            })?;
        let url = url.unwrap_or(QRZ_LOGBOOK_URL).to_string();
        tracing::info!(
            call,
            url = %url,
            api_key_set = !api_key.is_empty(),
            "Initialized QRZ logbook client"
        );
        Ok(Self {
            http,
            url,
            api_key: api_key.to_string(),
            verbose,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LogbookClient for QrzClient {
    async fn upload(&self, record: &str) -> Result<UploadResult, UploadError> {
        let form = [
            ("KEY", self.api_key.as_str()),
            ("ACTION", "INSERT"),
            ("ADIF", record),
        ];
        let response = self
            .http
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.url, "QRZ upload request failed");
                UploadError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "QRZ logbook returned an HTTP error");
            return Err(UploadError::Response(format!("HTTP status {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        if self.verbose {
            tracing::debug!(body = %body, "QRZ logbook response");
        }
        parse_qrz_response(&body)
    }
}

/// Map a logbook API response body onto an [`UploadResult`].
///
/// A body with no `RESULT` field is not a logbook response and is an error.
/// A missing `COUNT` reads as zero.
pub fn parse_qrz_response(body: &str) -> Result<UploadResult, UploadError> {
    let fields: HashMap<&str, &str> = body
        .trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let Some(result) = fields.get("RESULT") else {
        return Err(UploadError::Response(format!(
            "no RESULT field in response: {body:?}"
        )));
    };
    let status = *result == "OK";
    let count = match fields.get("COUNT") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|e| UploadError::Response(format!("bad COUNT {raw:?}: {e}")))?,
        None => 0,
    };
    let info = match (fields.get("REASON"), fields.get("LOGID")) {
        (Some(reason), _) => reason.to_string(),
        (None, Some(logid)) => format!("LOGID={logid}"),
        (None, None) => result.to_string(),
    };
    Ok(UploadResult {
        count,
        status,
        info,
    })
}
