//! Azure Blob Storage REST client
//!
//! Implements just the two calls the agent needs: Put Blob and
//! Get Container Properties. Requests are signed with Shared Key when the
//! connection string carries an account key, or authorized with the SAS
//! query string otherwise.

use super::account::{Credential, StorageAccount};
use super::traits::{BlobStore, ContainerProperties, StorageError};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2021-08-06";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_DETAIL: usize = 256;

pub struct AzureBlobStore {
    account: StorageAccount,
    client: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(account: StorageAccount) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(account, client))
    }

    pub fn with_client(account: StorageAccount, client: reqwest::Client) -> Self {
        Self { account, client }
    }

    fn resource_url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.account.endpoint.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base, path));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Build the authorized request for `url`; `ms_headers` are the `x-ms-*`
    /// headers beyond date and version
    fn request(
        &self,
        method: Method,
        mut url: Url,
        content_type: Option<&str>,
        content_length: usize,
        ms_headers: &[(&str, &str)],
    ) -> std::result::Result<reqwest::RequestBuilder, StorageError> {
        let mut canonical: BTreeMap<String, String> = ms_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        canonical.insert("x-ms-date".into(), http_date(Utc::now()));
        canonical.insert("x-ms-version".into(), API_VERSION.into());

        let mut headers = HeaderMap::new();
        for (name, value) in &canonical {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StorageError::InvalidRequest(e.to_string()))?;
            headers.insert(name, header_value(value)?);
        }
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }

        match &self.account.credential {
            Credential::SharedKey(key) => {
                let to_sign = string_to_sign(
                    method.as_str(),
                    &url,
                    &self.account.name,
                    content_type.unwrap_or(""),
                    content_length,
                    &canonical,
                );
                let signature = sign(key.expose_secret(), &to_sign)?;
                headers.insert(
                    AUTHORIZATION,
                    header_value(&format!("SharedKey {}:{}", self.account.name, signature))?,
                );
            }
            Credential::Sas(token) => {
                let query = match url.query() {
                    Some(existing) => format!("{}&{}", existing, token.expose_secret()),
                    None => token.expose_secret().to_string(),
                };
                url.set_query(Some(&query));
            }
        }

        Ok(self.client.request(method, url).headers(headers))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn account_name(&self) -> &str {
        &self.account.name
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        self.account.blob_url(container, blob)
    }

    async fn put_blob(
        &self,
        container: &str,
        blob: &str,
        content_type: &str,
        data: Bytes,
    ) -> std::result::Result<(), StorageError> {
        let url = self.resource_url(&format!("{}/{}", container, blob), &[]);
        debug!("PUT blob {} ({} bytes)", url.path(), data.len());

        let response = self
            .request(
                Method::PUT,
                url,
                Some(content_type),
                data.len(),
                &[("x-ms-blob-type", "BlockBlob")],
            )?
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }

    async fn container_properties(
        &self,
        container: &str,
    ) -> std::result::Result<ContainerProperties, StorageError> {
        let url = self.resource_url(container, &[("restype", "container")]);
        debug!("GET container properties {}", url.path());

        let response = self
            .request(Method::GET, url, None, 0, &[])?
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        let response = check_status(response).await?;

        let raw = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StorageError::InvalidResponse("missing Last-Modified header".into()))?;
        let last_modified = DateTime::parse_from_rfc2822(raw)
            .map_err(|e| StorageError::InvalidResponse(format!("bad Last-Modified {:?}: {}", raw, e)))?
            .with_timezone(&Utc);

        Ok(ContainerProperties { last_modified })
    }
}

async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut detail: String = body.trim().chars().take(MAX_ERROR_DETAIL).collect();
    if detail.is_empty() {
        detail = status.canonical_reason().unwrap_or("no detail").to_string();
    }

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized {
            status: status.as_u16(),
            detail,
        },
        StatusCode::NOT_FOUND => StorageError::NotFound(detail),
        _ => StorageError::Rejected {
            status: status.as_u16(),
            detail,
        },
    })
}

fn header_value(value: &str) -> std::result::Result<HeaderValue, StorageError> {
    HeaderValue::from_str(value).map_err(|e| StorageError::InvalidRequest(e.to_string()))
}

/// RFC 1123 date as required by `x-ms-date`
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Shared Key string-to-sign for the Blob service
fn string_to_sign(
    verb: &str,
    url: &Url,
    account: &str,
    content_type: &str,
    content_length: usize,
    ms_headers: &BTreeMap<String, String>,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    let mut out = format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n",
        verb, length, content_type
    );

    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name, value.trim()));
    }

    out.push_str(&format!("/{}{}", account, url.path()));

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{}:{}", name, values.join(",")));
    }

    out
}

fn sign(key: &[u8], to_sign: &str) -> std::result::Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::InvalidRequest(format!("invalid account key: {}", e)))?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
