//! Storage account settings parsed from a connection string

use crate::config::parse_connection_string;
use crate::error::{AgentError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{SecretBox, SecretString};
use url::Url;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

pub enum Credential {
    /// Decoded account key used for Shared Key signing
    SharedKey(SecretBox<Vec<u8>>),
    /// Pre-issued SAS query string, without the leading `?`
    Sas(SecretString),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey(_) => f.write_str("SharedKey(..)"),
            Credential::Sas(_) => f.write_str("Sas(..)"),
        }
    }
}

#[derive(Debug)]
pub struct StorageAccount {
    pub name: String,
    /// Blob service endpoint, no trailing slash
    pub endpoint: Url,
    pub credential: Credential,
}

impl StorageAccount {
    /// Parse `AccountName=..;AccountKey=..;EndpointSuffix=..` style strings
    pub fn from_connection_string(raw: &str) -> Result<Self> {
        let fields = parse_connection_string(raw)?;

        let name = fields
            .get("AccountName")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AgentError::Config("storage connection string has no AccountName".into()))?
            .clone();

        let credential = if let Some(key) = fields.get("AccountKey") {
            let decoded = STANDARD
                .decode(key.trim())
                .map_err(|e| AgentError::Config(format!("AccountKey is not valid base64: {}", e)))?;
            Credential::SharedKey(SecretBox::new(Box::new(decoded)))
        } else if let Some(sas) = fields.get("SharedAccessSignature") {
            Credential::Sas(SecretString::from(sas.trim_start_matches('?').to_string()))
        } else {
            return Err(AgentError::Config(
                "storage connection string needs AccountKey or SharedAccessSignature".into(),
            ));
        };

        let endpoint = match fields.get("BlobEndpoint") {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => {
                let protocol = fields
                    .get("DefaultEndpointsProtocol")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL);
                let suffix = fields
                    .get("EndpointSuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{}://{}.blob.{}", protocol, name, suffix)
            }
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| AgentError::Config(format!("invalid blob endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            name,
            endpoint,
            credential,
        })
    }

    /// Public address of a blob, independent of the credential in use
    pub fn blob_url(&self, container: &str, blob: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            container,
            blob
        )
    }
}
