//! HTTP search provider.
//!
//! Issues one GET per term against a URL template, with the term quoted as an
//! exact phrase. Credentials come from an environment variable named in the
//! configuration and are substituted into the URL or sent as a header.

use crate::provider::{ProviderError, ProviderResult, SearchProvider};
use crate::serp::{JsonSerpParser, SerpLayout};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("overlap/", env!("CARGO_PKG_VERSION"));
const MAX_PAYLOAD_SIZE: usize = 2 * 1024 * 1024; // 2MB max response body

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpProviderConfig {
    pub name: String,
    /// Request URL; `{query}` is replaced by the encoded quoted term and
    /// `{key}` by the credential.
    pub url_template: String,
    /// Environment variable holding the credential.
    pub credential_env: Option<String>,
    /// Extra request header; `{key}` in the value is replaced by the credential.
    pub header_name: Option<String>,
    pub header_value: Option<String>,
    /// Send the credential as `Authorization: Basic base64(credential)`.
    pub basic_auth: bool,
    /// Estimated number of indexed documents.
    pub index_size: u64,
    pub timeout_secs: u64,
    pub layout: SerpLayout,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            name: "web".to_string(),
            url_template: String::new(),
            credential_env: None,
            header_name: None,
            header_value: None,
            basic_auth: false,
            index_size: 1_000_000_000,
            timeout_secs: 30,
            layout: SerpLayout::default(),
        }
    }
}

pub struct HttpProvider {
    name: String,
    client: reqwest::Client,
    url_template: String,
    header: Option<(String, String)>,
    credential: Option<String>,
    index_size: u64,
    parser: JsonSerpParser,
}

impl HttpProvider {
    /// Build the provider, reading the credential from the environment.
    /// A missing credential or template placeholder is a configuration error.
    pub fn new(config: &HttpProviderConfig) -> Result<Self, ProviderError> {
        let credential = match &config.credential_env {
            Some(var) => Some(read_credential(var)?),
            None => None,
        };
        Self::with_credential(config, credential)
    }

    pub fn with_credential(
        config: &HttpProviderConfig,
        credential: Option<String>,
    ) -> Result<Self, ProviderError> {
        if !config.url_template.contains("{query}") {
            return Err(ProviderError::Configuration(format!(
                "url_template for provider {:?} has no {{query}} placeholder",
                config.name
            )));
        }
        let wants_key = config.url_template.contains("{key}")
            || config.basic_auth
            || config
                .header_value
                .as_deref()
                .is_some_and(|v| v.contains("{key}"));
        if wants_key && credential.is_none() {
            return Err(ProviderError::Configuration(format!(
                "provider {:?} needs a credential but none is configured",
                config.name
            )));
        }
        if config.index_size == 0 {
            return Err(ProviderError::Configuration(format!(
                "provider {:?} has index_size 0",
                config.name
            )));
        }

        let key = credential.clone().unwrap_or_default();
        let header = if config.basic_auth {
            Some((
                "Authorization".to_string(),
                format!("Basic {}", STANDARD.encode(key.as_bytes())),
            ))
        } else {
            match (&config.header_name, &config.header_value) {
                (Some(name), Some(value)) => Some((name.clone(), value.replace("{key}", &key))),
                _ => None,
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            url_template: config.url_template.clone(),
            header,
            credential,
            index_size: config.index_size,
            parser: JsonSerpParser::new(config.layout.clone()),
        })
    }

    /// The request URL for an exact-phrase query of `term`.
    pub fn request_url(&self, term: &str) -> String {
        let phrase = format!("\"{term}\"");
        let encoded: String = url::form_urlencoded::byte_serialize(phrase.as_bytes()).collect();
        self.url_template
            .replace("{key}", self.credential.as_deref().unwrap_or_default())
            .replace("{query}", &encoded)
    }
}

fn read_credential(var: &str) -> Result<String, ProviderError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ProviderError::Configuration(format!(
            "missing required credential: set {var}"
        ))),
    }
}

#[async_trait]
impl SearchProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn index_size(&self) -> u64 {
        self.index_size
    }

    async fn query(&self, term: &str) -> Result<String, ProviderError> {
        let mut request = self.client.get(self.request_url(term));
        if let Some((name, value)) = &self.header {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Transport {
                status: Some(status.as_u16()),
                message: self.parse_error(&body),
            });
        }
        if body.len() > MAX_PAYLOAD_SIZE {
            return Err(ProviderError::Parse(format!(
                "payload of {} bytes exceeds limit",
                body.len()
            )));
        }
        Ok(body)
    }

    fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
        self.parser.parse(payload)
    }

    fn parse_error(&self, payload: &str) -> String {
        self.parser.parse_error(payload)
    }
}
