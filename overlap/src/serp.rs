//! Configurable JSON search-result parser.
//!
//! Web search APIs differ only in where they put the result list, the URL
//! and snippet of each hit, and the total count. A [`SerpLayout`] names those
//! locations with JSON pointers so one parser covers them all.

use crate::provider::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Locations of result fields inside a provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerpLayout {
    /// JSON pointer to the array of hits.
    pub results: String,
    /// Field of each hit holding the source URL.
    pub url_field: String,
    /// Field of each hit holding the snippet text.
    pub snippet_field: String,
    /// JSON pointer to the total hit count; a number or a numeric string.
    pub total: Option<String>,
    /// JSON pointer to an error message in error payloads.
    pub error: Option<String>,
}

impl Default for SerpLayout {
    fn default() -> Self {
        Self {
            results: "/results".to_string(),
            url_field: "url".to_string(),
            snippet_field: "snippet".to_string(),
            total: Some("/total".to_string()),
            error: Some("/error/message".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonSerpParser {
    layout: SerpLayout,
}

impl JsonSerpParser {
    pub fn new(layout: SerpLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SerpLayout {
        &self.layout
    }

    pub fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
        let json: Value =
            serde_json::from_str(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let mut result = ProviderResult::new();

        if let Some(pointer) = &self.layout.total {
            if let Some(total) = json.pointer(pointer).and_then(as_count) {
                result.set_total(total);
            }
        }

        match json.pointer(&self.layout.results) {
            None | Some(Value::Null) => {}
            Some(Value::Array(hits)) => {
                for hit in hits {
                    let Some(url) = hit.get(&self.layout.url_field).and_then(Value::as_str) else {
                        log::debug!("Skipping hit without {:?}", self.layout.url_field);
                        continue;
                    };
                    let snippet = hit
                        .get(&self.layout.snippet_field)
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    result.put(url, snippet);
                }
            }
            Some(_) => {
                return Err(ProviderError::Parse(format!(
                    "{} is not an array",
                    self.layout.results
                )));
            }
        }
        Ok(result)
    }

    /// The message under the error pointer, or a truncated payload when the
    /// payload is not JSON or has no message there.
    pub fn parse_error(&self, payload: &str) -> String {
        let message = self.layout.error.as_ref().and_then(|pointer| {
            let json: Value = serde_json::from_str(payload).ok()?;
            match json.pointer(pointer)? {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        });
        message.unwrap_or_else(|| payload.chars().take(200).collect())
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
