use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Everything the harness keeps from one HTTP exchange.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lowercase; repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    pub raw_body: String,
    pub duration_ms: u64,
}

impl CapturedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.raw_body)
    }

    pub fn status_line(&self) -> String {
        format!("{} {}", self.status, self.status_text)
    }
}
