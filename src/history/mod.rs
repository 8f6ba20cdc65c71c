//! # Request log
//!
//! Records the HTTP exchanges a scenario performed so failed and errored
//! scenarios can show what was sent and what came back.

use std::collections::VecDeque;

use serde::Serialize;

use crate::http::method::HttpMethod;

/// Maximum number of exchanges kept per scenario.
const MAX_LOG_ENTRIES: usize = 32;

/// Whether a request was a pre-condition or the action under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestRole {
    Setup,
    Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub role: RequestRole,
    pub method: HttpMethod,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Chronological log of exchanges; the oldest entry is evicted when full.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    entries: VecDeque<RequestLogEntry>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: RequestLogEntry) {
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> &VecDeque<RequestLogEntry> {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<RequestLogEntry> {
        self.entries.into()
    }
}

impl RequestLogEntry {
    pub fn render(&self) -> String {
        let outcome = match (self.status, &self.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(error)) => format!("error: {error}"),
            (None, None) => "no response".to_string(),
        };
        let role = match self.role {
            RequestRole::Setup => " (setup)",
            RequestRole::Action => "",
        };
        match self.duration_ms {
            Some(ms) => format!("{} {}{role} -> {outcome} in {ms}ms", self.method, self.path),
            None => format!("{} {}{role} -> {outcome}", self.method, self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(path: &str) -> RequestLogEntry {
        RequestLogEntry {
            role: RequestRole::Action,
            method: HttpMethod::Get,
            path: path.to_string(),
            status: Some(200),
            duration_ms: Some(4),
            error: None,
        }
    }

    #[test]
    fn push_keeps_chronological_order() {
        let mut log = RequestLog::new();
        log.push(make_entry("/products/6"));
        log.push(make_entry("/products/7"));

        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].path, "/products/6");
        assert_eq!(log.entries()[1].path, "/products/7");
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut log = RequestLog::new();
        for i in 0..MAX_LOG_ENTRIES + 3 {
            log.push(make_entry(&format!("/products/{i}")));
        }
        assert_eq!(log.entries().len(), MAX_LOG_ENTRIES);
        assert_eq!(log.entries()[0].path, "/products/3");
    }

    #[test]
    fn render_marks_setup_and_errors() {
        let mut entry = make_entry("/products/6");
        entry.role = RequestRole::Setup;
        assert_eq!(entry.render(), "GET /products/6 (setup) -> 200 in 4ms");

        entry.status = None;
        entry.duration_ms = None;
        entry.error = Some("connection refused".into());
        assert_eq!(
            entry.render(),
            "GET /products/6 (setup) -> error: connection refused"
        );
    }
}
