use std::fmt::{self, Display, Write as _};

use serde::Serialize;

use crate::error::ContractViolation;
use crate::history::RequestLogEntry;
use crate::runner::Idempotency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Passed,
    /// The service answered, but not as the contract says.
    Failed,
    /// The scenario could not be evaluated: transport, setup, timeout or
    /// cancellation.
    Errored,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::Errored => "ERRORED",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CauseKind {
    Transport,
    Setup,
    Timeout,
    Cancelled,
    Panicked,
    Fixture,
}

impl Display for CauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CauseKind::Transport => "transport error",
            CauseKind::Setup => "setup failed",
            CauseKind::Timeout => "run timeout",
            CauseKind::Cancelled => "cancelled",
            CauseKind::Panicked => "scenario panicked",
            CauseKind::Fixture => "invalid fixture",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCause {
    pub kind: CauseKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub group: String,
    pub name: String,
    pub idempotency: Idempotency,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ContractViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<RequestLogEntry>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn title(&self) -> String {
        format!("{} › {}", self.group, self.name)
    }
}

/// Summary report for one run, scenarios in declared order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn from_scenarios(
        scenarios: Vec<ScenarioReport>,
        warnings: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        let count = |outcome: Outcome| scenarios.iter().filter(|s| s.outcome == outcome).count();
        Self {
            total: scenarios.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            errored: count(Outcome::Errored),
            duration_ms,
            warnings,
            scenarios,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    /// 0 when every scenario passed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for scenario in &self.scenarios {
            let _ = writeln!(
                out,
                "{:<8} {} ({}ms)",
                scenario.outcome.to_string(),
                scenario.title(),
                scenario.duration_ms
            );

            match scenario.outcome {
                Outcome::Passed => {}
                Outcome::Failed => {
                    for violation in &scenario.violations {
                        let _ = writeln!(out, "           ✗ {violation}");
                    }
                }
                Outcome::Errored => {
                    if let Some(error) = &scenario.error {
                        let _ = writeln!(out, "           ! {}: {}", error.kind, error.message);
                    }
                    for violation in &scenario.violations {
                        let _ = writeln!(out, "           ✗ {violation}");
                    }
                    for request in &scenario.requests {
                        let _ = writeln!(out, "           · {}", request.render());
                    }
                }
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out);
            for warning in &self.warnings {
                let _ = writeln!(out, "warning: {warning}");
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} scenarios: {} passed, {} failed, {} errored in {}ms",
            self.total, self.passed, self.failed, self.errored, self.duration_ms
        );
        out
    }
}
