use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::error::{ContractViolation, SetupFailure, TransportError, Violations};
use crate::history::{RequestLog, RequestLogEntry, RequestRole};
use crate::http::{ApiClient, CapturedResponse, RequestInput};
use crate::testing::Verdict;

/// Why a scenario body stopped before reaching its end.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScenarioAbort {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Setup(#[from] SetupFailure),

    /// A required check failed; its violations are already recorded.
    #[error("stopped after a required check failed")]
    Halted,

    /// The scenario's own fixture cannot produce a request.
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),
}

/// Per-scenario state: the shared client, the scenario's fixture, recorded
/// violations and the request log. Nothing here outlives the scenario.
pub struct ScenarioContext {
    client: Arc<ApiClient>,
    fixture: Value,
    violations: Vec<ContractViolation>,
    log: RequestLog,
}

impl ScenarioContext {
    pub fn new(client: Arc<ApiClient>, fixture: Value) -> Self {
        Self {
            client,
            fixture,
            violations: Vec::new(),
            log: RequestLog::new(),
        }
    }

    pub fn fixture(&self) -> &Value {
        &self.fixture
    }

    /// Perform the action under test. Any HTTP status is returned; only
    /// transport failures abort the scenario.
    pub async fn send(&mut self, request: RequestInput) -> Result<CapturedResponse, ScenarioAbort> {
        self.exchange(request, RequestRole::Action)
            .await
            .map_err(ScenarioAbort::Transport)
    }

    /// Perform a pre-condition request. Transport failures are reported as
    /// setup failures rather than as errors of the action under test.
    pub async fn setup(&mut self, request: RequestInput) -> Result<CapturedResponse, ScenarioAbort> {
        let label = request.label();
        self.exchange(request, RequestRole::Setup)
            .await
            .map_err(|source| {
                ScenarioAbort::Setup(SetupFailure::Transport {
                    request: label,
                    source,
                })
            })
    }

    /// Setup request whose JSON body seeds a later comparison.
    pub async fn setup_json(
        &mut self,
        request: RequestInput,
        expected_status: u16,
    ) -> Result<Value, ScenarioAbort> {
        let label = request.label();
        let response = self.setup(request).await?;
        if response.status != expected_status {
            return Err(SetupFailure::UnexpectedStatus {
                request: label,
                expected: expected_status,
                actual: response.status,
            }
            .into());
        }
        response.json().map_err(|err| {
            SetupFailure::InvalidBody {
                request: label,
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// Record a check and keep going.
    pub fn check(&mut self, verdict: Verdict) {
        if let Err(violations) = verdict {
            self.violations.extend(violations.into_inner());
        }
    }

    /// Record a check and stop the scenario if it failed, for checks later
    /// ones depend on.
    pub fn require(&mut self, verdict: Verdict) -> Result<(), ScenarioAbort> {
        match verdict {
            Ok(()) => Ok(()),
            Err(violations) => {
                self.violations.extend(violations.into_inner());
                Err(ScenarioAbort::Halted)
            }
        }
    }

    /// Parse the response body, recording a violation if it is not JSON.
    pub fn json(&mut self, response: &CapturedResponse) -> Result<Value, ScenarioAbort> {
        response.json().map_err(|err| {
            self.violations.push(ContractViolation::new(
                "body",
                "valid JSON",
                format!("unparsable ({err})"),
            ));
            ScenarioAbort::Halted
        })
    }

    /// Like [`Self::require`] for a check that yields a value.
    pub fn require_value<T>(&mut self, result: Result<T, Violations>) -> Result<T, ScenarioAbort> {
        result.map_err(|violations| {
            self.violations.extend(violations.into_inner());
            ScenarioAbort::Halted
        })
    }

    pub fn violations(&self) -> &[ContractViolation] {
        &self.violations
    }

    pub(crate) fn finish(self) -> (Vec<ContractViolation>, RequestLog) {
        (self.violations, self.log)
    }

    async fn exchange(
        &mut self,
        request: RequestInput,
        role: RequestRole,
    ) -> Result<CapturedResponse, TransportError> {
        let result = self.client.send(&request).await;
        let entry = match &result {
            Ok(response) => RequestLogEntry {
                role,
                method: request.method,
                path: request.path.clone(),
                status: Some(response.status),
                duration_ms: Some(response.duration_ms),
                error: None,
            },
            Err(err) => RequestLogEntry {
                role,
                method: request.method,
                path: request.path.clone(),
                status: None,
                duration_ms: None,
                error: Some(err.to_string()),
            },
        };
        self.log.push(entry);
        result
    }
}
