//! # Scenario runner
//!
//! Executes scenario groups against the target service and collects one
//! [`ScenarioReport`] per scenario, in declared order.
//!
//! Idempotent scenarios run first: groups are spread over a bounded pool of
//! workers and each group runs its scenarios in order. Mutating scenarios then
//! run one at a time, since they change state the whole suite shares.

mod context;
mod scenario;

pub use context::{ScenarioAbort, ScenarioContext};
pub use scenario::{Idempotency, Scenario, ScenarioFn, ScenarioGroup, filter_groups};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt as _;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::http::ApiClient;
use crate::testing::{CauseKind, ErrorCause, Outcome, RunReport, ScenarioReport};

#[derive(Debug, Clone)]
pub struct Runner {
    client: Arc<ApiClient>,
    max_concurrency: usize,
    run_timeout: Duration,
    serial_mutations: bool,
}

/// A scenario bound to its position in the final report.
#[derive(Debug, Clone)]
struct Slot {
    index: usize,
    group: Arc<str>,
    scenario: Scenario,
}

impl Runner {
    pub fn new(client: ApiClient, config: &HarnessConfig) -> Self {
        Self {
            client: Arc::new(client),
            max_concurrency: config.max_concurrency.max(1),
            run_timeout: Duration::from_millis(config.run_timeout_ms),
            serial_mutations: config.serial_mutations,
        }
    }

    /// Run every group. A message on `cancel_rx` stops the run; in-flight and
    /// pending scenarios are then reported as errored.
    pub async fn run(
        &self,
        groups: Vec<ScenarioGroup>,
        cancel_rx: broadcast::Receiver<()>,
    ) -> RunReport {
        let started = Instant::now();
        let deadline = started + self.run_timeout;
        let cancelled = Arc::new(AtomicBool::new(false));

        let (units, mutating) = self.partition(groups);
        let total = units.iter().map(Vec::len).sum::<usize>() + mutating.len();

        let mut warnings = Vec::new();
        for slot in &mutating {
            warn!(
                group = %slot.group,
                scenario = %slot.scenario.name,
                "Scenario mutates shared remote state"
            );
            warnings.push(format!(
                "{} › {} mutates shared remote state; its effects are visible to later runs",
                slot.group, slot.scenario.name
            ));
        }

        info!(
            scenarios = total,
            workers = self.max_concurrency,
            "Starting contract run"
        );

        let mut reports: Vec<Option<ScenarioReport>> = vec![None; total];

        for (index, report) in self
            .run_concurrent(units, deadline, cancelled.clone(), &cancel_rx)
            .await
        {
            reports[index] = Some(report);
        }

        let mut serial_rx = cancel_rx;
        for slot in mutating {
            let report = run_scenario(
                self.client.clone(),
                &slot,
                deadline,
                &cancelled,
                &mut serial_rx,
            )
            .await;
            reports[slot.index] = Some(report);
        }

        let scenarios: Vec<ScenarioReport> = reports.into_iter().flatten().collect();
        let report = RunReport::from_scenarios(
            scenarios,
            warnings,
            started.elapsed().as_millis() as u64,
        );
        info!(
            passed = report.passed,
            failed = report.failed,
            errored = report.errored,
            duration_ms = report.duration_ms,
            "Contract run finished"
        );
        report
    }

    /// Split groups into per-group work units for the concurrent phase and the
    /// list of scenarios deferred to the serial phase.
    fn partition(&self, groups: Vec<ScenarioGroup>) -> (Vec<Vec<Slot>>, Vec<Slot>) {
        let mut units = Vec::with_capacity(groups.len());
        let mut mutating = Vec::new();
        let mut index = 0;

        for group in groups {
            let name: Arc<str> = Arc::from(group.name.as_str());
            let mut unit = Vec::new();
            for scenario in group.scenarios {
                let slot = Slot {
                    index,
                    group: name.clone(),
                    scenario,
                };
                index += 1;
                if self.serial_mutations && slot.scenario.is_mutating() {
                    mutating.push(slot);
                } else {
                    unit.push(slot);
                }
            }
            if !unit.is_empty() {
                units.push(unit);
            }
        }

        (units, mutating)
    }

    async fn run_concurrent(
        &self,
        units: Vec<Vec<Slot>>,
        deadline: Instant,
        cancelled: Arc<AtomicBool>,
        cancel_rx: &broadcast::Receiver<()>,
    ) -> Vec<(usize, ScenarioReport)> {
        if units.is_empty() {
            return Vec::new();
        }

        let units = Arc::new(units);
        let next_unit = Arc::new(AtomicUsize::new(0));
        let worker_count = self.max_concurrency.min(units.len());
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let units = units.clone();
            let next_unit = next_unit.clone();
            let client = self.client.clone();
            let cancelled = cancelled.clone();
            let report_tx = report_tx.clone();
            let mut worker_cancel_rx = cancel_rx.resubscribe();

            let handle = tokio::spawn(async move {
                loop {
                    let idx = next_unit.fetch_add(1, Ordering::Relaxed);
                    let Some(unit) = units.get(idx) else {
                        break;
                    };

                    debug!(worker, group = %unit[0].group, "Running group");
                    for slot in unit {
                        let report = run_scenario(
                            client.clone(),
                            slot,
                            deadline,
                            &cancelled,
                            &mut worker_cancel_rx,
                        )
                        .await;
                        let _ = report_tx.send((slot.index, report));
                    }
                }
            });
            handles.push(handle);
        }
        drop(report_tx);

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Scenario worker crashed");
            }
        }

        let mut reports = Vec::new();
        while let Some(report) = report_rx.recv().await {
            reports.push(report);
        }

        // A crashed worker leaves its remaining scenarios without a report.
        let reported: Vec<usize> = reports.iter().map(|(index, _)| *index).collect();
        for slot in units.iter().flatten() {
            if !reported.contains(&slot.index) {
                reports.push((
                    slot.index,
                    errored(slot, CauseKind::Panicked, "scenario worker crashed", 0),
                ));
            }
        }

        reports
    }
}

async fn run_scenario(
    client: Arc<ApiClient>,
    slot: &Slot,
    deadline: Instant,
    cancelled: &AtomicBool,
    cancel_rx: &mut broadcast::Receiver<()>,
) -> ScenarioReport {
    if cancelled.load(Ordering::Relaxed) || cancel_requested(cancel_rx) {
        cancelled.store(true, Ordering::Relaxed);
        return errored(slot, CauseKind::Cancelled, "run cancelled before the scenario started", 0);
    }
    if Instant::now() >= deadline {
        return errored(slot, CauseKind::Timeout, "run timeout elapsed before the scenario started", 0);
    }

    let started = Instant::now();
    let mut ctx = ScenarioContext::new(client, slot.scenario.fixture.clone());
    let body = slot.scenario.body;

    let result = tokio::select! {
        result = tokio::time::timeout_at(deadline, AssertUnwindSafe(body(&mut ctx)).catch_unwind()) => Some(result),
        _ = wait_for_cancel(cancel_rx) => None,
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    let (violations, log) = ctx.finish();

    let (outcome, error) = match result {
        None => {
            cancelled.store(true, Ordering::Relaxed);
            (
                Outcome::Errored,
                Some(cause(CauseKind::Cancelled, "run cancelled while the scenario was in flight")),
            )
        }
        Some(Err(_elapsed)) => (
            Outcome::Errored,
            Some(cause(CauseKind::Timeout, "run timeout elapsed while the scenario was in flight")),
        ),
        Some(Ok(Err(panic))) => (
            Outcome::Errored,
            Some(cause(CauseKind::Panicked, &panic_message(panic.as_ref()))),
        ),
        Some(Ok(Ok(Err(ScenarioAbort::Transport(err))))) => {
            (Outcome::Errored, Some(cause(CauseKind::Transport, &err.to_string())))
        }
        Some(Ok(Ok(Err(ScenarioAbort::Setup(failure))))) => {
            (Outcome::Errored, Some(cause(CauseKind::Setup, &failure.to_string())))
        }
        Some(Ok(Ok(Err(ScenarioAbort::InvalidFixture(reason))))) => {
            (Outcome::Errored, Some(cause(CauseKind::Fixture, &reason)))
        }
        Some(Ok(Ok(Err(ScenarioAbort::Halted)))) => (Outcome::Failed, None),
        Some(Ok(Ok(Ok(())))) if violations.is_empty() => (Outcome::Passed, None),
        Some(Ok(Ok(Ok(())))) => (Outcome::Failed, None),
    };

    match outcome {
        Outcome::Passed => info!(group = %slot.group, scenario = %slot.scenario.name, duration_ms, "PASSED"),
        Outcome::Failed => warn!(
            group = %slot.group,
            scenario = %slot.scenario.name,
            violations = violations.len(),
            "FAILED"
        ),
        Outcome::Errored => error!(
            group = %slot.group,
            scenario = %slot.scenario.name,
            cause = ?error.as_ref().map(|cause| cause.kind),
            "ERRORED"
        ),
    }

    ScenarioReport {
        group: slot.group.to_string(),
        name: slot.scenario.name.clone(),
        idempotency: slot.scenario.idempotency,
        outcome,
        violations,
        error,
        requests: log.into_vec(),
        duration_ms,
    }
}

fn errored(slot: &Slot, kind: CauseKind, message: &str, duration_ms: u64) -> ScenarioReport {
    ScenarioReport {
        group: slot.group.to_string(),
        name: slot.scenario.name.clone(),
        idempotency: slot.scenario.idempotency,
        outcome: Outcome::Errored,
        violations: Vec::new(),
        error: Some(cause(kind, message)),
        requests: Vec::new(),
        duration_ms,
    }
}

fn cause(kind: CauseKind, message: &str) -> ErrorCause {
    ErrorCause {
        kind,
        message: message.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "scenario panicked".to_string()
}

fn cancel_requested(cancel_rx: &mut broadcast::Receiver<()>) -> bool {
    match cancel_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}

/// Resolves once cancellation is signalled; never resolves if every sender
/// is gone.
async fn wait_for_cancel(cancel_rx: &mut broadcast::Receiver<()>) {
    match cancel_rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}
