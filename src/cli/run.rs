use std::io::Write;
use std::path::Path;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::http::ApiClient;
use crate::runner::{Runner, filter_groups};
use crate::{storage, stub, suites};

use super::{OutputFormat, RunArgs};

/// Execute `run`: resolve configuration, run the selected groups and print
/// the report to `out`. Returns the process exit code of a completed run.
pub async fn execute_run<W: Write>(
    config_path: Option<&Path>,
    args: &RunArgs,
    cancel_rx: broadcast::Receiver<()>,
    out: &mut W,
) -> Result<u8, HarnessError> {
    let groups = filter_groups(suites::all_groups(), &args.groups);
    if groups.is_empty() {
        return Err(HarnessError::Usage(format!(
            "no scenario group matches {}",
            args.groups.join(", ")
        )));
    }

    let mut overrides = args.overrides();
    let stub_server = if args.stub {
        let server = stub::spawn("127.0.0.1:0").await?;
        info!(base_url = server.base_url(), "Running against the offline stub");
        overrides.base_url = Some(server.base_url().to_string());
        Some(server)
    } else {
        None
    };

    let config = HarnessConfig::load(config_path, &overrides)?;
    info!(base_url = %config.base_url, "Loaded configuration");

    let runner = Runner::new(ApiClient::new(&config)?, &config);
    let report = runner.run(groups, cancel_rx).await;

    match args.format {
        OutputFormat::Text => write!(out, "{}", report.render_text())?,
        OutputFormat::Json => writeln!(out, "{}", report.to_json()?)?,
    }

    if let Some(path) = &args.report {
        storage::write_report(path, &report)?;
    }

    if let Some(server) = stub_server {
        server.shutdown().await;
    }

    Ok(report.exit_code())
}

/// Print every group with its scenarios and their idempotency tag.
pub fn list_groups<W: Write>(out: &mut W) -> std::io::Result<()> {
    for group in suites::all_groups() {
        writeln!(out, "{}", group.name)?;
        for scenario in &group.scenarios {
            let tag = if scenario.is_mutating() { "mutating" } else { "idempotent" };
            writeln!(out, "  {:<11} {}", tag, scenario.name)?;
        }
    }
    Ok(())
}
