use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::HarnessError;
use crate::testing::RunReport;

/// Write the JSON report to `path`, creating parent directories as needed.
pub fn write_report(path: &Path, report: &RunReport) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let raw = report.to_json()?;
    fs::write(path, raw)?;
    debug!(path = %path.display(), "Wrote run report");
    Ok(())
}
