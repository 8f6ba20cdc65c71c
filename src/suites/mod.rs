//! Scenario suites shipped with the harness.

pub mod products;

use crate::runner::ScenarioGroup;

/// Every shipped group, in declared order.
pub fn all_groups() -> Vec<ScenarioGroup> {
    products::groups()
}
