//! # Contract assertions
//!
//! Declarative checks on captured responses (status, headers, field presence,
//! field types, subset and deep equality) and the report types that collect
//! their results per scenario and per run.

pub mod assertions;
pub mod report;
pub mod schema;

pub use assertions::{
    Verdict, all, expect_deep_equal, expect_each, expect_exact_fields, expect_field_types,
    expect_has_fields, expect_header_contains, expect_json_array, expect_non_empty, expect_status,
    expect_status_in_range, expect_subset_match,
};
pub use report::{CauseKind, ErrorCause, Outcome, RunReport, ScenarioReport};
pub use schema::{Schema, TypeTag};
