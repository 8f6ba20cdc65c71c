use std::fmt;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use super::context::{ScenarioAbort, ScenarioContext};

/// Body of a scenario: performs its requests through the context and records
/// checks on it.
pub type ScenarioFn = for<'a> fn(&'a mut ScenarioContext) -> BoxFuture<'a, Result<(), ScenarioAbort>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Idempotency {
    /// Repeating it leaves observable service state unchanged.
    Idempotent,
    /// Changes shared remote state (create, update, delete).
    Mutating,
}

#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub idempotency: Idempotency,
    /// Input data for the body: request payloads, path parameters.
    pub fixture: Value,
    pub body: ScenarioFn,
}

impl Scenario {
    pub fn new(name: impl Into<String>, body: ScenarioFn) -> Self {
        Self {
            name: name.into(),
            idempotency: Idempotency::Idempotent,
            fixture: Value::Null,
            body,
        }
    }

    pub fn mutating(mut self) -> Self {
        self.idempotency = Idempotency::Mutating;
        self
    }

    pub fn with_fixture(mut self, fixture: Value) -> Self {
        self.fixture = fixture;
        self
    }

    pub fn is_mutating(&self) -> bool {
        self.idempotency == Idempotency::Mutating
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("idempotency", &self.idempotency)
            .field("fixture", &self.fixture)
            .finish_non_exhaustive()
    }
}

/// Named, ordered set of scenarios. Scenarios in a group run in declared
/// order; groups are independent of each other.
#[derive(Debug, Clone)]
pub struct ScenarioGroup {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }
}

/// Keep groups whose name contains any filter (case-insensitive). An empty
/// filter list keeps everything.
pub fn filter_groups(groups: Vec<ScenarioGroup>, filters: &[String]) -> Vec<ScenarioGroup> {
    if filters.is_empty() {
        return groups;
    }
    let filters: Vec<String> = filters
        .iter()
        .map(|filter| filter.trim().to_lowercase())
        .filter(|filter| !filter.is_empty())
        .collect();

    groups
        .into_iter()
        .filter(|group| {
            let name = group.name.to_lowercase();
            filters.iter().any(|filter| name.contains(filter.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<(), ScenarioAbort>> {
        Box::pin(async { Ok(()) })
    }

    fn groups() -> Vec<ScenarioGroup> {
        vec![
            ScenarioGroup::new("products - get").scenario(Scenario::new("list", noop)),
            ScenarioGroup::new("product/:id - put")
                .scenario(Scenario::new("update", noop).mutating()),
            ScenarioGroup::new("product/:id - delete"),
        ]
    }

    #[test]
    fn filter_matches_substrings_case_insensitively() {
        let kept = filter_groups(groups(), &["PUT".to_string(), "delete".to_string()]);
        let names: Vec<_> = kept.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["product/:id - put", "product/:id - delete"]);
    }

    #[test]
    fn empty_filter_keeps_all_groups() {
        assert_eq!(filter_groups(groups(), &[]).len(), 3);
        assert!(filter_groups(groups(), &["nothing".to_string()]).is_empty());
    }

    #[test]
    fn scenario_builder_sets_tags() {
        let scenario = Scenario::new("update", noop)
            .mutating()
            .with_fixture(serde_json::json!({ "id": 7 }));
        assert!(scenario.is_mutating());
        assert_eq!(scenario.fixture["id"], 7);
        assert!(format!("{scenario:?}").contains("update"));
    }
}
