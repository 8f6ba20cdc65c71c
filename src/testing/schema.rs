use std::fmt::{self, Display};

use serde_json::{Map, Value};

use crate::error::{ContractViolation, Violations};

use super::assertions::{Verdict, collect, describe, expect_has_fields};

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    Boolean,
    Object,
    Array,
}

impl TypeTag {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            TypeTag::String => value.is_string(),
            TypeTag::Number => value.is_number(),
            TypeTag::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|number| number.fract() == 0.0)
            }
            TypeTag::Boolean => value.is_boolean(),
            TypeTag::Object => value.is_object(),
            TypeTag::Array => value.is_array(),
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Integer => "integer",
            TypeTag::Boolean => "boolean",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Tag(TypeTag),
    Object(Schema),
}

#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    name: String,
    shape: Shape,
    required: bool,
}

/// Declarative description of a JSON object: field name to expected type,
/// optionally nesting another schema for object-valued fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            shape: Shape::Tag(tag),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            shape: Shape::Tag(tag),
            required: false,
        });
        self
    }

    pub fn object(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            shape: Shape::Object(schema),
            required: true,
        });
        self
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Presence of every required field, then the type of every present
    /// field. Missing fields are reported once, by the presence check.
    pub fn check(&self, body: &Value) -> Verdict {
        let presence = expect_has_fields(body, &self.required_fields());
        let Some(object) = body.as_object() else {
            return presence;
        };
        let mut violations = presence.err().map(Violations::into_inner).unwrap_or_default();
        violations.extend(self.type_violations(object, false));
        collect(violations)
    }

    pub(crate) fn type_violations(
        &self,
        object: &Map<String, Value>,
        report_missing: bool,
    ) -> Vec<ContractViolation> {
        let mut violations = Vec::new();

        for field in &self.fields {
            let Some(value) = object.get(&field.name) else {
                if field.required && report_missing {
                    violations.push(ContractViolation::new(
                        field.name.clone(),
                        expected_label(&field.shape),
                        "missing",
                    ));
                }
                continue;
            };

            match &field.shape {
                Shape::Tag(tag) => {
                    if !tag.matches(value) {
                        violations.push(ContractViolation::new(
                            field.name.clone(),
                            tag.to_string(),
                            describe(value),
                        ));
                    }
                }
                Shape::Object(nested) => match value.as_object() {
                    Some(inner) => violations.extend(
                        nested
                            .type_violations(inner, true)
                            .into_iter()
                            .map(|violation| violation.nested_under(&field.name)),
                    ),
                    None => violations.push(ContractViolation::new(
                        field.name.clone(),
                        "object",
                        describe(value),
                    )),
                },
            }
        }

        violations
    }
}

fn expected_label(shape: &Shape) -> String {
    match shape {
        Shape::Tag(tag) => tag.to_string(),
        Shape::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rating_schema() -> Schema {
        Schema::new()
            .field("rate", TypeTag::Number)
            .field("count", TypeTag::Integer)
    }

    #[test]
    fn type_tags_match_json_values() {
        assert!(TypeTag::Number.matches(&json!(13.5)));
        assert!(TypeTag::Number.matches(&json!(7)));
        assert!(TypeTag::Integer.matches(&json!(7)));
        assert!(TypeTag::Integer.matches(&json!(7.0)));
        assert!(!TypeTag::Integer.matches(&json!(7.5)));
        assert!(!TypeTag::String.matches(&json!(1)));
        assert!(TypeTag::Array.matches(&json!([])));
        assert!(TypeTag::Object.matches(&json!({})));
        assert!(TypeTag::Boolean.matches(&json!(false)));
    }

    #[test]
    fn check_reports_missing_once_and_wrong_types() {
        let schema = Schema::new()
            .field("id", TypeTag::Integer)
            .field("title", TypeTag::String)
            .field("price", TypeTag::Number);

        let violations = schema
            .check(&json!({ "id": "1", "price": 3 }))
            .unwrap_err()
            .into_inner();

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].condition, "fields");
        assert!(violations[0].actual.contains("title"));
        assert_eq!(violations[1].condition, "id");
        assert_eq!(violations[1].expected, "integer");
        assert_eq!(violations[1].actual, "string");
    }

    #[test]
    fn optional_fields_are_only_type_checked_when_present() {
        let schema = Schema::new().optional("note", TypeTag::String);
        assert!(schema.check(&json!({})).is_ok());
        assert!(schema.check(&json!({ "note": 1 })).is_err());
    }

    #[test]
    fn nested_object_paths_are_reported() {
        let schema = Schema::new().object("rating", rating_schema());

        assert!(schema.check(&json!({ "rating": { "rate": 3.9, "count": 120 } })).is_ok());

        let violations = schema
            .check(&json!({ "rating": { "rate": "high" } }))
            .unwrap_err()
            .into_inner();
        let conditions: Vec<_> = violations.iter().map(|v| v.condition.as_str()).collect();
        assert_eq!(conditions, vec!["rating.rate", "rating.count"]);

        let violations = schema.check(&json!({ "rating": 4 })).unwrap_err().into_inner();
        assert_eq!(violations[0].expected, "object");
        assert_eq!(violations[0].actual, "number");
    }

    #[test]
    fn non_object_body_fails_presence_only() {
        let schema = Schema::new().field("id", TypeTag::Integer);
        let violations = schema.check(&json!([1, 2])).unwrap_err().into_inner();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].actual, "array");
    }

    #[test]
    fn field_listing_preserves_declaration_order() {
        let schema = Schema::new()
            .field("b", TypeTag::String)
            .optional("a", TypeTag::String);
        assert_eq!(schema.field_names(), vec!["b", "a"]);
        assert_eq!(schema.required_fields(), vec!["b"]);
    }
}
