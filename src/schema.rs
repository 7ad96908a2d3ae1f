//! Schema definitions for nixtest suite documents.
//!
//! A suite document is a list of named suites, each holding typed test
//! specifications. Documents are usually JSON generated by a build tool,
//! but the same shape is accepted from YAML and TOML (see [`crate::loader`]).

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A named group of tests.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SuiteSpec {
    /// Suite name, used for grouping in reports.
    pub name: String,

    /// The tests in this suite, in declaration order.
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

/// A single test specification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestSpec {
    /// Test kind: `unit`, `snapshot` or `script`.
    #[serde(rename = "type")]
    pub test_type: TestType,

    /// Test name. Snapshot paths are derived from it.
    pub name: String,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,

    /// Expected value for `unit` tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Literal actual value (ignored when `actualDrv` is set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,

    /// Build reference whose JSON output is the actual value.
    #[serde(
        default,
        rename = "actualDrv",
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_drv: Option<String>,

    /// Build reference of the script run by `script` tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Source position as `file:line`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,

    /// Owning suite, filled in by the runner when the suites are flattened.
    #[serde(skip)]
    pub suite: String,
}

impl TestSpec {
    /// Build reference for the actual value, if one is set and non-empty.
    pub fn actual_ref(&self) -> Option<&str> {
        self.actual_drv.as_deref().filter(|r| !r.is_empty())
    }

    /// Build reference for the script, if one is set and non-empty.
    pub fn script_ref(&self) -> Option<&str> {
        self.script.as_deref().filter(|r| !r.is_empty())
    }

    /// Split `pos` into file and optional line.
    pub fn position(&self) -> Option<(&str, Option<&str>)> {
        let pos = self.pos.as_deref().filter(|p| !p.is_empty())?;
        Some(match pos.split_once(':') {
            Some((file, line)) => (file, Some(line)),
            None => (pos, None),
        })
    }
}

/// Test kind discriminator.
///
/// Unrecognized strings are kept as [`TestType::Unknown`] so the runner can
/// report them per test instead of rejecting the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestType {
    /// Compare `actual` against the literal `expected`.
    Unit,
    /// Compare `actual` against a stored snapshot.
    Snapshot,
    /// Run a script; a zero exit code passes.
    Script,
    /// Anything else.
    Unknown(String),
}

impl From<String> for TestType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "unit" => TestType::Unit,
            "snapshot" => TestType::Snapshot,
            "script" => TestType::Script,
            _ => TestType::Unknown(s),
        }
    }
}

impl From<TestType> for String {
    fn from(t: TestType) -> String {
        t.to_string()
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Unit => f.write_str("unit"),
            TestType::Snapshot => f.write_str("snapshot"),
            TestType::Script => f.write_str("script"),
            TestType::Unknown(other) => f.write_str(other),
        }
    }
}

impl JsonSchema for TestType {
    fn schema_name() -> String {
        "TestType".to_string()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(vec!["unit".into(), "snapshot".into(), "script".into()]),
            ..Default::default()
        }
        .into()
    }
}

/// Generate the JSON Schema for suite documents.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Vec<SuiteSpec>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal_document() {
        let doc = r#"[
  {
    "name": "basics",
    "tests": [
      { "type": "unit", "name": "adds", "expected": 2, "actual": 2 }
    ]
  }
]"#;
        let suites: Vec<SuiteSpec> = serde_json::from_str(doc).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "basics");
        let test = &suites[0].tests[0];
        assert_eq!(test.test_type, TestType::Unit);
        assert_eq!(test.expected, Some(json!(2)));
        assert_eq!(test.description, "");
        // The suite back-reference is never read from the document
        assert_eq!(test.suite, "");
    }

    #[test]
    fn parse_all_fields() {
        let doc = json!({
            "type": "snapshot",
            "name": "Render Page",
            "description": "renders the index page",
            "actualDrv": "/nix/store/abc-page.drv",
            "pos": "tests/page.nix:12"
        });
        let test: TestSpec = serde_json::from_value(doc).unwrap();
        assert_eq!(test.test_type, TestType::Snapshot);
        assert_eq!(test.actual_ref(), Some("/nix/store/abc-page.drv"));
        assert_eq!(test.script_ref(), None);
        assert_eq!(test.position(), Some(("tests/page.nix", Some("12"))));
    }

    #[test]
    fn unknown_type_is_preserved() {
        let test: TestSpec =
            serde_json::from_value(json!({ "type": "fuzz", "name": "x" })).unwrap();
        assert_eq!(test.test_type, TestType::Unknown("fuzz".to_string()));
        assert_eq!(test.test_type.to_string(), "fuzz");
    }

    #[test]
    fn empty_refs_count_as_unset() {
        let test: TestSpec = serde_json::from_value(json!({
            "type": "script",
            "name": "x",
            "actualDrv": "",
            "script": ""
        }))
        .unwrap();
        assert_eq!(test.actual_ref(), None);
        assert_eq!(test.script_ref(), None);
    }

    #[test]
    fn null_values_read_as_absent() {
        let test: TestSpec = serde_json::from_value(json!({
            "type": "unit",
            "name": "x",
            "expected": null
        }))
        .unwrap();
        assert_eq!(test.expected, None);
        assert_eq!(test.actual, None);
    }

    #[test]
    fn position_without_line() {
        let test: TestSpec = serde_json::from_value(json!({
            "type": "unit",
            "name": "x",
            "pos": "flake.nix"
        }))
        .unwrap();
        assert_eq!(test.position(), Some(("flake.nix", None)));
    }

    #[test]
    fn type_round_trips_as_string() {
        let value = serde_json::to_value(TestType::Script).unwrap();
        assert_eq!(value, json!("script"));
    }

    #[test]
    fn schema_lists_known_types() {
        let schema = serde_json::to_value(generate_schema()).unwrap();
        let text = schema.to_string();
        assert!(text.contains("\"snapshot\""));
        assert!(text.contains("actualDrv"));
    }
}
