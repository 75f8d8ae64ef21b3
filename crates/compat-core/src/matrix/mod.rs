//! Version/scenario registry.
//!
//! The matrix maps each compat version to the ordered set of scenarios its
//! binary supports. It is validated once on construction and only borrowed
//! afterwards; the orchestrator never mutates it.
//!
//! For a non-baseline version `v` the executed scenarios are
//! `scenarios(v) ∩ scenarios(baseline)`, in the baseline's declared order.

mod builtin;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CompatError, Result};

pub use builtin::{BUILTIN_BASELINE, builtin_entries};

/// Identifier of a compat binary version (`dev`, `2.3.0`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    /// Creates a version tag.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the tag is empty or contains
    /// whitespace or a path separator (tags are used as directory names).
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        validate_name("version tag", &tag)?;
        reject_path("version tag", &tag)?;
        Ok(Self(tag))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionTag {
    type Error = CompatError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of one compatibility behaviour (`encrypt`, `group`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScenarioName(String);

impl ScenarioName {
    /// Creates a scenario name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty, contains
    /// whitespace or a path separator (it prefixes the scenario's temporary
    /// directory), or starts with `-` (it is passed as a positional argument).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name("scenario name", &name)?;
        reject_path("scenario name", &name)?;
        if name.starts_with('-') {
            return Err(CompatError::configuration(format!(
                "scenario name '{name}' must not start with '-'"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ScenarioName {
    type Error = CompatError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ScenarioName> for String {
    fn from(name: ScenarioName) -> Self {
        name.0
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_name(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CompatError::configuration(format!("{kind} cannot be empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(CompatError::configuration(format!(
            "{kind} '{value}' must not contain whitespace"
        )));
    }
    Ok(())
}

fn reject_path(kind: &str, value: &str) -> Result<()> {
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(CompatError::configuration(format!(
            "{kind} '{value}' must not be a path"
        )));
    }
    Ok(())
}

/// One version and the scenarios its binary supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionEntry {
    /// The version tag.
    #[serde(rename = "tag")]
    pub version: VersionTag,
    /// Declared scenarios, in order.
    pub scenarios: Vec<ScenarioName>,
}

impl VersionEntry {
    /// Creates an entry from string literals.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any name is invalid.
    pub fn from_names<'a>(
        version: &str,
        scenarios: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        Ok(Self {
            version: VersionTag::new(version)?,
            scenarios: scenarios
                .into_iter()
                .map(ScenarioName::new)
                .collect::<Result<_>>()?,
        })
    }
}

/// One `(version, scenario)` pair the orchestrator will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedRun<'a> {
    /// The historical version, run with `--base`.
    pub version: &'a VersionTag,
    /// The scenario.
    pub scenario: &'a ScenarioName,
}

/// Immutable version/scenario registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatrix {
    baseline: VersionTag,
    entries: Vec<VersionEntry>,
}

/// Raw TOML shape of a matrix, validated through [`VersionMatrix::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixSpec {
    /// The baseline ("current") version tag.
    pub baseline: VersionTag,
    /// Declared versions in run order.
    pub versions: Vec<VersionEntry>,
}

impl TryFrom<MatrixSpec> for VersionMatrix {
    type Error = CompatError;

    fn try_from(spec: MatrixSpec) -> Result<Self> {
        Self::new(spec.baseline, spec.versions)
    }
}

impl VersionMatrix {
    /// Builds and validates a matrix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - the baseline tag is not declared
    /// - a version is declared twice
    /// - a version declares the same scenario twice
    pub fn new(baseline: VersionTag, entries: Vec<VersionEntry>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(&entry.version) {
                return Err(CompatError::configuration(format!(
                    "version '{}' is declared more than once",
                    entry.version
                )));
            }
            let mut scenarios = BTreeSet::new();
            for scenario in &entry.scenarios {
                if !scenarios.insert(scenario) {
                    return Err(CompatError::configuration(format!(
                        "scenario '{scenario}' is declared twice for version '{}'",
                        entry.version
                    )));
                }
            }
        }

        if !seen.contains(&baseline) {
            return Err(CompatError::configuration(format!(
                "baseline version '{baseline}' is not declared in the matrix"
            )));
        }

        Ok(Self { baseline, entries })
    }

    /// The matrix the compat suite ships with.
    #[must_use]
    pub fn builtin() -> Self {
        // The built-in table is static and known valid.
        Self {
            baseline: VersionTag(BUILTIN_BASELINE.to_string()),
            entries: builtin_entries(),
        }
    }

    /// Parses a matrix from TOML (`baseline` plus `[[versions]]` tables).
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed TOML and a configuration
    /// error if validation fails.
    pub fn from_toml(content: &str) -> Result<Self> {
        let spec: MatrixSpec =
            toml::from_str(content).map_err(|e| CompatError::Serialization {
                context: "failed to parse version matrix".to_string(),
                source: Box::new(e),
            })?;
        spec.try_into()
    }

    /// The baseline version.
    #[must_use]
    pub const fn baseline(&self) -> &VersionTag {
        &self.baseline
    }

    /// All declared versions, baseline included, in declared order.
    pub fn versions(&self) -> impl Iterator<Item = &VersionTag> {
        self.entries.iter().map(|e| &e.version)
    }

    /// Declared versions other than the baseline, in declared order.
    pub fn historical_versions(&self) -> impl Iterator<Item = &VersionTag> {
        self.versions().filter(|v| **v != self.baseline)
    }

    /// Scenarios declared for `version`, if it is in the matrix.
    #[must_use]
    pub fn scenarios(&self, version: &VersionTag) -> Option<&[ScenarioName]> {
        self.entries
            .iter()
            .find(|e| &e.version == version)
            .map(|e| e.scenarios.as_slice())
    }

    fn baseline_scenarios(&self) -> &[ScenarioName] {
        self.scenarios(&self.baseline).unwrap_or_default()
    }

    fn declared(&self, version: &VersionTag) -> Result<&[ScenarioName]> {
        self.scenarios(version).ok_or_else(|| {
            CompatError::configuration(format!("version '{version}' is not declared"))
        })
    }

    /// Scenarios executed for `version`: its declared set intersected with
    /// the baseline's, in the baseline's order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `version` is not declared.
    pub fn scenarios_for(&self, version: &VersionTag) -> Result<Vec<&ScenarioName>> {
        let declared = self.declared(version)?;
        Ok(self
            .baseline_scenarios()
            .iter()
            .filter(|s| declared.contains(s))
            .collect())
    }

    /// Scenarios declared for `version` that the baseline does not declare.
    ///
    /// These are never run. Whether they were retired on purpose is not
    /// recorded anywhere, so callers surface them instead of dropping them
    /// silently.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `version` is not declared.
    pub fn unmatched_scenarios(&self, version: &VersionTag) -> Result<Vec<&ScenarioName>> {
        let baseline = self.baseline_scenarios();
        Ok(self
            .declared(version)?
            .iter()
            .filter(|s| !baseline.contains(s))
            .collect())
    }

    /// Every `(version, scenario)` pair to run, versions in declared order,
    /// scenarios in baseline order. The baseline itself is not compared
    /// against itself.
    #[must_use]
    pub fn plan(&self) -> Vec<PlannedRun<'_>> {
        let baseline = self.baseline_scenarios();
        self.entries
            .iter()
            .filter(|e| e.version != self.baseline)
            .flat_map(|entry| {
                baseline
                    .iter()
                    .filter(|s| entry.scenarios.contains(s))
                    .map(|scenario| PlannedRun {
                        version: &entry.version,
                        scenario,
                    })
            })
            .collect()
    }
}

impl Default for VersionMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> VersionTag {
        VersionTag::new(s).unwrap()
    }

    fn names(list: &[&ScenarioName]) -> Vec<String> {
        list.iter().map(|s| s.as_str().to_string()).collect()
    }

    #[test]
    fn test_builtin_matrix_shape() {
        let matrix = VersionMatrix::builtin();
        assert_eq!(matrix.baseline().as_str(), "dev");
        let versions: Vec<_> = matrix.versions().map(VersionTag::as_str).collect();
        assert_eq!(versions, ["dev", "2.3.0", "2.2.0", "2.1.0", "2.0.0"]);
        assert_eq!(matrix.scenarios(&tag("dev")).unwrap().len(), 9);

        // The built-in table must pass the same validation as user tables.
        let revalidated =
            VersionMatrix::new(matrix.baseline().clone(), builtin_entries()).unwrap();
        assert_eq!(revalidated, matrix);
    }

    #[test]
    fn test_scenarios_for_drops_baseline_only_scenarios() {
        let matrix = VersionMatrix::builtin();
        let run = matrix.scenarios_for(&tag("2.3.0")).unwrap();
        assert_eq!(run.len(), 8);
        assert!(!names(&run).contains(&"encryption-session".to_string()));
        assert_eq!(run[0].as_str(), "encrypt");
        assert_eq!(run[7].as_str(), "claim-provisional-self");
    }

    #[test]
    fn test_scenarios_for_follows_baseline_order() {
        let matrix = VersionMatrix::new(
            tag("dev"),
            vec![
                VersionEntry::from_names("dev", ["a", "b", "c"]).unwrap(),
                VersionEntry::from_names("1.0.0", ["c", "x", "a"]).unwrap(),
            ],
        )
        .unwrap();

        assert_eq!(names(&matrix.scenarios_for(&tag("1.0.0")).unwrap()), ["a", "c"]);
        assert_eq!(
            names(&matrix.unmatched_scenarios(&tag("1.0.0")).unwrap()),
            ["x"]
        );
    }

    #[test]
    fn test_empty_intersection_plans_nothing_for_version() {
        let matrix = VersionMatrix::new(
            tag("dev"),
            vec![
                VersionEntry::from_names("dev", ["encrypt"]).unwrap(),
                VersionEntry::from_names("0.9.0", ["legacy-only"]).unwrap(),
                VersionEntry::from_names("1.0.0", []).unwrap(),
            ],
        )
        .unwrap();

        assert!(matrix.scenarios_for(&tag("0.9.0")).unwrap().is_empty());
        assert!(matrix.scenarios_for(&tag("1.0.0")).unwrap().is_empty());
        assert!(matrix.plan().is_empty());
    }

    #[test]
    fn test_plan_skips_baseline_and_keeps_version_order() {
        let matrix = VersionMatrix::builtin();
        let plan = matrix.plan();
        assert_eq!(plan.len(), 4 * 8);
        assert!(plan.iter().all(|p| p.version.as_str() != "dev"));
        assert_eq!(plan[0].version.as_str(), "2.3.0");
        assert_eq!(plan[0].scenario.as_str(), "encrypt");
        assert_eq!(plan[31].version.as_str(), "2.0.0");
        assert_eq!(plan[31].scenario.as_str(), "claim-provisional-self");
    }

    #[test]
    fn test_missing_baseline_is_configuration_error() {
        let err = VersionMatrix::new(
            tag("dev"),
            vec![VersionEntry::from_names("2.0.0", ["encrypt"]).unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, CompatError::Configuration { .. }));
        assert!(err.to_string().contains("baseline version 'dev'"));
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let err = VersionMatrix::new(
            tag("dev"),
            vec![
                VersionEntry::from_names("dev", ["encrypt"]).unwrap(),
                VersionEntry::from_names("dev", ["group"]).unwrap(),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn test_duplicate_scenario_rejected() {
        let err = VersionMatrix::new(
            tag("dev"),
            vec![VersionEntry::from_names("dev", ["encrypt", "encrypt"]).unwrap()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_unknown_version_is_configuration_error() {
        let matrix = VersionMatrix::builtin();
        assert!(matrix.scenarios_for(&tag("9.9.9")).is_err());
        assert!(matrix.scenarios(&tag("9.9.9")).is_none());
    }

    #[test]
    fn test_name_validation() {
        assert!(VersionTag::new("").is_err());
        assert!(VersionTag::new("2.0.0 beta").is_err());
        assert!(VersionTag::new("../dev").is_err());
        assert!(ScenarioName::new("--base").is_err());
        assert!(ScenarioName::new("preshare-and-claim").is_ok());
    }

    #[test]
    fn test_scenario_names_cannot_be_paths() {
        for name in ["group/claim", "group\\claim", ".", ".."] {
            let err = ScenarioName::new(name).unwrap_err();
            assert!(matches!(err, CompatError::Configuration { .. }), "{name}");
        }
        assert!(ScenarioName::new("decrypt-old-claim.v2").is_ok());

        let err = VersionMatrix::from_toml(
            r#"
            baseline = "dev"

            [[versions]]
            tag = "dev"
            scenarios = ["group/claim"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CompatError::Serialization { .. }));
    }

    #[test]
    fn test_from_toml() {
        let matrix = VersionMatrix::from_toml(
            r#"
            baseline = "dev"

            [[versions]]
            tag = "dev"
            scenarios = ["encrypt", "group"]

            [[versions]]
            tag = "2.0.0"
            scenarios = ["group"]
            "#,
        )
        .unwrap();
        assert_eq!(names(&matrix.scenarios_for(&tag("2.0.0")).unwrap()), ["group"]);
    }

    #[test]
    fn test_from_toml_validates_baseline() {
        let err = VersionMatrix::from_toml(
            r#"
            baseline = "main"

            [[versions]]
            tag = "dev"
            scenarios = ["encrypt"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CompatError::Configuration { .. }));
    }

    #[test]
    fn test_from_toml_rejects_invalid_names() {
        let err = VersionMatrix::from_toml(
            r#"
            baseline = "dev"

            [[versions]]
            tag = "dev"
            scenarios = ["--next"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CompatError::Serialization { .. }));
    }
}
