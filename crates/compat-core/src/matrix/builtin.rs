//! Compat versions and scenarios shipped with the suite.

use super::{ScenarioName, VersionEntry, VersionTag};

/// Tag of the version built from the current source tree.
pub const BUILTIN_BASELINE: &str = "dev";

/// Scenarios every released 2.x compat binary implements.
const RELEASED_2X: &[&str] = &[
    "encrypt",
    "group",
    "unlock",
    "preshare-and-claim",
    "decrypt-old-claim",
    "provisional-user-group-claim",
    "provisional-user-group-old-claim",
    "claim-provisional-self",
];

/// Scenarios of the `dev` binary. `encryption-session` has no released
/// counterpart yet.
const DEV: &[&str] = &[
    "encrypt",
    "encryption-session",
    "group",
    "unlock",
    "preshare-and-claim",
    "decrypt-old-claim",
    "provisional-user-group-claim",
    "provisional-user-group-old-claim",
    "claim-provisional-self",
];

fn entry(version: &str, scenarios: &[&str]) -> VersionEntry {
    VersionEntry {
        version: VersionTag(version.to_string()),
        scenarios: scenarios
            .iter()
            .map(|s| ScenarioName((*s).to_string()))
            .collect(),
    }
}

/// Built-in entries, in run order.
#[must_use]
pub fn builtin_entries() -> Vec<VersionEntry> {
    vec![
        entry(BUILTIN_BASELINE, DEV),
        entry("2.3.0", RELEASED_2X),
        entry("2.2.0", RELEASED_2X),
        entry("2.1.0", RELEASED_2X),
        entry("2.0.0", RELEASED_2X),
    ]
}
