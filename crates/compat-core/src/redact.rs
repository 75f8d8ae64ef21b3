//! Secret redaction for logged command lines and environments.
//!
//! Verification codes travel as `--bob-code=<code>` arguments and admin tokens
//! travel as environment variables. Neither may reach the run log verbatim.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// The replacement text for redacted secrets.
const REDACTED: &str = "[REDACTED]";

/// Argument prefixes whose value is a secret.
const SECRET_ARG_PREFIXES: &[&str] = &["--bob-code="];

/// Environment variable names that indicate sensitive content.
static SENSITIVE_ENV_NAMES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i).*secret.*",
        r"(?i).*token.*",
        r"(?i).*password.*",
        r"(?i).*private[_\-]?key.*",
        r"(?i).*api[_\-]?key.*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid sensitive env pattern"))
    .collect()
});

/// Redacts the value of a single argument if it carries a secret.
#[must_use]
pub fn redact_arg(arg: &str) -> Cow<'_, str> {
    for prefix in SECRET_ARG_PREFIXES {
        if arg.starts_with(prefix) {
            return Cow::Owned(format!("{prefix}{REDACTED}"));
        }
    }
    Cow::Borrowed(arg)
}

/// Joins a command line for logging, redacting secret arguments.
#[must_use]
pub fn redact_command_line(command_line: &[String]) -> String {
    command_line
        .iter()
        .map(|arg| redact_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check if an environment variable name is sensitive.
#[must_use]
pub fn is_sensitive_env_name(name: &str) -> bool {
    SENSITIVE_ENV_NAMES.iter().any(|p| p.is_match(name))
}

/// Redact a value if the environment variable name is sensitive.
#[must_use]
pub fn redact_env_value<'a>(name: &str, value: &'a str) -> Cow<'a, str> {
    if is_sensitive_env_name(name) {
        Cow::Borrowed(REDACTED)
    } else {
        Cow::Borrowed(value)
    }
}
