//! Environment variable parsing with warn-level logging for invalid values.

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => parse_or_default(var, &v, default),
        Err(_) => default,
    }
}

/// Read an optional, non-empty string variable.
#[must_use]
pub fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn parse_or_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    raw: &str,
    default: T,
) -> T {
    match raw.trim().parse() {
        Ok(n) => n,
        Err(_) => {
            tracing::warn!(
                var,
                value = %raw,
                default = %default,
                "invalid env var value, using default"
            );
            default
        },
    }
}
