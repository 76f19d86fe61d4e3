//! Environment-variable parsing helpers.
//!
//! Every tuning knob read from the environment goes through these helpers so the parsing rules
//! live in one place.

/// Returns `true` when the variable is set to `1`, `true`, `yes` or `on` (case-insensitive,
/// trimmed).
pub(crate) fn env_var_truthy(var_name: &str) -> bool {
    std::env::var(var_name)
        .map(|raw| {
            let normalized = raw.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}

/// Parses the variable as a strictly positive integer.
pub(crate) fn env_var_positive_usize(var_name: &str) -> Option<usize> {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

/// Returns the trimmed value when the variable is set and non-empty.
pub(crate) fn env_var_string(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
