//! Behavioural suites for the engine.

mod lifecycle_behaviour;

/// Strips surrounding double quotes from a captured step argument.
fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}
