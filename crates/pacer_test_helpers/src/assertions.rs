//! Domain-specific assertions for PACER tests

use predicates::prelude::*;
use predicates::str::contains;

/// Assert that stderr does NOT contain any of the given strings
///
/// ```rust
/// use pacer_test_helpers::assertions::stderr_not_contains;
/// use predicates::prelude::*;
///
/// assert!(stderr_not_contains(&["ERROR", "WARN"]).eval("all good"));
/// ```
pub fn stderr_not_contains(values: &[&str]) -> impl Predicate<str> {
    let owned_values: Vec<String> = values.iter().map(|&s| s.to_string()).collect();
    predicate::function(move |s: &str| !owned_values.iter().any(|v| s.contains(v.as_str())))
}

/// Assert that a string looks like a JSON sync report from `pacer sync --json`
pub fn valid_sync_report() -> impl Predicate<str> {
    contains("\"status\"")
        .and(contains("\"success\""))
        .and(contains("\"synced_count\""))
        .and(contains("\"failed_count\""))
}

/// Assert that a string contains a hyphenated UUID (queued action ids)
pub fn contains_action_id() -> impl Predicate<str> {
    predicate::function(|s: &str| {
        s.split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
            .any(|word| {
                let groups: Vec<usize> = word.split('-').map(str::len).collect();
                groups == [8, 4, 4, 4, 12]
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_not_contains() {
        assert!(stderr_not_contains(&["ERROR", "WARN"]).eval("Some output without errors"));
        assert!(!stderr_not_contains(&["ERROR"]).eval("ERROR: something went wrong"));
    }

    #[test]
    fn test_valid_sync_report() {
        let report = r#"{"status":"completed","success":true,"synced_count":2,"failed_count":0}"#;
        assert!(valid_sync_report().eval(report));
        assert!(!valid_sync_report().eval(r#"{"status":"completed"}"#));
    }

    #[test]
    fn test_contains_action_id() {
        assert!(contains_action_id().eval("queued 6f1f2f7e-9d7e-4b8a-9a43-1f0c2d9d8e11 JOIN_TEAM"));
        assert!(!contains_action_id().eval("queued 6f1f2f7e-9d7e JOIN_TEAM"));
        assert!(!contains_action_id().eval("no id here"));
    }
}
