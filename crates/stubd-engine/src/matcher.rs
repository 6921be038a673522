//! Pure match predicate pairing a queued action with a request snapshot.

use crate::action::Action;
use crate::transaction::RequestSnapshot;

/// True iff the action's method equals the request's method (exact,
/// case-sensitive) and the action's pattern is found anywhere in the full
/// request URL (path plus query string, unanchored).
pub(crate) fn matches(action: &Action, request: &RequestSnapshot) -> bool {
    action.method().as_str() == request.method && action.pattern().is_match(&request.url)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::response::{Method, ResponseSpec};
    use crate::testkit::snapshot_for;

    fn respond_action(pattern: &str, method: Method) -> Action {
        Action::respond(ResponseSpec::new(pattern, method)).unwrap()
    }

    #[test]
    fn matches_on_method_and_url_substring() {
        let action = respond_action("/widgets", Method::Get);
        assert!(matches(&action, &snapshot_for("GET", "/api/widgets?x=1")));
    }

    #[test]
    fn pattern_is_unanchored_search() {
        let action = respond_action(r"widgets/\d+", Method::Get);
        assert!(matches(&action, &snapshot_for("GET", "/api/widgets/42?verbose=true")));
        assert!(!matches(&action, &snapshot_for("GET", "/api/widgets/latest")));
    }

    #[test]
    fn query_string_participates_in_matching() {
        let action = respond_action("withParam=abc", Method::Get);
        assert!(matches(&action, &snapshot_for("GET", "/api/some/path?withParam=abc")));
        assert!(!matches(&action, &snapshot_for("GET", "/api/some/path")));
    }

    #[test]
    fn method_mismatch_never_matches() {
        let action = respond_action("/widgets", Method::Post);
        assert!(!matches(&action, &snapshot_for("GET", "/api/widgets")));
    }

    #[test]
    fn method_comparison_is_case_sensitive() {
        let action = respond_action("/widgets", Method::Get);
        assert!(!matches(&action, &snapshot_for("get", "/api/widgets")));
    }

    #[test]
    fn url_mismatch_never_matches() {
        let action = respond_action("/a/different/path", Method::Get);
        assert!(!matches(&action, &snapshot_for("GET", "/api/some/path")));
    }
}
