use crate::db::models::ClassificationRule;

/// A rule matches when the app name is equal and the window title contains
/// the rule's substring. An empty substring matches every title.
pub fn rule_matches(rule: &ClassificationRule, app_name: &str, window_title: &str) -> bool {
    rule.app_name == app_name && window_title.contains(rule.window_title_contains.as_str())
}

/// Highest priority wins; equal priorities go to the most recently created
/// rule (highest id).
pub fn best_match<'a>(
    rules: &'a [ClassificationRule],
    app_name: &str,
    window_title: &str,
) -> Option<&'a ClassificationRule> {
    rules
        .iter()
        .filter(|rule| rule_matches(rule, app_name, window_title))
        .max_by_key(|rule| (rule.priority, rule.id))
}
