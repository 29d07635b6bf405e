/// Glob-style url pattern matching against hostnames
use regex::{Regex, RegexBuilder};

use crate::rule_data::Rule;

/// A compiled `urlPattern`.
///
/// Only `*` is translated (to `.*`); every other character is handed to the
/// regex engine untouched, so `.` keeps its "any character" meaning. The
/// resulting regex is unanchored and case-insensitive.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// The bare `*` pattern.
    Any,
    Regex(Regex),
    /// Pattern that did not compile; matched as a case-insensitive substring.
    Literal(String),
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> UrlPattern {
        if pattern == "*" {
            return UrlPattern::Any;
        }

        let translated = pattern.replace('*', ".*");
        match RegexBuilder::new(&translated).case_insensitive(true).build() {
            Ok(regex) => UrlPattern::Regex(regex),
            Err(e) => {
                log::debug!("Pattern {:?} is not a valid regex ({}), using substring match", pattern, e);
                UrlPattern::Literal(pattern.to_lowercase())
            }
        }
    }

    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Regex(regex) => regex.is_match(hostname),
            UrlPattern::Literal(literal) => hostname.to_lowercase().contains(literal.as_str()),
        }
    }
}

/// Does this rule apply to `hostname`?
pub fn rule_matches(rule: &Rule, hostname: &str) -> bool {
    rule.enabled && UrlPattern::compile(&rule.url_pattern).matches(hostname)
}

/// Rules that apply to `hostname`, in their original order.
pub fn matching_rules<'a>(rules: &'a [Rule], hostname: &str) -> Vec<&'a Rule> {
    rules.iter().filter(|rule| rule_matches(rule, hostname)).collect()
}

/// Rules whose pattern covers `hostname`, regardless of their enabled flag.
///
/// The popup lists these so that disabled rules can be switched back on.
pub fn rules_for_host<'a>(rules: &'a [Rule], hostname: &str) -> Vec<&'a Rule> {
    rules
        .iter()
        .filter(|rule| UrlPattern::compile(&rule.url_pattern).matches(hostname))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_rule(name: &str, pattern: &str, enabled: bool) -> Rule {
        let mut rule = Rule::from_selection(name, "example.com", Vec::new(), Utc::now());
        rule.url_pattern = pattern.to_string();
        rule.enabled = enabled;
        rule
    }

    #[test]
    fn test_star_matches_everything() {
        let rules = vec![create_test_rule("all", "*", true)];

        for domain in ["", "example.com", "localhost", "127.0.0.1", "ÜBER.de"] {
            assert_eq!(matching_rules(&rules, domain).len(), 1, "domain {:?}", domain);
        }
    }

    #[test]
    fn test_wildcard_subdomain() {
        let rules = vec![create_test_rule("shop", "*.example.com", true)];

        assert_eq!(matching_rules(&rules, "shop.example.com").len(), 1);
        assert!(matching_rules(&rules, "example.org").is_empty());
    }

    #[test]
    fn test_plain_pattern_is_unanchored_and_case_insensitive() {
        let rules = vec![create_test_rule("news", "News", true)];

        assert_eq!(matching_rules(&rules, "www.news.com").len(), 1);
        assert_eq!(matching_rules(&rules, "NEWSROOM.org").len(), 1);
        assert!(matching_rules(&rules, "example.com").is_empty());
    }

    #[test]
    fn test_dot_is_not_escaped() {
        let rules = vec![create_test_rule("dot", "example.com", true)];
        assert_eq!(matching_rules(&rules, "examplexcom").len(), 1);
    }

    #[test]
    fn test_disabled_rule_is_skipped_but_kept() {
        let rules = vec![
            create_test_rule("on", "*", true),
            create_test_rule("off", "*", false),
        ];

        let matched = matching_rules(&rules, "example.com");

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "on");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules_for_host(&rules, "example.com").len(), 2);
    }

    #[test]
    fn test_invalid_regex_falls_back_to_substring() {
        let rules = vec![create_test_rule("broken", "ads(", true)];

        assert_eq!(matching_rules(&rules, "my.ADS(.net").len(), 1);
        assert!(matching_rules(&rules, "ads.net").is_empty());
        assert!(matches!(UrlPattern::compile("ads("), UrlPattern::Literal(_)));
    }

    #[test]
    fn test_preserves_order() {
        let rules = vec![
            create_test_rule("first", "*", true),
            create_test_rule("skip", "other.org", true),
            create_test_rule("second", "example", true),
            create_test_rule("third", "*.com", true),
        ];

        let names: Vec<&str> = matching_rules(&rules, "www.example.com")
            .iter()
            .map(|r| r.name.as_str())
            .collect();

        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rules_for_host_lists_disabled_rules() {
        let rules = vec![
            create_test_rule("on", "example.com", true),
            create_test_rule("off", "*.example.com", false),
            create_test_rule("elsewhere", "example.org", true),
        ];

        let names: Vec<&str> = rules_for_host(&rules, "shop.example.com")
            .iter()
            .map(|r| r.name.as_str())
            .collect();

        assert_eq!(names, vec!["on", "off"]);
        assert_eq!(matching_rules(&rules, "shop.example.com").len(), 1);
    }
}
