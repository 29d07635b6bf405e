/// Rule listing operations: search, filtering, sorting, stats

use std::collections::HashSet;

use crate::rule_data::Rule;

/// How many rules the dashboard lists as recently created
pub const RECENT_RULES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnabledFilter {
    #[default]
    All,
    Enabled,
    Disabled,
}

impl EnabledFilter {
    pub fn parse(value: &str) -> EnabledFilter {
        match value {
            "enabled" => EnabledFilter::Enabled,
            "disabled" => EnabledFilter::Disabled,
            _ => EnabledFilter::All,
        }
    }

    fn accepts(self, rule: &Rule) -> bool {
        match self {
            EnabledFilter::All => true,
            EnabledFilter::Enabled => rule.enabled,
            EnabledFilter::Disabled => !rule.enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleSort {
    #[default]
    Name,
    Domain,
    /// Newest first
    CreatedAt,
    /// Most used first
    TimesUsed,
}

impl RuleSort {
    pub fn parse(value: &str) -> RuleSort {
        match value {
            "domain" => RuleSort::Domain,
            "createdAt" => RuleSort::CreatedAt,
            "timesUsed" => RuleSort::TimesUsed,
            _ => RuleSort::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleStats {
    pub total_rules: usize,
    pub active_rules: usize,
    pub sites_protected: usize,
    pub total_usage: u64,
}

/// Case-insensitive match against a rule's name or domain. A blank query matches everything.
pub fn matches_search(rule: &Rule, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || rule.name.to_lowercase().contains(&query)
        || rule.domain.to_lowercase().contains(&query)
}

/// Rules that pass the search and filter, in the requested order
pub fn filter_and_sort<'a>(
    rules: &'a [Rule],
    query: &str,
    filter: EnabledFilter,
    sort: RuleSort,
) -> Vec<&'a Rule> {
    let mut listed: Vec<&Rule> = rules
        .iter()
        .filter(|rule| filter.accepts(rule) && matches_search(rule, query))
        .collect();

    match sort {
        RuleSort::Name => listed.sort_by_key(|rule| rule.name.to_lowercase()),
        RuleSort::Domain => listed.sort_by(|a, b| {
            a.domain
                .to_lowercase()
                .cmp(&b.domain.to_lowercase())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }),
        RuleSort::CreatedAt => listed.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        RuleSort::TimesUsed => listed.sort_by(|a, b| b.times_used.cmp(&a.times_used)),
    }

    listed
}

pub fn rule_stats(rules: &[Rule]) -> RuleStats {
    let sites: HashSet<&str> = rules
        .iter()
        .map(|rule| rule.domain.as_str())
        .filter(|domain| !domain.is_empty())
        .collect();

    RuleStats {
        total_rules: rules.len(),
        active_rules: rules.iter().filter(|rule| rule.enabled).count(),
        sites_protected: sites.len(),
        total_usage: rules.iter().map(|rule| u64::from(rule.times_used)).sum(),
    }
}

/// The `n` most recently created rules, newest first
pub fn recent_rules(rules: &[Rule], n: usize) -> Vec<&Rule> {
    let mut recent: Vec<&Rule> = rules.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(n);
    recent
}
