/// Hostname extraction and per-site counting for WebBlur
use std::collections::HashMap;

use url::Url;

use crate::rule_data::Rule;

/// Hostname that rules are matched against.
///
/// Full URLs are parsed; anything that does not parse as a URL with a host
/// is treated as a bare hostname (scheme, path and port stripped).
///
/// Examples:
/// - https://www.google.com/search → www.google.com
/// - http://localhost:3000/app → localhost
/// - news.bbc.co.uk/article → news.bbc.co.uk
pub fn hostname_of(url: &str) -> String {
    let trimmed = url.trim();

    if let Some(host) = Url::parse(trimmed)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
    {
        return host.to_lowercase();
    }

    bare_hostname(trimmed)
}

fn bare_hostname(input: &str) -> String {
    let without_scheme = input
        .split_once("://")
        .map_or(input, |(_, rest)| rest);

    let host_with_port = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    host_with_port
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Count rules per authored domain
pub fn count_rule_domains(rules: &[Rule]) -> HashMap<String, usize> {
    rules
        .iter()
        .filter(|rule| !rule.domain.is_empty())
        .fold(HashMap::new(), |mut counts, rule| {
            *counts.entry(rule.domain.clone()).or_insert(0) += 1;
            counts
        })
}

/// Get the top N domains by rule count
pub fn get_top_domains(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut domain_vec: Vec<(String, usize)> = counts
        .iter()
        .map(|(domain, count)| (domain.clone(), *count))
        .collect();

    // Sort by count descending, then by domain name ascending
    domain_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    domain_vec.into_iter().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule_for(domain: &str) -> Rule {
        Rule::from_selection("r", domain, Vec::new(), Utc::now())
    }

    #[test]
    fn test_hostname_of_urls() {
        assert_eq!(hostname_of("https://www.google.com/search?q=rust"), "www.google.com");
        assert_eq!(hostname_of("http://Shop.Example.com"), "shop.example.com");
        assert_eq!(hostname_of("http://localhost:3000/app"), "localhost");
        assert_eq!(hostname_of("http://127.0.0.1:8080"), "127.0.0.1");
    }

    #[test]
    fn test_hostname_of_bare_hosts() {
        assert_eq!(hostname_of("news.bbc.co.uk/article"), "news.bbc.co.uk");
        assert_eq!(hostname_of("example.com"), "example.com");
        assert_eq!(hostname_of("localhost:3000"), "localhost");
        assert_eq!(hostname_of("  example.org  "), "example.org");
    }

    #[test]
    fn test_hostname_of_edge_cases() {
        assert_eq!(hostname_of(""), "");
        assert_eq!(hostname_of("https://"), "");
        assert_eq!(hostname_of("file:///tmp/page.html"), "");
    }

    #[test]
    fn test_count_rule_domains() {
        let rules = vec![
            rule_for("news.example.com"),
            rule_for("github.com"),
            rule_for("news.example.com"),
            rule_for(""),
        ];

        let counts = count_rule_domains(&rules);

        assert_eq!(counts.get("news.example.com"), Some(&2));
        assert_eq!(counts.get("github.com"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_get_top_domains() {
        let mut counts = HashMap::new();
        counts.insert("google.com".to_string(), 10);
        counts.insert("github.com".to_string(), 5);
        counts.insert("microsoft.com".to_string(), 8);
        counts.insert("reddit.com".to_string(), 3);

        let top3 = get_top_domains(&counts, 3);

        assert_eq!(top3.len(), 3);
        assert_eq!(top3[0], ("google.com".to_string(), 10));
        assert_eq!(top3[1], ("microsoft.com".to_string(), 8));
        assert_eq!(top3[2], ("github.com".to_string(), 5));
    }

    #[test]
    fn test_get_top_domains_with_ties() {
        let mut counts = HashMap::new();
        counts.insert("github.com".to_string(), 5);
        counts.insert("google.com".to_string(), 5);
        counts.insert("microsoft.com".to_string(), 5);

        let top2 = get_top_domains(&counts, 2);

        // With same counts, should be sorted alphabetically
        assert_eq!(top2.len(), 2);
        assert_eq!(top2[0].0, "github.com");
        assert_eq!(top2[1].0, "google.com");
    }
}
