/// Data structures for WebBlur rules
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{BlurError, Result};

/// Maximum number of characters kept from an element's text as a preview.
pub const EXCERPT_LEN: usize = 50;

/// A single element picked during a selection session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementTarget {
    pub selector: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub text_content: String,
}

impl ElementTarget {
    pub fn new(selector: String, tag_name: &str, text_content: &str) -> ElementTarget {
        ElementTarget {
            selector,
            tag_name: tag_name.to_lowercase(),
            text_content: excerpt(text_content),
        }
    }
}

/// A persisted blur rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    pub url_pattern: String,
    #[serde(default = "default_enabled", deserialize_with = "enabled_or_default")]
    pub enabled: bool,
    #[serde(default)]
    pub elements: Vec<ElementTarget>,
    #[serde(default)]
    pub times_used: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Rule {
    /// Build a rule from a finished selection session on `hostname`.
    pub fn from_selection(
        name: &str,
        hostname: &str,
        elements: Vec<ElementTarget>,
        now: DateTime<Utc>,
    ) -> Rule {
        Rule {
            id: new_rule_id(),
            name: name.trim().to_string(),
            domain: hostname.to_string(),
            url_pattern: hostname.to_string(),
            enabled: true,
            elements,
            times_used: 0,
            created_at: now,
            last_used: None,
        }
    }

    /// Reject rules without a usable name or pattern.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BlurError::MalformedRule { field: "name" });
        }
        if self.url_pattern.trim().is_empty() {
            return Err(BlurError::MalformedRule { field: "urlPattern" });
        }
        Ok(())
    }

    /// Decode a stored rule. A missing `id` or `createdAt` is filled here,
    /// once; the flag tells the caller the record must be written back so the
    /// filled values stick.
    pub fn from_stored(mut value: Value) -> Result<(Rule, bool)> {
        let mut repaired = false;
        if let Some(fields) = value.as_object_mut() {
            if fields.get("createdAt").is_none_or(Value::is_null) {
                fields.remove("createdAt");
                repaired = true;
            }
        }

        let mut rule: Rule = serde_json::from_value(value)?;
        if rule.id.is_empty() {
            rule.ensure_id();
            repaired = true;
        }
        Ok((rule, repaired))
    }

    /// Give the rule an id if it arrived without one.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = new_rule_id();
        }
    }

    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.times_used = self.times_used.saturating_add(1);
        self.last_used = Some(now);
    }
}

pub fn new_rule_id() -> String {
    Uuid::new_v4().to_string()
}

/// Collapse whitespace and cut the text down to the preview length.
fn excerpt(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(EXCERPT_LEN)
        .collect()
}

fn default_enabled() -> bool {
    true
}

// `null` is treated like a missing flag
fn enabled_or_default<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 28, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_element_target_excerpt() {
        let long = "word ".repeat(40);
        let target = ElementTarget::new("#a".to_string(), "DIV", &long);

        assert_eq!(target.tag_name, "div");
        assert_eq!(target.text_content.chars().count(), EXCERPT_LEN);
        assert!(!target.text_content.starts_with(' '));
    }

    #[test]
    fn test_element_target_multibyte_excerpt() {
        let text = "é".repeat(80);
        let target = ElementTarget::new(".x".to_string(), "span", &text);
        assert_eq!(target.text_content.chars().count(), EXCERPT_LEN);
    }

    #[test]
    fn test_from_selection() {
        let elements = vec![ElementTarget::new("#a".to_string(), "div", "Ad")];
        let rule = Rule::from_selection("  Ads ", "news.example.com", elements, fixed_time());

        assert_eq!(rule.name, "Ads");
        assert_eq!(rule.domain, "news.example.com");
        assert_eq!(rule.url_pattern, "news.example.com");
        assert!(rule.enabled);
        assert_eq!(rule.times_used, 0);
        assert_eq!(rule.created_at, fixed_time());
        assert!(Uuid::parse_str(&rule.id).is_ok());
    }

    #[test]
    fn test_enabled_defaults() {
        let absent: Rule = serde_json::from_str(r#"{"name":"a","urlPattern":"*"}"#).unwrap();
        let null: Rule =
            serde_json::from_str(r#"{"name":"a","urlPattern":"*","enabled":null}"#).unwrap();
        let off: Rule =
            serde_json::from_str(r#"{"name":"a","urlPattern":"*","enabled":false}"#).unwrap();

        assert!(absent.enabled);
        assert!(null.enabled);
        assert!(!off.enabled);
        assert_eq!(absent.times_used, 0);
        assert!(absent.last_used.is_none());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let missing_pattern = serde_json::from_str::<Rule>(r#"{"name":"a"}"#);
        assert!(missing_pattern.is_err());

        let missing_name = serde_json::from_str::<Rule>(r#"{"urlPattern":"*"}"#);
        assert!(missing_name.is_err());
    }

    #[test]
    fn test_validate() {
        let mut rule = Rule::from_selection("Ads", "example.com", Vec::new(), fixed_time());
        assert!(rule.validate().is_ok());

        rule.name = "   ".to_string();
        assert!(matches!(rule.validate(), Err(BlurError::MalformedRule { field: "name" })));

        rule.name = "Ads".to_string();
        rule.url_pattern = String::new();
        assert!(matches!(
            rule.validate(),
            Err(BlurError::MalformedRule { field: "urlPattern" })
        ));
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let mut rule = Rule::from_selection(
            "Ads",
            "example.com",
            vec![ElementTarget::new(".ad".to_string(), "div", "Buy")],
            fixed_time(),
        );
        rule.record_use(fixed_time());

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["urlPattern"], "example.com");
        assert_eq!(json["timesUsed"], 1);
        assert_eq!(json["elements"][0]["tagName"], "div");
        assert!(json.get("lastUsed").is_some());

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_accepts_javascript_iso_timestamps() {
        let rule: Rule = serde_json::from_str(
            r#"{"name":"a","urlPattern":"*","createdAt":"2024-10-28T10:30:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(rule.created_at, fixed_time());
    }

    #[test]
    fn test_from_stored_fills_missing_fields_once() {
        let (rule, repaired) =
            Rule::from_stored(serde_json::json!({"name": "a", "urlPattern": "*", "createdAt": null}))
                .unwrap();
        assert!(repaired);
        assert!(Uuid::parse_str(&rule.id).is_ok());

        // Written back and read again: nothing moves
        let (again, repaired) = Rule::from_stored(serde_json::to_value(&rule).unwrap()).unwrap();
        assert!(!repaired);
        assert_eq!(again.id, rule.id);
        assert_eq!(again.created_at, rule.created_at);
    }

    #[test]
    fn test_from_stored_keeps_complete_rules() {
        let stored = Rule::from_selection("Ads", "example.com", Vec::new(), fixed_time());

        let (rule, repaired) = Rule::from_stored(serde_json::to_value(&stored).unwrap()).unwrap();

        assert!(!repaired);
        assert_eq!(rule, stored);
    }

    #[test]
    fn test_ensure_id() {
        let mut rule: Rule = serde_json::from_str(r#"{"name":"a","urlPattern":"*"}"#).unwrap();
        assert!(rule.id.is_empty());
        rule.ensure_id();
        assert!(!rule.id.is_empty());

        let id = rule.id.clone();
        rule.ensure_id();
        assert_eq!(rule.id, id);
    }
}
