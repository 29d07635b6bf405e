/// The rule collection and its import/export format
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BlurError, Result};
use crate::rule_data::Rule;
use crate::settings::Settings;

pub const EXPORT_VERSION: &str = "1.0.0";

/// Root collection structure, stored under the `rules` key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageData {
    pub rules: Vec<Rule>,
}

/// Result of merging an import into the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.added + self.replaced
    }
}

impl StorageData {
    pub fn new() -> Self {
        StorageData { rules: Vec::new() }
    }

    /// Wrap a rule list, giving id-less rules an id of their own.
    pub fn from_rules(mut rules: Vec<Rule>) -> Self {
        rules.iter_mut().for_each(Rule::ensure_id);
        StorageData { rules }
    }

    /// Append a rule, filling in a missing id. Invalid rules are rejected untouched.
    pub fn add_rule(&mut self, mut rule: Rule) -> Result<&Rule> {
        rule.validate()?;
        rule.ensure_id();
        self.rules.push(rule);
        Ok(&self.rules[self.rules.len() - 1])
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let original_len = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() < original_len
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    /// Flip `enabled`; returns the new value.
    pub fn toggle_rule(&mut self, rule_id: &str) -> Option<bool> {
        self.rules.iter_mut().find(|r| r.id == rule_id).map(|rule| {
            rule.enabled = !rule.enabled;
            rule.enabled
        })
    }

    pub fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        self.rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .map(|rule| rule.enabled = enabled)
            .is_some()
    }

    pub fn rename_rule(&mut self, rule_id: &str, new_name: String) -> Result<bool> {
        if new_name.trim().is_empty() {
            return Err(BlurError::MalformedRule { field: "name" });
        }
        Ok(self
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .map(|rule| rule.name = new_name.trim().to_string())
            .is_some())
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Bump usage counters of the given rules; returns how many were updated.
    pub fn record_usage(&mut self, rule_ids: &[String], now: DateTime<Utc>) -> usize {
        let mut updated = 0;
        for rule in self.rules.iter_mut().filter(|r| rule_ids.contains(&r.id)) {
            rule.record_use(now);
            updated += 1;
        }
        updated
    }

    /// Merge imported rules by name: a rule whose name already exists replaces
    /// the first rule with that name, anything else is appended. Ids are kept.
    pub fn merge_imported(&mut self, imported: Vec<Rule>) -> ImportSummary {
        let existing_names: HashSet<String> = self.rules.iter().map(|r| r.name.clone()).collect();
        let mut summary = ImportSummary::default();

        for mut rule in imported {
            rule.ensure_id();
            let position = existing_names
                .contains(&rule.name)
                .then(|| self.rules.iter().position(|r| r.name == rule.name))
                .flatten();

            match position {
                Some(index) => {
                    self.rules[index] = rule;
                    summary.replaced += 1;
                }
                None => {
                    self.rules.push(rule);
                    summary.added += 1;
                }
            }
        }

        summary
    }

    pub fn export(&self, settings: Option<Settings>, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            rules: self.rules.clone(),
            settings,
            export_date: now,
            version: EXPORT_VERSION.to_string(),
        }
    }
}

/// Import/export file layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A validated import file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDocument {
    pub rules: Vec<Rule>,
    pub settings: Option<Settings>,
}

/// Parse and validate an import file. Nothing is returned unless every rule is usable.
pub fn parse_import(text: &str) -> Result<ImportDocument> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| BlurError::MalformedImport(format!("not valid JSON: {}", e)))?;

    let rules_value = value
        .get("rules")
        .filter(|rules| rules.is_array())
        .cloned()
        .ok_or_else(|| BlurError::MalformedImport("missing 'rules' array".to_string()))?;

    let rules: Vec<Rule> = serde_json::from_value(rules_value)
        .map_err(|e| BlurError::MalformedImport(format!("invalid rule: {}", e)))?;
    for rule in &rules {
        rule.validate()?;
    }

    let settings = match value.get("settings") {
        None | Some(serde_json::Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<Settings>(raw.clone())
                .map_err(|e| BlurError::MalformedImport(format!("invalid settings: {}", e)))?
                .normalized(),
        ),
    };

    Ok(ImportDocument { rules, settings })
}

/// `webblur-rules-2024-10-28.json`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("webblur-rules-{}.json", now.format("%Y-%m-%d"))
}
