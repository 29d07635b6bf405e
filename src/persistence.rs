/// Key-value persistence for rules and settings
///
/// The extension stores its data in `chrome.storage.sync`, the web viewer in
/// `localStorage`. Both sit behind `KeyValueStore` so the repository logic is
/// shared and testable without a browser.
use serde_json::{Value, json};
use wasm_bindgen::JsValue;

use crate::bridge::{describe, from_js, storage_sync_get, storage_sync_set, to_js};
use crate::error::{BlurError, Result};
use crate::rule_data::Rule;
use crate::settings::Settings;
use crate::storage::StorageData;

pub const RULES_KEY: &str = "rules";
pub const SETTINGS_KEY: &str = "settings";

#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// `chrome.storage.sync`
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeSyncStore;

impl KeyValueStore for ChromeSyncStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let items = storage_sync_get(JsValue::from_str(key))
            .await
            .map_err(|e| BlurError::persistence(describe(&e)))?;
        let items: Value = from_js(items)?;
        Ok(items.get(key).filter(|v| !v.is_null()).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut items = serde_json::Map::new();
        items.insert(key.to_string(), value);
        storage_sync_set(to_js(&items)?)
            .await
            .map(|_| ())
            .map_err(|e| BlurError::persistence(describe(&e)))
    }
}

/// `window.localStorage`, one JSON string per key.
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    prefix: String,
}

impl LocalStorageStore {
    pub fn new(prefix: &str) -> Self {
        LocalStorageStore {
            prefix: prefix.to_string(),
        }
    }

    fn storage(&self) -> Result<web_sys::Storage> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or_else(|| BlurError::persistence("localStorage is not available"))
    }
}

impl KeyValueStore for LocalStorageStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw = self
            .storage()?
            .get_item(&format!("{}{}", self.prefix, key))
            .map_err(|e| BlurError::persistence(describe(&e)))?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.storage()?
            .set_item(&format!("{}{}", self.prefix, key), &value.to_string())
            .map_err(|e| BlurError::persistence(describe(&e)))
    }
}

/// A decoded rule list and how many records needed a filled-in id or
/// creation time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedRules {
    pub data: StorageData,
    pub repaired: usize,
}

/// Read a stored rule list. Entries that no longer parse are skipped with a
/// warning; anything that is not a list yields an empty collection.
pub fn decode_rules(value: Value) -> DecodedRules {
    let Value::Array(entries) = value else {
        log::warn!("Stored rules are not a list, starting empty");
        return DecodedRules::default();
    };

    let mut repaired = 0;
    let rules = entries
        .into_iter()
        .filter_map(|entry| match Rule::from_stored(entry) {
            Ok((rule, filled)) => {
                repaired += usize::from(filled);
                Some(rule)
            }
            Err(e) => {
                log::warn!("Skipping unreadable stored rule: {}", e);
                None
            }
        })
        .collect();

    DecodedRules {
        data: StorageData::from_rules(rules),
        repaired,
    }
}

pub fn decode_settings(value: Value) -> Settings {
    serde_json::from_value::<Settings>(value)
        .unwrap_or_else(|e| {
            log::warn!("Stored settings unreadable ({}), using defaults", e);
            Settings::default()
        })
        .normalized()
}

/// Typed access to the `rules` and `settings` keys.
#[derive(Debug, Clone)]
pub struct RuleRepository<S> {
    store: S,
}

impl<S: KeyValueStore> RuleRepository<S> {
    pub fn new(store: S) -> Self {
        RuleRepository { store }
    }

    /// Load the rule collection (see `decode_rules`). Records that had an id
    /// or creation time filled in are written back right away.
    pub async fn load_rules(&self) -> Result<StorageData> {
        let Some(value) = self.store.get(RULES_KEY).await? else {
            return Ok(StorageData::new());
        };

        let decoded = decode_rules(value);
        if decoded.repaired > 0 {
            log::info!("Filling in missing fields of {} stored rule(s)", decoded.repaired);
            if let Err(e) = self.save_rules(&decoded.data).await {
                log::warn!("Could not write repaired rules back: {}", e);
            }
        }
        Ok(decoded.data)
    }

    pub async fn save_rules(&self, data: &StorageData) -> Result<()> {
        self.store
            .set(RULES_KEY, serde_json::to_value(&data.rules)?)
            .await
    }

    pub async fn load_settings(&self) -> Result<Settings> {
        Ok(self
            .store
            .get(SETTINGS_KEY)
            .await?
            .map(decode_settings)
            .unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store
            .set(SETTINGS_KEY, serde_json::to_value(settings.normalized())?)
            .await
    }

    /// Read-modify-write append of one rule.
    pub async fn add_rule(&self, rule: Rule) -> Result<Rule> {
        let mut data = self.load_rules().await?;
        let added = data.add_rule(rule)?.clone();
        self.save_rules(&data).await?;
        Ok(added)
    }

    /// Write defaults for keys that do not exist yet.
    pub async fn install_defaults(&self) -> Result<()> {
        if self.store.get(SETTINGS_KEY).await?.is_none() {
            self.save_settings(&Settings::default()).await?;
        }
        if self.store.get(RULES_KEY).await?.is_none() {
            self.store.set(RULES_KEY, json!([])).await?;
        }
        Ok(())
    }

    /// Drop every rule and reset settings.
    pub async fn clear_all(&self) -> Result<()> {
        self.save_rules(&StorageData::new()).await?;
        self.save_settings(&Settings::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_data::ElementTarget;
    use chrono::Utc;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        items: RefCell<HashMap<String, Value>>,
        fail_writes: bool,
    }

    impl KeyValueStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            Ok(self.items.borrow().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            if self.fail_writes {
                return Err(BlurError::persistence("quota exceeded"));
            }
            self.items.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
    }

    fn create_test_rule(name: &str) -> Rule {
        Rule::from_selection(
            name,
            "example.com",
            vec![ElementTarget::new(".ad".to_string(), "div", "")],
            Utc::now(),
        )
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let repo = RuleRepository::new(MemoryStore::default());

        assert!(block_on(repo.load_rules()).unwrap().rules.is_empty());
        assert_eq!(block_on(repo.load_settings()).unwrap(), Settings::default());
    }

    #[test]
    fn test_rules_round_trip_in_order() {
        let repo = RuleRepository::new(MemoryStore::default());
        let data = StorageData::from_rules(vec![
            create_test_rule("first"),
            create_test_rule("second"),
            create_test_rule("third"),
        ]);

        block_on(repo.save_rules(&data)).unwrap();
        let loaded = block_on(repo.load_rules()).unwrap();

        assert_eq!(loaded, data);
    }

    #[test]
    fn test_unreadable_rules_are_skipped() {
        let store = MemoryStore::default();
        let good = serde_json::to_value(create_test_rule("good")).unwrap();
        store
            .items
            .borrow_mut()
            .insert(RULES_KEY.to_string(), json!([{"name": "broken"}, good]));
        let repo = RuleRepository::new(store);

        let loaded = block_on(repo.load_rules()).unwrap();

        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.rules[0].name, "good");
    }

    #[test]
    fn test_settings_are_normalized() {
        let store = MemoryStore::default();
        store
            .items
            .borrow_mut()
            .insert(SETTINGS_KEY.to_string(), json!({"blurIntensity": 0}));
        let repo = RuleRepository::new(store);

        assert_eq!(block_on(repo.load_settings()).unwrap().blur_intensity, 1);
    }

    #[test]
    fn test_decode_helpers_are_lenient() {
        assert!(decode_rules(json!({"not": "a list"})).data.rules.is_empty());
        assert_eq!(decode_settings(json!("garbage")), Settings::default());
        assert!(!decode_settings(json!({"autoBlur": false})).auto_blur);
    }

    #[test]
    fn test_id_less_rules_get_distinct_ids() {
        let decoded = decode_rules(json!([
            {"name": "here", "urlPattern": "example.com", "elements": [{"selector": ".ad"}]},
            {"name": "elsewhere", "urlPattern": "other.org", "elements": [{"selector": ".ad"}]},
        ]));
        let mut data = decoded.data;

        assert_eq!(decoded.repaired, 2);
        assert!(data.rules.iter().all(|r| !r.id.is_empty()));
        assert_ne!(data.rules[0].id, data.rules[1].id);

        let used = vec![data.rules[0].id.clone()];
        assert_eq!(data.record_usage(&used, Utc::now()), 1);
        assert_eq!(data.rules[0].times_used, 1);
        assert_eq!(data.rules[1].times_used, 0);
    }

    #[test]
    fn test_repaired_rules_are_written_back_once() {
        let store = MemoryStore::default();
        store.items.borrow_mut().insert(
            RULES_KEY.to_string(),
            json!([{"name": "legacy", "urlPattern": "example.com"}]),
        );
        let repo = RuleRepository::new(store);

        let first = block_on(repo.load_rules()).unwrap();
        let second = block_on(repo.load_rules()).unwrap();

        assert_eq!(first, second);
        let stored = repo.store.items.borrow()[RULES_KEY].clone();
        assert_eq!(stored[0]["id"], json!(first.rules[0].id));
        assert!(stored[0]["createdAt"].is_string());
    }

    #[test]
    fn test_add_rule_appends() {
        let repo = RuleRepository::new(MemoryStore::default());

        block_on(repo.add_rule(create_test_rule("one"))).unwrap();
        let added = block_on(repo.add_rule(create_test_rule("two"))).unwrap();

        let loaded = block_on(repo.load_rules()).unwrap();
        assert_eq!(loaded.rules.len(), 2);
        assert_eq!(loaded.rules[1].id, added.id);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let repo = RuleRepository::new(MemoryStore {
            fail_writes: true,
            ..Default::default()
        });

        let err = block_on(repo.add_rule(create_test_rule("one"))).unwrap_err();
        assert!(matches!(err, BlurError::Persistence(_)));
    }

    #[test]
    fn test_install_defaults_keeps_existing_rules() {
        let repo = RuleRepository::new(MemoryStore::default());
        block_on(repo.add_rule(create_test_rule("keep me"))).unwrap();

        block_on(repo.install_defaults()).unwrap();

        assert_eq!(block_on(repo.load_rules()).unwrap().rules.len(), 1);
        assert_eq!(block_on(repo.load_settings()).unwrap(), Settings::default());
    }

    #[test]
    fn test_clear_all() {
        let repo = RuleRepository::new(MemoryStore::default());
        block_on(repo.add_rule(create_test_rule("gone"))).unwrap();
        block_on(repo.save_settings(&Settings {
            blur_enabled: false,
            ..Settings::default()
        }))
        .unwrap();

        block_on(repo.clear_all()).unwrap();

        assert!(block_on(repo.load_rules()).unwrap().rules.is_empty());
        assert!(block_on(repo.load_settings()).unwrap().blur_enabled);
    }
}
