//! Intent → method mapping and parameter transforms.
//!
//! The table is fixed at construction time, so lookups are pure. Each entry
//! names the MCP method an intent translates to, the key renames its
//! parameters undergo, and the fields the downstream method requires. An
//! intent without an entry is a defined error (`UnmappedIntent`), never a
//! best-effort conversion.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// One configured intent translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMapping {
    pub intent: String,
    pub method: String,
    /// ANP parameter key → MCP parameter key. Keys not listed pass through
    /// unchanged.
    #[serde(default)]
    pub renames: HashMap<String, String>,
    /// ANP-side parameter names the downstream method requires. Absence of
    /// any of them fails the transform with `InvalidParameters`.
    #[serde(default)]
    pub required: Vec<String>,
}

impl IntentMapping {
    /// Apply the declarative transform to a set of ANP parameters.
    pub fn apply(&self, parameters: &Map<String, Value>) -> BridgeResult<Map<String, Value>> {
        for field in &self.required {
            if !parameters.contains_key(field) {
                return Err(BridgeError::InvalidParameters(format!(
                    "intent '{}' requires parameter '{}'",
                    self.intent, field
                )));
            }
        }

        let mut out = Map::with_capacity(parameters.len());
        for (key, value) in parameters {
            let target = self.renames.get(key).unwrap_or(key);
            out.insert(target.clone(), value.clone());
        }
        Ok(out)
    }
}

/// Immutable intent → mapping table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct IntentMap {
    entries: HashMap<String, IntentMapping>,
}

impl IntentMap {
    pub fn new(mappings: Vec<IntentMapping>) -> Self {
        let entries = mappings.into_iter().map(|m| (m.intent.clone(), m)).collect();
        Self { entries }
    }

    /// The built-in table, mirroring the service's stock capabilities.
    pub fn builtin() -> Self {
        let renames: HashMap<String, String> = [
            ("user_id", "userId"),
            ("order_id", "orderId"),
            ("page_size", "pageSize"),
            ("page_num", "pageNum"),
            ("city", "cityName"),
            ("date", "queryDate"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        let entry = |intent: &str, method: &str, required: &[&str]| IntentMapping {
            intent: intent.to_string(),
            method: method.to_string(),
            renames: renames.clone(),
            required: required.iter().map(|s| s.to_string()).collect(),
        };

        Self::new(vec![
            entry("查询天气", "getWeather", &["city"]),
            entry("获取天气预报", "getWeatherForecast", &["city"]),
            entry("获取天气预警", "getWeatherAlert", &["city"]),
            entry("查询用户信息", "getUserInfo", &["user_id"]),
            entry("更新用户信息", "updateUserInfo", &["user_id"]),
            entry("查询订单", "getOrderInfo", &["order_id"]),
            entry("创建订单", "createOrder", &[]),
            entry("处理支付", "processPayment", &["order_id"]),
        ])
    }

    /// Load a table from a JSON file: an array of `IntentMapping` objects.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mappings: Vec<IntentMapping> = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.display(), entries = mappings.len(), "intent map loaded");
        Ok(Self::new(mappings))
    }

    /// Look up the mapping for an intent, or fail with `UnmappedIntent`.
    pub fn resolve(&self, intent: &str) -> BridgeResult<&IntentMapping> {
        self.entries
            .get(intent)
            .ok_or_else(|| BridgeError::UnmappedIntent(intent.to_string()))
    }

    /// All entries as `(intent, method)` pairs, sorted by method name, for
    /// the capabilities endpoint.
    pub fn listing(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .entries
            .values()
            .map(|m| (m.intent.clone(), m.method.clone()))
            .collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1));
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn resolve_is_total_over_the_builtin_table() {
        let map = IntentMap::builtin();
        for (intent, method) in map.listing() {
            assert_eq!(map.resolve(&intent).unwrap().method, method);
        }
        assert_eq!(map.resolve("查询用户信息").unwrap().method, "getUserInfo");
    }

    #[test]
    fn unmapped_intent_is_a_defined_error() {
        let map = IntentMap::builtin();
        let err = map.resolve("跳一支舞").unwrap_err();
        assert!(matches!(err, BridgeError::UnmappedIntent(_)));
    }

    #[test]
    fn apply_renames_declared_keys_and_passes_others_through() {
        let map = IntentMap::builtin();
        let mapping = map.resolve("查询用户信息").unwrap();
        let out = mapping
            .apply(&params(json!({"user_id": "12345", "fields": ["name", "age"]})))
            .unwrap();
        assert_eq!(out["userId"], "12345");
        assert_eq!(out["fields"], json!(["name", "age"]));
        assert!(!out.contains_key("user_id"));
    }

    #[test]
    fn apply_rejects_missing_required_field() {
        let map = IntentMap::builtin();
        let mapping = map.resolve("查询订单").unwrap();
        let err = mapping.apply(&params(json!({"page_size": 10}))).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameters(_)));
    }

    #[test]
    fn json_table_round_trips_through_serde() {
        let raw = json!([
            {"intent": "查询库存", "method": "getInventory",
             "renames": {"sku_id": "skuId"}, "required": ["sku_id"]}
        ]);
        let mappings: Vec<IntentMapping> = serde_json::from_value(raw).unwrap();
        let map = IntentMap::new(mappings);
        let mapping = map.resolve("查询库存").unwrap();
        assert_eq!(mapping.method, "getInventory");
        let out = mapping.apply(&params(json!({"sku_id": "S-1"}))).unwrap();
        assert_eq!(out["skuId"], "S-1");
    }
}
