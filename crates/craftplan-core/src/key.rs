//! Canonical identity for item instances.
//!
//! An [`ItemKey`] names an item by id, optionally narrowed to one variant by
//! `meta` and/or arbitrary structured `nbt` data. Keys are compared through
//! their [`fingerprint`](ItemKey::fingerprint), a deterministic string that
//! does not depend on the insertion order of object fields inside `nbt`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write as _};

/// Separator placed between the id, meta, and nbt parts of a fingerprint.
pub const FINGERPRINT_SEPARATOR: &str = "::";

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Variant discriminator for an item id (damage value, variant name, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Meta {
    Int(i64),
    Text(String),
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meta::Int(v) => write!(f, "{v}"),
            Meta::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Meta {
    fn from(v: i64) -> Self {
        Meta::Int(v)
    }
}

impl From<i32> for Meta {
    fn from(v: i32) -> Self {
        Meta::Int(i64::from(v))
    }
}

impl From<&str> for Meta {
    fn from(v: &str) -> Self {
        Meta::Text(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// ItemKey
// ---------------------------------------------------------------------------

/// Identifies an item, either exactly (meta and/or nbt present) or as a
/// wildcard over every variant of `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemKey {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbt: Option<Value>,
}

impl ItemKey {
    /// A wildcard key for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: None,
            nbt: None,
        }
    }

    pub fn with_meta(mut self, meta: impl Into<Meta>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn with_nbt(mut self, nbt: Value) -> Self {
        self.nbt = Some(nbt);
        self
    }

    /// Canonical identity string. See [`fingerprint_parts`].
    pub fn fingerprint(&self) -> String {
        fingerprint_parts(&self.id, self.meta.as_ref(), self.nbt.as_ref())
    }

    /// True when the key pins a specific variant (meta or nbt present).
    pub fn is_exact(&self) -> bool {
        self.meta.is_some() || self.nbt.is_some()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)?;
        if let Some(meta) = &self.meta {
            write!(f, "@{meta}")?;
        }
        if let Some(nbt) = &self.nbt {
            write!(f, "{}", stable_json(nbt))?;
        }
        Ok(())
    }
}

/// Build a fingerprint from loose parts: `id::meta::nbt`, with an empty meta
/// segment when absent and `null` when there is no nbt.
pub fn fingerprint_parts(id: &str, meta: Option<&Meta>, nbt: Option<&Value>) -> String {
    let meta = meta.map(Meta::to_string).unwrap_or_default();
    let nbt = nbt.map(stable_json).unwrap_or_else(|| "null".to_string());
    format!("{id}{FINGERPRINT_SEPARATOR}{meta}{FINGERPRINT_SEPARATOR}{nbt}")
}

// ---------------------------------------------------------------------------
// Canonical JSON
// ---------------------------------------------------------------------------

/// Compact JSON with object keys sorted recursively. Arrays keep their order.
pub fn stable_json(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::from(key.as_str()));
                write_stable(item, out);
            }
            out.push('}');
        }
        Value::Number(n) => match n.as_f64() {
            // Integral floats print as integers, so `1.0` and `1` agree.
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
                let _ = write!(out, "{}", f as i64);
            }
            _ => {
                let _ = write!(out, "{n}");
            }
        },
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Largest float whose integer value is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wildcard_fingerprint_shape() {
        assert_eq!(ItemKey::new("minecraft:stone").fingerprint(), "minecraft:stone::::null");
    }

    #[test]
    fn meta_is_part_of_identity() {
        let a = ItemKey::new("wool").with_meta(1);
        let b = ItemKey::new("wool").with_meta(2);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), "wool::1::null");
    }

    #[test]
    fn nbt_key_order_does_not_matter() {
        let a = ItemKey::new("potion").with_nbt(json!({"b": 1, "a": {"y": [1, 2], "x": "s"}}));
        let b = ItemKey::new("potion").with_nbt(json!({"a": {"x": "s", "y": [1, 2]}, "b": 1}));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn nbt_array_order_matters() {
        let a = ItemKey::new("potion").with_nbt(json!({"list": [1, 2]}));
        let b = ItemKey::new("potion").with_nbt(json!({"list": [2, 1]}));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn stable_json_sorts_nested_keys() {
        let v = json!({"z": {"b": true, "a": null}, "a": "q\"uote"});
        assert_eq!(stable_json(&v), r#"{"a":"q\"uote","z":{"a":null,"b":true}}"#);
    }

    #[test]
    fn integral_floats_match_integers() {
        let int: ItemKey = serde_json::from_str(r#"{"id":"p","nbt":{"lvl":1}}"#).unwrap();
        let float: ItemKey = serde_json::from_str(r#"{"id":"p","nbt":{"lvl":1.0}}"#).unwrap();
        assert_eq!(int.fingerprint(), float.fingerprint());
        assert_eq!(int.fingerprint(), r#"p::::{"lvl":1}"#);

        assert_eq!(stable_json(&json!([-0.0, 2.5, 1e3])), "[0,2.5,1000]");
        let half: ItemKey = serde_json::from_str(r#"{"id":"p","nbt":{"lvl":1.5}}"#).unwrap();
        assert_ne!(int.fingerprint(), half.fingerprint());
    }

    #[test]
    fn exactness() {
        assert!(!ItemKey::new("a").is_exact());
        assert!(ItemKey::new("a").with_meta("red").is_exact());
        assert!(ItemKey::new("a").with_nbt(json!({})).is_exact());
    }

    #[test]
    fn deserializes_int_and_text_meta() {
        let a: ItemKey = serde_json::from_str(r#"{"id":"a","meta":3}"#).unwrap();
        let b: ItemKey = serde_json::from_str(r#"{"id":"a","meta":"red"}"#).unwrap();
        assert_eq!(a.meta, Some(Meta::Int(3)));
        assert_eq!(b.meta, Some(Meta::Text("red".into())));
    }
}
