//! The structured value tree exchanged with device services.
//!
//! Every request and response on a service connection is a [`Value`]: a
//! tagged variant that can hold scalars, byte blobs, arrays, and ordered
//! string-keyed dictionaries.  The same tree is used for opaque payloads
//! such as the springboard icon state, whose schema belongs to the device.
//!
//! # Ordering (for beginners)
//!
//! A [`Dictionary`] remembers the order in which keys were inserted.  This
//! matters because the device sends layouts whose key order is meaningful to
//! humans reading a dump, and because the codec must reproduce the exact
//! bytes it was given.  A `HashMap` alone would shuffle keys; a `BTreeMap`
//! would sort them.  `Dictionary` keeps a `Vec` of `(key, value)` pairs in
//! order, with a `HashMap` beside it for lookups.

pub mod codec;

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use codec::{decode, encode, CodecError};

// ── Value ─────────────────────────────────────────────────────────────────────

/// A self-describing structured value.
///
/// `Integer` and `Real` are distinct tags: `Value::Integer(1)` never compares
/// equal to `Value::Real(1.0)`, and the codec preserves the distinction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Data(Vec<u8>),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Date(Date),
}

impl Value {
    /// Short lowercase name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Data(_) => "data",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Value::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Consumes the value and returns the dictionary, or gives the value back.
    pub fn into_dictionary(self) -> Result<Dictionary, Value> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other => Err(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::Dictionary(d)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Value::Date(d)
    }
}

// ── Dictionary ────────────────────────────────────────────────────────────────

/// An insertion-ordered mapping from string keys to [`Value`]s.
///
/// Keys are unique.  Inserting an existing key replaces its value in place
/// without moving it.  Entries live in a `Vec`; a `HashMap` from key to
/// position keeps lookups constant-time for the large dictionaries a device
/// can send.
#[derive(Clone, Default)]
pub struct Dictionary {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts `value` under `key`, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(&pos) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Inserts a key that must not be present yet.  On a duplicate the
    /// dictionary is left unchanged and the rejected entry is handed back.
    pub fn try_insert(&mut self, key: String, value: Value) -> Result<(), (String, Value)> {
        if self.index.contains_key(&key) {
            return Err((key, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let pos = *self.index.get(key)?;
        Some(&mut self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// Equality follows the ordered entries; the index is derived from them.
impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for Dictionary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Dictionary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<(String, Value)>::deserialize(deserializer)?;
        let mut dict = Dictionary::with_capacity(entries.len());
        for (key, value) in entries {
            dict.try_insert(key, value)
                .map_err(|(key, _)| <D::Error as serde::de::Error>::custom(format!("duplicate dictionary key: {key:?}")))?;
        }
        Ok(dict)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ── Date ──────────────────────────────────────────────────────────────────────

/// A point in time with microsecond precision.
///
/// Stored as signed microseconds since the Unix epoch so that dates before
/// 1970 are representable and round trips are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date {
    unix_micros: i64,
}

impl Date {
    pub const fn from_unix_micros(unix_micros: i64) -> Self {
        Self { unix_micros }
    }

    pub const fn unix_micros(&self) -> i64 {
        self.unix_micros
    }

    /// Converts a [`SystemTime`], saturating at the `i64` range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let unix_micros = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_micros()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_micros())
                .map(|m| -m)
                .unwrap_or(i64::MIN),
        };
        Self { unix_micros }
    }

    pub fn to_system_time(&self) -> SystemTime {
        let magnitude = Duration::from_micros(self.unix_micros.unsigned_abs());
        if self.unix_micros >= 0 {
            UNIX_EPOCH + magnitude
        } else {
            UNIX_EPOCH - magnitude
        }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_preserves_insertion_order() {
        // Arrange
        let mut dict = Dictionary::new();

        // Act
        dict.insert("zeta", 1);
        dict.insert("alpha", 2);
        dict.insert("mu", 3);

        // Assert
        let keys: Vec<&str> = dict.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mu"]);
    }

    #[test]
    fn test_dictionary_insert_existing_key_replaces_in_place() {
        // Arrange
        let mut dict: Dictionary = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();

        // Act
        let previous = dict.insert("b", "replaced");

        // Assert
        assert_eq!(previous, Some(Value::Integer(2)));
        assert_eq!(dict.len(), 3);
        let keys: Vec<&str> = dict.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(dict.get("b"), Some(&Value::from("replaced")));
    }

    #[test]
    fn test_dictionary_remove_keeps_remaining_order() {
        let mut dict: Dictionary = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();

        assert_eq!(dict.remove("a"), Some(Value::Integer(1)));
        assert_eq!(dict.remove("missing"), None);

        let keys: Vec<&str> = dict.keys().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_dictionary_with_same_entries_in_different_order_is_not_equal() {
        let a: Dictionary = [("x", 1), ("y", 2)].into_iter().collect();
        let b: Dictionary = [("y", 2), ("x", 1)].into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_integer_and_real_are_distinct() {
        assert_ne!(Value::Integer(1), Value::Real(1.0));
        assert_eq!(Value::Integer(1).as_real(), None);
        assert_eq!(Value::Real(1.0).as_integer(), None);
    }

    #[test]
    fn test_value_accessors_return_none_for_other_variants() {
        let v = Value::from("text");
        assert_eq!(v.as_str(), Some("text"));
        assert!(v.as_boolean().is_none());
        assert!(v.as_data().is_none());
        assert!(v.as_array().is_none());
        assert!(v.as_dictionary().is_none());
        assert_eq!(v.type_name(), "string");
    }

    #[test]
    fn test_into_dictionary_returns_original_value_on_mismatch() {
        let v = Value::Array(vec![Value::Null]);
        let back = v.clone().into_dictionary().unwrap_err();
        assert_eq!(back, v);
    }

    #[test]
    fn test_date_round_trips_through_system_time() {
        // Arrange
        let date = Date::from_unix_micros(1_700_000_000_123_456);

        // Act
        let restored = Date::from_system_time(date.to_system_time());

        // Assert
        assert_eq!(restored, date);
    }

    #[test]
    fn test_date_before_epoch_round_trips_through_system_time() {
        let date = Date::from_unix_micros(-978_307_200_000_000);
        assert_eq!(Date::from_system_time(date.to_system_time()), date);
    }

    #[test]
    fn test_value_json_round_trip_keeps_integer_real_distinction_and_order() {
        // Arrange
        let mut dict = Dictionary::new();
        dict.insert("count", 3);
        dict.insert("ratio", 3.0);
        dict.insert("blob", Value::Data(vec![0, 1, 255]));
        let original = Value::Dictionary(dict);

        // Act
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: Value = serde_json::from_str(&json).expect("deserialize");

        // Assert
        assert_eq!(restored, original);
    }

    #[test]
    fn test_dictionary_remove_then_lookup_uses_shifted_positions() {
        // Arrange
        let mut dict: Dictionary = [("a", 1), ("b", 2), ("c", 3), ("d", 4)].into_iter().collect();

        // Act
        dict.remove("b");
        dict.insert("c", 30);

        // Assert
        assert_eq!(dict.get("a"), Some(&Value::Integer(1)));
        assert_eq!(dict.get("c"), Some(&Value::Integer(30)));
        assert_eq!(dict.get("d"), Some(&Value::Integer(4)));
        assert!(!dict.contains_key("b"));
        let keys: Vec<&str> = dict.keys().collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_dictionary_try_insert_rejects_existing_key() {
        let mut dict: Dictionary = [("a", 1)].into_iter().collect();

        let rejected = dict.try_insert("a".to_string(), Value::Integer(2));

        assert_eq!(rejected, Err(("a".to_string(), Value::Integer(2))));
        assert_eq!(dict.get("a"), Some(&Value::Integer(1)));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_dictionary_json_with_duplicate_key_is_rejected() {
        // Arrange – a hand-edited layout repeating a key
        let json = r#"{"Dictionary":[["a",{"Integer":1}],["a",{"Integer":2}]]}"#;

        // Act
        let result = serde_json::from_str::<Value>(json);

        // Assert
        let err = result.unwrap_err();
        assert!(err.to_string().contains("duplicate dictionary key"), "{err}");
    }

    #[test]
    fn test_dictionary_json_keeps_the_pair_list_shape() {
        let dict: Dictionary = [("b", 1), ("a", 2)].into_iter().collect();

        let json = serde_json::to_string(&dict).expect("serialize");

        assert_eq!(json, r#"[["b",{"Integer":1}],["a",{"Integer":2}]]"#);
    }
}
