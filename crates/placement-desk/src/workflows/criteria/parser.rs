use super::normalizer::{normalize_key, normalize_value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SEPARATOR: char = ':';

/// Flat attribute name to raw value constraints lifted from one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaMapping(BTreeMap<String, String>);

impl CriteriaMapping {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Inserts a pair after normalizing it the same way the parser does.
    pub fn insert(&mut self, key: &str, value: &str) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        self.0.insert(key, normalize_value(value));
    }
}

impl<K, V> FromIterator<(K, V)> for CriteriaMapping
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = CriteriaMapping::default();
        for (key, value) in iter {
            mapping.insert(key.as_ref(), value.as_ref());
        }
        mapping
    }
}

/// Parses `key: value` lines. Lines without a separator are skipped and the last
/// occurrence of a repeated key wins.
pub fn parse_criteria(text: &str) -> CriteriaMapping {
    let mut mapping = CriteriaMapping::default();

    for line in text.lines() {
        if let Some((key, value)) = line.split_once(SEPARATOR) {
            mapping.insert(key, value);
        }
    }

    mapping
}
