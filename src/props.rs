//! The property bag: an opaque, order-preserving string-to-string
//! dictionary exchanged alongside SDP.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered key-value dictionary serialized as a JSON object under the
/// `props` field of a wire message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props {
    entries: IndexMap<String, String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overwrites a key, preserving its original insertion position
    /// on overwrite.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Props {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: IndexMap::from_iter(iter),
        }
    }
}

impl<'a> IntoIterator for &'a Props {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<indexmap::map::Iter<'a, String, String>, fn((&'a String, &'a String)) -> (&'a str, &'a str)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut props = Props::new();
        props.add("b", "2").add("a", "1").add("c", "3");

        let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut props = Props::new();
        props.add("a", "1").add("b", "2").add("a", "9");

        let entries: Vec<(&str, &str)> = props.iter().collect();
        assert_eq!(entries, vec![("a", "9"), ("b", "2")]);
    }

    #[test]
    fn roundtrips_through_json() {
        let mut props = Props::new();
        props.add("sdp-fmt", "vp8").add("audio", "opus");

        let json = serde_json::to_string(&props).unwrap();
        let back: Props = serde_json::from_str(&json).unwrap();
        assert_eq!(props, back);
    }
}
