//! Insertion-ordered descriptor name → value table.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Descriptor values for one structure, in the order they were computed.
///
/// A missing key means the value was not computed (for example a 3D group
/// whose embedding failed), which is distinct from a computed zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorTable {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. Overwriting keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    pub fn extend<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (name, value) in items {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, f64)> for DescriptorTable {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut table = DescriptorTable::new();
        table.extend(iter);
        table
    }
}

// ---------------------------------------------------------------------------
// Serde: a JSON object in insertion order; NaN travels as null
// ---------------------------------------------------------------------------

impl Serialize for DescriptorTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            let value = v.is_finite().then_some(*v);
            map.serialize_entry(k, &value)?;
        }
        map.end()
    }
}

struct TableVisitor;

impl<'de> Visitor<'de> for TableVisitor {
    type Value = DescriptorTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of descriptor names to numbers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = DescriptorTable::new();
        while let Some((k, v)) = access.next_entry::<String, Option<f64>>()? {
            table.insert(k, v.unwrap_or(f64::NAN));
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for DescriptorTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_overwrites_in_place() {
        let mut t = DescriptorTable::new();
        t.insert("b", 1.0);
        t.insert("a", 2.0);
        t.insert("b", 3.0);
        assert_eq!(t.names().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(t.get("b"), Some(3.0));
        assert_eq!(t.get("zzz"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn json_preserves_order_and_nan() {
        let mut t = DescriptorTable::new();
        t.insert("MolWt", 46.07);
        t.insert("MaxPartialCharge", f64::NAN);
        t.insert("AliphaticRings", 0.0);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"MolWt":46.07,"MaxPartialCharge":null,"AliphaticRings":0.0}"#);
        let back: DescriptorTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names().collect::<Vec<_>>(), t.names().collect::<Vec<_>>());
        assert!(back.get("MaxPartialCharge").unwrap().is_nan());
    }
}
