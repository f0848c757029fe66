//! Request arguments sent to the REST API

use std::collections::BTreeMap;

/// Values that can be sent as a request argument
pub trait ToParam {
    fn to_param(&self) -> String;
}

impl ToParam for bool {
    fn to_param(&self) -> String {
        let value = if *self { "1" } else { "0" };
        value.to_string()
    }
}

impl ToParam for &str {
    fn to_param(&self) -> String {
        (*self).to_string()
    }
}

impl ToParam for String {
    fn to_param(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_to_param_display {
    ($($t:ty),*) => {
        $(
            impl ToParam for $t {
                fn to_param(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_to_param_display!(i32, i64, u16, u32, u64, usize, f64);

/// Ordered set of request arguments
///
/// Used for entity fields on create/update, dispatch options, and query
/// parameters alike. Later writes to the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, key: impl Into<String>, value: impl ToParam) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToParam) {
        self.0.insert(key.into(), value.to_param());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    /// Copy every argument of `other` into this set
    pub fn extend(&mut self, other: &Params) {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_pairs(&self) -> Vec<(&str, &str)> {
        self.iter().collect()
    }
}

impl<K: Into<String>, V: ToParam> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_encoding() {
        let params = Params::new()
            .set("is_visible", false)
            .set("is_scheduled", true)
            .set("dispatch.buckets", 100)
            .set("search", "search index=main");

        assert_eq!(params.get("is_visible"), Some("0"));
        assert_eq!(params.get("is_scheduled"), Some("1"));
        assert_eq!(params.get("dispatch.buckets"), Some("100"));
        assert_eq!(params.get("search"), Some("search index=main"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_extend_overrides() {
        let mut base = Params::new().set("count", 30).set("offset", 0);
        base.extend(&Params::new().set("count", 0));
        assert_eq!(base.get("count"), Some("0"));
        assert_eq!(base.get("offset"), Some("0"));
    }

    #[test]
    fn test_collect() {
        let params: Params = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(params.as_pairs(), vec![("a", "1"), ("b", "2")]);
    }
}
