//! Header schemas.
//!
//! Headers are flat and carry only strings, so a header schema is a map from
//! lowercased header name to a "required" flag. Merging is a per-key OR: a
//! header is required if any contributor requires it.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tessera_core::GenericError;

/// A flat `name -> required` header schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSchema(IndexMap<String, bool>);

impl HeaderSchema {
    /// Creates an empty header schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required header.
    #[must_use]
    pub fn required(self, name: impl AsRef<str>) -> Self {
        self.header(name, true)
    }

    /// Declares an optional header.
    #[must_use]
    pub fn optional(self, name: impl AsRef<str>) -> Self {
        self.header(name, false)
    }

    /// Declares a header with an explicit flag. Names are case-insensitive.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, required: bool) -> Self {
        self.0.insert(name.as_ref().to_ascii_lowercase(), required);
        self
    }

    /// Returns `Some(required)` if `name` is declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(&name.to_ascii_lowercase()).copied()
    }

    /// Returns `true` if no header is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over declared headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, required)| (name.as_str(), *required))
    }

    /// Validates a header map, returning an object keyed by declared name.
    ///
    /// Absent optional headers resolve to `null`.
    ///
    /// # Errors
    ///
    /// Returns a missing-field error for the first absent required header.
    pub fn validate(&self, headers: &IndexMap<String, String>) -> Result<Value, GenericError> {
        let mut output = Map::with_capacity(self.0.len());
        for (name, required) in &self.0 {
            let found = headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| Value::String(value.clone()));
            match found {
                Some(value) => {
                    output.insert(name.clone(), value);
                }
                None if *required => return Err(GenericError::missing_field(name.as_str())),
                None => {
                    output.insert(name.clone(), Value::Null);
                }
            }
        }
        Ok(Value::Object(output))
    }
}

impl<S: AsRef<str>> FromIterator<(S, bool)> for HeaderSchema {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |schema, (name, required)| schema.header(name, required))
    }
}

/// Merges header schemas with per-key OR semantics.
#[must_use]
pub fn merge_header_schemas(schemas: &[HeaderSchema]) -> HeaderSchema {
    let mut merged = IndexMap::new();
    for schema in schemas {
        for (name, required) in &schema.0 {
            let entry = merged.entry(name.clone()).or_insert(false);
            *entry |= *required;
        }
    }
    HeaderSchema(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_core::ErrorKind;

    fn headers(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_merge_is_or() {
        let merged = merge_header_schemas(&[
            HeaderSchema::new().required("a"),
            HeaderSchema::new().optional("a"),
        ]);
        assert_eq!(merged, HeaderSchema::new().required("a"));

        let merged = merge_header_schemas(&[
            HeaderSchema::new().optional("a"),
            HeaderSchema::new().optional("a").required("b"),
        ]);
        assert_eq!(merged.get("a"), Some(false));
        assert_eq!(merged.get("b"), Some(true));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let schema = HeaderSchema::new().required("X-Request-Id");
        assert_eq!(schema.get("x-request-id"), Some(true));

        let value = schema
            .validate(&headers(&[("X-REQUEST-ID", "abc")]))
            .unwrap();
        assert_eq!(value, json!({"x-request-id": "abc"}));
    }

    #[test]
    fn test_missing_required_header() {
        let schema = HeaderSchema::new().required("authorization");
        let error = schema.validate(&IndexMap::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingField);
        assert_eq!(error.data()["path"], "authorization");
    }

    #[test]
    fn test_missing_optional_header_is_null() {
        let schema: HeaderSchema = [("accept", false)].into_iter().collect();
        assert_eq!(
            schema.validate(&IndexMap::new()).unwrap(),
            json!({"accept": null})
        );
    }
}
