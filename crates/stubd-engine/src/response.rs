//! Response specification: the entry a test author registers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status used when a spec does not name one.
pub const DEFAULT_STATUS: u16 = 200;

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// HTTP methods a spec can expect. Matching is exact, case-sensitive string
/// equality against the method the listener reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Update,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Update => "UPDATE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResponseSpec
// ---------------------------------------------------------------------------

/// One canned response (or observe pattern) registered by a test author.
///
/// Immutable once registered; consumed exactly once. `pattern` is interpreted
/// with standard regular-expression search semantics, unanchored; it only
/// has to be found somewhere inside the full request URL (path plus query
/// string).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub pattern: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl ResponseSpec {
    pub fn new(pattern: impl Into<String>, method: Method) -> Self {
        Self {
            pattern: pattern.into(),
            method,
            status: None,
            data: None,
            headers: None,
            status_text: None,
            delay_ms: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Status the delivery pass will write.
    pub fn status_or_default(&self) -> u16 {
        self.status.unwrap_or(DEFAULT_STATUS)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_defaults_to_200() {
        let spec = ResponseSpec::new("/widgets", Method::Get);
        assert_eq!(spec.status_or_default(), 200);
    }

    #[test]
    fn explicit_status_is_kept() {
        let spec = ResponseSpec::new("/widgets", Method::Get).with_status(401);
        assert_eq!(spec.status_or_default(), 401);
    }

    #[test]
    fn method_serializes_uppercase() {
        let json = serde_json::to_value(Method::Get).unwrap();
        assert_eq!(json, json!("GET"));
        let back: Method = serde_json::from_value(json!("UPDATE")).unwrap();
        assert_eq!(back, Method::Update);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let spec = ResponseSpec::new("/widgets", Method::Post);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, json!({"pattern": "/widgets", "method": "POST"}));
    }
}
