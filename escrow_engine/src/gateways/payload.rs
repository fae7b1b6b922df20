use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateways::GatewayError;

/// A flat set of string fields, as posted by (or sent to) a payment gateway.
///
/// Gateways post either `application/x-www-form-urlencoded` bodies or JSON objects. Both are flattened into the same
/// shape so that signatures are always computed over exactly the same strings, whatever the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayPayload {
    fields: BTreeMap<String, String>,
}

impl GatewayPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a urlencoded form body. `+` decodes to a space.
    pub fn from_form(body: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        Self { fields }
    }

    /// Parses a JSON object body. Booleans become `"true"`/`"false"`, numbers are written as they appear, and `null`
    /// becomes an empty string.
    pub fn from_json(body: &[u8]) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(GatewayError::MalformedPayload("Expected a JSON object".into()));
        };
        let fields = map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Ok(Self { fields })
    }

    /// Picks the parser from the request content type. Anything that is not JSON is treated as a form body.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Result<Self, GatewayError> {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => Self::from_json(body),
            _ => Ok(Self::from_form(body)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    /// The value of the field, or an empty string if it is missing.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// The trimmed, non-empty value of a field that must be present.
    pub fn required(&self, key: &'static str) -> Result<&str, GatewayError> {
        self.get(key).map(str::trim).filter(|s| !s.is_empty()).ok_or(GatewayError::MissingField(key))
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// A copy of the payload without the given field. Used to strip the signature before recomputing it.
    pub fn without(&self, key: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(key);
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GatewayPayload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let fields = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { fields }
    }
}
