//! Swagger security definition scope checks

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::{AuthError, quoted_set};

const HTTP_READ_METHODS: [&str; 3] = ["get", "head", "options"];

/// Scope requirements derived from swagger security definitions.
///
/// When any definition declares a `read` scope, read requests need it; the
/// same holds for `write` and all other requests. Operations listed under
/// `x-scopes-operation-ids` additionally need their own scope.
#[derive(Clone, Debug, Default)]
pub struct Scopes {
    requires_read: bool,
    requires_write: bool,
    operation_scopes: BTreeMap<String, String>,
}

fn definitions(security_definitions: &Value) -> Vec<&Value> {
    match security_definitions {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn declared_scopes(definition: &Value) -> Vec<&str> {
    match definition.get("scopes") {
        Some(Value::Object(scopes)) => scopes.keys().map(String::as_str).collect(),
        Some(Value::Array(scopes)) => scopes.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

impl Scopes {
    pub fn new(security_definitions: &Value) -> Self {
        let definitions = definitions(security_definitions);

        let unique: BTreeSet<&str> = definitions.iter().flat_map(|d| declared_scopes(*d)).collect();

        let mut operation_scopes = BTreeMap::new();
        for definition in &definitions {
            let Some(entries) = definition
                .get("x-scopes-operation-ids")
                .and_then(Value::as_array)
            else {
                continue;
            };
            for entry in entries.iter().filter_map(Value::as_object) {
                let Some((scope, endpoints)) = entry.iter().next() else {
                    continue;
                };
                for endpoint in endpoints.as_array().into_iter().flatten() {
                    if let Some(endpoint) = endpoint.as_str() {
                        operation_scopes.insert(endpoint.to_string(), scope.clone());
                    }
                }
            }
        }

        Self {
            requires_read: unique.contains("read"),
            requires_write: unique.contains("write"),
            operation_scopes,
        }
    }

    pub fn requires_read(&self) -> bool {
        self.requires_read
    }

    pub fn requires_write(&self) -> bool {
        self.requires_write
    }

    /// Check the token scopes for a request
    pub fn is_allowed(
        &self,
        user_scopes: &BTreeSet<String>,
        method: &str,
        endpoint: &str,
    ) -> Result<(), AuthError> {
        let read_request = HTTP_READ_METHODS.contains(&method.to_ascii_lowercase().as_str());
        let mut required = BTreeSet::new();

        if read_request && self.requires_read && !user_scopes.contains("read") {
            required.insert("read".to_string());
        }
        if !read_request && self.requires_write && !user_scopes.contains("write") {
            required.insert("write".to_string());
        }

        if required.is_empty() {
            let operation = self
                .operation_scopes
                .iter()
                .find(|(operation, _)| endpoint.ends_with(operation.as_str()));
            if let Some((_, scope)) = operation {
                if !user_scopes.contains(scope) {
                    required.insert(scope.clone());
                }
            }
        }

        if required.is_empty() {
            return Ok(());
        }
        let missing: BTreeSet<&String> = required.difference(user_scopes).collect();
        Err(AuthError::Forbidden(format!(
            "Provided token does not have the required scope(s): {}",
            quoted_set(missing)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes() -> Scopes {
        Scopes::new(&json!({
            "oauth2": {
                "type": "oauth2",
                "scopes": {"read": "Read access", "write": "Write access", "admin": "Admin access"},
                "x-scopes-operation-ids": [{"admin": ["delete_subscription", "hello"]}]
            }
        }))
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn denied(result: Result<(), AuthError>) -> String {
        result.unwrap_err().description()
    }

    #[test]
    fn test_read_and_write_requirements() {
        let s = scopes();
        assert!(s.requires_read());
        assert!(s.requires_write());

        assert!(s.is_allowed(&set(&["read"]), "GET", "products").is_ok());
        assert_eq!(
            denied(s.is_allowed(&set(&["admin"]), "GET", "products")),
            "Provided token does not have the required scope(s): {'read'}"
        );
        assert_eq!(
            denied(s.is_allowed(&set(&["read"]), "POST", "products")),
            "Provided token does not have the required scope(s): {'write'}"
        );
        assert!(s.is_allowed(&set(&["write"]), "options", "products").is_err());
    }

    #[test]
    fn test_operation_scopes() {
        let s = scopes();
        assert!(s.is_allowed(&set(&["read", "admin"]), "GET", "hello").is_ok());
        assert_eq!(
            denied(s.is_allowed(&set(&["read"]), "GET", "app.hello")),
            "Provided token does not have the required scope(s): {'admin'}"
        );
        assert_eq!(
            denied(s.is_allowed(&set(&["write"]), "DELETE", "hello")),
            "Provided token does not have the required scope(s): {'admin'}"
        );
    }

    #[test]
    fn test_no_declared_scopes() {
        let s = Scopes::new(&json!([{"type": "apiKey"}]));
        assert!(s.is_allowed(&BTreeSet::new(), "DELETE", "anything").is_ok());
    }
}
