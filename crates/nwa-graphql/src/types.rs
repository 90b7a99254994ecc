//! Plain data views of GraphQL execution state

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ResolverError;

/// One element of a response path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// An error in the `errors` list of a response
#[derive(Debug, Default, Serialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
    /// What a resolver failed with, if the error came from a resolver
    #[serde(skip)]
    pub source: Option<ResolverError>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Error raised by the resolver at `path`
    pub fn from_resolver(source: ResolverError, path: Vec<PathSegment>) -> Self {
        Self {
            message: source.to_string(),
            path,
            extensions: Map::new(),
            source: Some(source),
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }
}

/// Result of executing a GraphQL document
#[derive(Debug, Default, Serialize)]
pub struct ExecutionResult {
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl ExecutionResult {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: GraphQLError) -> Self {
        self.errors.push(error);
        self
    }
}

/// An object type of the schema
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field of an object type, named as in the source schema definition
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub deprecation_reason: Option<String>,
    /// Object type of the field, `None` for scalars
    pub type_def: Option<Arc<TypeDef>>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deprecation_reason: None,
            type_def: None,
        }
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    pub fn of_type(mut self, type_def: Arc<TypeDef>) -> Self {
        self.type_def = Some(type_def);
        self
    }
}

/// What a resolver knows about the field it resolves
#[derive(Clone, Debug, Default)]
pub struct ResolveInfo {
    /// Response path from the root operation field
    pub path: Vec<PathSegment>,
    /// `Query`, `Mutation` or `Subscription`
    pub root_type: String,
    pub parent_type: String,
    pub field_name: String,
    /// Deprecation reason of the field in its parent type
    pub field_deprecation: Option<String>,
}

impl ResolveInfo {
    /// Path joined with `/`
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(PathSegment::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_serialization() {
        let error = GraphQLError::new("boom")
            .with_path(vec!["subscriptions".into(), PathSegment::Index(0), "name".into()])
            .with_extension("error_type", json!("internal_error"));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"message": "boom", "path": ["subscriptions", 0, "name"], "extensions": {"error_type": "internal_error"}})
        );
        assert_eq!(
            serde_json::to_value(GraphQLError::new("plain")).unwrap(),
            json!({"message": "plain"})
        );
    }

    #[test]
    fn test_path_string() {
        let info = ResolveInfo {
            path: vec!["latestQuery".into(), PathSegment::Index(2), "outdated".into()],
            ..Default::default()
        };
        assert_eq!(info.path_string(), "latestQuery/2/outdated");
    }
}
