//! Logging of deprecated GraphQL paths and fields

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{FieldDef, ResolveInfo, TypeDef};

/// Deprecated paths such as `latestQuery/outdated` mapped to their reasons
pub type DeprecatedPaths = BTreeMap<String, String>;

/// `snake_case` to `camelCase`
pub fn to_camel(s: &str) -> String {
    let mut words = s.split('_');
    let mut out = words.next().unwrap_or_default().to_string();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Find all deprecated paths below `type_def`.
///
/// Fields of deprecated fields are not inspected further.
pub fn get_deprecated_paths(type_def: &TypeDef) -> DeprecatedPaths {
    let mut to_inspect: Vec<(Vec<String>, &[FieldDef])> = vec![(Vec::new(), type_def.fields.as_slice())];
    let mut deprecated = DeprecatedPaths::new();

    while let Some((path, fields)) = to_inspect.pop() {
        for field in fields {
            let mut field_path = path.clone();
            field_path.push(to_camel(&field.name));
            if let Some(reason) = field.deprecation_reason.as_ref().filter(|r| !r.is_empty()) {
                deprecated.insert(field_path.join("/"), reason.clone());
            } else if let Some(nested) = field.type_def.as_deref().filter(|t| !t.fields.is_empty()) {
                to_inspect.push((field_path, nested.fields.as_slice()));
            }
        }
    }
    deprecated
}

/// A deprecated thing a query used
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeprecatedUse {
    Path {
        root_type: String,
        path: String,
        reason: String,
    },
    Field {
        field: String,
        parent_type: String,
        path: String,
        reason: String,
    },
}

/// Checks resolved fields against the deprecated query and mutation paths
#[derive(Clone, Debug, Default)]
pub struct DeprecationChecker {
    deprecated_queries: DeprecatedPaths,
    deprecated_mutations: DeprecatedPaths,
}

impl DeprecationChecker {
    pub fn new(query: Option<&TypeDef>, mutation: Option<&TypeDef>) -> Self {
        let deprecated_queries = query.map(get_deprecated_paths).unwrap_or_default();
        let deprecated_mutations = mutation.map(get_deprecated_paths).unwrap_or_default();

        debug!(
            queries = %deprecated_queries.keys().cloned().collect::<Vec<_>>().join(","),
            mutations = %deprecated_mutations.keys().cloned().collect::<Vec<_>>().join(","),
            "Deprecations"
        );

        Self {
            deprecated_queries,
            deprecated_mutations,
        }
    }

    pub fn deprecated_queries(&self) -> &DeprecatedPaths {
        &self.deprecated_queries
    }

    pub fn deprecated_mutations(&self) -> &DeprecatedPaths {
        &self.deprecated_mutations
    }

    /// Log a warning when the resolved field is deprecated
    pub fn check(&self, info: &ResolveInfo) -> Option<DeprecatedUse> {
        let path = info.path_string();
        let reason = match info.root_type.as_str() {
            "Query" => self.deprecated_queries.get(&path),
            "Mutation" => self.deprecated_mutations.get(&path),
            _ => None,
        };

        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            warn!(root_type = %info.root_type, path = %path, deprecation_reason = ?reason, "Use of deprecated path");
            return Some(DeprecatedUse::Path {
                root_type: info.root_type.clone(),
                path,
                reason: reason.clone(),
            });
        }

        let reason = info.field_deprecation.as_ref().filter(|r| !r.is_empty())?;
        warn!(
            field = %info.field_name,
            parent_type = %info.parent_type,
            path = %path,
            deprecation_reason = ?reason,
            "Use of deprecated field"
        );
        Some(DeprecatedUse::Field {
            field: info.field_name.clone(),
            parent_type: info.parent_type.clone(),
            path,
            reason: reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_camel() {
        assert_eq!(to_camel("latest_query"), "latestQuery");
        assert_eq!(to_camel("subscription_id_list"), "subscriptionIdList");
        assert_eq!(to_camel("name"), "name");
        assert_eq!(to_camel("shout_LOUD"), "shoutLoud");
        assert_eq!(to_camel(""), "");
    }
}
