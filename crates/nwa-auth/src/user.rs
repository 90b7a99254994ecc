//! Attributes of an authenticated user as returned by the token check

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// URN prefix of SAB role entitlements
pub const SAB_ROLE_URN: &str = "urn:mace:surfnet.nl:surfnet.nl:sab:role:";
/// URN prefix of SURFteams memberships
pub const TEAMS_URN: &str = "urn:collab:group:surfteams.nl:nl:surfnet:diensten:";
/// URN prefix of organization code entitlements
pub const ORGANIZATION_CODE_URN: &str = "urn:mace:surfnet.nl:surfnet.nl:sab:organizationCode:";
/// URN prefix of organization GUID entitlements
pub const ORGANIZATION_GUID_URN: &str = "urn:mace:surfnet.nl:surfnet.nl:sab:organizationGUID:";

/// Typed accessors over the token check payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAttributes {
    attrs: Map<String, Value>,
}

impl UserAttributes {
    pub fn new(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }

    /// Build from any JSON value; non objects give an empty user
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(attrs) => Self { attrs },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.attrs
    }

    fn str_attr(&self, key: &str) -> &str {
        self.attrs.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn list_attr(&self, key: &str) -> Vec<&str> {
        match self.attrs.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn active(&self) -> bool {
        self.attrs.get("active").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn authenticating_authority(&self) -> &str {
        self.str_attr("authenticating_authority")
    }

    pub fn display_name(&self) -> &str {
        self.str_attr("display_name")
    }

    pub fn principal_name(&self) -> &str {
        self.str_attr("edu_person_principal_name")
    }

    pub fn email(&self) -> &str {
        self.str_attr("email")
    }

    pub fn memberships(&self) -> Vec<&str> {
        self.list_attr("edumember_is_member_of")
    }

    pub fn entitlements(&self) -> Vec<&str> {
        self.list_attr("eduperson_entitlement")
    }

    /// SAB roles from the entitlements
    pub fn roles(&self) -> BTreeSet<String> {
        strip_prefixed(self.entitlements(), SAB_ROLE_URN)
    }

    /// Token scopes, given either as a list or as a space separated string
    pub fn scopes(&self) -> BTreeSet<String> {
        match self.attrs.get("scope") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s.split(' ').map(str::to_string).collect(),
            _ => BTreeSet::from([String::new()]),
        }
    }

    /// Team names from the memberships
    pub fn teams(&self) -> BTreeSet<String> {
        strip_prefixed(self.memberships(), TEAMS_URN)
    }

    /// Organization codes from the entitlements; codes that are not numbers are skipped
    pub fn organization_codes(&self) -> BTreeSet<u32> {
        strip_prefixed(self.entitlements(), ORGANIZATION_CODE_URN)
            .iter()
            .filter_map(|code| code.parse().ok())
            .collect()
    }

    pub fn organization_guids(&self) -> BTreeSet<String> {
        strip_prefixed(self.entitlements(), ORGANIZATION_GUID_URN)
    }

    /// `user_name`, else `unspecified_id`, else empty
    pub fn user_name(&self) -> &str {
        if self.attrs.contains_key("user_name") {
            self.str_attr("user_name")
        } else {
            self.str_attr("unspecified_id")
        }
    }
}

impl From<Map<String, Value>> for UserAttributes {
    fn from(attrs: Map<String, Value>) -> Self {
        Self::new(attrs)
    }
}

impl std::fmt::Display for UserAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.attrs.clone()))
    }
}

fn strip_prefixed(urns: Vec<&str>, prefix: &str) -> BTreeSet<String> {
    urns.into_iter()
        .filter_map(|urn| urn.strip_prefix(prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(value: Value) -> UserAttributes {
        UserAttributes::from_value(value)
    }

    #[test]
    fn test_defaults() {
        let u = user(json!({}));
        assert!(!u.active());
        assert_eq!(u.display_name(), "");
        assert_eq!(u.user_name(), "");
        assert!(u.roles().is_empty());
        assert!(u.memberships().is_empty());
    }

    #[test]
    fn test_entitlements() {
        let u = user(json!({
            "active": true,
            "eduperson_entitlement": [
                "urn:mace:surfnet.nl:surfnet.nl:sab:role:Infrabeheerder",
                "urn:mace:surfnet.nl:surfnet.nl:sab:organizationCode:14",
                "urn:mace:surfnet.nl:surfnet.nl:sab:organizationGUID:ad93daef-0911-e511-80d0-005056956c1a",
                "urn:some:other"
            ],
            "edumember_is_member_of": [
                "urn:collab:group:surfteams.nl:nl:surfnet:diensten:noc-engineer"
            ]
        }));
        assert!(u.active());
        assert_eq!(u.roles(), BTreeSet::from(["Infrabeheerder".to_string()]));
        assert_eq!(u.organization_codes(), BTreeSet::from([14]));
        assert_eq!(
            u.organization_guids(),
            BTreeSet::from(["ad93daef-0911-e511-80d0-005056956c1a".to_string()])
        );
        assert_eq!(u.teams(), BTreeSet::from(["noc-engineer".to_string()]));
    }

    #[test]
    fn test_scopes_list_or_string() {
        let expected = BTreeSet::from(["read".to_string(), "write".to_string()]);
        assert_eq!(user(json!({"scope": ["read", "write"]})).scopes(), expected);
        assert_eq!(user(json!({"scope": "read write"})).scopes(), expected);
    }

    #[test]
    fn test_user_name_fallback() {
        assert_eq!(user(json!({"user_name": "john.doe", "unspecified_id": "x"})).user_name(), "john.doe");
        assert_eq!(user(json!({"unspecified_id": "urn:collab:person:jd"})).user_name(), "urn:collab:person:jd");
    }

    #[test]
    fn test_serializes_as_payload() {
        let payload = json!({"user_name": "john.doe", "active": true});
        let u = user(payload.clone());
        assert_eq!(serde_json::to_value(&u).unwrap(), payload);
        assert_eq!(u.get("user_name"), Some(&json!("john.doe")));
    }
}
