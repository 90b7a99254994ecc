//! Rule based access control
//!
//! Rules come from the `rules` list of the security definitions:
//!
//! ```yaml
//! rules:
//!   - endpoint: "*subscriptions*"
//!     methods: [GET]
//!     conditions:
//!       AnyOf:
//!         Teams: [noc]
//!         TargetOrganizations: [institutions]
//! ```
//!
//! A request matching a rule's endpoint glob and methods must satisfy every
//! condition of that rule.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use nwa_common::glob_matches;
use serde_json::Value;
use tracing::debug;

use crate::user::{ORGANIZATION_CODE_URN, ORGANIZATION_GUID_URN, SAB_ROLE_URN, TEAMS_URN};
use crate::{AuthError, AuthRequest, UserAttributes, quoted_set};

/// HTTP methods accepted in rule definitions
pub const VALID_HTTP_METHODS: [&str; 7] = ["*", "DELETE", "PATCH", "GET", "HEAD", "POST", "PUT"];

/// Where [`Condition::OrganizationGuid`] looks for its parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Json,
}

impl ParamLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "json" => Some(ParamLocation::Json),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Json => "json",
        }
    }
}

/// A single access condition
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// The user belongs to one of the organization codes
    TargetOrganizations(BTreeSet<u32>),
    /// The user has one of the SAB roles
    SabRoles(BTreeSet<String>),
    /// The user is a member of one of the teams
    Teams(BTreeSet<String>),
    /// The token has one of the scopes
    Scopes(BTreeSet<String>),
    AnyOf(Vec<Condition>),
    AllOf(Vec<Condition>),
    /// A request parameter holds one of the user's organization GUIDs
    OrganizationGuid {
        location: ParamLocation,
        parameter: String,
    },
}

/// Why a condition definition was rejected
enum ConditionError {
    MissingOption(String),
    Invalid(String),
}

fn organization_codes(group: &str) -> Option<&'static [u32]> {
    match group {
        "institutions" => Some(&[1, 2, 3, 4, 9, 14, 18, 19, 22, 23, 24]),
        "service_providers" => Some(&[11]),
        "international_partners" => Some(&[13]),
        "colo_providers" => Some(&[6, 10]),
        "other" => Some(&[
            5, 7, 8, 11, 12, 15, 16, 17, 20, 21, 25, 27, 28, 29, 30, 31, 32, 100,
        ]),
        _ => None,
    }
}

fn sab_role(option: &str) -> Option<&'static str> {
    match option {
        "infrabeheerder" | "Infrabeheerder" => Some("Infrabeheerder"),
        "infraverantwoordelijke" | "Infraverantwoordelijke" => Some("Infraverantwoordelijke"),
        _ => None,
    }
}

fn team(option: &str) -> Option<&'static str> {
    match option {
        "superuserro" => Some("noc_superuserro_team_for_netwerkdashboard"),
        "noc" => Some("noc-engineer"),
        "klantsupport" => Some("nwa-automation-klantsupport"),
        "changes" => Some("nwa-automation-network-changes"),
        _ => None,
    }
}

fn option_strings(options: &Value) -> Vec<String> {
    match options {
        Value::Array(items) => items
            .iter()
            .map(|i| match i {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn lookup<T>(
    options: &Value,
    table: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ConditionError> {
    option_strings(options)
        .iter()
        .map(|o| table(o).ok_or_else(|| ConditionError::MissingOption(format!("'{}'", o))))
        .collect()
}

impl Condition {
    fn parse(name: &str, options: &Value) -> Result<Condition, ConditionError> {
        match name {
            "TargetOrganizations" => {
                let groups = lookup(options, organization_codes)?;
                Ok(Condition::TargetOrganizations(
                    groups.into_iter().flatten().copied().collect(),
                ))
            }
            "SABRoles" => Ok(Condition::SabRoles(
                lookup(options, sab_role)?.into_iter().map(str::to_string).collect(),
            )),
            "Teams" => Ok(Condition::Teams(
                lookup(options, team)?.into_iter().map(str::to_string).collect(),
            )),
            "Scopes" => Ok(Condition::Scopes(option_strings(options).into_iter().collect())),
            "AnyOf" => Ok(Condition::AnyOf(Self::parse_all(options)?)),
            "AllOf" => Ok(Condition::AllOf(Self::parse_all(options)?)),
            "OrganizationGUID" => {
                let location = options
                    .get("where")
                    .ok_or_else(|| ConditionError::MissingOption("'where'".to_string()))?;
                let location = location
                    .as_str()
                    .and_then(ParamLocation::parse)
                    .ok_or_else(|| {
                        ConditionError::Invalid(
                            "The 'where' option should be one of {'json', 'path', 'query'}"
                                .to_string(),
                        )
                    })?;
                let parameter = options
                    .get("parameter")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ConditionError::MissingOption("'parameter'".to_string()))?;
                Ok(Condition::OrganizationGuid {
                    location,
                    parameter: parameter.to_string(),
                })
            }
            other => Err(ConditionError::MissingOption(format!("'{}'", other))),
        }
    }

    fn parse_all(options: &Value) -> Result<Vec<Condition>, ConditionError> {
        match options {
            Value::Object(map) => map
                .iter()
                .map(|(name, sub)| Condition::parse(name, sub))
                .collect(),
            _ => Err(ConditionError::Invalid(
                "Nested conditions should be a mapping".to_string(),
            )),
        }
    }

    /// Whether the user and request satisfy this condition
    pub fn test(&self, user: &UserAttributes, request: &AuthRequest) -> bool {
        match self {
            Condition::TargetOrganizations(codes) => {
                !user.organization_codes().is_disjoint(codes)
            }
            Condition::SabRoles(roles) => !user.roles().is_disjoint(roles),
            Condition::Teams(teams) => !user.teams().is_disjoint(teams),
            Condition::Scopes(scopes) => !user.scopes().is_disjoint(scopes),
            Condition::AnyOf(conditions) => conditions.iter().any(|c| c.test(user, request)),
            Condition::AllOf(conditions) => conditions.iter().all(|c| c.test(user, request)),
            Condition::OrganizationGuid {
                location,
                parameter,
            } => {
                let guids = user.organization_guids();
                match location {
                    ParamLocation::Path => request
                        .path_params
                        .get(parameter)
                        .is_some_and(|v| guids.contains(v)),
                    ParamLocation::Query => request
                        .query
                        .get(parameter)
                        .is_some_and(|v| guids.contains(v)),
                    ParamLocation::Json => match &request.json {
                        // Bad bodies are left for the application to reject
                        None => true,
                        Some(body) => body
                            .get(parameter)
                            .and_then(Value::as_str)
                            .is_some_and(|v| guids.contains(v)),
                    },
                }
            }
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::TargetOrganizations(codes) => {
                let codes: Vec<String> = codes.iter().map(u32::to_string).collect();
                write!(
                    f,
                    "CODE in {}CODE in eduperson_entitlements should be one of [{}]",
                    ORGANIZATION_CODE_URN,
                    codes.join(", ")
                )
            }
            Condition::SabRoles(roles) => write!(
                f,
                "ROLE in {}ROLE in eduperson_entitlements should be one of {}",
                SAB_ROLE_URN,
                quoted_set(roles)
            ),
            Condition::Teams(teams) => write!(
                f,
                "TEAM in {}TEAM should be one of {}",
                TEAMS_URN,
                quoted_set(teams)
            ),
            Condition::Scopes(scopes) => write!(
                f,
                "Scope must be one of the following: {}",
                quoted_set(scopes)
            ),
            Condition::AnyOf(conditions) => write!(
                f,
                "Any of the following conditions should apply:\n{}",
                join_lines(conditions)
            ),
            Condition::AllOf(conditions) => write!(
                f,
                "All of the following conditions should apply:\n{}",
                join_lines(conditions)
            ),
            Condition::OrganizationGuid {
                location,
                parameter,
            } => write!(
                f,
                "Parameter {} in the request {} should be in your organization GUID ('{}')",
                parameter,
                location.as_str(),
                ORGANIZATION_GUID_URN
            ),
        }
    }
}

fn join_lines(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(Condition::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Debug)]
struct Rule {
    endpoint: String,
    methods: Vec<String>,
    conditions: Vec<Condition>,
}

impl Rule {
    fn applies_to(&self, endpoint: &str, method: &str) -> bool {
        glob_matches(&self.endpoint, endpoint)
            && self.methods.iter().any(|m| m == "*" || m == method)
    }
}

/// Validated access rules
#[derive(Clone, Debug, Default)]
pub struct AccessControl {
    rules: Vec<Rule>,
}

impl AccessControl {
    /// Parse the `rules` of the security definitions.
    ///
    /// Definitions without rules allow everything.
    pub fn new(security_definitions: Option<&Value>) -> Result<Self, AuthError> {
        let Some(rules) = security_definitions
            .and_then(|d| d.get("rules"))
            .and_then(Value::as_array)
        else {
            return Ok(Self::default());
        };

        let mut parsed = Vec::with_capacity(rules.len());
        for (counter, definition) in rules.iter().enumerate() {
            let invalid = |message: String| AuthError::InvalidRuleDefinition {
                message,
                rule: counter,
                definition: definition.clone(),
            };

            let endpoint = definition
                .get("endpoint")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("Missing endpoint".to_string()))?;

            let methods = definition
                .get("methods")
                .ok_or_else(|| invalid("Missing HTTP methods".to_string()))?;
            let methods = option_strings(methods);
            if let Some(bad) = methods
                .iter()
                .find(|m| !VALID_HTTP_METHODS.contains(&m.as_str()))
            {
                return Err(invalid(format!("Not a valid HTTP method '{}'", bad)));
            }

            let conditions = definition
                .get("conditions")
                .and_then(Value::as_object)
                .ok_or_else(|| invalid("Missing conditions or options".to_string()))?;

            let mut checkers = Vec::with_capacity(conditions.len());
            for (name, options) in conditions {
                let condition = Condition::parse(name, options).map_err(|e| match e {
                    ConditionError::MissingOption(option) => invalid(format!(
                        "Missing option {}. Could not process condition: {}: {}",
                        option, name, options
                    )),
                    ConditionError::Invalid(message) => invalid(message),
                })?;
                checkers.push(condition);
            }

            parsed.push(Rule {
                endpoint: endpoint.to_string(),
                methods,
                conditions: checkers,
            });
        }

        debug!(rules = parsed.len(), "Loaded access rules");
        Ok(Self { rules: parsed })
    }

    /// Parse security definitions from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, AuthError> {
        let definitions: Value = serde_yaml::from_str(yaml)?;
        Self::new(Some(&definitions))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every matching rule; the first failing condition is reported
    pub fn is_allowed(&self, user: &UserAttributes, request: &AuthRequest) -> Result<(), AuthError> {
        let endpoint = request.endpoint_or_url();
        let method = request.method.as_str();

        for rule in self.rules.iter().filter(|r| r.applies_to(endpoint, method)) {
            if let Some(failed) = rule.conditions.iter().find(|c| !c.test(user, request)) {
                debug!(endpoint, method, condition = %failed, "Access denied");
                return Err(AuthError::Forbidden(failed.to_string()));
            }
        }
        Ok(())
    }
}
