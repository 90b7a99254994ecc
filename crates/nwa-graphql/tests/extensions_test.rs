use std::sync::Arc;

use nwa_graphql::{
    DeprecatedUse, DeprecationChecker, ErrorHandler, ErrorType, ExecutionResult, FieldDef,
    GraphQLError, PathSegment, ResolveInfo, ResolverError, TypeDef, default_to_error_type,
    register_error, register_exception,
};
use serde_json::json;

fn some_query_path() -> Vec<PathSegment> {
    vec!["someQuery".into()]
}

async fn failing_query(err: ResolverError) -> ExecutionResult {
    ExecutionResult::data(json!({"someQuery": null}))
        .with_error(GraphQLError::from_resolver(err, some_query_path()))
}

#[tokio::test]
async fn test_error_handler_no_errors() {
    let result = ErrorHandler::new()
        .execute(async { ExecutionResult::data(json!({"someQuery": ["the", "quick", "brown", "fox"]})) })
        .await;

    assert!(result.errors.is_empty());
    assert_eq!(result.data, Some(json!({"someQuery": ["the", "quick", "brown", "fox"]})));
}

#[tokio::test]
async fn test_error_handler_with_permission_error() {
    let result = ErrorHandler::new()
        .debug(false)
        .execute(failing_query(ResolverError::PermissionDenied(
            "There was a permission error".to_string(),
        )))
        .await;

    let error = &result.errors[0];
    assert_eq!(error.message, "There was a permission error");
    assert_eq!(error.path, some_query_path());
    assert_eq!(json!(error.extensions), json!({"error_type": "not_authorized"}));
    assert_eq!(result.data, Some(json!({"someQuery": null})));
}

#[tokio::test]
async fn test_error_handler_with_value_error_in_debug() {
    let result = ErrorHandler::new()
        .debug(true)
        .execute(failing_query(ResolverError::Other(anyhow::anyhow!(
            "There was a value error"
        ))))
        .await;

    let error = &result.errors[0];
    assert_eq!(error.message, "There was a value error");
    assert_eq!(json!(error.extensions), json!({"error_type": "internal_error"}));
}

#[tokio::test]
async fn test_error_handler_with_http_error() {
    for (status, message, error_type) in [
        (404, "Resource does not exists", "not_found"),
        (403, "Not authorized", "not_authorized"),
    ] {
        let result = ErrorHandler::new()
            .execute(failing_query(ResolverError::http(message, "surf.nl", status)))
            .await;

        let error = &result.errors[0];
        assert_eq!(error.message, message);
        assert_eq!(error.path, some_query_path());
        assert_eq!(
            json!(error.extensions),
            json!({"error_type": error_type, "http_status_code": {"surf.nl": status}})
        );
    }
}

#[tokio::test]
async fn test_registered_errors_follow_result_errors() {
    let result = ErrorHandler::new()
        .debug(false)
        .execute(async {
            register_error("Sort key is not valid", vec!["subscriptions".into()], ErrorType::BadRequest);
            register_exception(
                &ResolverError::http("Subscription not found", "http://ims/api", 404),
                vec!["subscriptions".into(), PathSegment::Index(3), "ims".into()],
                default_to_error_type,
            );
            failing_query(ResolverError::PermissionDenied("Forbidden".to_string())).await
        })
        .await;

    let messages: Vec<&str> = result.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["Forbidden", "Sort key is not valid", "Subscription not found"]);

    assert_eq!(json!(result.errors[1].extensions), json!({"error_type": "bad_request"}));
    assert_eq!(json!(result.errors[2].extensions), json!({"error_type": "not_found"}));
    assert_eq!(
        json!(result.errors[2].path),
        json!(["subscriptions", 3, "ims"])
    );
}

#[tokio::test]
async fn test_custom_error_type() {
    fn everything_bad_request(_: Option<&ResolverError>) -> ErrorType {
        ErrorType::BadRequest
    }

    let result = ErrorHandler::new()
        .with_error_type(everything_bad_request)
        .execute(failing_query(ResolverError::Other(anyhow::anyhow!("invalid filter"))))
        .await;
    assert_eq!(result.errors[0].message, "invalid filter");
    assert_eq!(json!(result.errors[0].extensions), json!({"error_type": "bad_request"}));
}

fn info(root: &str, path: &[&str], parent: &str, field_deprecation: Option<&str>) -> ResolveInfo {
    ResolveInfo {
        path: path.iter().map(|p| PathSegment::from(*p)).collect(),
        root_type: root.to_string(),
        parent_type: parent.to_string(),
        field_name: path.last().map(|p| p.to_string()).unwrap_or_default(),
        field_deprecation: field_deprecation.map(str::to_string),
    }
}

#[test]
fn test_deprecation_checker_no_deprecations() {
    let query = TypeDef::new("Query").field(FieldDef::new("latest_query"));
    let checker = DeprecationChecker::new(Some(&query), None);

    assert!(checker.deprecated_queries().is_empty());
    assert!(checker.deprecated_mutations().is_empty());
    assert_eq!(checker.check(&info("Query", &["latestQuery"], "Query", None)), None);
}

#[test]
fn test_deprecation_checker_with_deprecated_query() {
    let query = TypeDef::new("Query")
        .field(FieldDef::new("deprecated_query").deprecated("This query has been replaced!"));
    let checker = DeprecationChecker::new(Some(&query), None);

    assert_eq!(
        checker.deprecated_queries().get("deprecatedQuery").map(String::as_str),
        Some("This query has been replaced!")
    );
    assert!(checker.deprecated_mutations().is_empty());

    let found = checker.check(&info("Query", &["deprecatedQuery"], "Query", None));
    assert_eq!(
        found,
        Some(DeprecatedUse::Path {
            root_type: "Query".to_string(),
            path: "deprecatedQuery".to_string(),
            reason: "This query has been replaced!".to_string(),
        })
    );

    // Same path under another root type is not deprecated
    assert_eq!(checker.check(&info("Mutation", &["deprecatedQuery"], "Mutation", None)), None);
}

#[test]
fn test_deprecation_checker_with_deprecated_fields() {
    let with_fields = Arc::new(
        TypeDef::new("TypeWithDeprecatedFields")
            .field(FieldDef::new("outdated").deprecated("Please use 'replacement'"))
            .field(FieldDef::new("replacement")),
    );
    let query = TypeDef::new("Query").field(FieldDef::new("latest_query").of_type(with_fields));
    let checker = DeprecationChecker::new(Some(&query), None);

    assert_eq!(checker.deprecated_queries().len(), 1);
    assert_eq!(
        checker.deprecated_queries()["latestQuery/outdated"],
        "Please use 'replacement'"
    );
}

#[test]
fn test_deprecated_field_outside_known_paths() {
    let checker = DeprecationChecker::new(None, None);
    let found = checker.check(&info(
        "Query",
        &["search", "legacyName"],
        "Product",
        Some("Use name"),
    ));
    assert_eq!(
        found,
        Some(DeprecatedUse::Field {
            field: "legacyName".to_string(),
            parent_type: "Product".to_string(),
            path: "search/legacyName".to_string(),
            reason: "Use name".to_string(),
        })
    );
}
