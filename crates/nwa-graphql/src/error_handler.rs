//! Error collection and classification for GraphQL executions
//!
//! Every error in a response gets an `error_type` extension that tells the
//! frontend what to do about it:
//!
//! - `not_authenticated`: the user should (re)authenticate
//! - `not_authorized`: the user may not perform the operation on the resource
//! - `not_found`: a resource was not found
//! - `internal_error`: anything else, the user may retry later
//! - `bad_request`: query input parameters are not valid
//!
//! Resolvers can also register errors without failing, so that errors of
//! several resolvers end up in one response.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::future::Future;

use nwa_config::nwa_settings;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{ExecutionResult, GraphQLError, PathSegment};

pub const EXTENSION_ERROR_TYPE: &str = "error_type";
pub const EXTENSION_HTTP_STATUS_CODE: &str = "http_status_code";

/// Message shown instead of internal errors outside debug mode
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

tokio::task_local! {
    static ERROR_BUCKET: RefCell<Vec<GraphQLError>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NotAuthenticated,
    NotAuthorized,
    NotFound,
    InternalError,
    BadRequest,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::NotAuthenticated => "not_authenticated",
            ErrorType::NotAuthorized => "not_authorized",
            ErrorType::NotFound => "not_found",
            ErrorType::InternalError => "internal_error",
            ErrorType::BadRequest => "bad_request",
        }
    }
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a resolver can fail with
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("{0}")]
    PermissionDenied(String),

    /// A backend answered a request with an error status
    #[error("{message}")]
    Http {
        message: String,
        url: String,
        status: u16,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ResolverError {
    pub fn http(message: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        ResolverError::Http {
            message: message.into(),
            url: url.into(),
            status,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            ResolverError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classify a resolver error
pub fn default_to_error_type(err: Option<&ResolverError>) -> ErrorType {
    match err {
        Some(ResolverError::PermissionDenied(_)) => ErrorType::NotAuthorized,
        Some(e) => match e.http_status() {
            Some(401) => ErrorType::NotAuthenticated,
            Some(403) => ErrorType::NotAuthorized,
            Some(404) => ErrorType::NotFound,
            _ => ErrorType::InternalError,
        },
        None => ErrorType::InternalError,
    }
}

/// Function mapping resolver errors to error types
pub type ToErrorType = fn(Option<&ResolverError>) -> ErrorType;

/// Collects and enriches the errors of GraphQL executions
#[derive(Clone, Copy, Debug)]
pub struct ErrorHandler {
    to_error_type: ToErrorType,
    debug: bool,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    /// Handler with the default classification; internal errors are masked
    /// unless the `DEBUG` setting is on
    pub fn new() -> Self {
        Self {
            to_error_type: default_to_error_type,
            debug: nwa_settings().debug,
        }
    }

    pub fn with_error_type(mut self, to_error_type: ToErrorType) -> Self {
        self.to_error_type = to_error_type;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run an execution with an error bucket.
    ///
    /// The result's own errors are followed by the errors registered while
    /// `execution` ran; all of them are enriched.
    pub async fn execute<F>(&self, execution: F) -> ExecutionResult
    where
        F: Future<Output = ExecutionResult>,
    {
        ERROR_BUCKET
            .scope(RefCell::new(Vec::new()), async {
                let mut result = execution.await;
                let registered = ERROR_BUCKET.with(|bucket| bucket.take());
                let errors = std::mem::take(&mut result.errors);
                result.errors = errors
                    .into_iter()
                    .chain(registered)
                    .map(|error| self.process(error))
                    .collect();
                result
            })
            .await
    }

    fn process(&self, mut error: GraphQLError) -> GraphQLError {
        if let Some(ResolverError::Http { url, status, .. }) = &error.source {
            error
                .extensions
                .insert(EXTENSION_HTTP_STATUS_CODE.to_string(), json!({ url.as_str(): status }));
        }
        if !error.extensions.contains_key(EXTENSION_ERROR_TYPE) {
            let error_type = (self.to_error_type)(error.source.as_ref());
            error
                .extensions
                .insert(EXTENSION_ERROR_TYPE.to_string(), Value::from(error_type.as_str()));
        }

        let internal = error.extensions.get(EXTENSION_ERROR_TYPE).and_then(Value::as_str)
            == Some(ErrorType::InternalError.as_str());
        if internal && !self.debug {
            error.message = INTERNAL_ERROR_MESSAGE.to_string();
        }
        error
    }
}

fn register(message: String, path: Vec<PathSegment>, error_type: ErrorType) {
    let error = GraphQLError::new(message)
        .with_path(path)
        .with_extension(EXTENSION_ERROR_TYPE, Value::from(error_type.as_str()));

    let dropped = ERROR_BUCKET.try_with(|bucket| {
        debug!(message = %error.message, error_type = %error_type, "Registering error");
        bucket.borrow_mut().push(error);
    });
    if dropped.is_err() {
        debug!(error_type = %error_type, "ErrorHandler not active, dropping error");
    }
}

/// Register an error message for the current execution.
///
/// Lets several resolvers report errors in one response.
pub fn register_error(message: impl Into<String>, path: Vec<PathSegment>, error_type: ErrorType) {
    register(message.into(), path, error_type);
}

/// Register an error a resolver ran into, classified with `to_error_type`
pub fn register_exception(err: &ResolverError, path: Vec<PathSegment>, to_error_type: ToErrorType) {
    register(err.to_string(), path, to_error_type(Some(err)));
}
