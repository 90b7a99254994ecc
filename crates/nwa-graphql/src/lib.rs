//! NWA GraphQL - execution helpers independent of the GraphQL server
//!
//! - [`ErrorHandler`] collects raised and registered errors of an execution
//!   and classifies them with an [`ErrorType`]
//! - [`DeprecationChecker`] logs the use of deprecated query paths and fields

pub mod deprecation;
pub mod error_handler;
pub mod types;

pub use deprecation::{DeprecatedUse, DeprecationChecker, get_deprecated_paths, to_camel};
pub use error_handler::{
    ErrorHandler, ErrorType, ResolverError, default_to_error_type, register_error,
    register_exception,
};
pub use types::{ExecutionResult, FieldDef, GraphQLError, PathSegment, ResolveInfo, TypeDef};
