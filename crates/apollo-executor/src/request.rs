//! Errors that abort a request before any field is executed

use crate::response::GraphQLError;
use crate::response::Response;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::parser::SourceSpan;

/// A [request error](https://spec.graphql.org/October2021/#sec-Errors.Request-errors) is raised
/// during an early phase of execution to indicate that the request as a whole is faulty.
///
/// No resolver is called when one of these is returned.
/// The corresponding GraphQL response (see [`RequestError::to_response`])
/// does not have a `data` key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// The document has several operations but no operation name was given
    #[error("Must provide operation name if query contains multiple operations.")]
    AmbiguousOperation,

    #[error("Unknown operation named \"{name}\".")]
    UnknownOperation { name: String },

    /// The document has no operation at all
    #[error("Must provide an operation.")]
    NoOperation,

    /// The document has a definition that is neither an operation nor a fragment,
    /// such as a type definition.
    #[error("GraphQL cannot execute a request containing a {kind}.")]
    UnsupportedDefinition {
        kind: &'static str,
        location: Option<SourceSpan>,
    },

    /// A variable value is missing or cannot be coerced to its declared type
    #[error("{message}")]
    VariableCoercion {
        message: String,
        location: Option<SourceSpan>,
    },

    #[error("Schema does not define the required query root type.")]
    QueryNotConfigured { location: Option<SourceSpan> },

    #[error("Schema is not configured for mutations.")]
    MutationsNotConfigured { location: Option<SourceSpan> },

    #[error("Schema is not configured for subscriptions.")]
    SubscriptionsNotConfigured { location: Option<SourceSpan> },
}

impl RequestError {
    /// The location in the document most relevant to this error, if any
    pub fn location(&self) -> Option<SourceSpan> {
        match self {
            Self::AmbiguousOperation | Self::UnknownOperation { .. } | Self::NoOperation => None,
            Self::UnsupportedDefinition { location, .. }
            | Self::VariableCoercion { location, .. }
            | Self::QueryNotConfigured { location }
            | Self::MutationsNotConfigured { location }
            | Self::SubscriptionsNotConfigured { location } => *location,
        }
    }

    /// Convert to a response error, with line and column numbers taken from `sources`
    pub fn to_graphql_error(&self, sources: &SourceMap) -> GraphQLError {
        GraphQLError::new(self.to_string(), self.location(), sources)
    }

    /// Convert to a response whose only content is this error
    pub fn to_response(&self, sources: &SourceMap) -> Response {
        Response::from_request_error(self.to_graphql_error(sources))
    }
}
