//! GraphQL [responses](https://spec.graphql.org/October2021/#sec-Response)

use crate::JsonMap;
use apollo_compiler::ast;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::Name;
use apollo_compiler::Node;
use serde::Serialize;

/// A [GraphQL response](https://spec.graphql.org/October2021/#sec-Response-Format)
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    // <https://spec.graphql.org/October2021/#note-6f005> suggests serializing this first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,

    #[serde(skip_serializing_if = "ResponseData::is_absent")]
    pub data: ResponseData,
}

/// The `data` entry of a [`Response`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    /// Execution returned an object.
    /// [`Response::data`] is serialized as a JSON object.
    Object(JsonMap),

    /// Execution encountered a [field error] on a non-null field,
    /// and null was [propagated] all the way to the root of the response.
    /// [`Response::data`] is serialized as JSON null.
    ///
    /// [field error]: https://spec.graphql.org/October2021/#sec-Errors.Field-errors
    /// [propagated]: https://spec.graphql.org/October2021/#sec-Handling-Field-Errors
    Null,

    /// A [request error] was encountered. Execution did not start.
    /// [`Response::data`] is skipped from serialization.
    ///
    /// [request error]: https://spec.graphql.org/October2021/#sec-Errors.Request-errors
    Absent,
}

/// A serializable [error](https://spec.graphql.org/October2021/#sec-Errors.Error-result-format),
/// as found in a GraphQL [response][Response].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLError {
    /// The error message.
    pub message: String,

    /// Locations relevant to the error, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQLLocation>,

    /// If non-empty, the error is a [field error]
    /// for the particular field found at this path in [`Response::data`].
    ///
    /// [field error]: https://spec.graphql.org/October2021/#sec-Errors.Field-errors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathElement>,

    /// Reserved for any additional information
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub extensions: JsonMap,
}

/// A source location (line and column numbers) for a [`GraphQLError`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
pub struct GraphQLLocation {
    /// The line number for this location, starting at 1 for the first line.
    pub line: usize,
    /// The column number for this location, starting at 1.
    pub column: usize,
}

/// An element of [`GraphQLError::path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathElement {
    /// The response key of the relevant field in an object value
    Field(Name),

    /// The index of the relevant item in a list value
    ListIndex(usize),
}

/// Linked-list version of `Vec<PathElement>`, taking advantage of the call stack
///
/// Each node lives in the stack frame of the field or list item it designates,
/// so sibling branches share their common prefix without copying it.
pub(crate) type LinkedPath<'a> = Option<&'a LinkedPathElement<'a>>;

pub(crate) struct LinkedPathElement<'a> {
    pub(crate) element: PathElement,
    pub(crate) next: LinkedPath<'a>,
}

/// Converts a linked path to its root-first `Vec` representation
pub(crate) fn path_to_vec(mut link: LinkedPath<'_>) -> Vec<PathElement> {
    let mut path = Vec::new();
    while let Some(node) = link {
        path.push(node.element.clone());
        link = node.next;
    }
    path.reverse();
    path
}

impl Response {
    /// Create a response for a [request error]:
    /// handling of a request was aborted before execution started.
    ///
    /// [request error]: https://spec.graphql.org/October2021/#sec-Errors.Request-errors
    pub fn from_request_error(error: GraphQLError) -> Self {
        Self {
            errors: vec![error],
            data: ResponseData::Absent,
        }
    }
}

impl ResponseData {
    /// For serde `skip_serializing_if`
    fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the response data object, if execution produced one
    pub fn as_object(&self) -> Option<&JsonMap> {
        match self {
            Self::Object(map) => Some(map),
            Self::Null | Self::Absent => None,
        }
    }
}

impl Serialize for ResponseData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            // `Absent` is skipped by `Response`, serialize as null if used standalone
            Self::Absent | Self::Null => serializer.serialize_unit(),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl GraphQLError {
    /// Creates an error with a single optional location and no path
    pub fn new(
        message: impl Into<String>,
        location: Option<SourceSpan>,
        sources: &SourceMap,
    ) -> Self {
        Self {
            message: message.into(),
            locations: GraphQLLocation::from_span(sources, location)
                .into_iter()
                .collect(),
            path: Vec::new(),
            extensions: JsonMap::new(),
        }
    }

    /// Creates a [field error] located at every field node sharing the response key
    ///
    /// [field error]: https://spec.graphql.org/October2021/#sec-Errors.Field-errors
    pub(crate) fn field_error(
        message: impl Into<String>,
        path: LinkedPath<'_>,
        fields: &[&Node<ast::Field>],
        sources: &SourceMap,
    ) -> Self {
        Self {
            message: message.into(),
            locations: fields
                .iter()
                .filter_map(|field| GraphQLLocation::from_span(sources, field.location()))
                .collect(),
            path: path_to_vec(path),
            extensions: JsonMap::new(),
        }
    }
}

impl GraphQLLocation {
    /// Convert a `SourceSpan` to the line and column numbers of its start
    pub fn from_span(sources: &SourceMap, location: Option<SourceSpan>) -> Option<Self> {
        let range = location?.line_column_range(sources)?;
        Some(GraphQLLocation {
            line: range.start.line,
            column: range.start.column,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_path_is_root_first() {
        let root = LinkedPathElement {
            element: PathElement::Field(Name::new("hero").unwrap()),
            next: None,
        };
        let item = LinkedPathElement {
            element: PathElement::ListIndex(2),
            next: Some(&root),
        };
        let leaf = LinkedPathElement {
            element: PathElement::Field(Name::new("name").unwrap()),
            next: Some(&item),
        };
        let path = serde_json::to_string(&path_to_vec(Some(&leaf))).unwrap();
        assert_eq!(path, r#"["hero",2,"name"]"#);
    }

    #[test]
    fn absent_data_is_not_serialized() {
        let response = Response::from_request_error(GraphQLError {
            message: "Must provide an operation.".into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: JsonMap::new(),
        });
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"errors":[{"message":"Must provide an operation."}]}"#
        );

        let response = Response {
            errors: Vec::new(),
            data: ResponseData::Null,
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":null}"#
        );
    }
}
