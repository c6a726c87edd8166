#![doc = include_str!("../README.md")]

mod execution;
pub mod input_coercion;
mod request;
pub mod resolver;
pub mod response;
mod result_coercion;
pub mod schema;

pub use self::execution::Execution;
pub use self::request::RequestError;
pub use self::resolver::default_field_resolver;
pub use self::resolver::FieldError;
pub use self::resolver::ObjectValue;
pub use self::resolver::ResolveInfo;
pub use self::resolver::ResolvedValue;
pub use self::response::GraphQLError;
pub use self::response::Response;
pub use self::response::ResponseData;
pub use self::schema::ExecutableSchema;
pub use self::schema::ExecutableSchemaBuilder;
pub use self::schema::SchemaBuildError;

/// A JSON-compatible dynamically-typed value.
///
/// Note: [`serde_json_bytes::Value`] is similar
/// to [`serde_json::Value`][serde_json_bytes::serde_json::Value]
/// but uses its reference-counted [`ByteString`][serde_json_bytes::ByteString]
/// for string values and map keys.
pub type JsonValue = serde_json_bytes::Value;

/// A JSON-compatible object/map with string keys and dynamically-typed values.
pub type JsonMap = serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>;
