use crate::execution::ExecutionContext;
use crate::response::path_to_vec;
use crate::response::LinkedPath;
use crate::response::PathElement;
use crate::schema::ExecutableSchema;
use crate::JsonMap;
use crate::JsonValue;
use apollo_compiler::ast;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::Name;
use apollo_compiler::Node;
use std::any::Any;
use std::fmt;

/// A field resolver, as registered with [`ExecutableSchemaBuilder::resolver`][crate::ExecutableSchemaBuilder::resolver]
/// or passed to [`Execution::field_resolver`][crate::Execution::field_resolver].
///
/// Called with the source value (the parent object), the coerced field arguments,
/// the context value of the request, and information about the field being resolved.
pub type FieldResolverFn =
    dyn Fn(&ResolvedValue, &JsonMap, &dyn Any, &ResolveInfo<'_>) -> FieldResult + Send + Sync;

/// What resolvers return
pub type FieldResult = Result<ResolvedValue, FieldError>;

/// A GraphQL object whose fields are computed on demand during execution.
pub trait ObjectValue {
    /// Resolves the field described by `info` with the given coerced arguments.
    ///
    /// This is called by the default field resolver,
    /// for fields without a resolver registered in the schema.
    /// The resolved value is expected to match the type of the field definition.
    fn resolve_field(
        &self,
        arguments: &JsonMap,
        context: &dyn Any,
        info: &ResolveInfo<'_>,
    ) -> Result<ResolvedValue, FieldError>;
}

/// The value returned by a resolver, before it is completed according to its GraphQL type.
pub enum ResolvedValue {
    /// Plain JSON data.
    ///
    /// * JSON null represents GraphQL null
    /// * Leaf types go through serialization: built-in scalars, enum values as strings,
    ///   or any JSON value for custom scalars
    /// * A JSON array can be completed as a GraphQL list
    /// * A JSON object can be completed as a GraphQL object,
    ///   with the default field resolver reading one property per field
    Json(JsonValue),

    /// Expected where the GraphQL type is an object, interface, or union type
    Object(Box<dyn ObjectValue>),

    /// Expected for GraphQL list types.
    ///
    /// An item may be an error, which only affects the corresponding position in the list.
    List(Box<dyn Iterator<Item = Result<ResolvedValue, FieldError>>>),
}

/// The error type returned by resolvers.
///
/// It becomes a [field error](https://spec.graphql.org/October2021/#sec-Errors.Field-errors)
/// in the response, with location and path filled in by execution.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub message: String,
    /// Copied as-is into the `extensions` of the response error
    pub extensions: JsonMap,
}

/// Information passed to resolvers and to abstract type resolution hooks.
pub struct ResolveInfo<'a> {
    pub(crate) ctx: &'a ExecutionContext<'a>,
    pub(crate) parent_type: &'a ObjectType,
    pub(crate) field_definition: &'a FieldDefinition,
    pub(crate) fields: &'a [&'a Node<ast::Field>],
    pub(crate) path: LinkedPath<'a>,
}

/// The field resolver used when neither the schema nor [`Execution::field_resolver`][crate::Execution::field_resolver]
/// provides one.
///
/// * For an [`ResolvedValue::Object`] source, calls [`ObjectValue::resolve_field`]
/// * For a JSON object source, returns the property named like the field, or null if missing
/// * For any other source, returns null
pub fn default_field_resolver(
    source: &ResolvedValue,
    arguments: &JsonMap,
    context: &dyn Any,
    info: &ResolveInfo<'_>,
) -> Result<ResolvedValue, FieldError> {
    match source {
        ResolvedValue::Object(object) => object.resolve_field(arguments, context, info),
        ResolvedValue::Json(JsonValue::Object(map)) => Ok(map
            .get(info.field_name().as_str())
            .cloned()
            .map_or_else(ResolvedValue::null, ResolvedValue::Json)),
        ResolvedValue::Json(_) | ResolvedValue::List(_) => Ok(ResolvedValue::null()),
    }
}

impl<'a> ResolveInfo<'a> {
    /// The name of the field being resolved
    pub fn field_name(&self) -> &'a Name {
        &self.fields[0].name
    }

    /// The key of this field in the response: its alias if any, or its name
    pub fn response_key(&self) -> &'a Name {
        let field = self.fields[0];
        field.alias.as_ref().unwrap_or(&field.name)
    }

    /// The field selections being resolved.
    ///
    /// There is always at least one, but there may be more in case of
    /// [field merging](https://spec.graphql.org/October2021/#sec-Field-Selection-Merging).
    pub fn field_nodes(&self) -> &'a [&'a Node<ast::Field>] {
        self.fields
    }

    /// The field definition in the schema
    pub fn field_definition(&self) -> &'a FieldDefinition {
        self.field_definition
    }

    /// The declared type of the field
    pub fn return_type(&self) -> &'a ast::Type {
        &self.field_definition.ty
    }

    /// The object type that declares this field
    pub fn parent_type(&self) -> &'a ObjectType {
        self.parent_type
    }

    /// The path of this field in the response data
    pub fn path(&self) -> Vec<PathElement> {
        path_to_vec(self.path)
    }

    /// The schema originally passed to [`Execution::new`][crate::Execution::new]
    pub fn schema(&self) -> &'a ExecutableSchema {
        self.ctx.schema
    }

    /// Returns the fragment definition with the given name, if the document has one
    pub fn fragment(&self, name: &str) -> Option<&'a Node<ast::FragmentDefinition>> {
        self.ctx.fragments.get(name).copied()
    }

    /// The initial value of execution, passed as source to root fields
    pub fn root_value(&self) -> &'a ResolvedValue {
        self.ctx.root_value
    }

    /// The operation being executed
    pub fn operation(&self) -> &'a Node<ast::OperationDefinition> {
        self.ctx.operation
    }

    /// Values of the operation’s variables, after coercion
    pub fn variable_values(&self) -> &'a JsonMap {
        &self.ctx.variable_values
    }
}

impl ResolvedValue {
    /// Construct a null resolved value
    pub fn null() -> Self {
        Self::Json(JsonValue::Null)
    }

    /// Construct a resolved value from something that is convertible to JSON
    pub fn json(json: impl Into<JsonValue>) -> Self {
        Self::Json(json.into())
    }

    /// Construct an object resolved value
    pub fn object(object: impl ObjectValue + 'static) -> Self {
        Self::Object(Box::new(object))
    }

    /// Construct an object resolved value or null
    pub fn nullable_object(opt_object: Option<impl ObjectValue + 'static>) -> Self {
        match opt_object {
            Some(object) => Self::object(object),
            None => Self::null(),
        }
    }

    /// Construct a list resolved value from an iterator
    ///
    /// If errors can happen for individual items,
    /// construct the [`ResolvedValue::List`] enum variant directly instead.
    pub fn list<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Self>,
        I::IntoIter: 'static,
    {
        Self::List(Box::new(iter.into_iter().map(Ok)))
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Self::Json(JsonValue::Null))
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
            Self::List(_) => f.write_str("List(..)"),
        }
    }
}

/// How a resolved value is shown in error messages
impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(json) => write!(f, "{json}"),
            Self::Object(_) => f.write_str("{object}"),
            Self::List(_) => f.write_str("[list]"),
        }
    }
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: JsonMap::new(),
        }
    }

    /// Adds an entry to the `extensions` of the eventual response error
    pub fn with_extension(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.extensions.insert(key, value.into());
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
