use crate::input_coercion::coerce_argument_values;
use crate::input_coercion::coerce_variable_values;
use crate::request::RequestError;
use crate::resolver::default_field_resolver;
use crate::resolver::FieldError;
use crate::resolver::FieldResolverFn;
use crate::resolver::ResolveInfo;
use crate::resolver::ResolvedValue;
use crate::response::GraphQLError;
use crate::response::LinkedPath;
use crate::response::LinkedPathElement;
use crate::response::PathElement;
use crate::response::Response;
use crate::response::ResponseData;
use crate::result_coercion::complete_value;
use crate::schema::ExecutableSchema;
use crate::JsonMap;
use crate::JsonValue;
use apollo_compiler::ast;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::Name;
use apollo_compiler::Node;
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;

/// <https://spec.graphql.org/October2021/#sec-Normal-and-Serial-Execution>
#[derive(Debug, Copy, Clone)]
pub(crate) enum ExecutionMode {
    /// Allowed to resolve fields in any order
    Normal,
    /// Top-level fields of a mutation operation must be executed in order
    Sequential,
}

/// Return in `Err` when a field error occurred at some non-nullable place.
/// The error itself was already recorded.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) struct PropagateNull;

/// Everything that stays the same for the whole execution of one request
pub(crate) struct ExecutionContext<'a> {
    pub(crate) schema: &'a ExecutableSchema,
    pub(crate) sources: &'a SourceMap,
    pub(crate) fragments: HashMap<&'a str, &'a Node<ast::FragmentDefinition>>,
    pub(crate) root_value: &'a ResolvedValue,
    pub(crate) context_value: &'a dyn Any,
    pub(crate) operation: &'a Node<ast::OperationDefinition>,
    pub(crate) variable_values: JsonMap,
    pub(crate) field_resolver: &'a FieldResolverFn,
}

/// Builder for configuring the execution of one GraphQL request
///
/// ```
/// use apollo_compiler::ast::Document;
/// use apollo_compiler::Schema;
/// use apollo_executor::ExecutableSchema;
/// use apollo_executor::Execution;
/// use apollo_executor::ResolvedValue;
///
/// let schema = Schema::parse_and_validate("type Query { hello: String }", "schema.graphql").unwrap();
/// let schema = ExecutableSchema::builder(schema)
///     .resolver("Query", "hello", |_, _, _, _| Ok(ResolvedValue::json("world")))
///     .build()
///     .unwrap();
/// let document = Document::parse("{ hello }", "query.graphql").unwrap();
/// let response = Execution::new(&schema, &document).execute().unwrap();
/// assert_eq!(
///     serde_json::to_string(&response).unwrap(),
///     r#"{"data":{"hello":"world"}}"#
/// );
/// ```
pub struct Execution<'a> {
    schema: &'a ExecutableSchema,
    document: &'a ast::Document,
    operation_name: Option<&'a str>,
    variable_values: Option<&'a JsonMap>,
    root_value: ResolvedValue,
    context_value: &'a dyn Any,
    field_resolver: &'a FieldResolverFn,
}

impl<'a> Execution<'a> {
    /// Create a new builder for execution of `document` against `schema`.
    ///
    /// The document is expected to have been validated against the schema.
    pub fn new(schema: &'a ExecutableSchema, document: &'a ast::Document) -> Self {
        Self {
            schema,
            document,
            operation_name: None,
            variable_values: None,
            root_value: ResolvedValue::null(),
            context_value: &(),
            field_resolver: &default_field_resolver,
        }
    }

    /// Select the operation to execute by name.
    ///
    /// Required if the document has more than one operation.
    pub fn operation_name(mut self, operation_name: Option<&'a str>) -> Self {
        self.operation_name = operation_name;
        self
    }

    /// Provide raw values of the operation’s variables, as found in a GraphQL request.
    ///
    /// They are coerced to the types declared by the operation before execution starts.
    pub fn variable_values(mut self, variable_values: &'a JsonMap) -> Self {
        self.variable_values = Some(variable_values);
        self
    }

    /// The source value passed to resolvers of root fields. Defaults to null.
    pub fn root_value(mut self, root_value: ResolvedValue) -> Self {
        self.root_value = root_value;
        self
    }

    /// A value passed as-is to every resolver, such as request-scoped state.
    /// Resolvers access it with [`Any::downcast_ref`]. Defaults to `()`.
    pub fn context_value(mut self, context_value: &'a dyn Any) -> Self {
        self.context_value = context_value;
        self
    }

    /// The resolver for fields that don’t have one registered in the schema.
    ///
    /// Defaults to [`default_field_resolver`].
    pub fn field_resolver(mut self, field_resolver: &'a FieldResolverFn) -> Self {
        self.field_resolver = field_resolver;
        self
    }

    /// Execute the selected operation.
    ///
    /// Field errors are part of the response.
    /// `Err` is returned for a request error, in which case no resolver was called.
    /// [`RequestError::to_response`] can convert it to a response.
    pub fn execute(&self) -> Result<Response, RequestError> {
        self.execute_inner().map_err(|error| {
            tracing::debug!(%error, "request error");
            error
        })
    }

    fn execute_inner(&self) -> Result<Response, RequestError> {
        let ctx = self.build_context()?;
        let operation = ctx.operation;
        let span = tracing::debug_span!(
            "execute_operation",
            operation.name = operation.name.as_ref().map(|name| name.as_str()),
            operation.kind = operation.operation_type.name(),
        );
        let _guard = span.enter();
        let (root_type, mode) = root_operation_type(ctx.schema, operation)?;
        let mut errors = Vec::new();
        let data = execute_selection_set(
            &ctx,
            &mut errors,
            None,
            mode,
            root_type,
            ctx.root_value,
            &operation.selection_set,
        );
        tracing::debug!(errors = errors.len(), "executed operation");
        Ok(Response {
            errors,
            data: data.into(),
        })
    }

    /// <https://spec.graphql.org/October2021/#GetOperation()>
    /// and <https://spec.graphql.org/October2021/#CoerceVariableValues()>
    fn build_context(&self) -> Result<ExecutionContext<'_>, RequestError> {
        let mut operation = None;
        let mut fragments = HashMap::new();
        for definition in &self.document.definitions {
            match definition {
                ast::Definition::OperationDefinition(def) => match self.operation_name {
                    None if operation.is_some() => return Err(RequestError::AmbiguousOperation),
                    None => operation = Some(def),
                    Some(name) => {
                        if def.name.as_ref().is_some_and(|def_name| def_name == name) {
                            operation = Some(def)
                        }
                    }
                },
                ast::Definition::FragmentDefinition(def) => {
                    fragments.insert(def.name.as_str(), def);
                }
                _ => {
                    let (kind, location) = describe_definition(definition);
                    return Err(RequestError::UnsupportedDefinition { kind, location });
                }
            }
        }
        let operation = match (operation, self.operation_name) {
            (Some(operation), _) => operation,
            (None, Some(name)) => {
                return Err(RequestError::UnknownOperation {
                    name: name.to_owned(),
                })
            }
            (None, None) => return Err(RequestError::NoOperation),
        };
        let empty = JsonMap::new();
        let variable_values = coerce_variable_values(
            self.schema.definitions(),
            operation,
            self.variable_values.unwrap_or(&empty),
        )?;
        Ok(ExecutionContext {
            schema: self.schema,
            sources: &self.document.sources,
            fragments,
            root_value: &self.root_value,
            context_value: self.context_value,
            operation,
            variable_values,
            field_resolver: self.field_resolver,
        })
    }
}

fn root_operation_type<'a>(
    schema: &'a ExecutableSchema,
    operation: &Node<ast::OperationDefinition>,
) -> Result<(&'a ObjectType, ExecutionMode), RequestError> {
    let location = operation.location();
    let root_type = schema.root_operation_type(operation.operation_type);
    match operation.operation_type {
        ast::OperationType::Query => root_type
            .map(|def| (&**def, ExecutionMode::Normal))
            .ok_or(RequestError::QueryNotConfigured { location }),
        ast::OperationType::Mutation => root_type
            .map(|def| (&**def, ExecutionMode::Sequential))
            .ok_or(RequestError::MutationsNotConfigured { location }),
        ast::OperationType::Subscription => root_type
            .map(|def| (&**def, ExecutionMode::Normal))
            .ok_or(RequestError::SubscriptionsNotConfigured { location }),
    }
}

fn describe_definition(definition: &ast::Definition) -> (&'static str, Option<SourceSpan>) {
    match definition {
        ast::Definition::OperationDefinition(def) => ("OperationDefinition", def.location()),
        ast::Definition::FragmentDefinition(def) => ("FragmentDefinition", def.location()),
        ast::Definition::DirectiveDefinition(def) => ("DirectiveDefinition", def.location()),
        ast::Definition::SchemaDefinition(def) => ("SchemaDefinition", def.location()),
        ast::Definition::ScalarTypeDefinition(def) => ("ScalarTypeDefinition", def.location()),
        ast::Definition::ObjectTypeDefinition(def) => ("ObjectTypeDefinition", def.location()),
        ast::Definition::InterfaceTypeDefinition(def) => {
            ("InterfaceTypeDefinition", def.location())
        }
        ast::Definition::UnionTypeDefinition(def) => ("UnionTypeDefinition", def.location()),
        ast::Definition::EnumTypeDefinition(def) => ("EnumTypeDefinition", def.location()),
        ast::Definition::InputObjectTypeDefinition(def) => {
            ("InputObjectTypeDefinition", def.location())
        }
        ast::Definition::SchemaExtension(def) => ("SchemaExtension", def.location()),
        ast::Definition::ScalarTypeExtension(def) => ("ScalarTypeExtension", def.location()),
        ast::Definition::ObjectTypeExtension(def) => ("ObjectTypeExtension", def.location()),
        ast::Definition::InterfaceTypeExtension(def) => ("InterfaceTypeExtension", def.location()),
        ast::Definition::UnionTypeExtension(def) => ("UnionTypeExtension", def.location()),
        ast::Definition::EnumTypeExtension(def) => ("EnumTypeExtension", def.location()),
        ast::Definition::InputObjectTypeExtension(def) => {
            ("InputObjectTypeExtension", def.location())
        }
    }
}

/// <https://spec.graphql.org/October2021/#ExecuteSelectionSet()>
pub(crate) fn execute_selection_set<'a>(
    ctx: &ExecutionContext<'a>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    mode: ExecutionMode,
    object_type: &ObjectType,
    source: &ResolvedValue,
    selections: impl IntoIterator<Item = &'a ast::Selection>,
) -> Result<JsonMap, PropagateNull> {
    let mut grouped_field_set = IndexMap::new();
    collect_fields(
        ctx,
        object_type,
        selections,
        &mut HashSet::new(),
        &mut grouped_field_set,
    );

    match mode {
        ExecutionMode::Normal => {
            // Resolvers are synchronous: fields are still executed one at a time, in order,
            // but nothing here may rely on it except the order of keys in the response.
        }
        ExecutionMode::Sequential => {
            // Each root mutation field, including its whole subtree,
            // completes before the next one starts.
        }
    }

    let mut response_map = JsonMap::with_capacity(grouped_field_set.len());
    for (&response_key, fields) in &grouped_field_set {
        // Indexing should not panic: `collect_fields` only creates a `Vec` to push to it
        let field_name = &fields[0].name;
        let Some(field_def) = ctx.schema.field_definition(&object_type.name, field_name) else {
            // Not a field of this type: omitted from the response, not null
            continue;
        };
        let field_path = LinkedPathElement {
            element: PathElement::Field(response_key.clone()),
            next: path,
        };
        let value = execute_field(
            ctx,
            errors,
            Some(&field_path),
            object_type,
            source,
            field_def,
            fields,
        )?;
        response_map.insert(response_key.as_str(), value);
    }
    Ok(response_map)
}

/// <https://spec.graphql.org/October2021/#CollectFields()>
fn collect_fields<'a>(
    ctx: &ExecutionContext<'a>,
    object_type: &ObjectType,
    selections: impl IntoIterator<Item = &'a ast::Selection>,
    visited_fragments: &mut HashSet<&'a Name>,
    grouped_fields: &mut IndexMap<&'a Name, Vec<&'a Node<ast::Field>>>,
) {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                if !should_include_node(ctx, &field.directives) {
                    continue;
                }
                let response_key = field.alias.as_ref().unwrap_or(&field.name);
                grouped_fields.entry(response_key).or_default().push(field)
            }
            ast::Selection::FragmentSpread(spread) => {
                let new = visited_fragments.insert(&spread.fragment_name);
                if !new || !should_include_node(ctx, &spread.directives) {
                    continue;
                }
                let Some(fragment) = ctx.fragments.get(spread.fragment_name.as_str()) else {
                    continue;
                };
                if !does_fragment_type_apply(ctx.schema, object_type, &fragment.type_condition) {
                    continue;
                }
                collect_fields(
                    ctx,
                    object_type,
                    &fragment.selection_set,
                    visited_fragments,
                    grouped_fields,
                )
            }
            ast::Selection::InlineFragment(inline) => {
                if !should_include_node(ctx, &inline.directives) {
                    continue;
                }
                if let Some(condition) = &inline.type_condition {
                    if !does_fragment_type_apply(ctx.schema, object_type, condition) {
                        continue;
                    }
                }
                collect_fields(
                    ctx,
                    object_type,
                    &inline.selection_set,
                    visited_fragments,
                    grouped_fields,
                )
            }
        }
    }
}

/// <https://spec.graphql.org/October2021/#DoesFragmentTypeApply()>
fn does_fragment_type_apply(
    schema: &ExecutableSchema,
    object_type: &ObjectType,
    fragment_type: &Name,
) -> bool {
    match schema.get_type(fragment_type) {
        Some(ExtendedType::Object(_)) => *fragment_type == object_type.name,
        Some(ExtendedType::Interface(_) | ExtendedType::Union(_)) => {
            schema.is_possible_type(fragment_type, &object_type.name)
        }
        // Undefined or not an output type
        _ => false,
    }
}

/// `@skip` takes precedence over `@include`
fn should_include_node(ctx: &ExecutionContext<'_>, directives: &ast::DirectiveList) -> bool {
    if let Some(skip) = directives.get("skip") {
        if eval_if_arg(ctx, skip) == Some(true) {
            return false;
        }
    }
    if let Some(include) = directives.get("include") {
        return eval_if_arg(ctx, include) == Some(true);
    }
    true
}

/// Returns `None` if the `if` argument cannot be coerced to a boolean
fn eval_if_arg(ctx: &ExecutionContext<'_>, directive: &ast::Directive) -> Option<bool> {
    let schema = ctx.schema.definitions();
    let definition = schema.directive_definitions.get(directive.name.as_str())?;
    match coerce_argument_values(
        schema,
        &definition.arguments,
        &directive.arguments,
        &ctx.variable_values,
    ) {
        Ok(arguments) => arguments.get("if").and_then(JsonValue::as_bool),
        Err(error) => {
            tracing::debug!(
                directive = %directive.name,
                %error,
                "directive argument not coercible"
            );
            None
        }
    }
}

/// <https://spec.graphql.org/October2021/#ExecuteField()>
fn execute_field<'a>(
    ctx: &ExecutionContext<'a>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    object_type: &ObjectType,
    source: &ResolvedValue,
    field_def: &apollo_compiler::schema::FieldDefinition,
    fields: &[&'a Node<ast::Field>],
) -> Result<JsonValue, PropagateNull> {
    let field = fields[0];
    let info = ResolveInfo {
        ctx,
        parent_type: object_type,
        field_definition: field_def,
        fields,
        path,
    };
    let resolved = coerce_argument_values(
        ctx.schema.definitions(),
        &field_def.arguments,
        &field.arguments,
        &ctx.variable_values,
    )
    .and_then(|arguments| resolve_field(ctx, object_type, source, &arguments, &info));
    let completed = complete_value(ctx, errors, path, &info, &field_def.ty, resolved, fields);
    try_nullify(&field_def.ty, completed)
}

fn resolve_field(
    ctx: &ExecutionContext<'_>,
    object_type: &ObjectType,
    source: &ResolvedValue,
    arguments: &JsonMap,
    info: &ResolveInfo<'_>,
) -> Result<ResolvedValue, FieldError> {
    let field_name = info.field_name().as_str();
    if let Some(resolver) = ctx.schema.field_resolver(&object_type.name, field_name) {
        return resolver(source, arguments, ctx.context_value, info);
    }
    match field_name {
        "__typename" => Ok(ResolvedValue::json(object_type.name.as_str())),
        // Only defined on the root query type, other types don’t get this far
        "__schema" | "__type" => Err(FieldError::new(
            "Schema introspection is not provided by this executor.",
        )),
        _ => (ctx.field_resolver)(source, arguments, ctx.context_value, info),
    }
}

/// Try to insert a propagated null if possible, or keep propagating it.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) fn try_nullify(
    ty: &ast::Type,
    result: Result<JsonValue, PropagateNull>,
) -> Result<JsonValue, PropagateNull> {
    match result {
        Ok(json) => Ok(json),
        Err(PropagateNull) => {
            if ty.is_non_null() {
                Err(PropagateNull)
            } else {
                Ok(JsonValue::Null)
            }
        }
    }
}

impl From<Result<JsonMap, PropagateNull>> for ResponseData {
    fn from(result: Result<JsonMap, PropagateNull>) -> Self {
        match result {
            Ok(data) => Self::Object(data),
            Err(PropagateNull) => Self::Null,
        }
    }
}
