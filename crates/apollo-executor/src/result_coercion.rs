use crate::execution::execute_selection_set;
use crate::execution::try_nullify;
use crate::execution::ExecutionContext;
use crate::execution::ExecutionMode;
use crate::execution::PropagateNull;
use crate::resolver::FieldError;
use crate::resolver::ResolveInfo;
use crate::resolver::ResolvedValue;
use crate::response::GraphQLError;
use crate::response::LinkedPath;
use crate::response::LinkedPathElement;
use crate::response::PathElement;
use crate::JsonValue;
use apollo_compiler::ast;
use apollo_compiler::ast::Type;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::Name;
use apollo_compiler::Node;
use serde_json_bytes::serde_json::Number;

/// Records a field error at `path` and starts propagating null
fn field_error(
    ctx: &ExecutionContext<'_>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    fields: &[&Node<ast::Field>],
    error: FieldError,
) -> PropagateNull {
    let mut graphql_error = GraphQLError::field_error(error.message, path, fields, ctx.sources);
    graphql_error.extensions = error.extensions;
    tracing::trace!(
        message = %graphql_error.message,
        path = ?graphql_error.path,
        "field error"
    );
    errors.push(graphql_error);
    PropagateNull
}

/// <https://spec.graphql.org/October2021/#CompleteValue()>
///
/// Returns `Err` for a field error being propagated upwards to find a nullable place
pub(crate) fn complete_value<'a>(
    ctx: &ExecutionContext<'a>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    info: &ResolveInfo<'_>,
    ty: &Type,
    resolved: Result<ResolvedValue, FieldError>,
    fields: &[&'a Node<ast::Field>],
) -> Result<JsonValue, PropagateNull> {
    macro_rules! field_error {
        ($($arg: tt)+) => {
            return Err(field_error(ctx, errors, path, fields, FieldError::new(format!($($arg)+))))
        };
    }
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(error) => return Err(field_error(ctx, errors, path, fields, error)),
    };
    if resolved.is_null() {
        if ty.is_non_null() {
            field_error!(
                "Cannot return null for non-nullable field {}.{}.",
                info.parent_type().name,
                info.field_name()
            )
        }
        return Ok(JsonValue::Null);
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            return complete_list_value(ctx, errors, path, info, inner, resolved, fields);
        }
        Type::Named(name) | Type::NonNullNamed(name) => name,
    };
    let Some(ty_def) = ctx.schema.get_type(ty_name) else {
        field_error!("Unknown type \"{ty_name}\".")
    };
    let runtime_type = match ty_def {
        ExtendedType::Scalar(_) | ExtendedType::Enum(_) => {
            return complete_leaf_value(ctx, errors, path, ty_name, ty_def, resolved, fields);
        }
        ExtendedType::InputObject(_) => {
            field_error!("Input object type \"{ty_name}\" cannot be used as an output type.")
        }
        ExtendedType::Object(def) => RuntimeType {
            def,
            is_type_of_checked: false,
        },
        ExtendedType::Interface(_) | ExtendedType::Union(_) => {
            match resolve_abstract_type(ctx, info, ty_name, &resolved) {
                Ok(runtime_type) => runtime_type,
                Err(message) => field_error!("{message}"),
            }
        }
    };
    complete_object_value(ctx, errors, path, info, runtime_type, resolved, fields)
}

fn complete_list_value<'a>(
    ctx: &ExecutionContext<'a>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    info: &ResolveInfo<'_>,
    inner_ty: &Type,
    resolved: ResolvedValue,
    fields: &[&'a Node<ast::Field>],
) -> Result<JsonValue, PropagateNull> {
    let items: Box<dyn Iterator<Item = Result<ResolvedValue, FieldError>>> = match resolved {
        ResolvedValue::List(iter) => iter,
        ResolvedValue::Json(JsonValue::Array(items)) => {
            Box::new(items.into_iter().map(|item| Ok(ResolvedValue::Json(item))))
        }
        ResolvedValue::Json(_) | ResolvedValue::Object(_) => {
            let message = format!(
                "Expected Iterable, but did not find one for field {}.{}.",
                info.parent_type().name,
                info.field_name()
            );
            return Err(field_error(ctx, errors, path, fields, message.into()));
        }
    };
    let mut completed_list = Vec::with_capacity(items.size_hint().0);
    for (index, inner_resolved) in items.enumerate() {
        let inner_path = LinkedPathElement {
            element: PathElement::ListIndex(index),
            next: path,
        };
        let inner_result = complete_value(
            ctx,
            errors,
            Some(&inner_path),
            info,
            inner_ty,
            inner_resolved,
            fields,
        );
        // On field error, try to nullify that item.
        // If the item is non-null, the error propagates to the list.
        completed_list.push(try_nullify(inner_ty, inner_result)?)
    }
    Ok(completed_list.into())
}

fn complete_leaf_value(
    ctx: &ExecutionContext<'_>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    ty_name: &Name,
    ty_def: &ExtendedType,
    resolved: ResolvedValue,
    fields: &[&Node<ast::Field>],
) -> Result<JsonValue, PropagateNull> {
    let serialized = match &resolved {
        ResolvedValue::Json(json) => ctx.schema.serialize(ty_def, json),
        ResolvedValue::Object(_) | ResolvedValue::List(_) => None,
    };
    match serialized {
        Some(value) if !value.is_null() => Ok(value),
        _ => {
            let message = format!(
                "Expected a value of type \"{ty_name}\" but received: {resolved}"
            );
            Err(field_error(ctx, errors, path, fields, message.into()))
        }
    }
}

/// The object type a value is completed as
struct RuntimeType<'s> {
    def: &'s Node<ObjectType>,
    /// The `is_type_of` predicate of `def` already accepted the value
    is_type_of_checked: bool,
}

/// Find the object type of a value whose declared type is an interface or union.
///
/// Returns the message of a field error on failure.
fn resolve_abstract_type<'s>(
    ctx: &ExecutionContext<'s>,
    info: &ResolveInfo<'_>,
    abstract_type: &Name,
    resolved: &ResolvedValue,
) -> Result<RuntimeType<'s>, String> {
    let schema = ctx.schema;
    let (runtime_type_name, is_type_of_checked) = match schema.type_resolver(abstract_type) {
        Some(resolve_type) => (resolve_type(resolved, ctx.context_value, info), false),
        None => (
            schema
                .possible_types(abstract_type)
                .find(|def| {
                    schema
                        .is_type_of(&def.name)
                        .is_some_and(|is_type_of| is_type_of(resolved, ctx.context_value, info))
                })
                .map(|def| def.name.to_string()),
            true,
        ),
    };
    let Some(runtime_type_name) = runtime_type_name else {
        return Err(format!(
            "Abstract type \"{abstract_type}\" must resolve to an Object type at runtime \
             for field {}.{}. Either the \"{abstract_type}\" type should provide a type resolver \
             or each possible type should provide an is-type-of predicate.",
            info.parent_type().name,
            info.field_name()
        ));
    };
    let Some(object_type) = schema.get_object(&runtime_type_name) else {
        return Err(format!(
            "Abstract type {abstract_type} must resolve to an Object type at runtime \
             for field {}.{} with value {resolved}, received \"{runtime_type_name}\".",
            info.parent_type().name,
            info.field_name()
        ));
    };
    if !schema.is_possible_type(abstract_type, &runtime_type_name) {
        return Err(format!(
            "Runtime Object type \"{runtime_type_name}\" is not a possible type for \"{abstract_type}\"."
        ));
    }
    Ok(RuntimeType {
        def: object_type,
        is_type_of_checked,
    })
}

fn complete_object_value<'a>(
    ctx: &ExecutionContext<'a>,
    errors: &mut Vec<GraphQLError>,
    path: LinkedPath<'_>,
    info: &ResolveInfo<'_>,
    runtime_type: RuntimeType<'_>,
    resolved: ResolvedValue,
    fields: &[&'a Node<ast::Field>],
) -> Result<JsonValue, PropagateNull> {
    let RuntimeType {
        def: object_type,
        is_type_of_checked,
    } = runtime_type;
    if let Some(is_type_of) = ctx.schema.is_type_of(&object_type.name) {
        if !is_type_of_checked && !is_type_of(&resolved, ctx.context_value, info) {
            let message = format!(
                "Expected value of type \"{}\" but got: {resolved}.",
                object_type.name
            );
            return Err(field_error(ctx, errors, path, fields, message.into()));
        }
    }
    execute_selection_set(
        ctx,
        errors,
        path,
        ExecutionMode::Normal,
        object_type,
        &resolved,
        fields
            .iter()
            .copied()
            .flat_map(|field| &field.selection_set),
    )
    .map(JsonValue::Object)
}

/// [Result coercion](https://spec.graphql.org/October2021/#sec-Scalars.Result-Coercion-and-Serialization)
/// of built-in scalars.
///
/// Returns `None` if `scalar_name` is not a built-in scalar,
/// or `Some(None)` if `value` cannot be represented in that scalar type.
pub(crate) fn serialize_built_in_scalar(
    scalar_name: &str,
    value: &JsonValue,
) -> Option<Option<JsonValue>> {
    let serialized = match scalar_name {
        "Int" => serialize_int(value),
        "Float" => serialize_float(value),
        "String" => match value {
            JsonValue::String(_) => Some(value.clone()),
            JsonValue::Bool(_) | JsonValue::Number(_) => Some(value.to_string().into()),
            _ => None,
        },
        "Boolean" => match value {
            JsonValue::Bool(_) => Some(value.clone()),
            JsonValue::Number(number) => number.as_f64().map(|float| (float != 0.0).into()),
            _ => None,
        },
        "ID" => match value {
            JsonValue::String(_) => Some(value.clone()),
            JsonValue::Number(number) if number.is_i64() || number.is_u64() => {
                Some(number.to_string().into())
            }
            _ => None,
        },
        _ => return None,
    };
    Some(serialized)
}

fn serialize_int(value: &JsonValue) -> Option<JsonValue> {
    let int = match value {
        JsonValue::Bool(boolean) => i64::from(*boolean),
        JsonValue::Number(number) => match number.as_i64() {
            Some(int) => int,
            None => integral_float(number.as_f64()?)?,
        },
        JsonValue::String(string) => {
            let string = string.as_str().trim();
            match string.parse::<i64>() {
                Ok(int) => int,
                Err(_) => integral_float(string.parse().ok()?)?,
            }
        }
        _ => return None,
    };
    // Int is a signed 32-bit integer
    i32::try_from(int)
        .ok()
        .map(|int| JsonValue::from(i64::from(int)))
}

fn integral_float(float: f64) -> Option<i64> {
    if float.is_finite() && float.fract() == 0.0 && float.abs() <= i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn serialize_float(value: &JsonValue) -> Option<JsonValue> {
    let float = match value {
        JsonValue::Bool(boolean) => f64::from(u8::from(*boolean)),
        // Keep integers as they are
        JsonValue::Number(_) => return Some(value.clone()),
        JsonValue::String(string) => string.as_str().trim().parse().ok()?,
        _ => return None,
    };
    Number::from_f64(float).map(JsonValue::Number)
}
