//! [Input coercion](https://spec.graphql.org/October2021/#sec-Input-Values) of variables and arguments

use crate::request::RequestError;
use crate::resolver::FieldError;
use crate::JsonMap;
use crate::JsonValue;
use apollo_compiler::ast;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputValueDefinition;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use serde_json_bytes::serde_json::Number;

/// Coerce the values of variables from a GraphQL request to the types expected by the operation.
///
/// If type coercion fails, a request error is returned and the request must not be executed.
///
/// This is [CoerceVariableValues()](https://spec.graphql.org/October2021/#CoerceVariableValues())
/// in the GraphQL specification.
pub fn coerce_variable_values(
    schema: &Schema,
    operation: &ast::OperationDefinition,
    values: &JsonMap,
) -> Result<JsonMap, RequestError> {
    let mut coerced_values = JsonMap::new();
    for variable_def in &operation.variables {
        let name = variable_def.name.as_str();
        let ty = &*variable_def.ty;
        let error = |message: String| RequestError::VariableCoercion {
            message,
            location: variable_def.location(),
        };
        if !is_input_type(schema, ty) {
            return Err(error(format!(
                "Variable \"${name}\" expected value of type \"{ty}\" \
                 which cannot be used as an input type."
            )));
        }
        if let Some((key, value)) = values.get_key_value(name) {
            if value.is_null() && ty.is_non_null() {
                return Err(error(format!(
                    "Variable \"${name}\" of non-null type \"{ty}\" must not be null."
                )));
            }
            let value = coerce_input_value(schema, ty, value).map_err(|reason| {
                error(format!(
                    "Variable \"${name}\" got invalid value {value}; {reason}"
                ))
            })?;
            coerced_values.insert(key.clone(), value);
        } else if let Some(default) = &variable_def.default_value {
            let value = coerce_literal(schema, ty, default, &JsonMap::new()).map_err(|reason| {
                error(format!(
                    "Variable \"${name}\" has invalid default value {}; {reason}",
                    &**default
                ))
            })?;
            coerced_values.insert(name, value);
        } else if ty.is_non_null() {
            return Err(error(format!(
                "Variable \"${name}\" of required type \"{ty}\" was not provided."
            )));
        } else {
            // Nullable variable with no provided value nor explicit default:
            // leave it absent, which is distinct from an explicit null
        }
    }
    Ok(coerced_values)
}

/// Coerce the arguments of a field or directive to the types of their definitions.
///
/// Variable references are replaced with their (already coerced) value from `variable_values`.
///
/// This is [CoerceArgumentValues()](https://spec.graphql.org/October2021/#CoerceArgumentValues())
/// in the GraphQL specification.
pub fn coerce_argument_values(
    schema: &Schema,
    definitions: &[Node<InputValueDefinition>],
    arguments: &[Node<ast::Argument>],
    variable_values: &JsonMap,
) -> Result<JsonMap, FieldError> {
    let mut coerced_values = JsonMap::new();
    for arg_def in definitions {
        let name = arg_def.name.as_str();
        let ty = &*arg_def.ty;
        let argument = arguments.iter().find(|arg| arg.name == arg_def.name);
        let provided = match argument.map(|arg| &*arg.value) {
            Some(Value::Variable(var)) => match variable_values.get(var.as_str()) {
                Some(value) => Some(value.clone()),
                None if arg_def.default_value.is_none() && ty.is_non_null() => {
                    return Err(FieldError::new(format!(
                        "Argument \"{name}\" of required type \"{ty}\" was provided the variable \
                         \"${var}\" which was not provided a runtime value."
                    )))
                }
                None => None,
            },
            Some(value) => Some(coerce_literal(schema, ty, value, variable_values).map_err(
                |reason| {
                    FieldError::new(format!(
                        "Argument \"{name}\" has invalid value {value}; {reason}"
                    ))
                },
            )?),
            None => None,
        };
        if let Some(value) = provided {
            if value.is_null() && ty.is_non_null() {
                return Err(FieldError::new(format!(
                    "Argument \"{name}\" of non-null type \"{ty}\" must not be null."
                )));
            }
            coerced_values.insert(name, value);
        } else if let Some(default) = &arg_def.default_value {
            let value = coerce_literal(schema, ty, default, &JsonMap::new()).map_err(|reason| {
                FieldError::new(format!(
                    "Argument \"{name}\" has invalid default value {}; {reason}",
                    &**default
                ))
            })?;
            coerced_values.insert(name, value);
        } else if ty.is_non_null() {
            return Err(FieldError::new(format!(
                "Argument \"{name}\" of required type \"{ty}\" was not provided."
            )));
        }
    }
    Ok(coerced_values)
}

fn is_input_type(schema: &Schema, ty: &Type) -> bool {
    matches!(
        schema.types.get(ty.inner_named_type()),
        Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_) | ExtendedType::InputObject(_))
    )
}

/// Coerce a JSON value provided for a variable, returning the reason in case of failure
fn coerce_input_value(schema: &Schema, ty: &Type, value: &JsonValue) -> Result<JsonValue, String> {
    if value.is_null() {
        if ty.is_non_null() {
            return Err(format!(
                "Expected non-nullable type \"{ty}\" not to be null."
            ));
        }
        return Ok(JsonValue::Null);
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            // https://spec.graphql.org/October2021/#sec-List.Input-Coercion
            return value
                .as_array()
                .map(Vec::as_slice)
                // If not an array, treat the value as an array of size one:
                .unwrap_or(std::slice::from_ref(value))
                .iter()
                .map(|item| coerce_input_value(schema, inner, item))
                .collect();
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let invalid = || format!("Expected type \"{ty_name}\".");
    match schema.types.get(ty_name) {
        Some(ExtendedType::Scalar(_)) => match ty_name.as_str() {
            "Int" => {
                // https://spec.graphql.org/October2021/#sec-Int.Input-Coercion
                if let Some(int) = value.as_i64() {
                    return i32::try_from(int).map(|_| value.clone()).map_err(|_| {
                        format!("Int cannot represent non 32-bit signed integer value: {value}")
                    });
                }
                match value.as_f64() {
                    Some(float) if float.fract() == 0.0 && i32::try_from(float as i64).is_ok() => {
                        Ok(JsonValue::from(float as i64))
                    }
                    _ => Err(format!("Int cannot represent non-integer value: {value}")),
                }
            }
            // https://spec.graphql.org/October2021/#sec-Float.Input-Coercion
            "Float" if value.is_number() => Ok(value.clone()),
            // https://spec.graphql.org/October2021/#sec-String.Input-Coercion
            "String" if value.is_string() => Ok(value.clone()),
            // https://spec.graphql.org/October2021/#sec-Boolean.Input-Coercion
            "Boolean" if value.is_boolean() => Ok(value.clone()),
            // https://spec.graphql.org/October2021/#sec-ID.Input-Coercion
            "ID" if value.is_string() => Ok(value.clone()),
            "ID" if value.is_i64() || value.is_u64() => Ok(value.to_string().into()),
            "Int" | "Float" | "String" | "Boolean" | "ID" => Err(invalid()),
            // Custom scalar
            _ => Ok(value.clone()),
        },
        Some(ExtendedType::Enum(def)) => {
            // https://spec.graphql.org/October2021/#sec-Enums.Input-Coercion
            match value.as_str() {
                Some(name) if def.values.contains_key(name) => Ok(value.clone()),
                _ => Err(format!(
                    "Value {value} does not exist in \"{ty_name}\" enum."
                )),
            }
        }
        Some(ExtendedType::InputObject(def)) => {
            // https://spec.graphql.org/October2021/#sec-Input-Objects.Input-Coercion
            let Some(object) = value.as_object() else {
                return Err(format!("Expected type \"{ty_name}\" to be an object."));
            };
            if let Some(key) = object
                .keys()
                .find(|key| !def.fields.contains_key(key.as_str()))
            {
                return Err(format!(
                    "Field \"{}\" is not defined by type \"{ty_name}\".",
                    key.as_str()
                ));
            }
            let mut coerced = JsonMap::new();
            for (field_name, field_def) in &def.fields {
                if let Some(field_value) = object.get(field_name.as_str()) {
                    let field_value = coerce_input_value(schema, &field_def.ty, field_value)
                        .map_err(|reason| format!("at \"{field_name}\": {reason}"))?;
                    coerced.insert(field_name.as_str(), field_value);
                } else if let Some(default) = &field_def.default_value {
                    let default = coerce_literal(schema, &field_def.ty, default, &JsonMap::new())?;
                    coerced.insert(field_name.as_str(), default);
                } else if field_def.ty.is_non_null() {
                    return Err(format!(
                        "Field \"{ty_name}.{field_name}\" of required type \"{}\" was not provided.",
                        &*field_def.ty
                    ));
                }
            }
            Ok(coerced.into())
        }
        _ => Err(format!("Type \"{ty_name}\" is not an input type.")),
    }
}

/// Coerce a literal value from the document (an argument or a default value),
/// substituting variables. Returns the reason in case of failure.
fn coerce_literal(
    schema: &Schema,
    ty: &Type,
    value: &Value,
    variable_values: &JsonMap,
) -> Result<JsonValue, String> {
    match value {
        Value::Variable(var) => {
            // Variables were already coerced to the type declared on the operation
            return match variable_values.get(var.as_str()) {
                Some(value) if value.is_null() && ty.is_non_null() => Err(format!(
                    "Expected non-nullable type \"{ty}\" not to be null."
                )),
                Some(value) => Ok(value.clone()),
                None if ty.is_non_null() => Err(format!(
                    "Expected variable \"${var}\" of non-nullable type \"{ty}\" to have a value."
                )),
                None => Ok(JsonValue::Null),
            };
        }
        Value::Null => {
            if ty.is_non_null() {
                return Err(format!(
                    "Expected non-nullable type \"{ty}\" not to be null."
                ));
            }
            return Ok(JsonValue::Null);
        }
        _ => {}
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            return match value {
                Value::List(items) => items
                    .iter()
                    .map(|item| coerce_literal(schema, inner, item, variable_values))
                    .collect(),
                _ => Ok(JsonValue::Array(vec![coerce_literal(
                    schema,
                    inner,
                    value,
                    variable_values,
                )?])),
            };
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let invalid = || format!("Expected value of type \"{ty}\", found {value}.");
    match (schema.types.get(ty_name), value) {
        (Some(ExtendedType::Scalar(_)), _) => match (ty_name.as_str(), value) {
            ("Int", Value::Int(int)) => int
                .as_str()
                .parse::<i32>()
                .map(|int| JsonValue::from(i64::from(int)))
                .map_err(|_| {
                    format!(
                        "Int cannot represent non 32-bit signed integer value: {}",
                        int.as_str()
                    )
                }),
            ("Float", Value::Int(int)) => parse_float(int.as_str()).ok_or_else(invalid),
            ("Float", Value::Float(float)) => parse_float(float.as_str()).ok_or_else(invalid),
            ("String", Value::String(string)) => Ok(string.as_str().into()),
            ("Boolean", Value::Boolean(boolean)) => Ok((*boolean).into()),
            ("ID", Value::String(string)) => Ok(string.as_str().into()),
            ("ID", Value::Int(int)) => Ok(int.as_str().into()),
            ("Int" | "Float" | "String" | "Boolean" | "ID", _) => Err(invalid()),
            // Custom scalar
            _ => Ok(literal_to_json(value, variable_values)),
        },
        (Some(ExtendedType::Enum(def)), Value::Enum(name)) if def.values.contains_key(name) => {
            Ok(name.as_str().into())
        }
        (Some(ExtendedType::InputObject(def)), Value::Object(fields)) => {
            if let Some((key, _)) = fields.iter().find(|(key, _)| !def.fields.contains_key(key)) {
                return Err(format!(
                    "Field \"{key}\" is not defined by type \"{ty_name}\"."
                ));
            }
            let mut coerced = JsonMap::new();
            for (field_name, field_def) in &def.fields {
                let field_value = fields
                    .iter()
                    .find(|(key, _)| key == field_name)
                    .map(|(_, value)| value)
                    // A variable without a value counts as an absent field
                    .filter(|value| match &***value {
                        Value::Variable(var) => variable_values.contains_key(var.as_str()),
                        _ => true,
                    });
                if let Some(field_value) = field_value {
                    let field_value =
                        coerce_literal(schema, &field_def.ty, field_value, variable_values)?;
                    coerced.insert(field_name.as_str(), field_value);
                } else if let Some(default) = &field_def.default_value {
                    let default = coerce_literal(schema, &field_def.ty, default, &JsonMap::new())?;
                    coerced.insert(field_name.as_str(), default);
                } else if field_def.ty.is_non_null() {
                    return Err(format!(
                        "Field \"{ty_name}.{field_name}\" of required type \"{}\" was not provided.",
                        &*field_def.ty
                    ));
                }
            }
            Ok(coerced.into())
        }
        _ => Err(invalid()),
    }
}

fn parse_float(literal: &str) -> Option<JsonValue> {
    let float = literal.parse::<f64>().ok()?;
    Number::from_f64(float).map(JsonValue::Number)
}

/// Convert a literal to JSON without type information, as input to a custom scalar
fn literal_to_json(value: &Value, variable_values: &JsonMap) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Variable(var) => variable_values
            .get(var.as_str())
            .cloned()
            .unwrap_or(JsonValue::Null),
        Value::Enum(value) => value.as_str().into(),
        Value::String(value) => value.as_str().into(),
        Value::Boolean(value) => (*value).into(),
        Value::Int(value) => value
            .as_str()
            .parse::<i64>()
            .map(JsonValue::from)
            .ok()
            .or_else(|| parse_float(value.as_str()))
            .unwrap_or(JsonValue::Null),
        Value::Float(value) => parse_float(value.as_str()).unwrap_or(JsonValue::Null),
        Value::List(items) => items
            .iter()
            .map(|item| literal_to_json(item, variable_values))
            .collect(),
        Value::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(key, value)| (key.as_str().into(), literal_to_json(value, variable_values)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json_bytes::json;

    fn schema() -> apollo_compiler::validation::Valid<Schema> {
        Schema::parse_and_validate(
            r#"
            type Query {
                field(a: Int!, b: [String] = "single", c: Filter, d: ID): Int
            }
            input Filter { min: Float! max: Float = 10, tag: Color }
            enum Color { RED GREEN }
            scalar Json
            "#,
            "schema.graphql",
        )
        .unwrap()
    }

    fn parse_operation(source: &str) -> Node<ast::OperationDefinition> {
        let doc = ast::Document::parse(source, "query.graphql").unwrap();
        doc.definitions
            .into_iter()
            .find_map(|def| match def {
                ast::Definition::OperationDefinition(op) => Some(op),
                _ => None,
            })
            .unwrap()
    }

    fn field_arguments(
        schema: &Schema,
        operation: &ast::OperationDefinition,
        variables: &JsonMap,
    ) -> Result<JsonMap, FieldError> {
        let ast::Selection::Field(field) = &operation.selection_set[0] else {
            panic!("expected a field")
        };
        let def = schema.type_field("Query", "field").unwrap();
        coerce_argument_values(schema, &def.arguments, &field.arguments, variables)
    }

    #[test]
    fn variables() {
        let schema = schema();
        let op = parse_operation(
            "query($n: Int!, $tags: [String], $f: Filter, $id: ID = 4) { field(a: $n) }",
        );
        let raw = json!({"n": 3, "tags": "solo", "f": {"min": 1}});
        let coerced = coerce_variable_values(&schema, &op, raw.as_object().unwrap()).unwrap();
        assert_eq!(
            JsonValue::Object(coerced),
            json!({"n": 3, "tags": ["solo"], "f": {"min": 1, "max": 10.0}, "id": "4"})
        );
    }

    #[test]
    fn variable_errors() {
        let schema = schema();
        let op = parse_operation("query($n: Int!) { field(a: $n) }");
        let err = coerce_variable_values(&schema, &op, &JsonMap::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Variable "$n" of required type "Int!" was not provided."#
        );

        let raw = json!({"n": 2147483648_i64});
        let err = coerce_variable_values(&schema, &op, raw.as_object().unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Variable "$n" got invalid value 2147483648; Int cannot represent non 32-bit signed integer value: 2147483648"#
        );
        assert!(err.location().is_some());

        let op = parse_operation("query($f: Filter) { field(a: 1, c: $f) }");
        let raw = json!({"f": {"min": 1, "nope": true}});
        let err = coerce_variable_values(&schema, &op, raw.as_object().unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Variable "$f" got invalid value {"min":1,"nope":true}; Field "nope" is not defined by type "Filter"."#
        );
    }

    #[test]
    fn arguments() {
        let schema = schema();
        let op = parse_operation(
            "query($max: Float) { field(a: 1, c: {min: 2, max: $max, tag: RED}, d: 7) }",
        );
        let args = field_arguments(&schema, &op, &JsonMap::new()).unwrap();
        assert_eq!(
            JsonValue::Object(args),
            json!({"a": 1, "b": ["single"], "c": {"min": 2.0, "max": 10.0, "tag": "RED"}, "d": "7"})
        );

        let variables = json!({"max": 5.5});
        let args = field_arguments(&schema, &op, variables.as_object().unwrap()).unwrap();
        assert_eq!(
            args.get("c"),
            Some(&json!({"min": 2.0, "max": 5.5, "tag": "RED"}))
        );
    }

    #[test]
    fn argument_errors() {
        let schema = schema();
        let op = parse_operation("{ field }");
        let err = field_arguments(&schema, &op, &JsonMap::new()).unwrap_err();
        assert_eq!(
            err.message,
            r#"Argument "a" of required type "Int!" was not provided."#
        );

        let op = parse_operation("query($n: Int) { field(a: $n) }");
        let err = field_arguments(&schema, &op, &JsonMap::new()).unwrap_err();
        assert_eq!(
            err.message,
            r#"Argument "a" of required type "Int!" was provided the variable "$n" which was not provided a runtime value."#
        );

        let op = parse_operation(r#"{ field(a: "one") }"#);
        let err = field_arguments(&schema, &op, &JsonMap::new()).unwrap_err();
        assert_eq!(
            err.message,
            r#"Argument "a" has invalid value "one"; Expected value of type "Int!", found "one"."#
        );
    }
}
