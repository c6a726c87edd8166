//! A GraphQL schema together with the runtime behavior needed to execute operations against it

use crate::resolver::FieldResolverFn;
use crate::resolver::FieldResult;
use crate::resolver::ResolveInfo;
use crate::resolver::ResolvedValue;
use crate::result_coercion::serialize_built_in_scalar;
use crate::JsonMap;
use crate::JsonValue;
use apollo_compiler::ast;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Serializes the internal value of a leaf type (scalar or enum) to its response representation.
///
/// Returns `None` if the value cannot be represented in that type.
pub type SerializeFn = dyn Fn(&JsonValue) -> Option<JsonValue> + Send + Sync;

/// Determines the concrete object type of a value whose declared type is an interface or union.
///
/// Returns the name of an object type, or `None` if it cannot be determined.
pub type TypeResolverFn =
    dyn Fn(&ResolvedValue, &dyn Any, &ResolveInfo<'_>) -> Option<String> + Send + Sync;

/// Returns whether a value belongs to a given object type.
pub type IsTypeOfFn = dyn Fn(&ResolvedValue, &dyn Any, &ResolveInfo<'_>) -> bool + Send + Sync;

/// A valid schema, with field resolvers and other hooks attached to its types.
///
/// Built with [`ExecutableSchema::builder`]. Immutable once built.
pub struct ExecutableSchema {
    definitions: Valid<Schema>,
    field_resolvers: HashMap<Name, HashMap<Name, Box<FieldResolverFn>>>,
    serializers: HashMap<Name, Box<SerializeFn>>,
    type_resolvers: HashMap<Name, Box<TypeResolverFn>>,
    is_type_of: HashMap<Name, Box<IsTypeOfFn>>,
}

/// Builder for [`ExecutableSchema`]. Names are checked against the schema in [`build`][Self::build].
pub struct ExecutableSchemaBuilder {
    schema: ExecutableSchema,
    registered: Vec<Registration>,
}

enum Registration {
    Resolver {
        type_name: String,
        field_name: String,
    },
    Serializer { type_name: String },
    TypeResolver { type_name: String },
    IsTypeOf { type_name: String },
}

/// Returned by [`ExecutableSchemaBuilder::build`] when a hook does not match the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaBuildError {
    #[error("type `{name}` is not defined in the schema")]
    UndefinedType { name: String },

    #[error("field `{type_name}.{field_name}` is not defined in the schema")]
    UndefinedField {
        type_name: String,
        field_name: String,
    },

    #[error("a serializer is only allowed for scalar and enum types, but `{name}` is {kind}")]
    NotALeafType { name: String, kind: &'static str },

    #[error(
        "a type resolver is only allowed for interface and union types, but `{name}` is {kind}"
    )]
    NotAnAbstractType { name: String, kind: &'static str },

    #[error("an is-type-of predicate is only allowed for object types, but `{name}` is {kind}")]
    NotAnObjectType { name: String, kind: &'static str },

    #[error("name `{name}` is not a valid GraphQL name")]
    InvalidName { name: String },
}

impl ExecutableSchema {
    /// Start building an executable schema from a validated schema
    pub fn builder(definitions: Valid<Schema>) -> ExecutableSchemaBuilder {
        ExecutableSchemaBuilder {
            schema: ExecutableSchema {
                definitions,
                field_resolvers: HashMap::new(),
                serializers: HashMap::new(),
                type_resolvers: HashMap::new(),
                is_type_of: HashMap::new(),
            },
            registered: Vec::new(),
        }
    }

    /// The type definitions of this schema
    pub fn definitions(&self) -> &Valid<Schema> {
        &self.definitions
    }

    pub fn get_type(&self, name: &str) -> Option<&ExtendedType> {
        self.definitions.types.get(name)
    }

    pub fn get_object(&self, name: &str) -> Option<&Node<ObjectType>> {
        self.definitions.get_object(name)
    }

    /// Returns the object type for the root operation of the given kind, if the schema defines one
    pub fn root_operation_type(
        &self,
        operation_type: ast::OperationType,
    ) -> Option<&Node<ObjectType>> {
        let name = self.definitions.root_operation(operation_type)?;
        self.definitions.get_object(name)
    }

    /// Returns the definition of an explicit field or meta-field of an object type.
    ///
    /// `__typename` is defined on every type,
    /// `__schema` and `__type` only on the root query type.
    pub fn field_definition(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&Component<FieldDefinition>> {
        self.definitions.type_field(type_name, field_name).ok()
    }

    /// Returns the resolver registered for a field, if any
    pub fn field_resolver(&self, type_name: &str, field_name: &str) -> Option<&FieldResolverFn> {
        self.field_resolvers
            .get(type_name)?
            .get(field_name)
            .map(|resolver| &**resolver)
    }

    pub fn type_resolver(&self, abstract_type: &str) -> Option<&TypeResolverFn> {
        self.type_resolvers.get(abstract_type).map(|f| &**f)
    }

    pub fn is_type_of(&self, object_type: &str) -> Option<&IsTypeOfFn> {
        self.is_type_of.get(object_type).map(|f| &**f)
    }

    /// Returns the object types that a value of the given interface or union type can have,
    /// in the order they are declared in the schema.
    pub fn possible_types<'s>(
        &'s self,
        abstract_type: &'s str,
    ) -> impl Iterator<Item = &'s Node<ObjectType>> + 's {
        let union_members = self
            .definitions
            .get_union(abstract_type)
            .map(|def| &def.members);
        let is_interface = self.definitions.get_interface(abstract_type).is_some();
        self.definitions
            .types
            .values()
            .filter_map(|ty| match ty {
                ExtendedType::Object(def) => Some(def),
                _ => None,
            })
            .filter(move |def| is_interface && def.implements_interfaces.contains(abstract_type))
            .chain(
                union_members
                    .into_iter()
                    .flatten()
                    .filter_map(|member| self.definitions.get_object(&member.name)),
            )
    }

    /// Returns whether `object_type` is a member of the union or an implementer of the interface
    /// `abstract_type`
    pub fn is_possible_type(&self, abstract_type: &str, object_type: &str) -> bool {
        match self.definitions.types.get(abstract_type) {
            Some(ExtendedType::Union(def)) => def.members.contains(object_type),
            Some(ExtendedType::Interface(_)) => self
                .definitions
                .get_object(object_type)
                .is_some_and(|def| def.implements_interfaces.contains(abstract_type)),
            _ => false,
        }
    }

    /// Runs [Result Coercion](https://spec.graphql.org/October2021/#sec-Scalars.Result-Coercion-and-Serialization)
    /// for the leaf type `ty_def`.
    ///
    /// A registered serializer takes precedence over the built-in behavior.
    pub(crate) fn serialize(&self, ty_def: &ExtendedType, value: &JsonValue) -> Option<JsonValue> {
        if let Some(serialize) = self.serializers.get(ty_def.name()) {
            return serialize(value);
        }
        match ty_def {
            ExtendedType::Scalar(def) => {
                serialize_built_in_scalar(&def.name, value).unwrap_or_else(|| Some(value.clone()))
            }
            ExtendedType::Enum(def) => value
                .as_str()
                .filter(|name| def.values.contains_key(*name))
                .map(|_| value.clone()),
            _ => None,
        }
    }
}

impl ExecutableSchemaBuilder {
    /// Registers the resolver for field `field_name` of object type `type_name`.
    ///
    /// Fields without a registered resolver use the default field resolver.
    pub fn resolver<F>(mut self, type_name: &str, field_name: &str, resolver: F) -> Self
    where
        F: Fn(&ResolvedValue, &JsonMap, &dyn Any, &ResolveInfo<'_>) -> FieldResult
            + Send
            + Sync
            + 'static,
    {
        self.registered.push(Registration::Resolver {
            type_name: type_name.to_owned(),
            field_name: field_name.to_owned(),
        });
        if let (Ok(ty), Ok(field)) = (Name::new(type_name), Name::new(field_name)) {
            self.schema
                .field_resolvers
                .entry(ty)
                .or_default()
                .insert(field, Box::new(resolver));
        }
        self
    }

    /// Registers the serializer of a custom scalar or enum type,
    /// or overrides the serialization of a built-in scalar.
    pub fn serializer<F>(mut self, type_name: &str, serialize: F) -> Self
    where
        F: Fn(&JsonValue) -> Option<JsonValue> + Send + Sync + 'static,
    {
        self.registered.push(Registration::Serializer {
            type_name: type_name.to_owned(),
        });
        if let Ok(ty) = Name::new(type_name) {
            self.schema.serializers.insert(ty, Box::new(serialize));
        }
        self
    }

    /// Registers how to find the concrete object type of a value of an interface or union type.
    ///
    /// Without one, each possible type’s [`is_type_of`][Self::is_type_of] predicate is tried in turn.
    pub fn type_resolver<F>(mut self, type_name: &str, resolve_type: F) -> Self
    where
        F: Fn(&ResolvedValue, &dyn Any, &ResolveInfo<'_>) -> Option<String>
            + Send
            + Sync
            + 'static,
    {
        self.registered.push(Registration::TypeResolver {
            type_name: type_name.to_owned(),
        });
        if let Ok(ty) = Name::new(type_name) {
            self.schema.type_resolvers.insert(ty, Box::new(resolve_type));
        }
        self
    }

    /// Registers a predicate checking that values completed as this object type really are of this type.
    pub fn is_type_of<F>(mut self, type_name: &str, is_type_of: F) -> Self
    where
        F: Fn(&ResolvedValue, &dyn Any, &ResolveInfo<'_>) -> bool + Send + Sync + 'static,
    {
        self.registered.push(Registration::IsTypeOf {
            type_name: type_name.to_owned(),
        });
        if let Ok(ty) = Name::new(type_name) {
            self.schema.is_type_of.insert(ty, Box::new(is_type_of));
        }
        self
    }

    /// Checks every registered hook against the schema definitions
    pub fn build(self) -> Result<ExecutableSchema, SchemaBuildError> {
        let schema = &self.schema;
        for registration in &self.registered {
            match registration {
                Registration::Resolver {
                    type_name,
                    field_name,
                } => {
                    check_name(type_name)?;
                    check_name(field_name)?;
                    let ty = defined_type(schema, type_name)?;
                    if !matches!(ty, ExtendedType::Object(_)) {
                        return Err(SchemaBuildError::NotAnObjectType {
                            name: type_name.clone(),
                            kind: describe(ty),
                        });
                    }
                    if schema.field_definition(type_name, field_name).is_none() {
                        return Err(SchemaBuildError::UndefinedField {
                            type_name: type_name.clone(),
                            field_name: field_name.clone(),
                        });
                    }
                }
                Registration::Serializer { type_name } => {
                    check_name(type_name)?;
                    let ty = defined_type(schema, type_name)?;
                    if !ty.is_leaf() {
                        return Err(SchemaBuildError::NotALeafType {
                            name: type_name.clone(),
                            kind: describe(ty),
                        });
                    }
                }
                Registration::TypeResolver { type_name } => {
                    check_name(type_name)?;
                    let ty = defined_type(schema, type_name)?;
                    if !(ty.is_interface() || ty.is_union()) {
                        return Err(SchemaBuildError::NotAnAbstractType {
                            name: type_name.clone(),
                            kind: describe(ty),
                        });
                    }
                }
                Registration::IsTypeOf { type_name } => {
                    check_name(type_name)?;
                    let ty = defined_type(schema, type_name)?;
                    if !ty.is_object() {
                        return Err(SchemaBuildError::NotAnObjectType {
                            name: type_name.clone(),
                            kind: describe(ty),
                        });
                    }
                }
            }
        }
        Ok(self.schema)
    }
}

fn check_name(name: &str) -> Result<(), SchemaBuildError> {
    Name::new(name)
        .map(drop)
        .map_err(|_| SchemaBuildError::InvalidName {
            name: name.to_owned(),
        })
}

fn defined_type<'s>(
    schema: &'s ExecutableSchema,
    name: &str,
) -> Result<&'s ExtendedType, SchemaBuildError> {
    schema
        .get_type(name)
        .ok_or_else(|| SchemaBuildError::UndefinedType {
            name: name.to_owned(),
        })
}

fn describe(ty: &ExtendedType) -> &'static str {
    match ty {
        ExtendedType::Scalar(_) => "a scalar type",
        ExtendedType::Object(_) => "an object type",
        ExtendedType::Interface(_) => "an interface type",
        ExtendedType::Union(_) => "a union type",
        ExtendedType::Enum(_) => "an enum type",
        ExtendedType::InputObject(_) => "an input object type",
    }
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolvers: Vec<String> = self
            .field_resolvers
            .iter()
            .flat_map(|(ty, fields)| fields.keys().map(move |field| format!("{ty}.{field}")))
            .collect();
        f.debug_struct("ExecutableSchema")
            .field("field_resolvers", &resolvers)
            .field("serializers", &self.serializers.keys().collect::<Vec<_>>())
            .field(
                "type_resolvers",
                &self.type_resolvers.keys().collect::<Vec<_>>(),
            )
            .field("is_type_of", &self.is_type_of.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Valid<Schema> {
        Schema::parse_and_validate(
            "
            type Query { pet: Pet, search: [SearchResult], count: Int }
            interface Pet { name: String }
            type Dog implements Pet { name: String barks: Boolean }
            type Cat implements Pet { name: String meows: Boolean }
            type Human { name: String }
            union SearchResult = Human | Dog
            enum Color { RED GREEN }
            scalar Date
            ",
            "schema.graphql",
        )
        .unwrap()
    }

    #[test]
    fn possible_types_in_declaration_order() {
        let schema = ExecutableSchema::builder(schema()).build().unwrap();
        let names = |abstract_type| {
            schema
                .possible_types(abstract_type)
                .map(|def| def.name.as_str().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(names("Pet"), ["Dog", "Cat"]);
        assert_eq!(names("SearchResult"), ["Human", "Dog"]);
        assert!(names("Dog").is_empty());
        assert!(schema.is_possible_type("Pet", "Cat"));
        assert!(!schema.is_possible_type("Pet", "Human"));
        assert!(schema.is_possible_type("SearchResult", "Human"));
        assert!(!schema.is_possible_type("Dog", "Dog"));
    }

    #[test]
    fn build_checks_hooks_against_definitions() {
        let err = ExecutableSchema::builder(schema())
            .resolver("Query", "nope", |_, _, _, _| Ok(ResolvedValue::null()))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `Query.nope` is not defined in the schema"
        );

        let err = ExecutableSchema::builder(schema())
            .serializer("Dog", |value| Some(value.clone()))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaBuildError::NotALeafType {
                name: "Dog".into(),
                kind: "an object type"
            }
        );

        let err = ExecutableSchema::builder(schema())
            .type_resolver("Human", |_, _, _| None)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaBuildError::NotAnAbstractType { .. }));

        let err = ExecutableSchema::builder(schema())
            .is_type_of("Unicorn", |_, _, _| true)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaBuildError::UndefinedType {
                name: "Unicorn".into()
            }
        );

        let err = ExecutableSchema::builder(schema())
            .is_type_of("not a name", |_, _, _| true)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaBuildError::InvalidName { .. }));
    }

    #[test]
    fn leaf_serialization() {
        let schema = ExecutableSchema::builder(schema())
            .serializer("Date", |value| {
                value.as_i64().map(|days| format!("day {days}").into())
            })
            .build()
            .unwrap();
        let ty = |name| schema.get_type(name).unwrap();

        assert_eq!(
            schema.serialize(ty("Color"), &"RED".into()),
            Some("RED".into())
        );
        assert_eq!(schema.serialize(ty("Color"), &"BLUE".into()), None);
        assert_eq!(
            schema.serialize(ty("Date"), &3.into()),
            Some("day 3".into())
        );
        assert_eq!(schema.serialize(ty("Date"), &"today".into()), None);
        assert_eq!(
            schema.serialize(ty("Int"), &JsonValue::from(7)),
            Some(7.into())
        );
    }
}
