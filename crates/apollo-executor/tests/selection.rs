use apollo_compiler::ast::Document;
use apollo_compiler::Schema;
use apollo_executor::ExecutableSchema;
use apollo_executor::Execution;
use apollo_executor::ResolvedValue;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;

fn letters_schema() -> ExecutableSchema {
    let sdl = "type Query { a: Int, b: Int, c: Int, d: Int }";
    let schema = Schema::parse_and_validate(sdl, "schema.graphql").unwrap();
    ExecutableSchema::builder(schema).build().unwrap()
}

fn execute_letters(query: &str, variables: serde_json_bytes::Value) -> String {
    let schema = letters_schema();
    let document = Document::parse(query, "query.graphql").unwrap();
    let root = serde_json_bytes::json!({"a": 1, "b": 2, "c": 3, "d": 4});
    let response = Execution::new(&schema, &document)
        .root_value(ResolvedValue::Json(root))
        .variable_values(variables.as_object().unwrap())
        .execute()
        .unwrap();
    serde_json::to_string(&response).unwrap()
}

#[test]
fn response_keys_in_first_occurrence_order() {
    let query = "
        { c ...F a ... on Query { d c } b }
        fragment F on Query { a b }
    ";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"c":3,"a":1,"b":2,"d":4}}"#);
}

#[test]
fn skip_takes_precedence_over_include() {
    let query = "{
        a @skip(if: true) @include(if: true)
        b @include(if: false)
        c @skip(if: false)
        d @include(if: true) @skip(if: false)
    }";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"c":3,"d":4}}"#);
}

#[test]
fn directives_with_variables() {
    let query = "query($yes: Boolean!, $no: Boolean!) {
        a @skip(if: $yes)
        b @include(if: $no)
        c @include(if: $yes)
        d @skip(if: $no) @include(if: $yes)
    }";
    let variables = serde_json_bytes::json!({"yes": true, "no": false});
    let response = execute_letters(query, variables);
    assert_eq!(response, r#"{"data":{"c":3,"d":4}}"#);
}

#[test]
fn uncoercible_directive_argument() {
    // `if: Boolean!` cannot be coerced from a variable without a value:
    // such a directive neither skips nor includes.
    let query = "query($maybe: Boolean) {
        a @include(if: $maybe)
        b @skip(if: $maybe)
        c
    }";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"b":2,"c":3}}"#);
}

#[test]
fn directives_on_fragments() {
    let query = "
        query {
            ...F @skip(if: true)
            ... @include(if: false) { b }
            ... @include(if: true) { c }
            d
        }
        fragment F on Query { a }
    ";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"c":3,"d":4}}"#);
}

#[test]
fn fragment_spread_is_collected_once() {
    // The second spread is skipped as already visited, `b` stays at its first position
    let query = "
        { ...F a ...F }
        fragment F on Query { b }
    ";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"b":2,"a":1}}"#);
}

#[test]
fn non_matching_type_conditions() {
    let query = "
        { ... on Nope { a } ...OnNope b }
        fragment OnNope on Nope { c }
        fragment Unused on Query { d }
    ";
    let response = execute_letters(query, json_object());
    assert_eq!(response, r#"{"data":{"b":2}}"#);
}

#[test]
fn undefined_fragment_is_skipped() {
    let response = execute_letters("{ a ...Missing }", json_object());
    assert_eq!(response, r#"{"data":{"a":1}}"#);
}

fn json_object() -> serde_json_bytes::Value {
    serde_json_bytes::json!({})
}

#[test]
fn fragments_on_abstract_types() {
    let sdl = "
        type Query { pets: [Pet], search: [SearchResult] }
        interface Pet { name: String }
        type Dog implements Pet { name: String, barks: Boolean }
        type Cat implements Pet { name: String, meows: Boolean }
        type Human { name: String }
        union SearchResult = Dog | Human
    ";
    let schema = Schema::parse_and_validate(sdl, "schema.graphql").unwrap();
    let kind = |value: &ResolvedValue| match value {
        ResolvedValue::Json(json) => json
            .as_object()
            .and_then(|object| object.get("kind"))
            .and_then(|kind| kind.as_str())
            .map(ToOwned::to_owned),
        _ => None,
    };
    let schema = ExecutableSchema::builder(schema)
        .type_resolver("Pet", move |value, _, _| kind(value))
        .type_resolver("SearchResult", move |value, _, _| kind(value))
        .build()
        .unwrap();
    let root = serde_json_bytes::json!({
        "pets": [
            {"kind": "Dog", "name": "Rex", "barks": true},
            {"kind": "Cat", "name": "Tom", "meows": false},
        ],
        "search": [
            {"kind": "Human", "name": "Ada"},
            {"kind": "Dog", "name": "Rex", "barks": true},
        ],
    });
    let query = "
        {
            pets { name ... on Dog { barks } ... on Cat { meows } ...PetBits }
            search { ... on Pet { name } ... on Human { human: name } ...DogBits }
        }
        fragment PetBits on Pet { __typename }
        fragment DogBits on SearchResult { ... on Dog { barks } }
    ";
    let document = Document::parse(query, "query.graphql").unwrap();
    let response = Execution::new(&schema, &document)
        .root_value(ResolvedValue::Json(root))
        .execute()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"data": {
            "pets": [
                {"name": "Rex", "barks": true, "__typename": "Dog"},
                {"name": "Tom", "meows": false, "__typename": "Cat"},
            ],
            "search": [
                {"human": "Ada"},
                {"name": "Rex", "barks": true},
            ],
        }})
    );
}

struct Calls(Cell<usize>);

#[test]
fn merged_fields_resolve_once_with_merged_sub_selections() {
    let sdl = "
        type Query { user: User }
        type User { name: String, age: Int }
    ";
    let schema = Schema::parse_and_validate(sdl, "schema.graphql").unwrap();
    let schema = ExecutableSchema::builder(schema)
        .resolver("Query", "user", |_, _, context, _| {
            if let Some(calls) = context.downcast_ref::<Calls>() {
                calls.0.set(calls.0.get() + 1)
            }
            let user = serde_json_bytes::json!({"name": "Ada", "age": 36});
            Ok(ResolvedValue::json(user))
        })
        .build()
        .unwrap();
    let query = "
        { user { name } ...F user { name age } }
        fragment F on Query { user { age } }
    ";
    let document = Document::parse(query, "query.graphql").unwrap();
    let calls = Calls(Cell::new(0));
    let response = Execution::new(&schema, &document)
        .context_value(&calls)
        .execute()
        .unwrap();
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"data":{"user":{"name":"Ada","age":36}}}"#
    );
    assert_eq!(calls.0.get(), 1);
}
