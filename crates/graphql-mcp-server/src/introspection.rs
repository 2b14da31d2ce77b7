//! Schema introspection
//!
//! Holds the introspection documents sent to the endpoint and renders an
//! introspection result into SDL text.

use apollo_compiler::ast::{
    self, Argument, Definition, DirectiveList, DirectiveLocation, Document, EnumTypeDefinition,
    EnumValueDefinition, FieldDefinition, InputObjectTypeDefinition, InputValueDefinition,
    InterfaceTypeDefinition, ObjectTypeDefinition, OperationType, ScalarTypeDefinition,
    SchemaDefinition, Type, UnionTypeDefinition,
};
use apollo_compiler::parser::Parser;
use apollo_compiler::{Name, Node, Schema, name};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SchemaError;

/// Minimal introspection used as a liveness check
pub(crate) const LIVENESS_QUERY: &str = "query { __schema { queryType { name } } }";

/// Full introspection of the types and directives of a schema
pub(crate) const INTROSPECTION_QUERY: &str = r#"query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}"#;

const BUILT_IN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];
const BUILT_IN_DIRECTIVES: [&str; 5] = ["skip", "include", "deprecated", "specifiedBy", "oneOf"];
const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// Extract the name of the root query type from a liveness response
pub(crate) fn liveness_query_type(response: &Value) -> Option<&str> {
    response
        .pointer("/data/__schema/queryType/name")
        .and_then(Value::as_str)
}

/// Render an introspection response envelope as SDL
pub(crate) fn schema_from_response(response: Value) -> Result<String, SchemaError> {
    match response.pointer("/data/__schema") {
        Some(schema) if !schema.is_null() => {
            let schema = IntrospectionSchema::deserialize(schema)
                .map_err(|e| SchemaError::Malformed(e.to_string()))?;
            schema.to_sdl()
        }
        _ => match response.get("errors").and_then(Value::as_array) {
            Some(errors) if !errors.is_empty() => Err(SchemaError::Rejected(
                errors
                    .iter()
                    .map(|error| {
                        error
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
            _ => Err(SchemaError::Malformed(
                "response does not contain __schema".to_string(),
            )),
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<NamedRef>,
    mutation_type: Option<NamedRef>,
    subscription_type: Option<NamedRef>,
    types: Vec<FullType>,
    #[serde(default)]
    directives: Vec<Directive>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullType {
    kind: TypeKind,
    name: String,
    description: Option<String>,
    fields: Option<Vec<Field>>,
    input_fields: Option<Vec<InputValue>>,
    interfaces: Option<Vec<TypeRef>>,
    enum_values: Option<Vec<EnumValue>>,
    possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Field {
    name: String,
    description: Option<String>,
    #[serde(default)]
    args: Vec<InputValue>,
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputValue {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: TypeRef,
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumValue {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRef {
    kind: TypeKind,
    name: Option<String>,
    of_type: Option<Box<TypeRef>>,
}

#[derive(Debug, Deserialize)]
struct Directive {
    name: String,
    description: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    args: Vec<InputValue>,
}

/// A problem found while building the document; any of them means the schema is malformed
#[derive(Debug)]
struct RenderError(String);

type Render<T> = Result<T, RenderError>;

const DIRECTIVE_LOCATIONS: [DirectiveLocation; 19] = [
    DirectiveLocation::Query,
    DirectiveLocation::Mutation,
    DirectiveLocation::Subscription,
    DirectiveLocation::Field,
    DirectiveLocation::FragmentDefinition,
    DirectiveLocation::FragmentSpread,
    DirectiveLocation::InlineFragment,
    DirectiveLocation::VariableDefinition,
    DirectiveLocation::Schema,
    DirectiveLocation::Scalar,
    DirectiveLocation::Object,
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::ArgumentDefinition,
    DirectiveLocation::Interface,
    DirectiveLocation::Union,
    DirectiveLocation::Enum,
    DirectiveLocation::EnumValue,
    DirectiveLocation::InputObject,
    DirectiveLocation::InputFieldDefinition,
];

impl IntrospectionSchema {
    fn to_sdl(&self) -> Result<String, SchemaError> {
        let sdl = self
            .to_document()
            .map_err(|RenderError(message)| SchemaError::Malformed(message))?
            .to_string();

        // The serialized text must itself be a valid schema
        Schema::parse(&sdl, "schema.graphql")
            .map_err(|errors| SchemaError::Malformed(errors.to_string()))?;

        Ok(sdl)
    }

    fn to_document(&self) -> Render<Document> {
        let query_type = self
            .query_type
            .as_ref()
            .ok_or_else(|| RenderError("schema has no query type".to_string()))?;

        let mut document = Document::new();

        let roots = [
            (OperationType::Query, Some(query_type)),
            (OperationType::Mutation, self.mutation_type.as_ref()),
            (OperationType::Subscription, self.subscription_type.as_ref()),
        ];
        if roots.iter().any(|(operation, root)| {
            root.is_some_and(|root| root.name != operation.default_type_name().as_str())
        }) {
            let root_operations = roots
                .into_iter()
                .filter_map(|(operation, root)| root.map(|root| (operation, root)))
                .map(|(operation, root)| {
                    name(&root.name).map(|root_name| Node::new((operation, root_name)))
                })
                .collect::<Render<_>>()?;
            document
                .definitions
                .push(Definition::SchemaDefinition(Node::new(SchemaDefinition {
                    description: None,
                    directives: DirectiveList::default(),
                    root_operations,
                })));
        }

        for directive in self
            .directives
            .iter()
            .filter(|directive| !BUILT_IN_DIRECTIVES.contains(&directive.name.as_str()))
        {
            document.definitions.push(directive.to_definition()?);
        }

        for ty in self.types.iter().filter(|ty| {
            !ty.name.starts_with("__")
                && !(ty.kind == TypeKind::Scalar && BUILT_IN_SCALARS.contains(&ty.name.as_str()))
        }) {
            document.definitions.push(ty.to_definition()?);
        }

        Ok(document)
    }
}

impl Directive {
    fn to_definition(&self) -> Render<Definition> {
        let locations = self
            .locations
            .iter()
            .map(|location| {
                DIRECTIVE_LOCATIONS
                    .into_iter()
                    .find(|known| known.name() == location.as_str())
                    .ok_or_else(|| RenderError(format!("unknown directive location `{location}`")))
            })
            .collect::<Render<_>>()?;

        Ok(Definition::DirectiveDefinition(Node::new(
            ast::DirectiveDefinition {
                description: description(self.description.as_deref()),
                name: name(&self.name)?,
                arguments: input_values(&self.args)?,
                repeatable: false,
                locations,
            },
        )))
    }
}

impl FullType {
    fn to_definition(&self) -> Render<Definition> {
        let description = description(self.description.as_deref());
        let name = name(&self.name)?;
        let directives = DirectiveList::default();

        let definition = match self.kind {
            TypeKind::Scalar => Definition::ScalarTypeDefinition(Node::new(ScalarTypeDefinition {
                description,
                name,
                directives,
            })),
            TypeKind::Object => Definition::ObjectTypeDefinition(Node::new(ObjectTypeDefinition {
                description,
                name,
                implements_interfaces: named_types(self.interfaces.as_deref())?,
                directives,
                fields: self.field_definitions()?,
            })),
            TypeKind::Interface => {
                Definition::InterfaceTypeDefinition(Node::new(InterfaceTypeDefinition {
                    description,
                    name,
                    implements_interfaces: named_types(self.interfaces.as_deref())?,
                    directives,
                    fields: self.field_definitions()?,
                }))
            }
            TypeKind::Union => Definition::UnionTypeDefinition(Node::new(UnionTypeDefinition {
                description,
                name,
                directives,
                members: named_types(self.possible_types.as_deref())?,
            })),
            TypeKind::Enum => Definition::EnumTypeDefinition(Node::new(EnumTypeDefinition {
                description,
                name,
                directives,
                values: self
                    .enum_values
                    .iter()
                    .flatten()
                    .map(EnumValue::to_definition)
                    .collect::<Render<_>>()?,
            })),
            TypeKind::InputObject => {
                Definition::InputObjectTypeDefinition(Node::new(InputObjectTypeDefinition {
                    description,
                    name,
                    directives,
                    fields: input_values(self.input_fields.as_deref().unwrap_or_default())?,
                }))
            }
            TypeKind::List | TypeKind::NonNull => {
                return Err(RenderError(format!(
                    "type `{}` is a wrapping type in the type list",
                    self.name
                )));
            }
        };
        Ok(definition)
    }

    fn field_definitions(&self) -> Render<Vec<Node<FieldDefinition>>> {
        self.fields
            .iter()
            .flatten()
            .map(|field| -> Render<Node<FieldDefinition>> {
                Ok(Node::new(FieldDefinition {
                    description: description(field.description.as_deref()),
                    name: name(&field.name)?,
                    arguments: input_values(&field.args)?,
                    ty: field.ty.to_type()?,
                    directives: deprecation(
                        field.is_deprecated,
                        field.deprecation_reason.as_deref(),
                    ),
                }))
            })
            .collect()
    }
}

impl EnumValue {
    fn to_definition(&self) -> Render<Node<EnumValueDefinition>> {
        Ok(Node::new(EnumValueDefinition {
            description: description(self.description.as_deref()),
            value: name(&self.name)?,
            directives: deprecation(self.is_deprecated, self.deprecation_reason.as_deref()),
        }))
    }
}

impl InputValue {
    fn to_definition(&self) -> Render<Node<InputValueDefinition>> {
        Ok(Node::new(InputValueDefinition {
            description: description(self.description.as_deref()),
            name: name(&self.name)?,
            ty: Node::new(self.ty.to_type()?),
            default_value: self.default_value.as_deref().map(parse_value).transpose()?,
            directives: DirectiveList::default(),
        }))
    }
}

impl TypeRef {
    fn to_type(&self) -> Render<Type> {
        match self.kind {
            TypeKind::NonNull => Ok(self.inner()?.to_type()?.non_null()),
            TypeKind::List => Ok(self.inner()?.to_type()?.list()),
            _ => Ok(Type::Named(self.to_name()?)),
        }
    }

    fn to_name(&self) -> Render<Name> {
        let type_name = self
            .name
            .as_deref()
            .ok_or_else(|| RenderError(format!("{:?} type reference has no name", self.kind)))?;
        name(type_name)
    }

    fn inner(&self) -> Render<&TypeRef> {
        self.of_type
            .as_deref()
            .ok_or_else(|| RenderError(format!("{:?} type reference has no ofType", self.kind)))
    }
}

fn name(value: &str) -> Render<Name> {
    Name::new(value).map_err(|error| RenderError(error.to_string()))
}

fn named_types(refs: Option<&[TypeRef]>) -> Render<Vec<Name>> {
    refs.unwrap_or_default().iter().map(TypeRef::to_name).collect()
}

fn input_values(values: &[InputValue]) -> Render<Vec<Node<InputValueDefinition>>> {
    values.iter().map(InputValue::to_definition).collect()
}

fn description(description: Option<&str>) -> Option<Node<str>> {
    description
        .filter(|description| !description.is_empty())
        .map(Node::<str>::new_str)
}

fn deprecation(is_deprecated: bool, reason: Option<&str>) -> DirectiveList {
    if !is_deprecated {
        return DirectiveList::default();
    }
    let arguments = reason
        .filter(|reason| *reason != DEFAULT_DEPRECATION_REASON)
        .map(|reason| {
            Node::new(Argument {
                name: name!("reason"),
                value: Node::new(ast::Value::String(reason.to_string())),
            })
        })
        .into_iter()
        .collect();
    DirectiveList(vec![Node::new(ast::Directive {
        name: name!("deprecated"),
        arguments,
    })])
}

/// Parse a `defaultValue` literal by reading it back from a one-field input type
fn parse_value(raw: &str) -> Render<Node<ast::Value>> {
    let document = Parser::new()
        .parse_ast(
            format!("input DefaultValue {{ value: String = {raw} }}"),
            "default_value.graphql",
        )
        .map_err(|errors| RenderError(format!("invalid default value `{raw}`: {errors}")))?;
    document
        .definitions
        .iter()
        .find_map(|definition| match definition {
            Definition::InputObjectTypeDefinition(input) => input
                .fields
                .first()
                .and_then(|field| field.default_value.clone()),
            _ => None,
        })
        .ok_or_else(|| RenderError(format!("invalid default value `{raw}`")))
}
