//! Composite schemas.
//!
//! A [`Schema`] is a declarative tree: branches are plain mappings and leaves
//! are validators. [`Schema::validate`] walks the tree against an input value
//! and produces either a value isomorphic to the tree or the first error met.
//!
//! # Absence
//!
//! When a key is absent from the input and its leaf rejects the absence, the
//! failure is reported as a missing-field error carrying the dotted path.
//! Optional leaves resolve successfully on absence and never reach that
//! branch.
//!
//! ```
//! use serde_json::json;
//! use tessera_schema::{leaf, Schema};
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::new()
//!     .field("name", leaf::string())
//!     .field("age", leaf::optional(leaf::number()));
//!
//! let validated = schema.validate(&json!({ "name": "Ada" })).await.unwrap();
//! assert_eq!(validated.data(), &json!({ "name": "Ada", "age": null }));
//! # });
//! ```

use crate::unit::{BoxFuture, SharedValidator, TypeTag, ValidationUnit};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tessera_core::GenericError;
use uuid::Uuid;

/// Branch mapping of a schema tree.
pub type Tree = IndexMap<String, Node>;

/// Results of custom leaves, by contributor id then dotted path.
pub type CustomResults = IndexMap<String, IndexMap<String, Value>>;

/// A node of a schema tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// A single validator.
    Leaf(SharedValidator),
    /// Custom validators contributed by one or more fragments.
    Custom(Vec<CustomEntry>),
    /// A nested mapping.
    Branch(Tree),
}

impl Node {
    /// Returns the composition tag of this node.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Leaf(validator) => validator.tag(),
            Self::Custom(_) => TypeTag::Custom,
            Self::Branch(_) => TypeTag::Object,
        }
    }
}

impl From<SharedValidator> for Node {
    fn from(validator: SharedValidator) -> Self {
        Self::Leaf(validator)
    }
}

impl From<Schema> for Node {
    fn from(schema: Schema) -> Self {
        Self::Branch(schema.tree)
    }
}

impl From<Tree> for Node {
    fn from(tree: Tree) -> Self {
        Self::Branch(tree)
    }
}

/// A custom validator tagged with the contributor that declared it.
#[derive(Debug, Clone)]
pub struct CustomEntry {
    /// Contributor id (middleware key or route).
    pub contributor: String,
    /// Dotted path of the key in the contributor's fragment.
    pub path: String,
    /// The validator.
    pub validator: SharedValidator,
}

/// Successful outcome of [`Schema::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    data: Value,
    custom: CustomResults,
}

impl Validated {
    /// Returns the validated value, shaped like the schema tree.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the outcome, returning the validated value.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Returns every custom leaf result.
    #[must_use]
    pub fn custom(&self) -> &CustomResults {
        &self.custom
    }

    /// Returns the custom leaf results declared by `contributor`.
    #[must_use]
    pub fn custom_for(&self, contributor: &str) -> Option<&IndexMap<String, Value>> {
        self.custom.get(contributor)
    }
}

/// A declarative validation tree.
#[derive(Debug, Clone)]
pub struct Schema {
    id: Uuid,
    tree: Tree,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::from_tree(Tree::new())
    }

    /// Creates a schema from an existing tree.
    #[must_use]
    pub fn from_tree(tree: Tree) -> Self {
        Self {
            id: Uuid::now_v7(),
            tree,
        }
    }

    /// Adds a key to the schema.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, node: impl Into<Node>) -> Self {
        self.tree.insert(key.into(), node.into());
        self
    }

    /// Returns the schema id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the declared tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Consumes the schema, returning its tree.
    #[must_use]
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Returns `true` if the schema declares no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` if no key maps to a nested branch.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        !self.tree.values().any(|node| matches!(node, Node::Branch(_)))
    }

    /// Validates `input` against the schema.
    ///
    /// The first error anywhere in the walk aborts it; there is no partial
    /// result.
    pub async fn validate(&self, input: &Value) -> Result<Validated, GenericError> {
        let mut custom = CustomResults::new();
        let data = walk(&self.tree, Some(input), "", &mut custom).await?;
        tracing::trace!(schema = %self.id, "schema validated");
        Ok(Validated { data, custom })
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn resolve<'v>(input: Option<&'v Value>, key: &str) -> Option<&'v Value> {
    match input {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => map.get(key),
        Some(other) => Some(other),
    }
}

async fn execute(
    validator: &SharedValidator,
    resolved: Option<&Value>,
    path: &str,
) -> Result<Value, GenericError> {
    let raw = resolved.cloned().unwrap_or(Value::Null);
    match ValidationUnit::new(Arc::clone(validator), raw).execute().await {
        Ok(value) => Ok(value),
        Err(error) if resolved.is_none() => {
            let mut missing = GenericError::missing_field(path);
            missing.add_error(error);
            Err(missing)
        }
        Err(error) => Err(error),
    }
}

fn walk<'a>(
    tree: &'a Tree,
    input: Option<&'a Value>,
    path: &'a str,
    custom: &'a mut CustomResults,
) -> BoxFuture<'a, Result<Value, GenericError>> {
    Box::pin(async move {
        let mut output = Map::with_capacity(tree.len());

        for (key, node) in tree {
            let path = join(path, key);
            let resolved = resolve(input, key);

            let value = match node {
                Node::Branch(subtree) => walk(subtree, resolved, &path, custom).await?,
                Node::Leaf(validator) => execute(validator, resolved, &path).await?,
                Node::Custom(entries) => {
                    if entries.is_empty() {
                        return Err(GenericError::schema_execution(format!(
                            "custom leaf '{path}' has no validators"
                        )));
                    }
                    let mut last = Value::Null;
                    for entry in entries {
                        last = execute(&entry.validator, resolved, &path).await?;
                        custom
                            .entry(entry.contributor.clone())
                            .or_default()
                            .insert(entry.path.clone(), last.clone());
                    }
                    last
                }
            };

            output.insert(key.clone(), value);
        }

        Ok(Value::Object(output))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf;
    use serde_json::json;
    use tessera_core::ErrorKind;

    fn address() -> Schema {
        Schema::new()
            .field("city", leaf::string())
            .field("zip", leaf::optional(leaf::integer()))
    }

    #[tokio::test]
    async fn test_optional_absent_resolves_null() {
        let schema = Schema::new()
            .field("name", leaf::string())
            .field("age", leaf::optional(leaf::number()));
        let validated = schema.validate(&json!({"name": "Ada"})).await.unwrap();
        assert_eq!(validated.data(), &json!({"name": "Ada", "age": null}));
    }

    #[tokio::test]
    async fn test_invalid_value_reports_leaf_error() {
        let schema = Schema::new().field("age", leaf::number());
        let error = schema.validate(&json!({"age": "abc"})).await.unwrap_err();
        assert_eq!(error.message(), "Invalid number");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_missing_nested_field_has_dotted_path() {
        let schema = Schema::new().field("user", Schema::new().field("address", address()));
        let error = schema
            .validate(&json!({"user": {"address": {"zip": 12345}}}))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingField);
        assert_eq!(error.data()["path"], "user.address.city");
        assert_eq!(error.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_null_is_invalid_not_missing() {
        let schema = Schema::new().field("age", leaf::number());
        let error = schema.validate(&json!({"age": null})).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_first_error_aborts_walk() {
        let schema = Schema::new()
            .field("a", leaf::boolean())
            .field("b", leaf::number());
        let error = schema
            .validate(&json!({"a": "nope", "b": "nope"}))
            .await
            .unwrap_err();
        assert_eq!(error.message(), "Invalid boolean");
    }

    #[tokio::test]
    async fn test_output_mirrors_tree() {
        let schema = Schema::new()
            .field("id", leaf::integer())
            .field("address", address())
            .field("tags", leaf::array(leaf::string()));
        let validated = schema
            .validate(&json!({
                "id": "7",
                "address": {"city": "Lyon", "zip": "69001"},
                "tags": ["a", 1],
                "ignored": true
            }))
            .await
            .unwrap();
        assert_eq!(
            validated.into_data(),
            json!({
                "id": 7,
                "address": {"city": "Lyon", "zip": 69001},
                "tags": ["a", "1"]
            })
        );
    }

    #[tokio::test]
    async fn test_unindexed_input_is_used_directly() {
        let schema = Schema::new().field("value", leaf::number());
        let validated = schema.validate(&json!("12")).await.unwrap();
        assert_eq!(validated.data(), &json!({"value": 12}));
    }

    #[tokio::test]
    async fn test_empty_custom_leaf_is_schema_execution_error() {
        let schema = Schema::new().field("token", Node::Custom(Vec::new()));
        let error = schema.validate(&json!({"token": "x"})).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SchemaExecution);
    }

    #[tokio::test]
    async fn test_custom_results_by_contributor() {
        let entries = vec![
            CustomEntry {
                contributor: "auth".to_string(),
                path: "token".to_string(),
                validator: leaf::custom(|raw| Ok(json!({"user": raw}))),
            },
            CustomEntry {
                contributor: "route".to_string(),
                path: "token".to_string(),
                validator: leaf::custom(|raw| Ok(raw)),
            },
        ];
        let schema = Schema::new().field("token", Node::Custom(entries));
        let validated = schema.validate(&json!({"token": "abc"})).await.unwrap();

        assert_eq!(validated.data(), &json!({"token": "abc"}));
        assert_eq!(
            validated.custom_for("auth").unwrap()["token"],
            json!({"user": "abc"})
        );
        assert_eq!(validated.custom_for("route").unwrap()["token"], json!("abc"));
    }

    #[test]
    fn test_flatness() {
        assert!(Schema::new().field("a", leaf::string()).is_flat());
        assert!(!Schema::new().field("a", address()).is_flat());
    }
}
