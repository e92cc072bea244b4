//! Schema fragment composition.
//!
//! A route's schema for one category is the union of the route's own fragment
//! and the fragment of every attached middleware. Fragments are merged once,
//! when the route is bound, pairwise from left to right:
//!
//! - a key present on one side only is taken unmodified
//! - a key present on both sides must carry the same type tag, otherwise
//!   composition fails
//! - the merged leaf is optional only if every side marked it optional
//! - custom leaves are concatenated; each entry keeps its contributor id and
//!   path
//!
//! ```
//! use tessera_schema::{leaf, merge_fragments, Fragment, Schema};
//!
//! let from_auth = Fragment::new("auth", Schema::new().field("tenant", leaf::optional(leaf::string())));
//! let from_route = Fragment::new("route", Schema::new().field("tenant", leaf::string()));
//!
//! let merged = merge_fragments(&[from_auth, from_route]).unwrap();
//! assert!(!merged.tree()["tenant"].tag().to_string().is_empty());
//!
//! let clash = Fragment::new("other", Schema::new().field("tenant", leaf::number()));
//! assert!(merge_fragments(&[clash, Fragment::new("route", merged)]).is_err());
//! ```

use crate::schema::{CustomEntry, Node, Schema, Tree};
use crate::unit::TypeTag;
use tessera_core::GenericError;

/// One contributor's partial schema for a category.
#[derive(Debug, Clone)]
pub struct Fragment {
    contributor: String,
    schema: Schema,
}

impl Fragment {
    /// Creates a fragment, tagging its custom leaves with `contributor`.
    #[must_use]
    pub fn new(contributor: impl Into<String>, schema: Schema) -> Self {
        let contributor = contributor.into();
        let tree = tag_custom(schema.into_tree(), &contributor, "");
        Self {
            contributor,
            schema: Schema::from_tree(tree),
        }
    }

    /// Returns the contributor id.
    #[must_use]
    pub fn contributor(&self) -> &str {
        &self.contributor
    }

    /// Returns the fragment's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

fn tag_custom(tree: Tree, contributor: &str, prefix: &str) -> Tree {
    tree.into_iter()
        .map(|(key, node)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            let node = match node {
                Node::Leaf(validator) if validator.tag() == TypeTag::Custom => {
                    Node::Custom(vec![CustomEntry {
                        contributor: contributor.to_string(),
                        path,
                        validator,
                    }])
                }
                Node::Branch(subtree) => Node::Branch(tag_custom(subtree, contributor, &path)),
                other => other,
            };
            (key, node)
        })
        .collect()
}

/// Merges fragments into one schema.
///
/// # Errors
///
/// Returns a schema-composition error when two fragments declare the same
/// key with different type tags.
pub fn merge_fragments(fragments: &[Fragment]) -> Result<Schema, GenericError> {
    let mut merged = Tree::new();
    for fragment in fragments {
        merged = merge_trees(merged, fragment.schema.tree().clone(), "")?;
        tracing::trace!(contributor = %fragment.contributor, "merged schema fragment");
    }
    Ok(Schema::from_tree(merged))
}

/// Merges fragments that must not nest (cookies).
///
/// # Errors
///
/// Fails like [`merge_fragments`], and also when any fragment nests.
pub fn merge_flat_fragments(fragments: &[Fragment], category: &str) -> Result<Schema, GenericError> {
    if let Some(nested) = fragments.iter().find(|f| !f.schema.is_flat()) {
        return Err(GenericError::composition(format!(
            "{category} fragment from '{}' must be flat",
            nested.contributor
        )));
    }
    merge_fragments(fragments)
}

fn merge_trees(mut left: Tree, right: Tree, prefix: &str) -> Result<Tree, GenericError> {
    for (key, incoming) in right {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let merged = match left.shift_remove(&key) {
            Some(existing) => merge_nodes(existing, incoming, &path)?,
            None => incoming,
        };
        left.insert(key, merged);
    }
    Ok(left)
}

fn merge_nodes(left: Node, right: Node, path: &str) -> Result<Node, GenericError> {
    let (left_tag, right_tag) = (left.tag(), right.tag());
    if left_tag != right_tag {
        return Err(GenericError::composition(format!(
            "Type mismatch for key '{path}': {left_tag} vs {right_tag}"
        ))
        .with_data(serde_json::json!({
            "path": path,
            "left": left_tag.to_string(),
            "right": right_tag.to_string(),
        })));
    }

    match (left, right) {
        (Node::Branch(a), Node::Branch(b)) => Ok(Node::Branch(merge_trees(a, b, path)?)),
        (Node::Custom(mut a), Node::Custom(b)) => {
            a.extend(b);
            Ok(Node::Custom(a))
        }
        (Node::Leaf(a), Node::Leaf(b)) => {
            // a required side wins over an optional one
            if a.is_optional() && !b.is_optional() {
                Ok(Node::Leaf(b))
            } else {
                Ok(Node::Leaf(a))
            }
        }
        (a, b) => Err(GenericError::composition(format!(
            "Cannot merge key '{path}': {} vs {}",
            a.tag(),
            b.tag()
        ))),
    }
}
