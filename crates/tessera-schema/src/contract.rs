//! Schema contributions and their composition.
//!
//! Routes and middleware declare the same shape of contribution: zero or more
//! schemas per category. A route binds its own contribution together with
//! every attached middleware's, and the composer merges each category into a
//! single schema once, at bind time.

use crate::compose::{merge_flat_fragments, merge_fragments, Fragment};
use crate::header::{merge_header_schemas, HeaderSchema};
use crate::schema::Schema;
use std::fmt;
use tessera_core::GenericError;

/// Input data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Request or response body.
    Body,
    /// Query string parameters.
    Query,
    /// Headers.
    Headers,
    /// Cookies.
    Cookies,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::Query => write!(f, "query"),
            Self::Headers => write!(f, "headers"),
            Self::Cookies => write!(f, "cookies"),
        }
    }
}

/// Input schemas declared by one contributor.
#[derive(Debug, Clone, Default)]
pub struct InputSchemas {
    /// Body fragments.
    pub body: Vec<Schema>,
    /// Query fragments.
    pub query: Vec<Schema>,
    /// Header fragments.
    pub headers: Vec<HeaderSchema>,
    /// Cookie fragments; must be flat.
    pub cookies: Vec<Schema>,
}

impl InputSchemas {
    /// Creates an empty contribution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body fragment.
    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.body.push(schema);
        self
    }

    /// Adds a query fragment.
    #[must_use]
    pub fn query(mut self, schema: Schema) -> Self {
        self.query.push(schema);
        self
    }

    /// Adds a header fragment.
    #[must_use]
    pub fn headers(mut self, schema: HeaderSchema) -> Self {
        self.headers.push(schema);
        self
    }

    /// Adds a cookie fragment.
    #[must_use]
    pub fn cookies(mut self, schema: Schema) -> Self {
        self.cookies.push(schema);
        self
    }
}

/// Output schemas declared by one contributor.
#[derive(Debug, Clone, Default)]
pub struct OutputSchemas {
    /// Body fragments.
    pub body: Vec<Schema>,
    /// Header fragments.
    pub headers: Vec<HeaderSchema>,
}

impl OutputSchemas {
    /// Creates an empty contribution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body fragment.
    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.body.push(schema);
        self
    }

    /// Adds a header fragment.
    #[must_use]
    pub fn headers(mut self, schema: HeaderSchema) -> Self {
        self.headers.push(schema);
        self
    }
}

/// Merged input schemas of a bound route.
#[derive(Debug, Clone, Default)]
pub struct ComposedInput {
    /// Merged body schema.
    pub body: Schema,
    /// Merged query schema.
    pub query: Schema,
    /// Merged header schema.
    pub headers: HeaderSchema,
    /// Merged cookie schema.
    pub cookies: Schema,
}

/// Merged output schemas of a bound route.
#[derive(Debug, Clone, Default)]
pub struct ComposedOutput {
    /// Merged body schema.
    pub body: Schema,
    /// Merged header schema.
    pub headers: HeaderSchema,
}

fn fragments<'a>(
    contributions: impl IntoIterator<Item = (&'a str, &'a [Schema])>,
) -> Vec<Fragment> {
    contributions
        .into_iter()
        .flat_map(|(contributor, schemas)| {
            schemas
                .iter()
                .map(move |schema| Fragment::new(contributor, schema.clone()))
        })
        .collect()
}

/// Merges input contributions, in order, into one schema per category.
///
/// # Errors
///
/// Returns a schema-composition error on the first category that fails to
/// merge.
pub fn compose_input(contributions: &[(&str, &InputSchemas)]) -> Result<ComposedInput, GenericError> {
    let body = merge_fragments(&fragments(
        contributions.iter().map(|(id, c)| (*id, c.body.as_slice())),
    ))?;
    let query = merge_fragments(&fragments(
        contributions.iter().map(|(id, c)| (*id, c.query.as_slice())),
    ))?;
    let cookies = merge_flat_fragments(
        &fragments(contributions.iter().map(|(id, c)| (*id, c.cookies.as_slice()))),
        &Category::Cookies.to_string(),
    )?;
    let headers: Vec<HeaderSchema> = contributions
        .iter()
        .flat_map(|(_, c)| c.headers.iter().cloned())
        .collect();

    Ok(ComposedInput {
        body,
        query,
        headers: merge_header_schemas(&headers),
        cookies,
    })
}

/// Merges output contributions, in order, into one schema per category.
///
/// # Errors
///
/// Returns a schema-composition error when the body fragments conflict.
pub fn compose_output(
    contributions: &[(&str, &OutputSchemas)],
) -> Result<ComposedOutput, GenericError> {
    let body = merge_fragments(&fragments(
        contributions.iter().map(|(id, c)| (*id, c.body.as_slice())),
    ))?;
    let headers: Vec<HeaderSchema> = contributions
        .iter()
        .flat_map(|(_, c)| c.headers.iter().cloned())
        .collect();

    Ok(ComposedOutput {
        body,
        headers: merge_header_schemas(&headers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf;
    use tessera_core::ErrorKind;

    #[test]
    fn test_compose_input_merges_every_category() {
        let auth = InputSchemas::new()
            .headers(HeaderSchema::new().required("authorization"))
            .cookies(Schema::new().field("sid", leaf::optional(leaf::string())));
        let route = InputSchemas::new()
            .body(Schema::new().field("name", leaf::string()))
            .headers(HeaderSchema::new().optional("authorization"))
            .cookies(Schema::new().field("sid", leaf::string()));

        let composed = compose_input(&[("auth", &auth), ("route", &route)]).unwrap();
        assert_eq!(composed.headers.get("authorization"), Some(true));
        assert_eq!(composed.body.tree().len(), 1);
        assert!(composed.query.is_empty());
        assert_eq!(composed.cookies.tree().len(), 1);
    }

    #[test]
    fn test_compose_input_rejects_nested_cookies() {
        let route = InputSchemas::new().cookies(
            Schema::new().field("prefs", Schema::new().field("theme", leaf::string())),
        );
        let error = compose_input(&[("route", &route)]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SchemaComposition);
    }

    #[test]
    fn test_compose_output_detects_conflicts() {
        let a = OutputSchemas::new().body(Schema::new().field("id", leaf::uuid()));
        let b = OutputSchemas::new().body(Schema::new().field("id", leaf::integer()));
        assert!(compose_output(&[("a", &a), ("b", &b)]).is_err());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Cookies.to_string(), "cookies");
        assert_eq!(Category::Query.to_string(), "query");
    }
}
