//! Cookie parsing and `Set-Cookie` rendering.
//!
//! Inbound cookies arrive as one raw `Cookie` header string and are parsed
//! into a flat map before schema validation. Outbound cookies are collected
//! from middleware and the route, then rendered into a single `Set-Cookie`
//! header with the individual cookies joined by `"; "`.
//!
//! # Example
//!
//! ```rust
//! use tessera_middleware::cookie::{Cookie, CookieOptions, SameSite};
//!
//! let cookie = Cookie::new("session", "abc123")
//!     .with_options(CookieOptions::default().http_only(true).max_age_secs(3600));
//!
//! let header = cookie.to_header_value();
//! assert!(header.starts_with("session=abc123"));
//! assert!(header.contains("Path=/"));
//! assert!(header.contains("HttpOnly"));
//! assert!(header.contains("SameSite=Strict"));
//! ```

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Parsed request cookies, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    cookies: IndexMap<String, String>,
}

impl Cookies {
    /// Creates an empty cookie set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw `Cookie` header value.
    ///
    /// Pairs without `=` are skipped; surrounding quotes are removed. A
    /// repeated name keeps its last value.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let cookies = header_value
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self { cookies }
    }

    /// Returns a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns `true` if the cookie is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Iterates over all cookies.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns `true` if there are no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Returns the cookies as a flat JSON object for schema validation.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.cookies
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<_, _>>(),
        )
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Sent with cross-site requests.
    None,
    /// Sent with same-site requests and top-level navigations.
    Lax,
    /// Sent with same-site requests only.
    #[default]
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lax => write!(f, "Lax"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// Error returned when parsing an unknown `SameSite` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown same-site policy '{0}'")]
pub struct UnknownSameSite(pub String);

/// Error returned for a cookie that cannot be rendered safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCookie {
    /// The name is empty or not an RFC 6265 token.
    #[error("invalid cookie name '{0}'")]
    Name(String),
    /// The value holds characters outside `cookie-octet`.
    #[error("invalid value for cookie '{0}'")]
    Value(String),
    /// An attribute holds `;` or a control character.
    #[error("invalid {attribute} attribute for cookie '{name}'")]
    Attribute {
        /// Cookie name.
        name: String,
        /// Attribute name.
        attribute: &'static str,
    },
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !br#"()<>@,;:\"/[]?={}"#.contains(&b)
        })
}

fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}

fn is_cookie_value(value: &str) -> bool {
    let inner = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value);
    inner.bytes().all(is_cookie_octet)
}

fn is_attribute_value(value: &str) -> bool {
    value.bytes().all(|b| b != b';' && !b.is_ascii_control())
}

impl FromStr for SameSite {
    type Err = UnknownSameSite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            _ => Err(UnknownSameSite(s.to_string())),
        }
    }
}

/// Attributes of an outbound cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain` attribute.
    pub domain: Option<String>,
    /// `Expires` attribute.
    pub expires: Option<DateTime<Utc>>,
    /// `HttpOnly` flag.
    pub http_only: bool,
    /// `Max-Age` attribute.
    pub max_age: Option<Duration>,
    /// `Path` attribute.
    pub path: String,
    /// `SameSite` attribute.
    pub same_site: SameSite,
    /// `Secure` flag.
    pub secure: bool,
    /// `Partitioned` flag.
    pub partitioned: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            domain: None,
            expires: None,
            http_only: false,
            max_age: None,
            path: "/".to_string(),
            same_site: SameSite::Strict,
            secure: false,
            partitioned: false,
        }
    }
}

impl CookieOptions {
    /// Sets the `Domain` attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the `Expires` attribute.
    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Sets the `HttpOnly` flag.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `Max-Age` attribute.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets the `Max-Age` attribute in seconds.
    #[must_use]
    pub fn max_age_secs(self, seconds: u64) -> Self {
        self.max_age(Duration::from_secs(seconds))
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Sets the `Secure` flag.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `Partitioned` flag.
    #[must_use]
    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }
}

/// An outbound cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    options: CookieOptions,
}

impl Cookie {
    /// Creates a cookie with default options.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options: CookieOptions::default(),
        }
    }

    /// Creates a cookie that clears `name` on the client.
    #[must_use]
    pub fn removal(name: impl Into<String>) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.options.max_age = Some(Duration::ZERO);
        cookie
    }

    /// Replaces the cookie's options.
    #[must_use]
    pub fn with_options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the cookie options.
    #[must_use]
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// Checks that the cookie renders as exactly one `name=value` pair with
    /// its own attributes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCookie`] for a name that is not a token, a value
    /// outside `cookie-octet`, or a path or domain holding `;`.
    pub fn validate(&self) -> Result<(), InvalidCookie> {
        if !is_token(&self.name) {
            return Err(InvalidCookie::Name(self.name.clone()));
        }
        if !is_cookie_value(&self.value) {
            return Err(InvalidCookie::Value(self.name.clone()));
        }
        let attribute = |attribute| InvalidCookie::Attribute {
            name: self.name.clone(),
            attribute,
        };
        if !is_attribute_value(&self.options.path) {
            return Err(attribute("Path"));
        }
        if let Some(domain) = &self.options.domain {
            if !is_attribute_value(domain) {
                return Err(attribute("Domain"));
            }
        }
        Ok(())
    }

    /// Renders this cookie as a `Set-Cookie` value.
    ///
    /// The output is unchecked; [`render_set_cookie`] skips cookies that fail
    /// [`validate`](Self::validate).
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let options = &self.options;
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref domain) = options.domain {
            parts.push(format!("Domain={domain}"));
        }

        parts.push(format!("Path={}", options.path));

        if let Some(max_age) = options.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }

        if let Some(expires) = options.expires {
            parts.push(format!(
                "Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }

        if options.secure {
            parts.push("Secure".to_string());
        }

        if options.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.push(format!("SameSite={}", options.same_site));

        if options.partitioned {
            parts.push("Partitioned".to_string());
        }

        parts.join("; ")
    }
}

/// Renders cookies into one `Set-Cookie` value, or `None` if there are none.
///
/// Cookies that fail [`Cookie::validate`] are dropped with a warning.
pub fn render_set_cookie<'a>(cookies: impl IntoIterator<Item = &'a Cookie>) -> Option<String> {
    let rendered: Vec<String> = cookies
        .into_iter()
        .filter(|cookie| match cookie.validate() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(error = %error, "cookie dropped from reply");
                false
            }
        })
        .map(Cookie::to_header_value)
        .collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join("; "))
    }
}
