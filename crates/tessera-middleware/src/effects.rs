//! Trigger-scoped side effects.
//!
//! Middleware and routes set headers and cookies without knowing whether the
//! request will end in a success or an error reply. Every effect is filed
//! under a [`Trigger`] and the pipeline picks the maps to apply once the
//! terminal outcome is known:
//!
//! | Outcome | Applied maps |
//! |---|---|
//! | success | `on_both`, then `on_success` |
//! | failure | `on_both`, then `on_failure` |
//!
//! The more specific map is applied last, so it wins on key conflicts. Within
//! one map the last write wins.

use crate::cookie::Cookie;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When a side effect applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Applied only to a success reply.
    #[default]
    OnSuccess,
    /// Applied only to an error reply.
    OnFailure,
    /// Always applied.
    OnBoth,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnSuccess => write!(f, "on_success"),
            Self::OnFailure => write!(f, "on_failure"),
            Self::OnBoth => write!(f, "on_both"),
        }
    }
}

/// Three keyed maps, one per trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMap<T> {
    on_success: IndexMap<String, T>,
    on_failure: IndexMap<String, T>,
    on_both: IndexMap<String, T>,
}

impl<T> Default for TriggerMap<T> {
    fn default() -> Self {
        Self {
            on_success: IndexMap::new(),
            on_failure: IndexMap::new(),
            on_both: IndexMap::new(),
        }
    }
}

impl<T: Clone> TriggerMap<T> {
    /// Creates empty maps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, trigger: Trigger) -> &mut IndexMap<String, T> {
        match trigger {
            Trigger::OnSuccess => &mut self.on_success,
            Trigger::OnFailure => &mut self.on_failure,
            Trigger::OnBoth => &mut self.on_both,
        }
    }

    /// Returns the map for one trigger.
    #[must_use]
    pub fn get(&self, trigger: Trigger) -> &IndexMap<String, T> {
        match trigger {
            Trigger::OnSuccess => &self.on_success,
            Trigger::OnFailure => &self.on_failure,
            Trigger::OnBoth => &self.on_both,
        }
    }

    /// Files `value` under `key` for `trigger`, replacing an earlier value.
    pub fn insert(&mut self, trigger: Trigger, key: impl Into<String>, value: T) {
        self.map_mut(trigger).insert(key.into(), value);
    }

    /// Absorbs `other`, its entries winning on conflict.
    pub fn extend(&mut self, other: Self) {
        self.on_success.extend(other.on_success);
        self.on_failure.extend(other.on_failure);
        self.on_both.extend(other.on_both);
    }

    /// Returns `true` if all three maps are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_success.is_empty() && self.on_failure.is_empty() && self.on_both.is_empty()
    }

    /// Returns the entries that apply to a terminal outcome.
    #[must_use]
    pub fn resolve(&self, success: bool) -> IndexMap<String, T> {
        let specific = if success {
            &self.on_success
        } else {
            &self.on_failure
        };
        let mut resolved = self.on_both.clone();
        for (key, value) in specific {
            resolved.insert(key.clone(), value.clone());
        }
        resolved
    }
}

/// Headers and cookies accumulated for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// Header values by lowercased name.
    pub headers: TriggerMap<String>,
    /// Cookies by name.
    pub cookies: TriggerMap<Cookie>,
}

impl Effects {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a header.
    pub fn set_header(&mut self, trigger: Trigger, name: &str, value: impl Into<String>) {
        self.headers
            .insert(trigger, name.to_ascii_lowercase(), value.into());
    }

    /// Files a cookie.
    pub fn set_cookie(&mut self, trigger: Trigger, cookie: Cookie) {
        self.cookies.insert(trigger, cookie.name().to_string(), cookie);
    }

    /// Absorbs effects collected elsewhere.
    pub fn absorb(&mut self, other: Self) {
        self.headers.extend(other.headers);
        self.cookies.extend(other.cookies);
    }

    /// Returns `true` if nothing was filed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.cookies.is_empty()
    }

    /// Returns the headers and cookies that apply to a terminal outcome.
    #[must_use]
    pub fn resolve(&self, success: bool) -> ResolvedEffects {
        ResolvedEffects {
            headers: self.headers.resolve(success),
            cookies: self.cookies.resolve(success).into_values().collect(),
        }
    }
}

/// Effects selected for a terminal reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEffects {
    /// Headers by lowercased name.
    pub headers: IndexMap<String, String>,
    /// Cookies in filing order.
    pub cookies: Vec<Cookie>,
}
