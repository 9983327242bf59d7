//! The per-attempt request context and its builder.

use crate::{options::ResolvedOptions, Error, RequestSnapshot, Result};
use http::Method;
use std::collections::HashMap;
use url::Url;

/// Describes one in-flight request.
///
/// A context is built at the start of every layer of a call and passed to
/// middleware by value. Handlers return a (possibly modified) copy, which is
/// what the rest of the layer and any retry or redirect continuation uses.
#[derive(Debug, Clone)]
pub struct Context {
    /// The HTTP method.
    pub method: Method,

    /// The fully resolved URL, query parameters included.
    pub url: Url,

    /// The resolved options for this call.
    pub options: ResolvedOptions,

    /// Scratch space for middleware-to-middleware communication.
    pub meta: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Builds a context for `target`.
    ///
    /// `target` is resolved against `base` when it is relative, then
    /// `options.params` are appended as URL-encoded query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL cannot be resolved to an
    /// absolute URL.
    pub fn build(
        method: Method,
        target: &str,
        base: Option<&Url>,
        options: ResolvedOptions,
        meta: HashMap<String, serde_json::Value>,
    ) -> Result<Self> {
        let mut url = match base {
            Some(base) => base.join(target),
            None => Url::parse(target),
        }
        .map_err(|e| Error::configuration(format!("Invalid URL {:?}: {}", target, e)))?;

        if !options.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &options.params {
                pairs.append_pair(key, value);
            }
        }

        Ok(Self {
            method,
            url,
            options,
            meta,
        })
    }

    /// Stores a metadata entry.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Reads a metadata entry.
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.meta.get(key)
    }

    /// Captures this context as it stands at `attempt`.
    pub fn snapshot(&self, attempt: usize) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.clone(),
            url: self.url.to_string(),
            options: self.options.clone(),
            attempt,
        }
    }
}
