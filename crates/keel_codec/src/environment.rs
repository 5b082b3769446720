//! Out-of-band reference tables for classes and owner-scoped services.
//!
//! Neither types nor services are written into the byte stream. The encoder
//! assigns each distinct identity a dense token in first-seen order and the
//! token table travels next to the bytes as an [`Environment`]. At load time
//! the host maps the stored names back to live types.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::model::{TypeRef, TypeRegistry};

/// Identity → token map with the entries in token order.
pub(crate) struct TokenTable<T> {
    tokens: HashMap<usize, u32>,
    entries: Vec<T>,
}

impl<T> TokenTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Returns the token for `identity`, registering `entry` on first sight.
    ///
    /// The entry is kept alive for the table's lifetime so the identity
    /// (an address) cannot be reused by another object mid-pass.
    pub(crate) fn token_for(&mut self, identity: usize, entry: impl FnOnce() -> T) -> u32 {
        if let Some(&token) = self.tokens.get(&identity) {
            return token;
        }
        let token = self.entries.len() as u32;
        self.entries.push(entry());
        self.tokens.insert(identity, token);
        token
    }

    pub(crate) fn entries(&self) -> &[T] {
        &self.entries
    }
}

/// The persisted token tables of one encoded graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Type names, indexed by class token.
    pub classes: Vec<String>,
    /// Service names, indexed by service token.
    pub services: Vec<String>,
}

impl Environment {
    /// Maps stored type names back to live types.
    ///
    /// Fails with [`CodecError::UnknownType`] if the registry lacks a type,
    /// which the cache layer treats as a miss.
    pub fn resolve(&self, registry: &TypeRegistry) -> CodecResult<DecodeEnvironment> {
        let classes = self
            .classes
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CodecError::UnknownType(name.clone()))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(DecodeEnvironment {
            classes,
            services: self.services.clone(),
        })
    }
}

/// Token → live reference tables supplied by the host for a decode pass.
#[derive(Clone, Debug, Default)]
pub struct DecodeEnvironment {
    classes: Vec<TypeRef>,
    services: Vec<String>,
}

impl DecodeEnvironment {
    /// Builds an environment from live tables directly.
    pub fn new(classes: Vec<TypeRef>, services: Vec<String>) -> Self {
        Self { classes, services }
    }

    /// The type standing behind a class token.
    pub fn decode_class(&self, token: u32) -> CodecResult<TypeRef> {
        self.classes
            .get(token as usize)
            .map(Arc::clone)
            .ok_or(CodecError::UnknownClassToken(token))
    }

    /// The service name standing behind a service token.
    pub fn service_name(&self, token: u32) -> CodecResult<&str> {
        self.services
            .get(token as usize)
            .map(String::as_str)
            .ok_or(CodecError::UnknownServiceToken(token))
    }

    /// Number of class entries.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
