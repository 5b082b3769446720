//! Per-type codec bindings consulted before the generic bean encodings.
//!
//! Bindings are matched in registration order against the bean's type and
//! its supertypes; the first match wins. A type can be bound to a
//! [`CustomCodec`] that owns its wire form, or marked unsupported, in which
//! case every instance is reported and written as null.

use std::fmt;
use std::sync::Arc;

use crate::context::{ReadContext, WriteContext};
use crate::error::CodecResult;
use crate::model::{BeanType, TypeRef};
use crate::value::{BeanRef, Value};

/// Hand-written encoding for the instances of one type.
///
/// `encode` and `decode` must read back exactly what was written. Both run
/// inside the bean's trace frame and may use the full value codec for nested
/// values. A custom-coded bean is registered for sharing before `encode`
/// runs, but cycles that lead back to it decode as null.
pub trait CustomCodec: Send + Sync {
    /// Writes the state of `bean`.
    fn encode(&self, ctx: &mut WriteContext, bean: &BeanRef) -> CodecResult<()>;

    /// Rebuilds an instance of `ty` from the stream.
    fn decode(&self, ctx: &mut ReadContext<'_>, ty: &TypeRef) -> CodecResult<Value>;
}

/// What a bound type is encoded with.
#[derive(Clone)]
pub enum Binding {
    /// A hand-written codec.
    Custom(Arc<dyn CustomCodec>),
    /// Instances are never encoded.
    Unsupported,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Custom(_) => f.write_str("Custom"),
            Binding::Unsupported => f.write_str("Unsupported"),
        }
    }
}

/// Ordered type-name → [`Binding`] registry.
#[derive(Clone, Debug, Default)]
pub struct CodecBindings {
    entries: Vec<(String, Binding)>,
}

impl CodecBindings {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds instances of `type_name` and its subtypes to `codec`.
    pub fn bind(mut self, type_name: impl Into<String>, codec: impl CustomCodec + 'static) -> Self {
        self.entries
            .push((type_name.into(), Binding::Custom(Arc::new(codec))));
        self
    }

    /// Marks `type_name` and its subtypes as never serializable.
    pub fn unsupported(mut self, type_name: impl Into<String>) -> Self {
        self.entries.push((type_name.into(), Binding::Unsupported));
        self
    }

    /// The first binding matching `ty`, if any.
    pub fn lookup(&self, ty: &BeanType) -> Option<Binding> {
        self.entries
            .iter()
            .find(|(name, _)| ty.is_subtype_of(name))
            .map(|(_, binding)| binding.clone())
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
