//! Object-graph codec for the Keel configuration cache.
//!
//! A captured configuration is a graph of [`Value`]s whose beans may share
//! substructure and form cycles. [`GraphCodec::encode`] writes the graph to a
//! compact tagged stream plus an [`Environment`] of class and service names;
//! [`GraphCodec::decode`] rebuilds it against the live types of the current
//! process.
//!
//! How a bean type is encoded is decided once per type by the
//! [`EncodingResolver`]: plain field walk, `writeReplace` substitution,
//! `readResolve` replacement, or the legacy `writeObject`/`readObject`
//! protocol emulated through [`ObjectOutput`] and [`ObjectInput`]. Types
//! bound in [`CodecBindings`] skip the resolver and use their own codec.
//! Problems the codec can work around become diagnostics; everything else is
//! a [`CodecError`].

#![warn(missing_docs)]

pub mod bean;
pub mod bindings;
mod bean_codec;
mod bean_state;
pub mod codec;
pub mod context;
pub mod environment;
pub mod error;
pub mod isolate;
pub mod model;
pub mod problems;
pub mod recorder;
pub mod resolver;
pub mod trace;
pub mod value;
mod wire;

pub use bean::Bean;
pub use bindings::{Binding, CodecBindings, CustomCodec};
pub use codec::{CodecOptions, EncodedGraph, GraphCodec, DEFAULT_MAX_PROBLEMS};
pub use context::{ReadContext, WriteContext};
pub use environment::{DecodeEnvironment, Environment};
pub use error::{CodecError, CodecResult, HookError};
pub use isolate::{IsolateContext, IsolateOwner, IsolateStack, OwnerKind, OwnerScope};
pub use model::{
    BeanType, BeanTypeBuilder, FieldDescriptor, FieldType, Method, MethodBody, PrimitiveKind,
    TypeRef, TypeRegistry, TypeSig,
};
pub use problems::{
    Phase, ProblemReporter, TOO_MANY_PROBLEMS, TYPE_MISMATCH_ON_ASSIGN, UNENCODABLE_VALUE,
    UNSUPPORTED_FIELD_TYPE, UNSUPPORTED_TYPE,
};
pub use recorder::{LegacyInput, ObjectInput, ObjectOutput, RecordingOutput};
pub use resolver::{Encoding, EncodingResolver, LegacyChain, LegacyLink, RelevantField};
pub use trace::{TraceFrame, Tracer};
pub use value::{BeanRef, NativeHandle, ServiceRef, Value};
