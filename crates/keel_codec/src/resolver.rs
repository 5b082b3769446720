//! Per-type encoding classification and relevant-field enumeration.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{
    BeanType, ConventionFn, FieldType, LegacyReadHook, LegacyWriteHook, Method, MethodBody,
    ResolveHook, SubstituteHook, TypeRef, TypeSig,
};

/// How beans of a type are encoded when the default field walk is not enough.
///
/// The default is represented by the absence of an `Encoding`.
#[derive(Clone)]
pub enum Encoding {
    /// Serialize whatever the type's `writeReplace` returns.
    Substitute(SubstituteHook),
    /// Encode fields normally; replace the decoded bean via `readResolve`.
    ResolveOnRead(ResolveHook),
    /// Route state through the legacy imperative protocol.
    LegacyHooks(LegacyChain),
}

impl Encoding {
    /// Short name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Encoding::Substitute(_) => "substitute",
            Encoding::ResolveOnRead(_) => "resolve-on-read",
            Encoding::LegacyHooks(_) => "legacy-hooks",
        }
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::LegacyHooks(chain) => f.debug_tuple("LegacyHooks").field(chain).finish(),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// One level of the hierarchy in a legacy chain.
///
/// Levels without a hook of their own fall back to the default field walk
/// restricted to the fields that level declares.
#[derive(Clone)]
pub struct LegacyLink {
    /// The type declaring this level's fields and hooks.
    pub declaring: TypeRef,
    /// `writeObject` declared by this level.
    pub write: Option<LegacyWriteHook>,
    /// `readObject` declared by this level.
    pub read: Option<LegacyReadHook>,
}

impl fmt::Debug for LegacyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyLink")
            .field("declaring", &self.declaring.name())
            .field("write", &self.write.is_some())
            .field("read", &self.read.is_some())
            .finish()
    }
}

/// Legacy hooks of a whole hierarchy, root first.
#[derive(Clone, Debug)]
pub struct LegacyChain {
    /// One link per type of the hierarchy.
    pub links: Vec<LegacyLink>,
}

impl LegacyChain {
    /// Whether any level declares a write hook.
    pub fn has_write_hooks(&self) -> bool {
        self.links.iter().any(|l| l.write.is_some())
    }

    /// Whether any level declares a read hook.
    pub fn has_read_hooks(&self) -> bool {
        self.links.iter().any(|l| l.read.is_some())
    }
}

/// A field that takes part in the persisted state of a type.
#[derive(Clone)]
pub struct RelevantField {
    /// Slot in the bean.
    pub slot: usize,
    /// The type declaring the field.
    pub declaring: TypeRef,
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Convention lookup, for fields taking part in convention mapping.
    pub convention: Option<ConventionFn>,
}

impl RelevantField {
    /// Whether an unset value may be supplied by a convention lookup.
    pub fn is_convention_overridable(&self) -> bool {
        self.convention.is_some()
    }
}

impl fmt::Debug for RelevantField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {} @{}", self.declaring.name(), self.name, self.ty, self.slot)
    }
}

/// Memoizing classifier shared by every pass of a session.
///
/// Caches are keyed by type identity and hold the type alive, so a key can
/// never be recycled by a different type while the resolver lives.
#[derive(Default)]
pub struct EncodingResolver {
    encodings: DashMap<usize, (TypeRef, Option<Encoding>)>,
    fields: DashMap<usize, (TypeRef, Arc<[RelevantField]>)>,
    inspections: AtomicUsize,
}

fn type_key(ty: &TypeRef) -> usize {
    Arc::as_ptr(ty) as usize
}

impl EncodingResolver {
    /// Creates a resolver with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoding for beans of `ty`, or `None` for the default field walk.
    ///
    /// Racing first lookups may both classify; the first insert wins and the
    /// results are identical anyway.
    pub fn encoding_for(&self, ty: &TypeRef) -> Option<Encoding> {
        let key = type_key(ty);
        if let Some(entry) = self.encodings.get(&key) {
            return entry.1.clone();
        }
        let encoding = self.classify(ty);
        self.encodings
            .entry(key)
            .or_insert_with(|| (Arc::clone(ty), encoding))
            .1
            .clone()
    }

    /// Fields persisted for `ty`, supertype fields first, in declaration order.
    pub fn relevant_fields(&self, ty: &TypeRef) -> Arc<[RelevantField]> {
        let key = type_key(ty);
        if let Some(entry) = self.fields.get(&key) {
            return Arc::clone(&entry.1);
        }
        let fields: Arc<[RelevantField]> = hierarchy_refs(ty)
            .iter()
            .flat_map(|level| {
                level
                    .declared_fields()
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| !f.transient && !f.is_static)
                    .map(move |(i, f)| RelevantField {
                        slot: level.slot_offset() + i,
                        declaring: Arc::clone(level),
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                        convention: f.convention.clone(),
                    })
            })
            .collect();
        Arc::clone(
            &self
                .fields
                .entry(key)
                .or_insert_with(|| (Arc::clone(ty), fields))
                .1,
        )
    }

    /// How many times a type's method set has been inspected.
    pub fn inspection_count(&self) -> usize {
        self.inspections.load(Ordering::Relaxed)
    }

    fn classify(&self, ty: &TypeRef) -> Option<Encoding> {
        self.inspections.fetch_add(1, Ordering::Relaxed);
        let levels = hierarchy_refs(ty);

        // Most derived declaration wins for inheritable hooks.
        let substitute = levels.iter().rev().find_map(|t| {
            t.declared_methods().iter().find_map(|m| match &m.body {
                MethodBody::Substitute(h) if is_replace_signature(m, "writeReplace") => {
                    Some(Arc::clone(h))
                }
                _ => None,
            })
        });
        let encoding = if let Some(hook) = substitute {
            Some(Encoding::Substitute(hook))
        } else if let Some(hook) = levels.iter().rev().find_map(|t| {
            t.declared_methods().iter().find_map(|m| match &m.body {
                MethodBody::Resolve(h) if is_replace_signature(m, "readResolve") => {
                    Some(Arc::clone(h))
                }
                _ => None,
            })
        }) {
            Some(Encoding::ResolveOnRead(hook))
        } else {
            let chain = LegacyChain {
                links: levels
                    .iter()
                    .map(|t| LegacyLink {
                        declaring: Arc::clone(t),
                        write: declared_write_hook(t),
                        read: declared_read_hook(t),
                    })
                    .collect(),
            };
            if chain.has_write_hooks() || chain.has_read_hooks() {
                Some(Encoding::LegacyHooks(chain))
            } else {
                None
            }
        };

        tracing::debug!(
            ty = ty.name(),
            encoding = encoding.as_ref().map_or("default", Encoding::kind_name),
            "classified bean type"
        );
        encoding
    }
}

/// The hierarchy as shared handles, root first.
fn hierarchy_refs(ty: &TypeRef) -> Vec<TypeRef> {
    let mut chain = vec![Arc::clone(ty)];
    let mut current = ty.supertype();
    while let Some(t) = current {
        chain.push(Arc::clone(t));
        current = t.supertype();
    }
    chain.reverse();
    chain
}

fn is_replace_signature(m: &Method, name: &str) -> bool {
    m.name == name && m.params.is_empty() && m.returns == TypeSig::Object
}

fn is_stream_signature(m: &Method, name: &str, stream: TypeSig) -> bool {
    m.name == name && m.params == [stream] && m.returns == TypeSig::Void
}

fn declared_write_hook(t: &BeanType) -> Option<LegacyWriteHook> {
    t.declared_methods().iter().find_map(|m| match &m.body {
        MethodBody::WriteObject(h)
            if is_stream_signature(m, "writeObject", TypeSig::ObjectOutputStream) =>
        {
            Some(Arc::clone(h))
        }
        _ => None,
    })
}

fn declared_read_hook(t: &BeanType) -> Option<LegacyReadHook> {
    t.declared_methods().iter().find_map(|m| match &m.body {
        MethodBody::ReadObject(h)
            if is_stream_signature(m, "readObject", TypeSig::ObjectInputStream) =>
        {
            Some(Arc::clone(h))
        }
        _ => None,
    })
}
