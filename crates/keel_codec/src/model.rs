//! Runtime type descriptions for beans.
//!
//! A [`BeanType`] is what a reflective codec would call a class: a name, an
//! optional supertype, declared fields and a declared method table. The
//! encoding resolver inspects the method table to find legacy hooks, and the
//! bean state writer walks the field list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bean::Bean;
use crate::error::HookError;
use crate::isolate::IsolateOwner;
use crate::recorder::{ObjectInput, ObjectOutput};
use crate::value::{BeanRef, Value};

/// Shared handle to a type description. Identity is pointer identity.
pub type TypeRef = Arc<BeanType>;

/// Computes the convention value of a field from the rest of the bean.
pub type ConventionFn = Arc<dyn Fn(&Bean) -> Value + Send + Sync>;

/// `writeReplace`: returns the object to serialize in place of the bean.
pub type SubstituteHook = Arc<dyn Fn(&Bean) -> Result<Value, HookError> + Send + Sync>;

/// `readResolve`: returns the object to use in place of the decoded bean.
pub type ResolveHook = Arc<dyn Fn(&BeanRef) -> Result<Value, HookError> + Send + Sync>;

/// `writeObject`: imperative serialization of one level of the hierarchy.
pub type LegacyWriteHook =
    Arc<dyn Fn(&Bean, &mut dyn ObjectOutput) -> Result<(), HookError> + Send + Sync>;

/// `readObject`: imperative deserialization of one level of the hierarchy.
pub type LegacyReadHook =
    Arc<dyn Fn(&BeanRef, &mut dyn ObjectInput) -> Result<(), HookError> + Send + Sync>;

/// The constructor reserved for deserialization.
pub type Constructor = Arc<dyn Fn(&TypeRef) -> Result<Bean, HookError> + Send + Sync>;

/// Post-construction hook reattaching a decoded model object to its owner.
pub type ModelHook =
    Arc<dyn Fn(&BeanRef, &dyn IsolateOwner) -> Result<(), HookError> + Send + Sync>;

/// Primitive value kinds, shared by primitive and boxed field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `boolean`
    Bool,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `char`
    Char,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveKind {
    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PrimitiveKind::Bool, Value::Bool(_))
                | (PrimitiveKind::Byte, Value::Byte(_))
                | (PrimitiveKind::Short, Value::Short(_))
                | (PrimitiveKind::Char, Value::Char(_))
                | (PrimitiveKind::Int, Value::Int(_))
                | (PrimitiveKind::Long, Value::Long(_))
                | (PrimitiveKind::Float, Value::Float(_))
                | (PrimitiveKind::Double, Value::Double(_))
        )
    }

    fn zero(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Short => Value::Short(0),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Long => Value::Long(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }
}

/// The declared (static) type of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// A primitive; never null.
    Primitive(PrimitiveKind),
    /// A boxed primitive; the primitive or null.
    Boxed(PrimitiveKind),
    /// A string or null.
    Str,
    /// A byte array or null.
    Bytes,
    /// A list or null.
    List,
    /// A map or null.
    Map,
    /// A type reference or null.
    Class,
    /// A service reference or null.
    Service,
    /// A bean of the named type (or any subtype), any bean if `None`, or null.
    Bean(Option<String>),
    /// Anything.
    Any,
    /// A type the codec knows it cannot serialize, e.g. `Thread`.
    Unsupported(String),
}

impl FieldType {
    /// Shorthand for [`FieldType::Any`].
    pub fn any() -> Self {
        FieldType::Any
    }

    /// Shorthand for a bean field restricted to `name` and its subtypes.
    pub fn bean(name: impl Into<String>) -> Self {
        FieldType::Bean(Some(name.into()))
    }

    /// Shorthand for an unsupported field type.
    pub fn unsupported(name: impl Into<String>) -> Self {
        FieldType::Unsupported(name.into())
    }

    /// Whether a value of the given runtime type may be assigned to a field
    /// of this declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Primitive(kind) => kind.matches(value),
            FieldType::Any => true,
            _ if value.is_null() => true,
            FieldType::Boxed(kind) => kind.matches(value),
            FieldType::Str => matches!(value, Value::Str(_)),
            FieldType::Bytes => matches!(value, Value::Bytes(_)),
            FieldType::List => matches!(value, Value::List(_)),
            FieldType::Map => matches!(value, Value::Map(_)),
            FieldType::Class => matches!(value, Value::Class(_)),
            FieldType::Service => matches!(value, Value::Service(_)),
            FieldType::Bean(None) => matches!(value, Value::Bean(_)),
            FieldType::Bean(Some(name)) => match value {
                Value::Bean(b) => b.borrow().ty().is_subtype_of(name),
                _ => false,
            },
            FieldType::Unsupported(_) => matches!(value, Value::Native(_)),
        }
    }

    /// The value a freshly allocated field holds.
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::Primitive(kind) => kind.zero(),
            _ => Value::Null,
        }
    }

    /// Returns `true` for [`FieldType::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FieldType::Unsupported(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(k) => f.write_str(k.name()),
            FieldType::Boxed(k) => write!(f, "boxed {}", k.name()),
            FieldType::Str => f.write_str("String"),
            FieldType::Bytes => f.write_str("byte[]"),
            FieldType::List => f.write_str("List"),
            FieldType::Map => f.write_str("Map"),
            FieldType::Class => f.write_str("Class"),
            FieldType::Service => f.write_str("service"),
            FieldType::Bean(Some(name)) => f.write_str(name),
            FieldType::Bean(None) => f.write_str("bean"),
            FieldType::Any => f.write_str("Object"),
            FieldType::Unsupported(name) => f.write_str(name),
        }
    }
}

/// A field declared by a [`BeanType`].
#[derive(Clone)]
pub struct FieldDescriptor {
    /// Field name, unique within the declaring type.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Transient fields are not part of the persisted state.
    pub transient: bool,
    /// Static fields belong to the type, not the bean.
    pub is_static: bool,
    /// Convention lookup used while the field has no explicit value.
    pub convention: Option<ConventionFn>,
}

impl FieldDescriptor {
    /// Creates a plain instance field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            transient: false,
            is_static: false,
            convention: None,
        }
    }

    /// Marks the field transient.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Marks the field static.
    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attaches a convention lookup to the field.
    pub fn with_convention(
        mut self,
        convention: impl Fn(&Bean) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.convention = Some(Arc::new(convention));
        self
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("transient", &self.transient)
            .field("is_static", &self.is_static)
            .field("convention", &self.convention.is_some())
            .finish()
    }
}

/// Parameter and return types appearing in method signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeSig {
    /// No value.
    Void,
    /// `Object`.
    Object,
    /// The legacy output stream type.
    ObjectOutputStream,
    /// The legacy input stream type.
    ObjectInputStream,
    /// Any other named type.
    Named(&'static str),
}

/// What a method does when invoked by the codec.
#[derive(Clone)]
pub enum MethodBody {
    /// Returns a substitute to serialize.
    Substitute(SubstituteHook),
    /// Returns a replacement for a decoded bean.
    Resolve(ResolveHook),
    /// Writes the declaring level's state imperatively.
    WriteObject(LegacyWriteHook),
    /// Reads the declaring level's state imperatively.
    ReadObject(LegacyReadHook),
    /// A method the codec never calls.
    Opaque,
}

/// A method declared by a [`BeanType`].
#[derive(Clone)]
pub struct Method {
    /// Method name.
    pub name: String,
    /// Parameter types in order.
    pub params: Vec<TypeSig>,
    /// Return type.
    pub returns: TypeSig,
    /// Behavior.
    pub body: MethodBody,
}

impl Method {
    /// `Object writeReplace()`.
    pub fn write_replace(
        hook: impl Fn(&Bean) -> Result<Value, HookError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: "writeReplace".to_string(),
            params: Vec::new(),
            returns: TypeSig::Object,
            body: MethodBody::Substitute(Arc::new(hook)),
        }
    }

    /// `Object readResolve()`.
    pub fn read_resolve(
        hook: impl Fn(&BeanRef) -> Result<Value, HookError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: "readResolve".to_string(),
            params: Vec::new(),
            returns: TypeSig::Object,
            body: MethodBody::Resolve(Arc::new(hook)),
        }
    }

    /// `void writeObject(ObjectOutputStream)`.
    pub fn write_object(
        hook: impl Fn(&Bean, &mut dyn ObjectOutput) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: "writeObject".to_string(),
            params: vec![TypeSig::ObjectOutputStream],
            returns: TypeSig::Void,
            body: MethodBody::WriteObject(Arc::new(hook)),
        }
    }

    /// `void readObject(ObjectInputStream)`.
    pub fn read_object(
        hook: impl Fn(&BeanRef, &mut dyn ObjectInput) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: "readObject".to_string(),
            params: vec![TypeSig::ObjectInputStream],
            returns: TypeSig::Void,
            body: MethodBody::ReadObject(Arc::new(hook)),
        }
    }

    /// Any other method; the codec only looks at its signature.
    pub fn opaque(name: impl Into<String>, params: Vec<TypeSig>, returns: TypeSig) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            body: MethodBody::Opaque,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}({:?})", self.returns, self.name, self.params)
    }
}

/// Description of a bean type: its place in the hierarchy, fields and methods.
pub struct BeanType {
    name: String,
    supertype: Option<TypeRef>,
    fields: Vec<FieldDescriptor>,
    methods: Vec<Method>,
    generated: bool,
    constructor: Option<Constructor>,
    model_hook: Option<ModelHook>,
    slot_offset: usize,
}

impl BeanType {
    /// Starts describing a type.
    pub fn builder(name: impl Into<String>) -> BeanTypeBuilder {
        BeanTypeBuilder {
            ty: BeanType {
                name: name.into(),
                supertype: None,
                fields: Vec::new(),
                methods: Vec::new(),
                generated: false,
                constructor: None,
                model_hook: None,
                slot_offset: 0,
            },
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct supertype, if any.
    pub fn supertype(&self) -> Option<&TypeRef> {
        self.supertype.as_ref()
    }

    /// Fields declared by this type only.
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Methods declared by this type only.
    pub fn declared_methods(&self) -> &[Method] {
        &self.methods
    }

    /// Whether this is a runtime-generated (decorated) subtype.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// The serialization constructor, if the type declares one.
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// The model-object post-construction hook, if any.
    pub fn model_hook(&self) -> Option<&ModelHook> {
        self.model_hook.as_ref()
    }

    /// The type and its supertypes, root first.
    pub fn hierarchy(&self) -> Vec<&BeanType> {
        let mut chain = vec![self];
        let mut current = self.supertype.as_deref();
        while let Some(t) = current {
            chain.push(t);
            current = t.supertype.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Number of field slots an instance needs, including inherited fields.
    pub fn slot_count(&self) -> usize {
        self.slot_offset + self.fields.len()
    }

    /// Index of the first slot of this type's own fields.
    pub fn slot_offset(&self) -> usize {
        self.slot_offset
    }

    /// Every field of the hierarchy with its slot, root first.
    pub fn all_fields(&self) -> Vec<(usize, &BeanType, &FieldDescriptor)> {
        let mut out = Vec::with_capacity(self.slot_count());
        for t in self.hierarchy() {
            for (i, field) in t.fields.iter().enumerate() {
                out.push((t.slot_offset + i, t, field));
            }
        }
        out
    }

    /// Finds a field slot by name. Subtype fields shadow supertype fields.
    pub fn find_slot(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.fields.iter().position(|f| f.name == name) {
            return Some(self.slot_offset + i);
        }
        self.supertype.as_ref()?.find_slot(name)
    }

    /// The descriptor of the field in the given slot.
    pub fn field_at(&self, slot: usize) -> Option<&FieldDescriptor> {
        if slot >= self.slot_offset {
            return self.fields.get(slot - self.slot_offset);
        }
        self.supertype.as_ref()?.field_at(slot)
    }

    /// Whether this type is `name` or inherits from it.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.name == name
            || self
                .supertype
                .as_ref()
                .is_some_and(|s| s.is_subtype_of(name))
    }
}

impl fmt::Debug for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanType")
            .field("name", &self.name)
            .field("supertype", &self.supertype.as_ref().map(|s| s.name()))
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .field("generated", &self.generated)
            .finish()
    }
}

/// Builder for [`BeanType`].
pub struct BeanTypeBuilder {
    ty: BeanType,
}

impl BeanTypeBuilder {
    /// Sets the supertype.
    pub fn extends(mut self, supertype: &TypeRef) -> Self {
        self.ty.slot_offset = supertype.slot_count();
        self.ty.supertype = Some(Arc::clone(supertype));
        self
    }

    /// Declares a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.ty.fields.push(field);
        self
    }

    /// Declares a method.
    pub fn method(mut self, method: Method) -> Self {
        self.ty.methods.push(method);
        self
    }

    /// Marks the type as runtime-generated.
    pub fn generated(mut self) -> Self {
        self.ty.generated = true;
        self
    }

    /// Sets the serialization constructor.
    pub fn constructor(
        mut self,
        ctor: impl Fn(&TypeRef) -> Result<Bean, HookError> + Send + Sync + 'static,
    ) -> Self {
        self.ty.constructor = Some(Arc::new(ctor));
        self
    }

    /// Gives the type the model-object capability.
    pub fn model_object(
        mut self,
        hook: impl Fn(&BeanRef, &dyn IsolateOwner) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.ty.model_hook = Some(Arc::new(hook));
        self
    }

    /// Finishes the type.
    pub fn build(self) -> TypeRef {
        Arc::new(self.ty)
    }
}

/// Host-side lookup of live types by name.
///
/// Persisted environments store type names; at load time the host maps them
/// back to the types of the running process through this registry.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeRef>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type under its name, replacing any previous registration.
    pub fn register(&mut self, ty: &TypeRef) {
        self.types.insert(ty.name().to_string(), Arc::clone(ty));
    }

    /// Looks a type up by name.
    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.types.get(name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
