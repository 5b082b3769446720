//! Dynamic values making up a captured object graph.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::bean::Bean;
use crate::model::TypeRef;

/// Shared, mutable handle to a bean. Identity is pointer identity.
pub type BeanRef = Rc<RefCell<Bean>>;

/// A node of the object graph.
///
/// Beans are reference-counted so that shared substructure and cycles can be
/// represented; everything else is plain data.
#[derive(Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An 8-bit signed integer.
    Byte(i8),
    /// A 16-bit signed integer.
    Short(i16),
    /// A character.
    Char(char),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 64-bit signed integer.
    Long(i64),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A UTF-8 string.
    Str(String),
    /// A raw byte range.
    Bytes(Vec<u8>),
    /// An ordered collection.
    List(Vec<Value>),
    /// Key/value pairs in insertion order.
    Map(Vec<(Value, Value)>),
    /// A reference to a type, encoded out of band as a class token.
    Class(TypeRef),
    /// A reference to an owner-scoped service, encoded out of band.
    Service(ServiceRef),
    /// A bean, written once per pass and back-referenced afterwards.
    Bean(BeanRef),
    /// A live runtime resource with no serializable form.
    Native(NativeHandle),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Wraps a bean into a shared value.
    pub fn bean(bean: Bean) -> Self {
        Value::Bean(Rc::new(RefCell::new(bean)))
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Class(_) => "class",
            Value::Service(_) => "service",
            Value::Bean(_) => "bean",
            Value::Native(_) => "native",
        }
    }

    /// Describes the runtime type, naming the bean type where there is one.
    pub fn type_description(&self) -> String {
        match self {
            Value::Bean(b) => format!("bean `{}`", b.borrow().ty().name()),
            Value::Native(n) => format!("`{}`", n.type_name()),
            other => other.kind_name().to_string(),
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the bean handle if this is a bean.
    pub fn as_bean(&self) -> Option<&BeanRef> {
        match self {
            Value::Bean(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the string if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

// Beans compare by identity, which also keeps comparison finite on cycles.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Service(a), Value::Service(b)) => a.ptr_eq(b),
            (Value::Bean(a), Value::Bean(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Byte(v) => write!(f, "Byte({v})"),
            Value::Short(v) => write!(f, "Short({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Long(v) => write!(f, "Long({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Value::List(v) => f.debug_list().entries(v).finish(),
            Value::Map(v) => f
                .debug_map()
                .entries(v.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Class(t) => write!(f, "Class({})", t.name()),
            Value::Service(s) => write!(f, "Service({})", s.name()),
            // Never recurse into bean state: graphs may be cyclic.
            Value::Bean(b) => match b.try_borrow() {
                Ok(bean) => write!(f, "Bean({}@{:p})", bean.ty().name(), Rc::as_ptr(b)),
                Err(_) => write!(f, "Bean(<borrowed>@{:p})", Rc::as_ptr(b)),
            },
            Value::Native(n) => write!(f, "Native({})", n.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A handle to an owner-scoped service instance.
///
/// Services are never serialized. The stream records a token standing for
/// the service name, and the decoder asks the active isolate owner for a
/// live instance with that name.
#[derive(Clone)]
pub struct ServiceRef {
    name: Arc<str>,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceRef {
    /// Wraps a live service instance under a lookup name.
    pub fn new<T: Any + Send + Sync>(name: impl Into<Arc<str>>, instance: T) -> Self {
        Self {
            name: name.into(),
            instance: Arc::new(instance),
        }
    }

    /// The name the service is resolved by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Downcasts the instance to a concrete service type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    /// Identity comparison of the underlying instance.
    pub fn ptr_eq(&self, other: &ServiceRef) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.instance) as *const () as usize
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceRef({})", self.name)
    }
}

/// A live runtime resource (thread, socket, open stream) captured in the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeHandle {
    type_name: Arc<str>,
}

impl NativeHandle {
    /// Creates a handle for a resource of the named runtime type.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    /// The runtime type of the resource.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BeanType;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Int(1).kind_name(), "int");
        assert_eq!(Value::str("x").kind_name(), "string");
        assert_eq!(Value::Native(NativeHandle::new("Thread")).kind_name(), "native");
    }

    #[test]
    fn beans_compare_by_identity() {
        let ty = BeanType::builder("Empty").build();
        let a = Value::bean(Bean::new(&ty));
        let b = Value::bean(Bean::new(&ty));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn services_compare_by_instance() {
        let s = ServiceRef::new("fs", 1u8);
        let same_name = ServiceRef::new("fs", 1u8);
        assert!(s.ptr_eq(&s.clone()));
        assert!(!s.ptr_eq(&same_name));
        assert_eq!(s.downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn debug_does_not_recurse_into_cycles() {
        let ty = BeanType::builder("Node")
            .field(crate::model::FieldDescriptor::new("next", crate::model::FieldType::any()))
            .build();
        let node = Value::bean(Bean::new(&ty));
        if let Value::Bean(b) = &node {
            b.borrow_mut().set("next", node.clone());
        }
        let s = format!("{node:?}");
        assert!(s.starts_with("Bean(Node@"));
    }

    #[test]
    fn type_description_names_beans() {
        let ty = BeanType::builder("Task").build();
        let v = Value::bean(Bean::new(&ty));
        assert_eq!(v.type_description(), "bean `Task`");
        assert_eq!(Value::Long(1).type_description(), "long");
    }
}
