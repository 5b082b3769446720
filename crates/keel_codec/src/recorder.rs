//! Emulation of the legacy imperative serialization protocol.
//!
//! Legacy write hooks never touch the byte stream. They talk to a
//! [`RecordingOutput`] that turns every call into a deferred operation, and
//! the operations are replayed against the write context only once every
//! hook of the bean returned cleanly. On the read side a [`LegacyInput`]
//! pulls tagged values from the read context in the order they were written.

use std::sync::Arc;

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::model::TypeRef;
use crate::value::{BeanRef, Value};

/// Output side of the legacy protocol, as seen by `writeObject` hooks.
pub trait ObjectOutput {
    /// Writes a boolean.
    fn write_boolean(&mut self, v: bool) -> CodecResult<()>;
    /// Writes a byte.
    fn write_byte(&mut self, v: i8) -> CodecResult<()>;
    /// Writes a short.
    fn write_short(&mut self, v: i16) -> CodecResult<()>;
    /// Writes a char.
    fn write_char(&mut self, v: char) -> CodecResult<()>;
    /// Writes an int.
    fn write_int(&mut self, v: i32) -> CodecResult<()>;
    /// Writes a long.
    fn write_long(&mut self, v: i64) -> CodecResult<()>;
    /// Writes a float.
    fn write_float(&mut self, v: f32) -> CodecResult<()>;
    /// Writes a double.
    fn write_double(&mut self, v: f64) -> CodecResult<()>;
    /// Writes a string.
    fn write_utf(&mut self, v: &str) -> CodecResult<()>;
    /// Writes a byte array.
    fn write_bytes(&mut self, v: &[u8]) -> CodecResult<()>;
    /// Writes an arbitrary graph value.
    fn write_object(&mut self, v: Value) -> CodecResult<()>;
    /// Writes the fields declared by the hook's own type.
    fn default_write_object(&mut self) -> CodecResult<()>;
    /// No-op.
    fn flush(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn put_fields(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn write_fields(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn reset(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn write_unshared(&mut self, v: Value) -> CodecResult<()>;
    /// Not supported.
    fn use_protocol_version(&mut self, version: i32) -> CodecResult<()>;
}

/// Input side of the legacy protocol, as seen by `readObject` hooks.
pub trait ObjectInput {
    /// Reads a boolean.
    fn read_boolean(&mut self) -> CodecResult<bool>;
    /// Reads a byte.
    fn read_byte(&mut self) -> CodecResult<i8>;
    /// Reads a short.
    fn read_short(&mut self) -> CodecResult<i16>;
    /// Reads a char.
    fn read_char(&mut self) -> CodecResult<char>;
    /// Reads an int.
    fn read_int(&mut self) -> CodecResult<i32>;
    /// Reads a long.
    fn read_long(&mut self) -> CodecResult<i64>;
    /// Reads a float.
    fn read_float(&mut self) -> CodecResult<f32>;
    /// Reads a double.
    fn read_double(&mut self) -> CodecResult<f64>;
    /// Reads a string.
    fn read_utf(&mut self) -> CodecResult<String>;
    /// Reads a byte array.
    fn read_bytes(&mut self) -> CodecResult<Vec<u8>>;
    /// Reads an arbitrary graph value.
    fn read_object(&mut self) -> CodecResult<Value>;
    /// Reads the fields declared by the hook's own type into the bean.
    fn default_read_object(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn read_fields(&mut self) -> CodecResult<()>;
    /// Not supported.
    fn read_unshared(&mut self) -> CodecResult<Value>;
    /// Not supported.
    fn register_validation(&mut self, priority: i32) -> CodecResult<()>;
}

pub(crate) type DeferredOp = Box<dyn FnOnce(&mut WriteContext) -> CodecResult<()>>;

/// Deferred operations recorded for one bean.
pub(crate) struct Recorder {
    bean_name: String,
    ops: Vec<DeferredOp>,
    failure: Option<&'static str>,
}

impl Recorder {
    pub(crate) fn new(bean_name: &str) -> Self {
        Self {
            bean_name: bean_name.to_string(),
            ops: Vec::new(),
            failure: None,
        }
    }

    /// An output handed to the write hook declared by `declaring`.
    pub(crate) fn output(&mut self, bean: &BeanRef, declaring: &TypeRef) -> RecordingOutput<'_> {
        RecordingOutput {
            recorder: self,
            bean: BeanRef::clone(bean),
            declaring: Arc::clone(declaring),
        }
    }

    /// Records the default field walk of a level without a write hook.
    pub(crate) fn record_default(&mut self, bean: &BeanRef, declaring: &TypeRef) {
        let bean = BeanRef::clone(bean);
        let declaring = Arc::clone(declaring);
        self.push(move |ctx| ctx.write_level_fields(&bean, &declaring));
    }

    fn push(&mut self, op: impl FnOnce(&mut WriteContext) -> CodecResult<()> + 'static) {
        self.ops.push(Box::new(op));
    }

    fn unsupported(&mut self, method: &'static str) -> CodecResult<()> {
        self.failure.get_or_insert(method);
        Err(CodecError::UnsupportedLegacyOperation {
            method,
            bean: self.bean_name.clone(),
        })
    }

    /// Fails if a hook invoked an unsupported operation, even if the hook
    /// swallowed the error.
    pub(crate) fn check(&self) -> CodecResult<()> {
        match self.failure {
            Some(method) => Err(CodecError::UnsupportedLegacyOperation {
                method,
                bean: self.bean_name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Replays every recorded operation in order.
    pub(crate) fn playback(self, ctx: &mut WriteContext) -> CodecResult<()> {
        self.check()?;
        for op in self.ops {
            op(ctx)?;
        }
        Ok(())
    }
}

/// The [`ObjectOutput`] passed to `writeObject` hooks.
pub struct RecordingOutput<'r> {
    recorder: &'r mut Recorder,
    bean: BeanRef,
    declaring: TypeRef,
}

impl RecordingOutput<'_> {
    fn value(&mut self, v: Value) -> CodecResult<()> {
        self.recorder.push(move |ctx| ctx.write_value(&v));
        Ok(())
    }
}

impl ObjectOutput for RecordingOutput<'_> {
    fn write_boolean(&mut self, v: bool) -> CodecResult<()> {
        self.value(Value::Bool(v))
    }

    fn write_byte(&mut self, v: i8) -> CodecResult<()> {
        self.value(Value::Byte(v))
    }

    fn write_short(&mut self, v: i16) -> CodecResult<()> {
        self.value(Value::Short(v))
    }

    fn write_char(&mut self, v: char) -> CodecResult<()> {
        self.value(Value::Char(v))
    }

    fn write_int(&mut self, v: i32) -> CodecResult<()> {
        self.value(Value::Int(v))
    }

    fn write_long(&mut self, v: i64) -> CodecResult<()> {
        self.value(Value::Long(v))
    }

    fn write_float(&mut self, v: f32) -> CodecResult<()> {
        self.value(Value::Float(v))
    }

    fn write_double(&mut self, v: f64) -> CodecResult<()> {
        self.value(Value::Double(v))
    }

    fn write_utf(&mut self, v: &str) -> CodecResult<()> {
        self.value(Value::str(v))
    }

    fn write_bytes(&mut self, v: &[u8]) -> CodecResult<()> {
        self.value(Value::Bytes(v.to_vec()))
    }

    fn write_object(&mut self, v: Value) -> CodecResult<()> {
        self.value(v)
    }

    fn default_write_object(&mut self) -> CodecResult<()> {
        self.recorder.record_default(&self.bean, &self.declaring);
        Ok(())
    }

    fn flush(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn put_fields(&mut self) -> CodecResult<()> {
        self.recorder.unsupported("putFields")
    }

    fn write_fields(&mut self) -> CodecResult<()> {
        self.recorder.unsupported("writeFields")
    }

    fn reset(&mut self) -> CodecResult<()> {
        self.recorder.unsupported("reset")
    }

    fn write_unshared(&mut self, _v: Value) -> CodecResult<()> {
        self.recorder.unsupported("writeUnshared")
    }

    fn use_protocol_version(&mut self, _version: i32) -> CodecResult<()> {
        self.recorder.unsupported("useProtocolVersion")
    }
}

/// The [`ObjectInput`] passed to `readObject` hooks.
pub struct LegacyInput<'c, 'a> {
    ctx: &'c mut ReadContext<'a>,
    bean: BeanRef,
    declaring: TypeRef,
}

impl<'c, 'a> LegacyInput<'c, 'a> {
    pub(crate) fn new(ctx: &'c mut ReadContext<'a>, bean: &BeanRef, declaring: &TypeRef) -> Self {
        Self {
            ctx,
            bean: BeanRef::clone(bean),
            declaring: Arc::clone(declaring),
        }
    }

    fn next(&mut self, expected: &'static str) -> CodecResult<Value> {
        let value = self.ctx.read_value()?;
        if value.kind_name() == expected {
            Ok(value)
        } else {
            Err(self.mismatch(expected, &value))
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> CodecError {
        CodecError::LegacyStreamMismatch {
            bean: self.declaring.name().to_string(),
            expected,
            found: found.kind_name(),
        }
    }

    fn unsupported<T>(&self, method: &'static str) -> CodecResult<T> {
        Err(CodecError::UnsupportedLegacyOperation {
            method,
            bean: self.declaring.name().to_string(),
        })
    }
}

macro_rules! read_primitive {
    ($self:ident, $variant:ident, $kind:literal) => {
        match $self.next($kind)? {
            Value::$variant(v) => Ok(v),
            other => Err($self.mismatch($kind, &other)),
        }
    };
}

impl ObjectInput for LegacyInput<'_, '_> {
    fn read_boolean(&mut self) -> CodecResult<bool> {
        read_primitive!(self, Bool, "boolean")
    }

    fn read_byte(&mut self) -> CodecResult<i8> {
        read_primitive!(self, Byte, "byte")
    }

    fn read_short(&mut self) -> CodecResult<i16> {
        read_primitive!(self, Short, "short")
    }

    fn read_char(&mut self) -> CodecResult<char> {
        read_primitive!(self, Char, "char")
    }

    fn read_int(&mut self) -> CodecResult<i32> {
        read_primitive!(self, Int, "int")
    }

    fn read_long(&mut self) -> CodecResult<i64> {
        read_primitive!(self, Long, "long")
    }

    fn read_float(&mut self) -> CodecResult<f32> {
        read_primitive!(self, Float, "float")
    }

    fn read_double(&mut self) -> CodecResult<f64> {
        read_primitive!(self, Double, "double")
    }

    fn read_utf(&mut self) -> CodecResult<String> {
        read_primitive!(self, Str, "string")
    }

    fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        read_primitive!(self, Bytes, "bytes")
    }

    fn read_object(&mut self) -> CodecResult<Value> {
        self.ctx.read_value()
    }

    fn default_read_object(&mut self) -> CodecResult<()> {
        self.ctx.read_level_fields(&self.bean, &self.declaring)
    }

    fn read_fields(&mut self) -> CodecResult<()> {
        self.unsupported("readFields")
    }

    fn read_unshared(&mut self) -> CodecResult<Value> {
        self.unsupported("readUnshared")
    }

    fn register_validation(&mut self, _priority: i32) -> CodecResult<()> {
        self.unsupported("registerValidation")
    }
}
