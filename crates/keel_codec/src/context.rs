//! Per-pass encode and decode state, and the tagged value codec.
//!
//! Every value starts with a one-byte tag. Strings are written inline the
//! first time and as back-references afterwards; classes and services are
//! written as environment tokens; beans are written once and referenced by
//! index on later occurrences.

use std::collections::HashMap;
use std::sync::Arc;

use keel_common::{InternalError, Interner};

use crate::bindings::CodecBindings;
use crate::codec::EncodedGraph;
use crate::environment::{DecodeEnvironment, Environment, TokenTable};
use crate::error::{CodecError, CodecResult};
use crate::isolate::{IsolateContext, IsolateOwner, IsolateStack};
use crate::model::TypeRef;
use crate::problems::ProblemReporter;
use crate::resolver::EncodingResolver;
use crate::trace::{TraceFrame, Tracer};
use crate::value::{BeanRef, ServiceRef, Value};
use crate::wire::{Decoder, Encoder};

pub(crate) mod tag {
    pub const NULL: u8 = 0;
    pub const BOOL: u8 = 1;
    pub const BYTE: u8 = 2;
    pub const SHORT: u8 = 3;
    pub const CHAR: u8 = 4;
    pub const INT: u8 = 5;
    pub const LONG: u8 = 6;
    pub const FLOAT: u8 = 7;
    pub const DOUBLE: u8 = 8;
    pub const STRING: u8 = 9;
    pub const BYTES: u8 = 10;
    pub const LIST: u8 = 11;
    pub const MAP: u8 = 12;
    pub const CLASS: u8 = 13;
    pub const SERVICE: u8 = 14;
    pub const BEAN: u8 = 15;
    pub const BEAN_REF: u8 = 16;
    pub const CUSTOM: u8 = 17;
}

/// State of one encode pass.
pub struct WriteContext {
    pub(crate) encoder: Encoder,
    pub(crate) resolver: Arc<EncodingResolver>,
    pub(crate) bindings: Arc<CodecBindings>,
    classes: TokenTable<TypeRef>,
    services: TokenTable<ServiceRef>,
    strings: Interner,
    /// Bean identity → index of its first write.
    pub(crate) beans: HashMap<usize, u32>,
    /// Keeps written beans alive so their identities stay unique.
    pub(crate) written: Vec<BeanRef>,
    pub(crate) bean_count: u32,
    isolates: IsolateStack,
    pub(crate) tracer: Tracer,
    pub(crate) problems: ProblemReporter,
}

impl WriteContext {
    pub(crate) fn new(
        resolver: Arc<EncodingResolver>,
        problems: ProblemReporter,
        trace_frames: bool,
    ) -> Self {
        Self {
            encoder: Encoder::new(),
            resolver,
            bindings: Arc::default(),
            classes: TokenTable::new(),
            services: TokenTable::new(),
            strings: Interner::new(),
            beans: HashMap::new(),
            written: Vec::new(),
            bean_count: 0,
            isolates: IsolateStack::new(),
            tracer: Tracer::new(trace_frames),
            problems,
        }
    }

    pub(crate) fn with_bindings(mut self, bindings: Arc<CodecBindings>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Writes any graph value.
    pub fn write_value(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.encoder.write_u8(tag::NULL),
            Value::Bool(v) => {
                self.encoder.write_u8(tag::BOOL)?;
                self.encoder.write_bool(*v)
            }
            Value::Byte(v) => {
                self.encoder.write_u8(tag::BYTE)?;
                self.encoder.write_i8(*v)
            }
            Value::Short(v) => {
                self.encoder.write_u8(tag::SHORT)?;
                self.encoder.write_i16(*v)
            }
            Value::Char(v) => {
                self.encoder.write_u8(tag::CHAR)?;
                self.encoder.write_char(*v)
            }
            Value::Int(v) => {
                self.encoder.write_u8(tag::INT)?;
                self.encoder.write_i32(*v)
            }
            Value::Long(v) => {
                self.encoder.write_u8(tag::LONG)?;
                self.encoder.write_i64(*v)
            }
            Value::Float(v) => {
                self.encoder.write_u8(tag::FLOAT)?;
                self.encoder.write_f32(*v)
            }
            Value::Double(v) => {
                self.encoder.write_u8(tag::DOUBLE)?;
                self.encoder.write_f64(*v)
            }
            Value::Str(s) => {
                self.encoder.write_u8(tag::STRING)?;
                self.write_string(s)
            }
            Value::Bytes(b) => {
                self.encoder.write_u8(tag::BYTES)?;
                self.encoder.write_bytes(b)
            }
            Value::List(items) => {
                self.encoder.write_u8(tag::LIST)?;
                self.write_len(items.len())?;
                for (i, item) in items.iter().enumerate() {
                    self.framed(TraceFrame::Element(i), |ctx| ctx.write_value(item))?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                self.encoder.write_u8(tag::MAP)?;
                self.write_len(entries.len())?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    self.framed(TraceFrame::Element(i), |ctx| {
                        ctx.write_value(k)?;
                        ctx.write_value(v)
                    })?;
                }
                Ok(())
            }
            Value::Class(ty) => {
                self.encoder.write_u8(tag::CLASS)?;
                self.write_class(ty)
            }
            Value::Service(service) => {
                self.encoder.write_u8(tag::SERVICE)?;
                let token = self
                    .services
                    .token_for(service.identity(), || service.clone());
                self.encoder.write_small_int(token)
            }
            Value::Bean(bean) => self.write_bean(bean),
            Value::Native(_) => {
                self.problems
                    .unencodable_value(&value.type_description(), self.tracer.location())?;
                self.encoder.write_u8(tag::NULL)
            }
        }
    }

    /// Token of `ty` in this pass's class environment.
    pub fn encode_class(&mut self, ty: &TypeRef) -> u32 {
        self.classes
            .token_for(Arc::as_ptr(ty) as usize, || Arc::clone(ty))
    }

    pub(crate) fn write_class(&mut self, ty: &TypeRef) -> CodecResult<()> {
        let token = self.encode_class(ty);
        self.encoder.write_small_int(token)
    }

    fn write_string(&mut self, s: &str) -> CodecResult<()> {
        let (id, fresh) = self.strings.intern(s);
        if fresh {
            self.encoder.write_small_int(0)?;
            self.encoder.write_str(s)
        } else {
            self.encoder.write_small_int(id.as_raw() + 1)
        }
    }

    fn write_len(&mut self, len: usize) -> CodecResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| InternalError::new(format!("collection of {len} elements is too large")))?;
        self.encoder.write_small_int(len)
    }

    /// Runs `f` inside a trace frame.
    pub(crate) fn framed<R>(
        &mut self,
        frame: TraceFrame,
        f: impl FnOnce(&mut Self) -> CodecResult<R>,
    ) -> CodecResult<R> {
        self.tracer.push(frame, self.encoder.position());
        let result = f(self);
        self.tracer.pop();
        result
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.encoder.position()
    }

    /// Ends the pass, returning the bytes and the environment to persist
    /// with them.
    pub fn finish(self) -> EncodedGraph {
        debug_assert!(self.written.len() >= self.bean_count as usize);
        let environment = Environment {
            classes: self
                .classes
                .entries()
                .iter()
                .map(|t| t.name().to_string())
                .collect(),
            services: self
                .services
                .entries()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
        };
        EncodedGraph {
            bytes: self.encoder.into_bytes(),
            environment,
            beans: self.bean_count as usize,
            problems: self.problems.reported(),
        }
    }
}

impl IsolateContext for WriteContext {
    fn isolates(&mut self) -> &mut IsolateStack {
        &mut self.isolates
    }
}

/// State of one decode pass.
pub struct ReadContext<'a> {
    pub(crate) decoder: Decoder<'a>,
    pub(crate) resolver: Arc<EncodingResolver>,
    pub(crate) bindings: Arc<CodecBindings>,
    pub(crate) env: &'a DecodeEnvironment,
    strings: Vec<String>,
    /// Decoded beans by write index; resolved replacements overwrite entries.
    pub(crate) beans: Vec<Value>,
    isolates: IsolateStack,
    pub(crate) tracer: Tracer,
    pub(crate) problems: ProblemReporter,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(
        bytes: &'a [u8],
        env: &'a DecodeEnvironment,
        resolver: Arc<EncodingResolver>,
        problems: ProblemReporter,
        trace_frames: bool,
    ) -> Self {
        Self {
            decoder: Decoder::new(bytes),
            resolver,
            bindings: Arc::default(),
            env,
            strings: Vec::new(),
            beans: Vec::new(),
            isolates: IsolateStack::new(),
            tracer: Tracer::new(trace_frames),
            problems,
        }
    }

    pub(crate) fn with_bindings(mut self, bindings: Arc<CodecBindings>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Reads the next graph value.
    pub fn read_value(&mut self) -> CodecResult<Value> {
        let tag = self.decoder.read_u8()?;
        match tag {
            tag::NULL => Ok(Value::Null),
            tag::BOOL => Ok(Value::Bool(self.decoder.read_bool()?)),
            tag::BYTE => Ok(Value::Byte(self.decoder.read_i8()?)),
            tag::SHORT => Ok(Value::Short(self.decoder.read_i16()?)),
            tag::CHAR => Ok(Value::Char(self.decoder.read_char()?)),
            tag::INT => Ok(Value::Int(self.decoder.read_i32()?)),
            tag::LONG => Ok(Value::Long(self.decoder.read_i64()?)),
            tag::FLOAT => Ok(Value::Float(self.decoder.read_f32()?)),
            tag::DOUBLE => Ok(Value::Double(self.decoder.read_f64()?)),
            tag::STRING => Ok(Value::Str(self.read_string()?)),
            tag::BYTES => Ok(Value::Bytes(self.decoder.read_bytes()?)),
            tag::LIST => {
                let len = self.decoder.read_small_int()? as usize;
                let mut items = Vec::new();
                for i in 0..len {
                    items.push(self.framed(TraceFrame::Element(i), |ctx| ctx.read_value())?);
                }
                Ok(Value::List(items))
            }
            tag::MAP => {
                let len = self.decoder.read_small_int()? as usize;
                let mut entries = Vec::new();
                for i in 0..len {
                    let entry = self.framed(TraceFrame::Element(i), |ctx| {
                        let k = ctx.read_value()?;
                        let v = ctx.read_value()?;
                        Ok((k, v))
                    })?;
                    entries.push(entry);
                }
                Ok(Value::Map(entries))
            }
            tag::CLASS => {
                let token = self.decoder.read_small_int()?;
                Ok(Value::Class(self.env.decode_class(token)?))
            }
            tag::SERVICE => self.read_service(),
            tag::BEAN => self.read_bean(),
            tag::CUSTOM => self.read_custom_bean(),
            tag::BEAN_REF => {
                let id = self.decoder.read_small_int()?;
                self.beans
                    .get(id as usize)
                    .cloned()
                    .ok_or(CodecError::UnknownBeanReference(id))
            }
            other => Err(CodecError::InvalidTag(other)),
        }
    }

    fn read_string(&mut self) -> CodecResult<String> {
        match self.decoder.read_small_int()? {
            0 => {
                let s = self.decoder.read_string()?;
                self.strings.push(s.clone());
                Ok(s)
            }
            n => self
                .strings
                .get(n as usize - 1)
                .cloned()
                .ok_or(CodecError::UnknownStringReference(n)),
        }
    }

    fn read_service(&mut self) -> CodecResult<Value> {
        let token = self.decoder.read_small_int()?;
        let env = self.env;
        let name = env.service_name(token)?;
        // Resolved through whichever owner is active now, never cached.
        let owner = self.current_owner()?;
        owner
            .service(name)
            .map(Value::Service)
            .ok_or_else(|| CodecError::ServiceUnavailable {
                name: name.to_string(),
                owner: owner.display_name(),
            })
    }

    /// The owner of the innermost active isolate.
    pub fn current_owner(&self) -> CodecResult<Arc<dyn IsolateOwner>> {
        self.isolates
            .current()
            .cloned()
            .ok_or(CodecError::NoActiveOwner)
    }

    /// Runs `f` inside a trace frame.
    pub(crate) fn framed<R>(
        &mut self,
        frame: TraceFrame,
        f: impl FnOnce(&mut Self) -> CodecResult<R>,
    ) -> CodecResult<R> {
        self.tracer.push(frame, self.decoder.position());
        let result = f(self);
        self.tracer.pop();
        result
    }

    /// Whether every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.decoder.is_at_end()
    }

    /// Problems reported by this pass so far.
    pub fn problem_count(&self) -> usize {
        self.problems.reported()
    }
}

impl IsolateContext for ReadContext<'_> {
    fn isolates(&mut self) -> &mut IsolateStack {
        &mut self.isolates
    }
}
