//! Bean identity, encoding dispatch and instantiation.
//!
//! A bean is written as `BEAN class-token generated-flag state` the first
//! time it is reached and as `BEAN_REF index` afterwards. Beans of a type
//! bound to a custom codec are written as `CUSTOM class-token state` instead.
//! Indices count `BEAN` and `CUSTOM` records in stream order, so the reader
//! can register each instance before reading its state and cycles resolve to
//! the same instance.

use std::rc::Rc;
use std::sync::Arc;

use crate::bean::Bean;
use crate::bindings::{Binding, CustomCodec};
use crate::context::{tag, ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::model::{SubstituteHook, TypeRef};
use crate::recorder::{LegacyInput, Recorder};
use crate::resolver::{Encoding, LegacyChain};
use crate::trace::TraceFrame;
use crate::value::{BeanRef, Value};

fn bean_key(bean: &BeanRef) -> usize {
    Rc::as_ptr(bean) as *const () as usize
}

impl WriteContext {
    pub(crate) fn write_bean(&mut self, bean: &BeanRef) -> CodecResult<()> {
        if let Some(&id) = self.beans.get(&bean_key(bean)) {
            self.encoder.write_u8(tag::BEAN_REF)?;
            return self.encoder.write_small_int(id);
        }
        let ty = TypeRef::clone(bean.borrow().ty());
        match self.bindings.lookup(&ty) {
            Some(Binding::Custom(codec)) => return self.write_custom_bean(bean, &ty, &*codec),
            Some(Binding::Unsupported) => {
                self.problems
                    .unsupported_type(ty.name(), self.tracer.location())?;
                return self.encoder.write_u8(tag::NULL);
            }
            None => {}
        }
        match self.resolver.encoding_for(&ty) {
            Some(Encoding::Substitute(hook)) => self.write_substitute(bean, &ty, &hook),
            Some(Encoding::LegacyHooks(chain)) => self.write_legacy_bean(bean, &ty, &chain),
            Some(Encoding::ResolveOnRead(_)) | None => self.write_default_bean(bean, &ty),
        }
    }

    fn register_bean(&mut self, bean: &BeanRef) {
        let id = self.bean_count;
        self.bean_count += 1;
        self.beans.insert(bean_key(bean), id);
        self.written.push(BeanRef::clone(bean));
    }

    fn begin_bean(&mut self, bean: &BeanRef, ty: &TypeRef) -> CodecResult<()> {
        self.encoder.write_u8(tag::BEAN)?;
        self.register_bean(bean);
        self.write_class(ty)?;
        self.encoder.write_bool(ty.is_generated())
    }

    fn write_custom_bean(
        &mut self,
        bean: &BeanRef,
        ty: &TypeRef,
        codec: &dyn CustomCodec,
    ) -> CodecResult<()> {
        self.encoder.write_u8(tag::CUSTOM)?;
        self.register_bean(bean);
        self.write_class(ty)?;
        self.framed(TraceFrame::Bean(ty.name().to_string()), |ctx| {
            codec.encode(ctx, bean)
        })
    }

    fn write_default_bean(&mut self, bean: &BeanRef, ty: &TypeRef) -> CodecResult<()> {
        self.begin_bean(bean, ty)?;
        self.framed(TraceFrame::Bean(ty.name().to_string()), |ctx| {
            ctx.write_state_of(bean, ty)
        })
    }

    fn write_substitute(
        &mut self,
        bean: &BeanRef,
        ty: &TypeRef,
        hook: &SubstituteHook,
    ) -> CodecResult<()> {
        let replacement = hook(&*bean.borrow()).map_err(CodecError::from_hook)?;
        if let Value::Bean(r) = &replacement {
            if Rc::ptr_eq(r, bean) {
                return self.write_default_bean(bean, ty);
            }
        }
        self.write_value(&replacement)?;
        // Later occurrences of the original point at the replacement.
        if let Value::Bean(r) = &replacement {
            if let Some(&id) = self.beans.get(&bean_key(r)) {
                self.beans.insert(bean_key(bean), id);
                self.written.push(BeanRef::clone(bean));
            }
        }
        Ok(())
    }

    /// Records every level's legacy output before a single byte of the bean
    /// is written, so a bean whose hooks fail leaves no trace in the stream.
    fn write_legacy_bean(
        &mut self,
        bean: &BeanRef,
        ty: &TypeRef,
        chain: &LegacyChain,
    ) -> CodecResult<()> {
        let mut recorder = Recorder::new(ty.name());
        for link in &chain.links {
            match &link.write {
                Some(hook) => {
                    let result = {
                        let snapshot = bean.borrow();
                        let mut out = recorder.output(bean, &link.declaring);
                        hook(&*snapshot, &mut out)
                    };
                    result.map_err(CodecError::from_hook)?;
                }
                None => recorder.record_default(bean, &link.declaring),
            }
        }
        recorder.check()?;

        self.begin_bean(bean, ty)?;
        self.framed(TraceFrame::Bean(ty.name().to_string()), move |ctx| {
            recorder.playback(ctx)
        })
    }
}

/// Instantiates a bean for decoding.
///
/// Runtime-generated types are allocated without running any constructor;
/// other types go through their serialization constructor when they have one.
fn new_bean(ty: &TypeRef, generated: bool) -> CodecResult<BeanRef> {
    let bean = match ty.constructor() {
        Some(ctor) if !generated => ctor(ty).map_err(CodecError::from_hook)?,
        _ => Bean::new(ty),
    };
    // Slots are numbered for `ty`; an instance of any other type can't hold them.
    if !Arc::ptr_eq(bean.ty(), ty) {
        return Err(CodecError::ConstructorTypeMismatch {
            expected: ty.name().to_string(),
            found: bean.ty().name().to_string(),
        });
    }
    Ok(bean.into_ref())
}

impl ReadContext<'_> {
    pub(crate) fn read_bean(&mut self) -> CodecResult<Value> {
        let token = self.decoder.read_small_int()?;
        let ty = self.env.decode_class(token)?;
        let generated = self.decoder.read_bool()?;
        let bean = new_bean(&ty, generated)?;

        let id = self.beans.len();
        self.beans.push(Value::Bean(BeanRef::clone(&bean)));

        let encoding = self.resolver.encoding_for(&ty);
        self.framed(TraceFrame::Bean(ty.name().to_string()), |ctx| {
            match &encoding {
                Some(Encoding::LegacyHooks(chain)) => ctx.read_legacy_state(&bean, chain),
                _ => ctx.read_state_of(&bean, &ty),
            }
        })?;

        if let Some(hook) = ty.model_hook() {
            let owner = self.current_owner()?;
            hook(&bean, &*owner).map_err(CodecError::from_hook)?;
        }

        match encoding {
            Some(Encoding::ResolveOnRead(hook)) => {
                let resolved = hook(&bean).map_err(CodecError::from_hook)?;
                self.beans[id] = resolved.clone();
                Ok(resolved)
            }
            _ => Ok(Value::Bean(bean)),
        }
    }

    pub(crate) fn read_custom_bean(&mut self) -> CodecResult<Value> {
        let token = self.decoder.read_small_int()?;
        let ty = self.env.decode_class(token)?;
        let codec = match self.bindings.lookup(&ty) {
            Some(Binding::Custom(codec)) => codec,
            _ => return Err(CodecError::MissingBinding(ty.name().to_string())),
        };

        // Back-references reached while decoding the state see null.
        let id = self.beans.len();
        self.beans.push(Value::Null);
        let value = self.framed(TraceFrame::Bean(ty.name().to_string()), |ctx| {
            codec.decode(ctx, &ty)
        })?;
        self.beans[id] = value.clone();
        Ok(value)
    }

    fn read_legacy_state(&mut self, bean: &BeanRef, chain: &LegacyChain) -> CodecResult<()> {
        for link in &chain.links {
            match &link.read {
                Some(hook) => {
                    let mut input = LegacyInput::new(self, bean, &link.declaring);
                    hook(bean, &mut input).map_err(CodecError::from_hook)?;
                }
                None => self.read_level_fields(bean, &link.declaring)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use keel_diagnostics::DiagnosticSink;

    use crate::context::tests::write_context;
    use crate::model::{BeanType, FieldDescriptor, FieldType, Method};
    use crate::recorder::ObjectOutput;

    #[test]
    fn failing_legacy_hook_leaves_no_bytes() {
        let ty = BeanType::builder("Legacy")
            .method(Method::write_object(|_, out| {
                out.write_int(1)?;
                // swallow the failure and keep writing
                let _ = out.write_fields();
                out.write_int(2)?;
                Ok(())
            }))
            .build();
        let sink = Arc::new(DiagnosticSink::new());
        let mut ctx = write_context(&sink);
        ctx.write_value(&Value::Int(7)).unwrap();
        let before = ctx.position();

        let bean = Bean::new(&ty).into_ref();
        let err = ctx.write_value(&Value::Bean(bean)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedLegacyOperation { method: "writeFields", .. }
        ));
        assert_eq!(ctx.position(), before);
    }

    #[test]
    fn propagated_legacy_failure_keeps_its_variant() {
        let ty = BeanType::builder("Legacy")
            .method(Method::write_object(|_, out| {
                out.write_unshared(Value::Null)?;
                Ok(())
            }))
            .build();
        let sink = Arc::new(DiagnosticSink::new());
        let mut ctx = write_context(&sink);
        let err = ctx
            .write_value(&Value::bean(Bean::new(&ty)))
            .unwrap_err();
        assert!(err.is_unsupported_legacy_operation());
        assert_eq!(ctx.position(), 0);
    }

    #[test]
    fn repeated_bean_is_written_once() {
        let ty = BeanType::builder("Leaf")
            .field(FieldDescriptor::new("name", FieldType::Str))
            .build();
        let bean = Value::bean(Bean::new(&ty).with("name", "shared"));
        let sink = Arc::new(DiagnosticSink::new());
        let mut ctx = write_context(&sink);
        ctx.write_value(&Value::List(vec![bean.clone(), bean])).unwrap();
        let encoded = ctx.finish();
        assert_eq!(encoded.beans, 1);
        assert_eq!(encoded.environment.classes, vec!["Leaf"]);
    }

    #[test]
    fn generated_types_skip_the_constructor() {
        let ty = BeanType::builder("Decorated")
            .generated()
            .constructor(|_| Err("constructor must not run".into()))
            .build();
        assert!(new_bean(&ty, true).is_ok());
        let err = new_bean(&ty, false).unwrap_err();
        assert_eq!(err.to_string(), "constructor must not run");
    }

    #[test]
    fn constructor_returning_another_type_is_an_error() {
        let other = BeanType::builder("Other").build();
        let ty = BeanType::builder("Task")
            .field(FieldDescriptor::new("name", FieldType::Str))
            .constructor(move |_| Ok(Bean::new(&other)))
            .build();
        let err = new_bean(&ty, false).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ConstructorTypeMismatch { ref expected, ref found }
                if expected == "Task" && found == "Other"
        ));
    }
}
