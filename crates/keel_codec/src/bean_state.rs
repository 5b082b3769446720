//! Field-by-field bean state writer and reader.

use std::sync::Arc;

use crate::bean::Bean;
use crate::context::{ReadContext, WriteContext};
use crate::error::CodecResult;
use crate::model::TypeRef;
use crate::problems::Phase;
use crate::resolver::RelevantField;
use crate::trace::TraceFrame;
use crate::value::{BeanRef, Value};

/// The value to persist for a field.
///
/// An unset convention-mapped field persists its convention value, but only
/// when that value fits the declared type.
fn effective_value(bean: &Bean, field: &RelevantField) -> Value {
    let raw = bean.slot(field.slot);
    match &field.convention {
        Some(convention) if !bean.is_explicit_slot(field.slot) => {
            let candidate = convention(bean);
            if field.ty.accepts(&candidate) {
                candidate
            } else {
                raw.clone()
            }
        }
        _ => raw.clone(),
    }
}

fn field_frame(field: &RelevantField) -> TraceFrame {
    TraceFrame::field(field.declaring.name(), &field.name)
}

impl WriteContext {
    /// Writes every relevant field of the bean.
    pub(crate) fn write_state_of(&mut self, bean: &BeanRef, ty: &TypeRef) -> CodecResult<()> {
        let fields = self.resolver.relevant_fields(ty);
        for field in fields.iter() {
            self.write_field(bean, field)?;
        }
        Ok(())
    }

    /// Writes the relevant fields declared by one level of the bean's hierarchy.
    pub(crate) fn write_level_fields(
        &mut self,
        bean: &BeanRef,
        declaring: &TypeRef,
    ) -> CodecResult<()> {
        let ty = TypeRef::clone(bean.borrow().ty());
        let fields = self.resolver.relevant_fields(&ty);
        for field in fields
            .iter()
            .filter(|f| Arc::ptr_eq(&f.declaring, declaring))
        {
            self.write_field(bean, field)?;
        }
        Ok(())
    }

    fn write_field(&mut self, bean: &BeanRef, field: &RelevantField) -> CodecResult<()> {
        let value = effective_value(&bean.borrow(), field);
        self.framed(field_frame(field), |ctx| {
            if field.ty.is_unsupported() {
                ctx.problems.unsupported_field_type(
                    field.declaring.name(),
                    &field.name,
                    &field.ty,
                    Phase::Store,
                    ctx.tracer.location(),
                )?;
                if matches!(value, Value::Native(_)) {
                    return ctx.write_value(&Value::Null);
                }
            }
            ctx.write_value(&value)
        })
    }
}

impl ReadContext<'_> {
    /// Reads every relevant field into the bean.
    pub(crate) fn read_state_of(&mut self, bean: &BeanRef, ty: &TypeRef) -> CodecResult<()> {
        let fields = self.resolver.relevant_fields(ty);
        for field in fields.iter() {
            self.read_field(bean, field)?;
        }
        Ok(())
    }

    /// Reads the relevant fields declared by one level of the bean's hierarchy.
    pub(crate) fn read_level_fields(
        &mut self,
        bean: &BeanRef,
        declaring: &TypeRef,
    ) -> CodecResult<()> {
        let ty = TypeRef::clone(bean.borrow().ty());
        let fields = self.resolver.relevant_fields(&ty);
        for field in fields
            .iter()
            .filter(|f| Arc::ptr_eq(&f.declaring, declaring))
        {
            self.read_field(bean, field)?;
        }
        Ok(())
    }

    fn read_field(&mut self, bean: &BeanRef, field: &RelevantField) -> CodecResult<()> {
        self.framed(field_frame(field), |ctx| {
            let value = ctx.read_value()?;
            // Whatever was stored, an unsupported field is never assigned.
            if field.ty.is_unsupported() {
                return ctx.problems.unsupported_field_type(
                    field.declaring.name(),
                    &field.name,
                    &field.ty,
                    Phase::Load,
                    ctx.tracer.location(),
                );
            }
            if field.ty.accepts(&value) {
                bean.borrow_mut().set_slot(field.slot, value);
                Ok(())
            } else {
                ctx.problems.type_mismatch(
                    field.declaring.name(),
                    &field.name,
                    &value.type_description(),
                    &field.ty,
                    ctx.tracer.location(),
                )
            }
        })
    }
}
