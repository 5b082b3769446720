//! Bean instances: field slots plus explicit-value tracking.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::model::TypeRef;
use crate::value::{BeanRef, Value};

/// An instance of a [`BeanType`](crate::model::BeanType).
///
/// Slots hold field values in hierarchy order (see
/// [`BeanType::all_fields`](crate::model::BeanType::all_fields)). A slot is
/// *explicit* once something assigned it; until then a convention lookup, if
/// the field has one, supplies the effective value.
pub struct Bean {
    ty: TypeRef,
    slots: Vec<Value>,
    explicit: Vec<bool>,
}

impl Bean {
    /// Allocates an instance with every field at its default, running no
    /// constructor.
    pub fn new(ty: &TypeRef) -> Self {
        let slots: Vec<Value> = ty
            .all_fields()
            .into_iter()
            .map(|(_, _, field)| field.ty.default_value())
            .collect();
        let explicit = vec![false; slots.len()];
        Self {
            ty: Arc::clone(ty),
            slots,
            explicit,
        }
    }

    /// Moves the bean behind a shared handle.
    pub fn into_ref(self) -> BeanRef {
        Rc::new(RefCell::new(self))
    }

    /// The bean's type.
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Reads a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.find_slot(name).map(|slot| &self.slots[slot])
    }

    /// Assigns a field by name, marking it explicit. Returns `false` if the
    /// type has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.ty.find_slot(name) {
            Some(slot) => {
                self.set_slot(slot, value.into());
                true
            }
            None => false,
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Reads a slot directly.
    pub fn slot(&self, slot: usize) -> &Value {
        &self.slots[slot]
    }

    /// Assigns a slot directly, marking it explicit.
    pub fn set_slot(&mut self, slot: usize, value: Value) {
        self.slots[slot] = value;
        self.explicit[slot] = true;
    }

    /// Whether the slot was assigned since allocation.
    pub fn is_explicit_slot(&self, slot: usize) -> bool {
        self.explicit[slot]
    }

    /// Whether the named field was assigned since allocation.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.ty
            .find_slot(name)
            .is_some_and(|slot| self.explicit[slot])
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        for (slot, _, field) in self.ty.all_fields() {
            s.field(&field.name, &self.slots[slot]);
        }
        s.finish()
    }
}
