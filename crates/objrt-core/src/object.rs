//! Object model and class system
//!
//! A generated class is a [`ClassDescriptor`] static: identity, ordered field
//! names and a flat [`VTable`]. An [`Instance`] pairs a descriptor with a
//! [`FieldTable`] holding one slot per declared field.
//!
//! ```
//! use objrt_core::object::{ClassDescriptor, ClassId};
//! use objrt_core::{construct, Value};
//!
//! static PAIR: ClassDescriptor = ClassDescriptor::new(ClassId(1), "Pair", &["first", "second"]);
//!
//! let mut pair = construct(&PAIR, vec![Value::int(3), Value::int(4)]).unwrap();
//! assert_eq!(pair.field("first").unwrap(), &Value::int(3));
//! pair.free_fields().unwrap();
//! assert!(pair.field("first").is_err());
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::Value;
use std::fmt;
use tracing::trace;

/// Class identity (unique per registered class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Method body: receives the instance and its arguments
pub type MethodFn = fn(&mut Instance, Vec<Value>) -> RuntimeResult<Value>;

/// Default constructor: produces one value per declared field
pub type DefaultFieldsFn = fn() -> Vec<Value>;

/// VTable entry
#[derive(Clone, Copy)]
pub struct Method {
    /// Method name (for lookup and diagnostics)
    pub name: &'static str,
    /// Method body
    pub func: MethodFn,
}

impl Method {
    /// Create a method entry
    pub const fn new(name: &'static str, func: MethodFn) -> Self {
        Self { name, func }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.name)
    }
}

/// Virtual method table
///
/// Slots are fixed at generation time; the slot index is the selector that
/// generated code dispatches on.
#[derive(Debug, Clone, Copy)]
pub struct VTable {
    methods: &'static [Method],
}

impl VTable {
    /// Create a vtable over generated method entries
    pub const fn new(methods: &'static [Method]) -> Self {
        Self { methods }
    }

    /// Vtable without methods
    pub const fn empty() -> Self {
        Self { methods: &[] }
    }

    /// Get method by slot
    pub fn get_method(&self, slot: usize) -> Option<&Method> {
        self.methods.get(slot)
    }

    /// Find slot and method by name
    pub fn find(&self, name: &str) -> Option<(usize, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, method)| method.name == name)
    }

    /// Get number of methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl Default for VTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Class definition metadata
///
/// Immutable and process-lifetime; generated code declares one `static` per
/// class.
#[derive(Debug)]
pub struct ClassDescriptor {
    id: ClassId,
    name: &'static str,
    field_names: &'static [&'static str],
    vtable: VTable,
    default_constructor: Option<DefaultFieldsFn>,
}

impl ClassDescriptor {
    /// Create a class with the given ordered fields and no methods
    pub const fn new(
        id: ClassId,
        name: &'static str,
        field_names: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            name,
            field_names,
            vtable: VTable::empty(),
            default_constructor: None,
        }
    }

    /// Attach a vtable
    pub const fn with_vtable(self, vtable: VTable) -> Self {
        Self { vtable, ..self }
    }

    /// Attach a zero-argument constructor
    pub const fn with_default_constructor(self, ctor: DefaultFieldsFn) -> Self {
        Self {
            default_constructor: Some(ctor),
            ..self
        }
    }

    /// Class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared fields, in positional order
    pub fn field_names(&self) -> &'static [&'static str] {
        self.field_names
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Position of field `name`
    pub fn field_index(&self, name: &str) -> RuntimeResult<usize> {
        self.field_names
            .iter()
            .position(|field| *field == name)
            .ok_or_else(|| RuntimeError::FieldNotFound {
                class: self.name,
                field: name.to_string(),
            })
    }

    /// Name of field at `index`
    pub fn field_name(&self, index: usize) -> Option<&'static str> {
        self.field_names.get(index).copied()
    }

    /// Method table
    pub fn vtable(&self) -> &VTable {
        &self.vtable
    }

    /// Zero-argument constructor, if the class declares one
    pub fn default_constructor(&self) -> Option<DefaultFieldsFn> {
        self.default_constructor
    }

    /// Check whether the class declares a zero-argument constructor
    pub fn has_default_constructor(&self) -> bool {
        self.default_constructor.is_some()
    }
}

/// Per-instance field storage
///
/// One slot per declared field. A cleared slot (`None`) no longer holds a
/// value; teardown clears every slot.
#[derive(Debug)]
pub struct FieldTable {
    slots: Vec<Option<Value>>,
    released: bool,
}

impl FieldTable {
    fn from_values(values: Vec<Value>) -> Self {
        Self {
            slots: values.into_iter().map(Some).collect(),
            released: false,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow the value in slot `index`, `None` if cleared or out of range
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Number of slots still holding a value
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether teardown already ran
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            if let Some(value) = slot.take() {
                value.release();
                released += 1;
            }
        }
        self.released = true;
        released
    }
}

impl PartialEq for FieldTable {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

/// Object instance
pub struct Instance {
    class: &'static ClassDescriptor,
    fields: FieldTable,
}

impl Instance {
    pub(crate) fn from_values(class: &'static ClassDescriptor, values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), class.field_count());
        Self {
            class,
            fields: FieldTable::from_values(values),
        }
    }

    /// Class descriptor
    pub fn class(&self) -> &'static ClassDescriptor {
        self.class
    }

    /// Class id
    pub fn class_id(&self) -> ClassId {
        self.class.id
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.class.field_count()
    }

    /// Field storage
    pub fn field_table(&self) -> &FieldTable {
        &self.fields
    }

    /// Borrow field by name
    pub fn field(&self, name: &str) -> RuntimeResult<&Value> {
        let index = self.class.field_index(name)?;
        self.fields.get(index).ok_or_else(|| self.cleared(name))
    }

    /// Mutably borrow field by name
    pub fn field_mut(&mut self, name: &str) -> RuntimeResult<&mut Value> {
        let index = self.class.field_index(name)?;
        let class = self.class.name;
        self.fields
            .get_mut(index)
            .ok_or_else(|| RuntimeError::FieldNotFound {
                class,
                field: name.to_string(),
            })
    }

    /// Borrow field by position
    pub fn field_at(&self, index: usize) -> RuntimeResult<&Value> {
        self.fields
            .get(index)
            .ok_or_else(|| self.cleared(&index.to_string()))
    }

    /// Clone field by name (see [`Value::try_clone`])
    pub fn get(&self, name: &str) -> RuntimeResult<Value> {
        self.field(name)?.try_clone()
    }

    /// Store into field `name`, releasing the previous value
    pub fn set_field(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        let index = self.class.field_index(name)?;
        self.set_field_at(index, value)
    }

    /// Store into field at `index`, releasing the previous value
    pub fn set_field_at(&mut self, index: usize, value: Value) -> RuntimeResult<()> {
        match self.fields.get_mut(index) {
            Some(slot) => {
                std::mem::replace(slot, value).release();
                Ok(())
            }
            None => {
                let field = self
                    .class
                    .field_name(index)
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                value.release();
                Err(RuntimeError::FieldNotFound {
                    class: self.class.name,
                    field,
                })
            }
        }
    }

    /// Move field `name` out, leaving null in the slot
    pub fn take_field(&mut self, name: &str) -> RuntimeResult<Value> {
        Ok(std::mem::take(self.field_mut(name)?))
    }

    /// Iterate over live fields in declared order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.class
            .field_names
            .iter()
            .zip(self.fields.slots.iter())
            .filter_map(|(name, slot)| slot.as_ref().map(|value| (*name, value)))
    }

    /// Dispatch through the vtable slot
    pub fn invoke(&mut self, slot: usize, args: Vec<Value>) -> RuntimeResult<Value> {
        let method = self.class.vtable.get_method(slot).copied().ok_or_else(|| {
            RuntimeError::MethodNotFound {
                class: self.class.name,
                selector: format!("slot {}", slot),
            }
        })?;
        trace!(class = self.class.name, method = method.name, "dispatch");
        (method.func)(self, args)
    }

    /// Dispatch by method name
    pub fn invoke_named(&mut self, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let slot = self
            .class
            .vtable
            .find(name)
            .map(|(slot, _)| slot)
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: self.class.name,
                selector: name.to_string(),
            })?;
        self.invoke(slot, args)
    }

    /// Release every field slot
    ///
    /// Visits each slot once, releasing nested instances recursively. The
    /// shell stays with its owner. A second call fails with
    /// [`RuntimeError::DoubleRelease`].
    pub fn free_fields(&mut self) -> RuntimeResult<()> {
        if self.fields.is_released() {
            return Err(RuntimeError::DoubleRelease {
                what: format!("fields of {} instance", self.class.name),
            });
        }
        self.release_fields();
        Ok(())
    }

    /// Whether teardown already ran
    pub fn is_freed(&self) -> bool {
        self.fields.is_released()
    }

    /// Total teardown; no-op on an already released table
    pub(crate) fn release_fields(&mut self) {
        if self.fields.is_released() {
            return;
        }
        let released = self.fields.release_all();
        trace!(class = self.class.name, released, "freed fields");
    }

    fn cleared(&self, field: &str) -> RuntimeError {
        RuntimeError::FieldNotFound {
            class: self.class.name,
            field: field.to_string(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.class.id == other.class.id && self.fields == other.fields
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name);
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        if self.is_freed() {
            s.field("freed", &true);
        }
        s.finish()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_freed() {
            return write!(f, "{}{{<freed>}}", self.class.name);
        }
        write!(f, "{}{{", self.class.name)?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        write!(f, "}}")
    }
}
