//! Boxed value representation
//!
//! Every field, parameter and return value of generated code is a [`Value`].
//! The enum is closed: new kinds are added here, at build time, never at
//! runtime.
//!
//! # Ownership
//!
//! ```text
//! plain data   Null Bool Int Real Char Quote   copied on try_clone
//! unique       Text Collection Object Opaque   moved, never cloned
//! shared       Shared                          reference counted
//! ```
//!
//! A uniquely-owned value belongs to exactly one slot or variable. Aliasing it
//! requires an explicit [`Value::into_shared`], after which every
//! [`Value::try_clone`] hands out one more share and the payload is freed when
//! the last share is released.
//!
//! Shared handles use non-atomic counting and are not `Send`; reference cycles
//! through shared handles are not collected.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::Instance;
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Discriminant of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Absent value
    Null,
    /// Boolean
    Bool,
    /// Integer (nat, nat1, int)
    Int,
    /// Real / rational
    Real,
    /// Character
    Char,
    /// Quote literal, identified by its generated id
    Quote,
    /// Token or string payload
    Text,
    /// Seq, set or product
    Collection,
    /// Class instance
    Object,
    /// Payload owned by an external value library
    Opaque,
    /// Reference-counted handle
    Shared,
}

impl ValueKind {
    /// Kind name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Real => "real",
            ValueKind::Char => "char",
            ValueKind::Quote => "quote",
            ValueKind::Text => "text",
            ValueKind::Collection => "collection",
            ValueKind::Object => "object",
            ValueKind::Opaque => "opaque",
            ValueKind::Shared => "shared",
        }
    }

    /// Plain data kinds are copied rather than owned
    pub const fn is_plain(self) -> bool {
        matches!(
            self,
            ValueKind::Null
                | ValueKind::Bool
                | ValueKind::Int
                | ValueKind::Real
                | ValueKind::Char
                | ValueKind::Quote
        )
    }
}

/// Uniform runtime value
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Real
    Real(f64),
    /// Character
    Char(char),
    /// Quote literal id
    Quote(u32),
    /// Uniquely-owned text
    Text(Box<str>),
    /// Uniquely-owned collection; owns its elements
    Collection(Collection),
    /// Uniquely-owned class instance
    Object(Box<Instance>),
    /// Uniquely-owned external payload
    Opaque(OpaqueBox),
    /// Shared handle
    Shared(Shared),
}

impl Value {
    /// Create a null value
    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    /// Create an integer value
    #[inline]
    pub const fn int(i: i64) -> Self {
        Value::Int(i)
    }

    /// Create a real value
    #[inline]
    pub const fn real(r: f64) -> Self {
        Value::Real(r)
    }

    /// Create a character value
    #[inline]
    pub const fn char(c: char) -> Self {
        Value::Char(c)
    }

    /// Create a quote literal value
    #[inline]
    pub const fn quote(id: u32) -> Self {
        Value::Quote(id)
    }

    /// Create a text value
    pub fn text(s: impl Into<Box<str>>) -> Self {
        Value::Text(s.into())
    }

    /// Create a sequence taking ownership of `elements`
    pub fn seq(elements: Vec<Value>) -> Self {
        Value::Collection(Collection::new(CollectionKind::Seq, elements))
    }

    /// Create a set taking ownership of `elements`
    pub fn set(elements: Vec<Value>) -> Self {
        Value::Collection(Collection::new(CollectionKind::Set, elements))
    }

    /// Create a product (tuple) taking ownership of `elements`
    pub fn product(elements: Vec<Value>) -> Self {
        Value::Collection(Collection::new(CollectionKind::Product, elements))
    }

    /// Create a map; each entry is stored as a `(key, value)` product
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let elements = entries
            .into_iter()
            .map(|(key, value)| Value::product(vec![key, value]))
            .collect();
        Value::Collection(Collection::new(CollectionKind::Map, elements))
    }

    /// Box a class instance
    pub fn object(instance: Instance) -> Self {
        Value::Object(Box::new(instance))
    }

    /// Box an external payload
    pub fn opaque<T: Any>(payload: T) -> Self {
        Value::Opaque(OpaqueBox::new(payload))
    }

    /// Wrap `value` in a fresh shared handle with one share
    pub fn shared(value: Value) -> Self {
        Value::Shared(Shared::new(value))
    }

    /// Kind of this value
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Real(_) => ValueKind::Real,
            Value::Char(_) => ValueKind::Char,
            Value::Quote(_) => ValueKind::Quote,
            Value::Text(_) => ValueKind::Text,
            Value::Collection(_) => ValueKind::Collection,
            Value::Object(_) => ValueKind::Object,
            Value::Opaque(_) => ValueKind::Opaque,
            Value::Shared(_) => ValueKind::Shared,
        }
    }

    /// Get type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Check if this value is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a shared handle
    #[inline]
    pub const fn is_shared(&self) -> bool {
        matches!(self, Value::Shared(_))
    }

    /// Number of outstanding shares, `None` for non-shared values
    pub fn share_count(&self) -> Option<usize> {
        match self {
            Value::Shared(s) => Some(s.share_count()),
            _ => None,
        }
    }

    /// Clone this value without breaking ownership
    ///
    /// Plain data is copied and shared handles gain one share. Uniquely-owned
    /// kinds fail with [`RuntimeError::Ownership`].
    pub fn try_clone(&self) -> RuntimeResult<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Real(r) => Ok(Value::Real(*r)),
            Value::Char(c) => Ok(Value::Char(*c)),
            Value::Quote(q) => Ok(Value::Quote(*q)),
            Value::Shared(s) => Ok(Value::Shared(s.share())),
            other => Err(RuntimeError::Ownership {
                kind: other.type_name(),
            }),
        }
    }

    /// Convert into a shared handle so the value can be aliased
    ///
    /// Plain data and values that are already shared are returned unchanged.
    pub fn into_shared(self) -> Value {
        if self.kind().is_plain() || self.is_shared() {
            self
        } else {
            Value::shared(self)
        }
    }

    /// Release this value
    ///
    /// Consumes the handle. Shared handles drop one share and free the payload
    /// only when it was the last; everything else is freed immediately,
    /// recursing into collection elements and instance fields.
    pub fn release(self) {
        match self {
            Value::Collection(collection) => collection.release(),
            Value::Object(mut instance) => {
                instance.release_fields();
                trace!(class = instance.class().name(), "freed instance shell");
            }
            Value::Opaque(opaque) => {
                trace!(payload = opaque.type_name(), "released opaque payload");
            }
            Value::Shared(shared) => shared.release(),
            _ => {}
        }
    }

    /// Extract boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract real; integers widen
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract character
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    /// Extract quote id
    pub fn as_quote(&self) -> Option<u32> {
        match self {
            Value::Quote(q) => Some(*q),
            _ => None,
        }
    }

    /// Borrow text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow collection
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Mutably borrow collection
    pub fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Borrow instance
    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Mutably borrow instance
    pub fn as_object_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow shared handle
    pub fn as_shared(&self) -> Option<&Shared> {
        match self {
            Value::Shared(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast an opaque payload
    pub fn downcast_opaque<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(o) => o.downcast_ref(),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Shared(a), Value::Shared(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Shared(a), b) => *a.borrow() == *b,
            (a, Value::Shared(b)) => *a == *b.borrow(),
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Quote(a), Value::Quote(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Collection(a), Value::Collection(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Opaque payloads have no equality known to the runtime
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Int(i) => write!(f, "int({})", i),
            Value::Real(r) => write!(f, "real({})", r),
            Value::Char(c) => write!(f, "char({:?})", c),
            Value::Quote(q) => write!(f, "quote({})", q),
            Value::Text(s) => write!(f, "text({:?})", s),
            Value::Collection(c) => write!(f, "{:?}", c),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Opaque(o) => write!(f, "{:?}", o),
            Value::Shared(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Quote(q) => write!(f, "<quote#{}>", q),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::Collection(c) => write!(f, "{}", c),
            Value::Object(o) => write!(f, "{}", o),
            Value::Opaque(o) => write!(f, "<{}>", o.type_name()),
            Value::Shared(s) => write!(f, "{}", *s.borrow()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::object(instance)
    }
}

/// Reference-counted value handle
///
/// Each handle is one share. The wrapped value is released when the last
/// share is released (or dropped).
pub struct Shared(Rc<RefCell<Value>>);

impl Shared {
    /// Wrap a value with a single share
    pub fn new(value: Value) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }

    fn share(&self) -> Shared {
        let shared = Shared(Rc::clone(&self.0));
        trace!(shares = shared.share_count(), "shared value cloned");
        shared
    }

    /// Number of outstanding shares
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Borrow the shared value
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    /// Mutably borrow the shared value
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Whether both handles share the same payload
    pub fn ptr_eq(&self, other: &Shared) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn release(self) {
        match Rc::try_unwrap(self.0) {
            Ok(cell) => {
                trace!("last share released, freeing payload");
                cell.into_inner().release();
            }
            Err(rc) => {
                trace!(shares = Rc::strong_count(&rc) - 1, "share released");
                drop(rc);
            }
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared#{}({:?})", self.share_count(), *self.borrow())
    }
}

/// Collection flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered sequence
    Seq,
    /// Set (uniqueness is the value library's concern)
    Set,
    /// Fixed-arity product (tuple)
    Product,
    /// Map entries, each a two-element product
    Map,
}

/// Owned collection of values
#[derive(PartialEq)]
pub struct Collection {
    kind: CollectionKind,
    elements: Vec<Value>,
}

impl Collection {
    /// Create a collection taking ownership of `elements`
    pub fn new(kind: CollectionKind, elements: Vec<Value>) -> Self {
        Self { kind, elements }
    }

    /// Collection flavour
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Borrow element at `index`
    pub fn get_ref(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    /// Clone element at `index` (see [`Value::try_clone`])
    pub fn get(&self, index: usize) -> RuntimeResult<Value> {
        self.element(index)?.try_clone()
    }

    /// Replace element at `index`, releasing the previous element
    pub fn set(&mut self, index: usize, value: Value) -> RuntimeResult<()> {
        let len = self.elements.len();
        let slot = self
            .elements
            .get_mut(index)
            .ok_or(RuntimeError::IndexOutOfBounds { index, len })?;
        std::mem::replace(slot, value).release();
        Ok(())
    }

    /// Move element at `index` out, leaving null behind
    pub fn take(&mut self, index: usize) -> RuntimeResult<Value> {
        let len = self.elements.len();
        let slot = self
            .elements
            .get_mut(index)
            .ok_or(RuntimeError::IndexOutOfBounds { index, len })?;
        Ok(std::mem::take(slot))
    }

    /// Append an element
    pub fn push(&mut self, value: Value) {
        self.elements.push(value);
    }

    /// Iterate over elements
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elements.iter()
    }

    /// Iterate over `(key, value)` pairs, skipping elements that are not pairs
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.elements.iter().filter_map(as_pair)
    }

    fn element(&self, index: usize) -> RuntimeResult<&Value> {
        self.elements.get(index).ok_or(RuntimeError::IndexOutOfBounds {
            index,
            len: self.elements.len(),
        })
    }

    fn release(self) {
        for element in self.elements {
            element.release();
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            CollectionKind::Seq => "seq",
            CollectionKind::Set => "set",
            CollectionKind::Product => "product",
            CollectionKind::Map => "map",
        };
        write!(f, "{}", name)?;
        f.debug_list().entries(&self.elements).finish()
    }
}

fn as_pair(element: &Value) -> Option<(&Value, &Value)> {
    match element.as_collection()? {
        Collection {
            kind: CollectionKind::Product,
            elements,
        } if elements.len() == 2 => Some((&elements[0], &elements[1])),
        _ => None,
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.kind {
            CollectionKind::Seq => ("[", "]"),
            CollectionKind::Set | CollectionKind::Map => ("{", "}"),
            CollectionKind::Product => ("mk_(", ")"),
        };
        if self.kind == CollectionKind::Map && self.elements.is_empty() {
            return write!(f, "{{|->}}");
        }
        write!(f, "{}", open)?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match (self.kind, as_pair(element)) {
                (CollectionKind::Map, Some((key, value))) => write!(f, "{} |-> {}", key, value)?,
                _ => write!(f, "{}", element)?,
            }
        }
        write!(f, "{}", close)
    }
}

/// Payload owned by an external value library
pub struct OpaqueBox {
    type_name: &'static str,
    payload: Box<dyn Any>,
}

impl OpaqueBox {
    /// Box a payload
    pub fn new<T: Any>(payload: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            payload: Box::new(payload),
        }
    }

    /// Rust type name of the payload
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Downcast to the concrete payload
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Mutably downcast to the concrete payload
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut()
    }
}

impl fmt::Debug for OpaqueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opaque({})", self.type_name)
    }
}
