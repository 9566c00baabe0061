//! Object runtime for generated class stubs
//!
//! This crate provides the substrate every translator-generated class plugs into:
//! - Boxed values with unique-by-default ownership and explicit sharing
//! - Class descriptors, vtables and per-instance field tables
//! - All-or-nothing construction and total, recursive teardown
//! - Ordered const/static lifecycle across all registered classes
//!
//! The runtime is single-threaded; none of its handle types are `Send`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod construct;
pub mod error;
pub mod lifecycle;
pub mod object;
pub mod registry;
pub mod runtime;
pub mod value;

pub use config::{DefaultConstructors, RuntimeOptions};
pub use construct::{
    construct, construct_boxed, construct_default, construct_default_with, construct_with,
};
pub use error::{RuntimeError, RuntimeResult};
pub use lifecycle::{ClassHooks, ClassState, EntryState, LifecycleManager, Phase};
pub use object::{ClassDescriptor, ClassId, FieldTable, Instance, Method, VTable};
pub use registry::ClassRegistry;
pub use runtime::Runtime;
pub use value::{Collection, CollectionKind, OpaqueBox, Shared, Value, ValueKind};
