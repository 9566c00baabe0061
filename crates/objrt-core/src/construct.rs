//! Construction protocol
//!
//! Arguments bind by position into the declared fields. Construction is
//! all-or-nothing: an arity mismatch is reported before anything is bound,
//! and a failing argument producer releases every field bound so far.

use crate::config::DefaultConstructors;
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ClassDescriptor, Instance};
use crate::value::Value;
use tracing::trace;

/// Construct an instance from positional arguments
///
/// Takes ownership of every argument; callers that need to keep a copy clone
/// before calling.
pub fn construct(class: &'static ClassDescriptor, args: Vec<Value>) -> RuntimeResult<Instance> {
    check_arity(class, args.len())?;
    trace!(class = class.name(), "construct");
    Ok(Instance::from_values(class, args))
}

/// Construct from fallible argument producers
///
/// Typed constructors generated on top of this layer convert and validate
/// each argument; the first failure releases every already-bound field and
/// is returned unchanged.
pub fn construct_with<I>(class: &'static ClassDescriptor, args: I) -> RuntimeResult<Instance>
where
    I: IntoIterator<Item = RuntimeResult<Value>>,
    I::IntoIter: ExactSizeIterator,
{
    let args = args.into_iter();
    check_arity(class, args.len())?;

    let mut bound = Vec::with_capacity(class.field_count());
    for arg in args {
        match arg {
            Ok(value) => bound.push(value),
            Err(err) => {
                trace!(class = class.name(), bound = bound.len(), "construction rolled back");
                release_all(bound);
                return Err(err);
            }
        }
    }

    // ExactSizeIterator is only a promise
    if bound.len() != class.field_count() {
        let got = bound.len();
        release_all(bound);
        return Err(RuntimeError::Arity {
            class: class.name(),
            expected: class.field_count(),
            got,
        });
    }

    trace!(class = class.name(), "construct");
    Ok(Instance::from_values(class, bound))
}

/// Construct and box as an object value
pub fn construct_boxed(class: &'static ClassDescriptor, args: Vec<Value>) -> RuntimeResult<Value> {
    construct(class, args).map(Value::object)
}

/// Zero-argument construction using the class's declared default constructor
pub fn construct_default(class: &'static ClassDescriptor) -> RuntimeResult<Instance> {
    construct_default_with(class, DefaultConstructors::Declared)
}

/// Zero-argument construction under an explicit policy
pub fn construct_default_with(
    class: &'static ClassDescriptor,
    policy: DefaultConstructors,
) -> RuntimeResult<Instance> {
    let values = match (policy, class.default_constructor()) {
        (DefaultConstructors::Disabled, _) => None,
        (_, Some(ctor)) => Some(ctor()),
        (DefaultConstructors::NullFilled, None) => Some(
            std::iter::repeat_with(Value::null)
                .take(class.field_count())
                .collect(),
        ),
        (DefaultConstructors::Declared, None) => None,
    };

    match values {
        Some(values) => {
            if values.len() != class.field_count() {
                let got = values.len();
                release_all(values);
                return Err(RuntimeError::Arity {
                    class: class.name(),
                    expected: class.field_count(),
                    got,
                });
            }
            construct(class, values)
        }
        None => Err(RuntimeError::UnsupportedOperation {
            class: class.name(),
            operation: "default construction",
        }),
    }
}

fn check_arity(class: &ClassDescriptor, got: usize) -> RuntimeResult<()> {
    if got == class.field_count() {
        Ok(())
    } else {
        Err(RuntimeError::Arity {
            class: class.name(),
            expected: class.field_count(),
            got,
        })
    }
}

fn release_all(values: Vec<Value>) {
    for value in values {
        value.release();
    }
}
