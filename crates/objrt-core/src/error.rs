//! Runtime error types
//!
//! Every variant is a contract violation between generated code and the
//! runtime. None of them are transient; callers propagate them with `?`.

use crate::object::ClassId;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Object runtime errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Constructor called with the wrong number of arguments
    #[error("Arity mismatch constructing {class}: expected {expected} arguments, got {got}")]
    Arity {
        /// Class being constructed
        class: &'static str,
        /// Declared field count
        expected: usize,
        /// Number of arguments supplied
        got: usize,
    },

    /// Attempted to clone a uniquely-owned value
    #[error("Cannot clone uniquely-owned {kind} value; move it or convert it into a shared value")]
    Ownership {
        /// Kind name of the offending value
        kind: &'static str,
    },

    /// Release of storage that was already released
    #[error("Double release of {what}")]
    DoubleRelease {
        /// What was released twice
        what: String,
    },

    /// Two classes registered with the same identity
    #[error("Duplicate class id {id:?}: {existing} is already registered, cannot register {name}")]
    DuplicateClass {
        /// Colliding class id
        id: ClassId,
        /// Name of the class already holding the id
        existing: &'static str,
        /// Name of the class being registered
        name: &'static str,
    },

    /// Capability not provided by this class or configuration
    #[error("Unsupported operation on {class}: {operation}")]
    UnsupportedOperation {
        /// Class the operation was attempted on
        class: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Lifecycle hook or phase invoked out of sequence
    #[error("Lifecycle order violation: cannot {action} while {state}")]
    LifecycleOrder {
        /// Attempted transition
        action: &'static str,
        /// Current state
        state: String,
    },

    /// Field lookup by unknown (or already cleared) name
    #[error("Field '{field}' not found on {class}")]
    FieldNotFound {
        /// Class name
        class: &'static str,
        /// Requested field
        field: String,
    },

    /// No method in the vtable slot or under the given name
    #[error("Method {selector} not found on {class}")]
    MethodNotFound {
        /// Class name
        class: &'static str,
        /// Slot index or method name
        selector: String,
    },

    /// Class id not registered
    #[error("Class {0:?} not registered")]
    ClassNotFound(ClassId),

    /// Element or field index out of range
    #[error("Index {index} out of bounds (length {len})")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Container length
        len: usize,
    },

    /// A lifecycle hook reported failure
    #[error("Lifecycle hook {hook} of {class} failed: {message}")]
    Hook {
        /// Class owning the hook
        class: &'static str,
        /// Hook name
        hook: &'static str,
        /// Failure reported by the hook
        message: String,
    },

    /// A lifecycle hook propagated a runtime error of another kind
    #[error("Lifecycle hook {hook} of {class} failed")]
    InHook {
        /// Class owning the hook
        class: &'static str,
        /// Hook name
        hook: &'static str,
        /// Error returned by the hook
        #[source]
        source: Box<RuntimeError>,
    },

    /// Options could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Shorthand for a hook to report its own failure
    ///
    /// The class and hook names are filled in by the lifecycle manager.
    pub fn hook_failed(message: impl Into<String>) -> Self {
        RuntimeError::Hook {
            class: "<unknown>",
            hook: "<unknown>",
            message: message.into(),
        }
    }
}
