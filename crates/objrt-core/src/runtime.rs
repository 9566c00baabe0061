//! Runtime context
//!
//! The single object a generated program holds: options and the lifecycle
//! manager, which also owns the class registry.

use crate::config::RuntimeOptions;
use crate::construct::{construct, construct_default_with, construct_with};
use crate::error::RuntimeResult;
use crate::lifecycle::{ClassHooks, ClassState, LifecycleManager, Phase};
use crate::object::{ClassDescriptor, ClassId, Instance};
use crate::registry::ClassRegistry;
use crate::value::Value;

/// Object runtime context
#[derive(Debug)]
pub struct Runtime {
    options: RuntimeOptions,
    lifecycle: LifecycleManager,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_options(RuntimeOptions::default())
    }
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime with explicit options
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            lifecycle: LifecycleManager::with_leftover_release(options.release_leftover_state),
            options,
        }
    }

    /// Active options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Registered classes
    pub fn classes(&self) -> &ClassRegistry {
        self.lifecycle.registry()
    }

    /// Lifecycle manager
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Mutable lifecycle manager (for running phases individually)
    pub fn lifecycle_mut(&mut self) -> &mut LifecycleManager {
        &mut self.lifecycle
    }

    /// Register a class and its lifecycle hooks
    ///
    /// Fails with a duplicate-class error if the id is taken, or a lifecycle
    /// order error once startup has begun. Nothing is registered on failure.
    pub fn register_class(
        &mut self,
        class: &'static ClassDescriptor,
        hooks: ClassHooks,
    ) -> RuntimeResult<()> {
        self.lifecycle.register(class, hooks)
    }

    /// Run every const-init then every static-init
    pub fn startup(&mut self) -> RuntimeResult<()> {
        self.lifecycle.startup()
    }

    /// Run every static-shutdown then every const-shutdown
    pub fn shutdown(&mut self) -> RuntimeResult<()> {
        self.lifecycle.shutdown()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Constants and statics of a registered class
    pub fn class_state(&self, id: ClassId) -> Option<&ClassState> {
        self.lifecycle.class_state(id)
    }

    /// Clone constant `name` of class `id`
    pub fn constant(&self, id: ClassId, name: &str) -> Option<RuntimeResult<Value>> {
        self.class_state(id)?.constant(name).map(Value::try_clone)
    }

    /// Construct an instance of a registered class
    pub fn construct(&self, id: ClassId, args: Vec<Value>) -> RuntimeResult<Instance> {
        let class = self.classes().require(id)?;
        construct(class, args)
    }

    /// Construct from fallible argument producers
    pub fn construct_with<I>(&self, id: ClassId, args: I) -> RuntimeResult<Instance>
    where
        I: IntoIterator<Item = RuntimeResult<Value>>,
        I::IntoIter: ExactSizeIterator,
    {
        let class = self.classes().require(id)?;
        construct_with(class, args)
    }

    /// Zero-argument construction under the configured policy
    pub fn construct_default(&self, id: ClassId) -> RuntimeResult<Instance> {
        let class = self.classes().require(id)?;
        construct_default_with(class, self.options.default_constructors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultConstructors;
    use crate::error::RuntimeError;

    static PAIR: ClassDescriptor = ClassDescriptor::new(ClassId(1), "Pair", &["first", "second"]);
    static OTHER: ClassDescriptor = ClassDescriptor::new(ClassId(1), "Other", &[]);

    #[test]
    fn test_register_and_construct() {
        let mut rt = Runtime::new();
        rt.register_class(&PAIR, ClassHooks::new()).unwrap();

        let pair = rt.construct(ClassId(1), vec![Value::int(3), Value::int(4)]).unwrap();
        assert_eq!(pair.field("first").unwrap(), &Value::int(3));

        assert_eq!(
            rt.construct(ClassId(9), vec![]).unwrap_err(),
            RuntimeError::ClassNotFound(ClassId(9))
        );
    }

    #[test]
    fn test_duplicate_registration_is_atomic() {
        let mut rt = Runtime::new();
        rt.register_class(&PAIR, ClassHooks::new()).unwrap();
        assert!(matches!(
            rt.register_class(&OTHER, ClassHooks::new()),
            Err(RuntimeError::DuplicateClass { .. })
        ));
        assert_eq!(rt.classes().len(), 1);
        assert_eq!(rt.lifecycle().len(), 1);
    }

    #[test]
    fn test_register_after_startup_fails() {
        let mut rt = Runtime::new();
        rt.startup().unwrap();
        assert!(matches!(
            rt.register_class(&PAIR, ClassHooks::new()),
            Err(RuntimeError::LifecycleOrder { .. })
        ));
        assert!(rt.classes().is_empty());
    }

    #[test]
    fn test_default_construction_policy() {
        let mut rt = Runtime::new();
        rt.register_class(&PAIR, ClassHooks::new()).unwrap();
        assert!(matches!(
            rt.construct_default(ClassId(1)),
            Err(RuntimeError::UnsupportedOperation { .. })
        ));

        let mut rt = Runtime::with_options(RuntimeOptions {
            default_constructors: DefaultConstructors::NullFilled,
            ..RuntimeOptions::default()
        });
        rt.register_class(&PAIR, ClassHooks::new()).unwrap();
        let pair = rt.construct_default(ClassId(1)).unwrap();
        assert!(pair.field("second").unwrap().is_null());
    }

    #[test]
    fn test_lifecycle_registration_is_constructible() {
        let mut rt = Runtime::new();
        rt.lifecycle_mut().register(&PAIR, ClassHooks::new()).unwrap();

        assert!(rt.classes().contains(ClassId(1)));
        let pair = rt.construct(ClassId(1), vec![Value::int(1), Value::int(2)]).unwrap();
        assert_eq!(pair.field("second").unwrap(), &Value::int(2));

        assert!(matches!(
            rt.register_class(&OTHER, ClassHooks::new()),
            Err(RuntimeError::DuplicateClass { existing: "Pair", .. })
        ));
        assert!(matches!(
            rt.lifecycle_mut().register(&OTHER, ClassHooks::new()),
            Err(RuntimeError::DuplicateClass { .. })
        ));
        assert_eq!(rt.classes().len(), 1);
        assert_eq!(rt.lifecycle().len(), 1);
    }

    #[test]
    fn test_leftover_release_follows_options() {
        let leaky = || {
            ClassHooks::new().static_init(|state| {
                state.set_static("cache", Value::int(7));
                Ok(())
            })
        };

        let mut rt = Runtime::new();
        assert!(rt.lifecycle().releases_leftover_state());
        rt.register_class(&PAIR, leaky()).unwrap();
        rt.startup().unwrap();
        rt.shutdown().unwrap();
        assert_eq!(rt.class_state(ClassId(1)).unwrap().static_count(), 0);

        let mut rt = Runtime::with_options(RuntimeOptions {
            release_leftover_state: false,
            ..RuntimeOptions::default()
        });
        assert!(!rt.lifecycle().releases_leftover_state());
        rt.register_class(&PAIR, leaky()).unwrap();
        rt.startup().unwrap();
        rt.shutdown().unwrap();
        assert_eq!(
            rt.class_state(ClassId(1)).unwrap().static_var("cache"),
            Some(&Value::int(7))
        );
    }

    #[test]
    fn test_constant_lookup() {
        let mut rt = Runtime::new();
        rt.register_class(
            &PAIR,
            ClassHooks::new().const_init(|state| {
                state.set_const("numFields", Value::int(2));
                Ok(())
            }),
        )
        .unwrap();
        rt.startup().unwrap();

        assert_eq!(rt.constant(ClassId(1), "numFields").unwrap().unwrap(), Value::int(2));
        assert!(rt.constant(ClassId(1), "missing").is_none());
        assert_eq!(rt.phase(), Phase::StaticInitialized);
    }
}
