//! Class registry for runtime class metadata

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ClassDescriptor, ClassId};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Registered class descriptors
///
/// Enforces class-id uniqueness; keeps registration order.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Classes in registration order
    classes: Vec<&'static ClassDescriptor>,
    /// Class id to position
    by_id: FxHashMap<ClassId, usize>,
    /// Class name to position
    by_name: FxHashMap<&'static str, usize>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, failing if its id is taken
    pub fn register(&mut self, class: &'static ClassDescriptor) -> RuntimeResult<()> {
        self.check_unique(class)?;

        let index = self.classes.len();
        self.classes.push(class);
        self.by_id.insert(class.id(), index);
        self.by_name.entry(class.name()).or_insert(index);

        debug!(class = class.name(), id = class.id().0, "registered class");
        Ok(())
    }

    /// Fail with [`RuntimeError::DuplicateClass`] if `class`'s id is taken
    pub fn check_unique(&self, class: &'static ClassDescriptor) -> RuntimeResult<()> {
        match self.get(class.id()) {
            Some(existing) => Err(RuntimeError::DuplicateClass {
                id: class.id(),
                existing: existing.name(),
                name: class.name(),
            }),
            None => Ok(()),
        }
    }

    /// Get class by id
    pub fn get(&self, id: ClassId) -> Option<&'static ClassDescriptor> {
        self.by_id.get(&id).map(|&index| self.classes[index])
    }

    /// Registration position of a class id
    pub(crate) fn index_of(&self, id: ClassId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Get class by id or fail with [`RuntimeError::ClassNotFound`]
    pub fn require(&self, id: ClassId) -> RuntimeResult<&'static ClassDescriptor> {
        self.get(id).ok_or(RuntimeError::ClassNotFound(id))
    }

    /// Get class by name (first registered wins)
    pub fn get_by_name(&self, name: &str) -> Option<&'static ClassDescriptor> {
        self.by_name.get(name).map(|&index| self.classes[index])
    }

    /// Check if a class id is registered
    pub fn contains(&self, id: ClassId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Get the number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &'static ClassDescriptor> + '_ {
        self.classes.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static POINT: ClassDescriptor = ClassDescriptor::new(ClassId(0), "Point", &["x", "y"]);
    static CIRCLE: ClassDescriptor =
        ClassDescriptor::new(ClassId(1), "Circle", &["c", "r", "fill"]);
    static CLASH: ClassDescriptor = ClassDescriptor::new(ClassId(0), "Clash", &[]);

    #[test]
    fn test_register_class() {
        let mut registry = ClassRegistry::new();
        registry.register(&POINT).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ClassId(0)));
    }

    #[test]
    fn test_get_class() {
        let mut registry = ClassRegistry::new();
        registry.register(&POINT).unwrap();
        registry.register(&CIRCLE).unwrap();

        assert_eq!(registry.get(ClassId(1)).unwrap().name(), "Circle");
        assert_eq!(registry.get_by_name("Point").unwrap().field_count(), 2);
        assert!(registry.get(ClassId(7)).is_none());
        assert_eq!(
            registry.require(ClassId(7)).unwrap_err(),
            RuntimeError::ClassNotFound(ClassId(7))
        );
    }

    #[test]
    fn test_duplicate_class_id() {
        let mut registry = ClassRegistry::new();
        registry.register(&POINT).unwrap();

        let err = registry.register(&CLASH).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::DuplicateClass {
                id: ClassId(0),
                existing: "Point",
                name: "Clash",
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ClassId(0)).unwrap().name(), "Point");
    }

    #[test]
    fn test_iteration_order() {
        let mut registry = ClassRegistry::new();
        registry.register(&CIRCLE).unwrap();
        registry.register(&POINT).unwrap();

        let names: Vec<_> = registry.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Circle", "Point"]);
    }
}
