//! Class lifecycle manager
//!
//! Global, ordered setup and teardown of class-level constants and static
//! state. Phases advance strictly:
//!
//! ```text
//! Registering -> ConstInitialized -> StaticInitialized -> StaticShutdown -> ConstShutdown
//! ```
//!
//! Init phases run hooks in registration order; shutdown phases run them in
//! reverse, so a class's static state never outlives a constant it depends on.
//! A failing hook moves the manager to [`Phase::Failed`].
//!
//! The manager owns the [`ClassRegistry`]: a class has a lifecycle entry
//! exactly when it has a registry slot.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ClassDescriptor, ClassId};
use crate::registry::ClassRegistry;
use crate::value::Value;
use std::fmt;
use tracing::{debug, warn};

/// Lifecycle hook
pub type Hook = Box<dyn FnMut(&mut ClassState) -> RuntimeResult<()>>;

/// The four lifecycle hooks of a class
///
/// Missing hooks are no-ops.
#[derive(Default)]
pub struct ClassHooks {
    const_init: Option<Hook>,
    const_shutdown: Option<Hook>,
    static_init: Option<Hook>,
    static_shutdown: Option<Hook>,
}

impl ClassHooks {
    /// Hooks that do nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the const-init hook
    pub fn const_init(
        mut self,
        hook: impl FnMut(&mut ClassState) -> RuntimeResult<()> + 'static,
    ) -> Self {
        self.const_init = Some(Box::new(hook));
        self
    }

    /// Set the const-shutdown hook
    pub fn const_shutdown(
        mut self,
        hook: impl FnMut(&mut ClassState) -> RuntimeResult<()> + 'static,
    ) -> Self {
        self.const_shutdown = Some(Box::new(hook));
        self
    }

    /// Set the static-init hook
    pub fn static_init(
        mut self,
        hook: impl FnMut(&mut ClassState) -> RuntimeResult<()> + 'static,
    ) -> Self {
        self.static_init = Some(Box::new(hook));
        self
    }

    /// Set the static-shutdown hook
    pub fn static_shutdown(
        mut self,
        hook: impl FnMut(&mut ClassState) -> RuntimeResult<()> + 'static,
    ) -> Self {
        self.static_shutdown = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ClassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHooks")
            .field("const_init", &self.const_init.is_some())
            .field("const_shutdown", &self.const_shutdown.is_some())
            .field("static_init", &self.static_init.is_some())
            .field("static_shutdown", &self.static_shutdown.is_some())
            .finish()
    }
}

/// Class-level constants and static variables
#[derive(Debug, Default)]
pub struct ClassState {
    constants: Vec<(String, Value)>,
    statics: Vec<(String, Value)>,
}

impl ClassState {
    /// Define constant `name`, releasing any previous value
    pub fn set_const(&mut self, name: &str, value: Value) {
        put(&mut self.constants, name, value);
    }

    /// Borrow constant `name`
    pub fn constant(&self, name: &str) -> Option<&Value> {
        lookup(&self.constants, name)
    }

    /// Remove constant `name`
    pub fn take_const(&mut self, name: &str) -> Option<Value> {
        remove(&mut self.constants, name)
    }

    /// Define static variable `name`, releasing any previous value
    pub fn set_static(&mut self, name: &str, value: Value) {
        put(&mut self.statics, name, value);
    }

    /// Borrow static variable `name`
    pub fn static_var(&self, name: &str) -> Option<&Value> {
        lookup(&self.statics, name)
    }

    /// Mutably borrow static variable `name`
    pub fn static_var_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.statics
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Remove static variable `name`
    pub fn take_static(&mut self, name: &str) -> Option<Value> {
        remove(&mut self.statics, name)
    }

    /// Number of live constants
    pub fn const_count(&self) -> usize {
        self.constants.len()
    }

    /// Number of live static variables
    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    /// Release every constant, returning how many there were
    pub fn release_constants(&mut self) -> usize {
        release_all(&mut self.constants)
    }

    /// Release every static variable, returning how many there were
    pub fn release_statics(&mut self) -> usize {
        release_all(&mut self.statics)
    }
}

fn put(slots: &mut Vec<(String, Value)>, name: &str, value: Value) {
    match slots.iter_mut().find(|(n, _)| n == name) {
        Some((_, slot)) => std::mem::replace(slot, value).release(),
        None => slots.push((name.to_string(), value)),
    }
}

fn lookup<'a>(slots: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    slots.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn remove(slots: &mut Vec<(String, Value)>, name: &str) -> Option<Value> {
    let index = slots.iter().position(|(n, _)| n == name)?;
    Some(slots.remove(index).1)
}

fn release_all(slots: &mut Vec<(String, Value)>) -> usize {
    let count = slots.len();
    // Reverse definition order, matching the hook order
    while let Some((_, value)) = slots.pop() {
        value.release();
    }
    count
}

/// Manager-wide phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting registrations
    Registering,
    /// All const-inits done
    ConstInitialized,
    /// All static-inits done
    StaticInitialized,
    /// All static-shutdowns done
    StaticShutdown,
    /// All const-shutdowns done
    ConstShutdown,
    /// A hook failed; no further transitions
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Registering => "registering",
            Phase::ConstInitialized => "const-initialized",
            Phase::StaticInitialized => "static-initialized",
            Phase::StaticShutdown => "static-shut-down",
            Phase::ConstShutdown => "const-shut-down",
            Phase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Per-class lifecycle state
///
/// A class that was never registered has no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Registered, no hook run yet
    Registered,
    /// Const-init done
    ConstInitialized,
    /// Static-init done
    StaticInitialized,
    /// Static-shutdown done
    StaticShutdown,
    /// Const-shutdown done
    ConstShutdown,
}

#[derive(Debug, Clone, Copy)]
enum HookKind {
    ConstInit,
    StaticInit,
    StaticShutdown,
    ConstShutdown,
}

impl HookKind {
    fn name(self) -> &'static str {
        match self {
            HookKind::ConstInit => "const_init",
            HookKind::StaticInit => "static_init",
            HookKind::StaticShutdown => "static_shutdown",
            HookKind::ConstShutdown => "const_shutdown",
        }
    }

    /// Entry state required before the hook, and the state after it
    fn transition(self) -> (EntryState, EntryState) {
        match self {
            HookKind::ConstInit => (EntryState::Registered, EntryState::ConstInitialized),
            HookKind::StaticInit => (EntryState::ConstInitialized, EntryState::StaticInitialized),
            HookKind::StaticShutdown => (EntryState::StaticInitialized, EntryState::StaticShutdown),
            HookKind::ConstShutdown => (EntryState::StaticShutdown, EntryState::ConstShutdown),
        }
    }
}

struct LifecycleEntry {
    class: &'static ClassDescriptor,
    hooks: ClassHooks,
    state: EntryState,
    data: ClassState,
}

impl LifecycleEntry {
    fn run(&mut self, kind: HookKind, release_leftover: bool) -> RuntimeResult<()> {
        let (expected, next) = kind.transition();
        if self.state != expected {
            return Err(RuntimeError::LifecycleOrder {
                action: kind.name(),
                state: format!("{} is {:?}", self.class.name(), self.state),
            });
        }

        let hook = match kind {
            HookKind::ConstInit => self.hooks.const_init.as_mut(),
            HookKind::StaticInit => self.hooks.static_init.as_mut(),
            HookKind::StaticShutdown => self.hooks.static_shutdown.as_mut(),
            HookKind::ConstShutdown => self.hooks.const_shutdown.as_mut(),
        };
        if let Some(hook) = hook {
            let class = self.class.name();
            hook(&mut self.data).map_err(|err| match err {
                RuntimeError::Hook { message, .. } => RuntimeError::Hook {
                    class,
                    hook: kind.name(),
                    message,
                },
                other => RuntimeError::InHook {
                    class,
                    hook: kind.name(),
                    source: Box::new(other),
                },
            })?;
        }

        match kind {
            HookKind::StaticShutdown => self.settle_statics(release_leftover),
            HookKind::ConstShutdown => self.settle_constants(release_leftover),
            _ => {}
        }

        self.state = next;
        Ok(())
    }

    fn settle_statics(&mut self, release: bool) {
        let left = self.data.static_count();
        if left == 0 {
            return;
        }
        if release {
            self.data.release_statics();
            warn!(class = self.class.name(), released = left, "released leftover static state");
        } else {
            warn!(class = self.class.name(), left, "static state left after static-shutdown");
        }
    }

    fn settle_constants(&mut self, release: bool) {
        let left = self.data.const_count();
        if left == 0 {
            return;
        }
        if release {
            self.data.release_constants();
            warn!(class = self.class.name(), released = left, "released leftover constants");
        } else {
            warn!(class = self.class.name(), left, "constants left after const-shutdown");
        }
    }
}

impl fmt::Debug for LifecycleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEntry")
            .field("class", &self.class.name())
            .field("state", &self.state)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Ordered registry of class lifecycle hooks
#[derive(Debug)]
pub struct LifecycleManager {
    /// Class descriptors, same order as `entries`
    registry: ClassRegistry,
    entries: Vec<LifecycleEntry>,
    phase: Phase,
    release_leftover: bool,
}

impl LifecycleManager {
    /// Create an empty manager accepting registrations
    pub fn new() -> Self {
        Self::with_leftover_release(true)
    }

    /// Create a manager that does or does not release leftover class state
    pub fn with_leftover_release(release: bool) -> Self {
        Self {
            registry: ClassRegistry::new(),
            entries: Vec::new(),
            phase: Phase::Registering,
            release_leftover: release,
        }
    }

    /// Whether shutdown releases class state the hooks left behind
    pub fn releases_leftover_state(&self) -> bool {
        self.release_leftover
    }

    /// Registered class descriptors
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no class is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail unless registrations are still accepted
    pub fn ensure_registering(&self) -> RuntimeResult<()> {
        self.expect_phase(Phase::Registering, "register a class")
    }

    /// Register a class and append it to the init order
    ///
    /// Fails with a duplicate-class error if the id is taken, or a lifecycle
    /// order error once startup has begun. Nothing is registered on failure.
    pub fn register(
        &mut self,
        class: &'static ClassDescriptor,
        hooks: ClassHooks,
    ) -> RuntimeResult<()> {
        self.ensure_registering()?;
        self.registry.register(class)?;

        debug!(class = class.name(), order = self.entries.len(), "lifecycle hooks registered");
        self.entries.push(LifecycleEntry {
            class,
            hooks,
            state: EntryState::Registered,
            data: ClassState::default(),
        });
        Ok(())
    }

    /// Run every const-init hook in registration order
    pub fn run_const_init_all(&mut self) -> RuntimeResult<()> {
        self.expect_phase(Phase::Registering, "run const-init")?;
        self.run_phase(HookKind::ConstInit, false, Phase::ConstInitialized)
    }

    /// Run every static-init hook in registration order
    pub fn run_static_init_all(&mut self) -> RuntimeResult<()> {
        self.expect_phase(Phase::ConstInitialized, "run static-init")?;
        self.run_phase(HookKind::StaticInit, false, Phase::StaticInitialized)
    }

    /// Run every static-shutdown hook in reverse registration order
    pub fn run_static_shutdown_all(&mut self) -> RuntimeResult<()> {
        self.expect_phase(Phase::StaticInitialized, "run static-shutdown")?;
        self.run_phase(HookKind::StaticShutdown, true, Phase::StaticShutdown)
    }

    /// Run every const-shutdown hook in reverse registration order
    pub fn run_const_shutdown_all(&mut self) -> RuntimeResult<()> {
        self.expect_phase(Phase::StaticShutdown, "run const-shutdown")?;
        self.run_phase(HookKind::ConstShutdown, true, Phase::ConstShutdown)
    }

    /// Const-init then static-init
    pub fn startup(&mut self) -> RuntimeResult<()> {
        self.run_const_init_all()?;
        self.run_static_init_all()
    }

    /// Static-shutdown then const-shutdown
    pub fn shutdown(&mut self) -> RuntimeResult<()> {
        self.run_static_shutdown_all()?;
        self.run_const_shutdown_all()
    }

    /// Lifecycle state of a class, `None` if never registered
    pub fn state_of(&self, id: ClassId) -> Option<EntryState> {
        self.entry(id).map(|e| e.state)
    }

    /// Constants and statics of a class
    pub fn class_state(&self, id: ClassId) -> Option<&ClassState> {
        self.entry(id).map(|e| &e.data)
    }

    /// Mutable constants and statics of a class
    pub fn class_state_mut(&mut self, id: ClassId) -> Option<&mut ClassState> {
        let index = self.registry.index_of(id)?;
        self.entries.get_mut(index).map(|e| &mut e.data)
    }

    /// Registered classes in init order
    pub fn classes(&self) -> impl Iterator<Item = &'static ClassDescriptor> + '_ {
        self.registry.iter()
    }

    fn entry(&self, id: ClassId) -> Option<&LifecycleEntry> {
        self.entries.get(self.registry.index_of(id)?)
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> RuntimeResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RuntimeError::LifecycleOrder {
                action,
                state: format!("lifecycle is {}", self.phase),
            })
        }
    }

    fn run_phase(&mut self, kind: HookKind, reverse: bool, done: Phase) -> RuntimeResult<()> {
        debug!(hook = kind.name(), classes = self.entries.len(), "lifecycle phase start");

        let release = self.release_leftover;
        let result = if reverse {
            self.entries.iter_mut().rev().try_for_each(|e| e.run(kind, release))
        } else {
            self.entries.iter_mut().try_for_each(|e| e.run(kind, release))
        };

        match result {
            Ok(()) => {
                self.phase = done;
                debug!(phase = %done, "lifecycle phase complete");
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Failed;
                // No later shutdown phase will run, so settle every class now
                if reverse {
                    for entry in self.entries.iter_mut().rev() {
                        entry.settle_statics(release);
                        entry.settle_constants(release);
                    }
                }
                Err(err)
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
