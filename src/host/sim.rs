//! Simulated host runtime
//!
//! A single-threaded, deterministic stand-in for CPython's `gc` module. It
//! follows the same contracts the binding cache relies on:
//! - imports fail until `initialize` has run
//! - handles belong to the epoch that created them; using one after
//!   `finalize` is a dangling-handle fault
//! - invoking `collect` with an error pending is a fatal fault
//!
//! Failure injection and call accounting make cache behavior observable.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{CallArgs, Host, HostError};

/// CPython's debug flag values
pub const SIM_FLAGS: [(&str, i64); 5] = [
    ("DEBUG_STATS", 1),
    ("DEBUG_COLLECTABLE", 2),
    ("DEBUG_UNCOLLECTABLE", 4),
    ("DEBUG_SAVEALL", 32),
    ("DEBUG_LEAK", 38),
];

const CALLABLES: [&str; 4] = ["enable", "disable", "isenabled", "collect"];

/// Object kinds living in the simulated runtime
#[derive(Debug, Clone, PartialEq)]
pub enum SimObject {
    Module(String),
    Function(String),
    Int(i64),
    Bool(bool),
    None,
    List(String),
}

/// Reference to a simulated object, tagged with the epoch that produced it
#[derive(Debug, Clone)]
pub struct SimHandle {
    object: Rc<SimObject>,
    epoch: u64,
}

impl SimHandle {
    pub fn object(&self) -> &SimObject {
        &self.object
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Host-side reference count of the underlying object
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.object)
    }

    /// Identity comparison, like `is` in the host language
    pub fn same_object(&self, other: &SimHandle) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCall {
    pub function: String,
    pub args: CallArgs,
}

/// Per-epoch runtime state. Dropped wholesale on finalize.
struct Runtime {
    epoch: u64,
    module: Rc<SimObject>,
    members: Vec<(String, Rc<SimObject>)>,
    enabled: bool,
    garbage: [usize; 3],
}

impl Runtime {
    fn boot(epoch: u64, module_name: &str) -> Self {
        let mut members: Vec<(String, Rc<SimObject>)> = CALLABLES
            .iter()
            .map(|name| (name.to_string(), Rc::new(SimObject::Function(name.to_string()))))
            .collect();

        for (name, value) in SIM_FLAGS {
            members.push((name.to_string(), Rc::new(SimObject::Int(value))));
        }
        members.push(("garbage".into(), Rc::new(SimObject::List("garbage".into()))));
        members.push(("callbacks".into(), Rc::new(SimObject::List("callbacks".into()))));

        Self {
            epoch,
            module: Rc::new(SimObject::Module(module_name.to_string())),
            members,
            enabled: true,
            garbage: [0; 3],
        }
    }

    fn member(&self, name: &str) -> Option<Rc<SimObject>> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, object)| Rc::clone(object))
    }
}

/// In-process simulated runtime exposing a `gc`-like module
pub struct SimHost {
    module_name: String,
    runtime: RefCell<Option<Runtime>>,
    next_epoch: Cell<u64>,
    pending: RefCell<Option<HostError>>,
    hidden: RefCell<Vec<String>>,
    overrides: RefCell<Vec<(String, i64)>>,
    fail_imports: Cell<bool>,
    fail_teardown: Cell<bool>,
    collect_result: Cell<Option<i64>>,
    imports: Cell<usize>,
    lookups: Cell<usize>,
    releases: Cell<usize>,
    calls: RefCell<Vec<SimCall>>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Create an uninitialized runtime whose collector module is `gc`
    pub fn new() -> Self {
        Self::with_module_name("gc")
    }

    pub fn with_module_name(name: impl Into<String>) -> Self {
        Self {
            module_name: name.into(),
            runtime: RefCell::new(None),
            next_epoch: Cell::new(1),
            pending: RefCell::new(None),
            hidden: RefCell::new(Vec::new()),
            overrides: RefCell::new(Vec::new()),
            fail_imports: Cell::new(false),
            fail_teardown: Cell::new(false),
            collect_result: Cell::new(None),
            imports: Cell::new(0),
            lookups: Cell::new(0),
            releases: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Create a runtime that is already initialized
    pub fn initialized() -> Self {
        let host = Self::new();
        host.initialize();
        host
    }

    /// Start a fresh runtime epoch. No-op if already running.
    pub fn initialize(&self) {
        let mut runtime = self.runtime.borrow_mut();
        if runtime.is_some() {
            return;
        }
        let epoch = self.next_epoch.get();
        self.next_epoch.set(epoch + 1);
        let mut booted = Runtime::boot(epoch, &self.module_name);
        for (name, value) in self.overrides.borrow().iter() {
            if let Some(slot) = booted.members.iter_mut().find(|(member, _)| member == name) {
                slot.1 = Rc::new(SimObject::Int(*value));
            }
        }
        *runtime = Some(booted);
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.borrow().is_some()
    }

    /// Epoch of the running runtime, if any
    pub fn epoch(&self) -> Option<u64> {
        self.runtime.borrow().as_ref().map(|rt| rt.epoch)
    }

    /// Make every import fail with `ImportError`
    pub fn set_fail_imports(&self, fail: bool) {
        self.fail_imports.set(fail);
    }

    /// Make the next teardowns report a negative status
    pub fn set_fail_teardown(&self, fail: bool) {
        self.fail_teardown.set(fail);
    }

    /// Remove a member from the module, as an older runtime might lack it
    pub fn hide_member(&self, name: &str) {
        self.hidden.borrow_mut().push(name.to_string());
    }

    /// Replace an integer member for all future epochs
    pub fn override_int(&self, name: &str, value: i64) {
        self.overrides.borrow_mut().push((name.to_string(), value));
        if let Some(rt) = self.runtime.borrow_mut().as_mut() {
            if let Some(slot) = rt.members.iter_mut().find(|(member, _)| member == name) {
                slot.1 = Rc::new(SimObject::Int(value));
            }
        }
    }

    /// Make `collect` report `value` instead of the real count
    pub fn set_collect_result(&self, value: Option<i64>) {
        self.collect_result.set(value);
    }

    /// Seed unreachable objects into a generation for the next collection
    pub fn seed_garbage(&self, generation: usize, count: usize) {
        if let Some(rt) = self.runtime.borrow_mut().as_mut() {
            rt.garbage[generation.min(2)] += count;
        }
    }

    /// Set an error on the ambient channel
    pub fn raise(&self, kind: &str, message: &str) {
        *self.pending.borrow_mut() = Some(HostError::new(kind, message));
    }

    pub fn collector_enabled(&self) -> Option<bool> {
        self.runtime.borrow().as_ref().map(|rt| rt.enabled)
    }

    pub fn import_count(&self) -> usize {
        self.imports.get()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    /// Temporary handles handed back through `Host::release`
    pub fn release_count(&self) -> usize {
        self.releases.get()
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.borrow().clone()
    }

    fn handle(&self, object: Rc<SimObject>, epoch: u64) -> SimHandle {
        SimHandle { object, epoch }
    }

    fn check_live(&self, handle: &SimHandle) -> u64 {
        match self.epoch() {
            Some(epoch) if epoch == handle.epoch => epoch,
            _ => panic!(
                "fatal: use of dangling handle {:?} from runtime epoch {}",
                handle.object, handle.epoch
            ),
        }
    }

    fn invoke(&self, name: &str, args: CallArgs) -> Option<SimObject> {
        let mut runtime = self.runtime.borrow_mut();
        let rt = runtime.as_mut()?;

        match (name, args) {
            ("enable", CallArgs::Empty) => {
                rt.enabled = true;
                Some(SimObject::None)
            }
            ("disable", CallArgs::Empty) => {
                rt.enabled = false;
                Some(SimObject::None)
            }
            ("isenabled", CallArgs::Empty) => Some(SimObject::Bool(rt.enabled)),
            ("collect", args) => {
                if self.pending.borrow().is_some() {
                    panic!("Fatal Python error: collect called with an exception set");
                }
                let upto = match args {
                    CallArgs::Empty => 2,
                    CallArgs::Int(gen) if (0..=2).contains(&gen) => gen as usize,
                    CallArgs::Int(_) => {
                        self.raise("ValueError", "invalid generation");
                        return None;
                    }
                };
                let found: usize = rt.garbage[..=upto].iter().sum();
                for slot in rt.garbage[..=upto].iter_mut() {
                    *slot = 0;
                }
                Some(SimObject::Int(self.collect_result.get().unwrap_or(found as i64)))
            }
            (_, _) => {
                self.raise("TypeError", &format!("{}() got an unexpected argument", name));
                None
            }
        }
    }
}

impl Host for SimHost {
    type Handle = SimHandle;

    fn import_module(&self, name: &str) -> Option<SimHandle> {
        self.imports.set(self.imports.get() + 1);

        let found = {
            let runtime = self.runtime.borrow();
            match runtime.as_ref() {
                Some(rt) if !self.fail_imports.get() && name == self.module_name => {
                    Some((Rc::clone(&rt.module), rt.epoch))
                }
                _ => None,
            }
        };

        match found {
            Some((module, epoch)) => Some(self.handle(module, epoch)),
            None => {
                self.raise("ImportError", &format!("No module named '{}'", name));
                None
            }
        }
    }

    fn get_attr(&self, target: &SimHandle, name: &str) -> Option<SimHandle> {
        let epoch = self.check_live(target);
        self.lookups.set(self.lookups.get() + 1);

        let found = if self.hidden.borrow().iter().any(|hidden| hidden == name) {
            None
        } else {
            match target.object() {
                SimObject::Module(_) => self.runtime.borrow().as_ref().and_then(|rt| rt.member(name)),
                _ => None,
            }
        };

        match found {
            Some(object) => Some(self.handle(object, epoch)),
            None => {
                self.raise(
                    "AttributeError",
                    &format!("module '{}' has no attribute '{}'", self.module_name, name),
                );
                None
            }
        }
    }

    fn call(&self, callable: &SimHandle, args: CallArgs) -> Option<SimHandle> {
        let epoch = self.check_live(callable);

        let name = match callable.object() {
            SimObject::Function(name) => name.clone(),
            other => {
                self.raise("TypeError", &format!("{:?} is not callable", other));
                return None;
            }
        };

        self.calls.borrow_mut().push(SimCall {
            function: name.clone(),
            args,
        });

        self.invoke(&name, args)
            .map(|result| self.handle(Rc::new(result), epoch))
    }

    fn to_isize(&self, value: &SimHandle) -> Option<isize> {
        match value.object() {
            SimObject::Int(n) => Some(*n as isize),
            SimObject::Bool(b) => Some(*b as isize),
            _ => {
                self.raise("TypeError", "an integer is required");
                None
            }
        }
    }

    fn to_bool(&self, value: &SimHandle) -> Option<bool> {
        match value.object() {
            SimObject::Bool(b) => Some(*b),
            SimObject::Int(n) => Some(*n != 0),
            SimObject::None => Some(false),
            _ => {
                self.raise("TypeError", "value has no truth value");
                None
            }
        }
    }

    fn to_flag_mask(&self, value: &SimHandle) -> Option<u64> {
        match value.object() {
            SimObject::Int(n) => Some(*n as u64),
            SimObject::Bool(b) => Some(*b as u64),
            _ => {
                self.raise("TypeError", "an integer is required");
                None
            }
        }
    }

    fn error_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    fn last_error(&self) -> Option<HostError> {
        self.pending.borrow().clone()
    }

    fn clear_error(&self) {
        self.pending.borrow_mut().take();
    }

    fn set_error(&self, kind: &str, message: &str) {
        self.raise(kind, message);
    }

    fn finalize(&self) -> i32 {
        let was_running = self.runtime.borrow_mut().take().is_some();
        self.pending.borrow_mut().take();
        if self.fail_teardown.get() || !was_running {
            -1
        } else {
            0
        }
    }

    fn release(&self, handle: SimHandle) {
        self.check_live(&handle);
        self.releases.set(self.releases.get() + 1);
    }
}
