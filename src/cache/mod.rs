//! Binding cache - lazily resolved handles to the host collector module
//!
//! Design: one table per host runtime instance.
//! 1. The module handle is imported on first use
//! 2. Member handles are resolved on first use and reused afterwards
//! 3. Debug flags are decoded once into plain integers
//! 4. `guarded_teardown` tears the host down and invalidates everything
//!
//! Failures are reported as `GchError`; the descriptive error stays on the
//! host's ambient channel (`last_error`).
//!
//! Not safe for concurrent use. The process-wide instance in `global` wraps
//! one in a mutex.

mod names;
mod slot;

#[cfg(test)]
mod tests;

pub use names::{GcFlag, Member};
pub use slot::{Slot, SlotState};

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::{FlagPolicy, GchConfig};
use crate::errors::{GchError, GchResult};
use crate::host::{CallArgs, Host, HostError};
use crate::logging::{
    log_cache_hit, log_discarded_error, log_host_call, log_invalidation, log_resolution,
    log_teardown,
};

/// Generation sentinel meaning "collect every generation"
pub const ALL_GENERATIONS: isize = -1;

/// Lifetime counters for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub module_imports: usize,
    pub member_resolutions: usize,
    pub flag_decodes: usize,
    pub collections: usize,
    pub invalidations: usize,
}

/// Serializable view of the cache contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub module: String,
    pub module_state: SlotState,
    pub members: BTreeMap<String, SlotState>,
    pub flags: BTreeMap<String, u64>,
    pub flag_policy: FlagPolicy,
    pub stats: CacheStats,
}

impl CacheSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Lazily populated table of host collector bindings
pub struct BindingCache<H: Host> {
    host: H,
    module_name: String,
    policy: FlagPolicy,
    module: Slot<H::Handle>,
    entries: HashMap<Member, Slot<H::Handle>>,
    flags: HashMap<GcFlag, u64>,
    stats: CacheStats,
}

impl<H: Host> BindingCache<H> {
    /// Create an empty cache with default configuration
    pub fn new(host: H) -> Self {
        Self::with_config(host, &GchConfig::default())
    }

    pub fn with_config(host: H, config: &GchConfig) -> Self {
        Self {
            host,
            module_name: config.module.clone(),
            policy: config.flag_policy,
            module: Slot::Unresolved,
            entries: Member::ALL.iter().map(|m| (*m, Slot::Unresolved)).collect(),
            flags: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn flag_policy(&self) -> FlagPolicy {
        self.policy
    }

    /// Error currently set on the host's ambient channel
    pub fn last_error(&self) -> Option<HostError> {
        self.host.last_error()
    }

    pub fn module_imported(&self) -> bool {
        self.module.is_resolved()
    }

    /// Resolution state of a member slot
    pub fn state(&self, member: Member) -> SlotState {
        self.entries
            .get(&member)
            .map(Slot::state)
            .unwrap_or(SlotState::Unresolved)
    }

    /// Decoded flag value, if one is cached
    pub fn cached_flag(&self, flag: GcFlag) -> Option<u64> {
        self.flags.get(&flag).copied()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Import the collector module unless already imported
    pub fn ensure_module_imported(&mut self) -> GchResult<&H::Handle> {
        if self.module.is_resolved() {
            log_cache_hit(&self.module_name);
        } else {
            let handle = self.host.import_module(&self.module_name);
            log_resolution(&self.module_name, handle.is_some());
            let handle = handle.ok_or_else(|| GchError::module_unavailable(&self.module_name))?;
            self.stats.module_imports += 1;
            self.module.fill(handle);
        }

        self.module
            .get()
            .ok_or_else(|| GchError::module_unavailable(&self.module_name))
    }

    /// Resolve `name` off the module into a caller-owned slot
    ///
    /// A slot that is already resolved is left untouched and counts as success.
    /// The module is always imported first.
    pub fn resolve_into(&mut self, name: &str, slot: &mut Slot<H::Handle>) -> GchResult<()> {
        self.ensure_module_imported()?;
        if slot.is_resolved() {
            log_cache_hit(name);
            return Ok(());
        }

        let handle = self.lookup(name)?;
        slot.fill(handle);
        Ok(())
    }

    /// Resolve a member handle, reusing the cached one when present
    pub fn ensure_member_imported(&mut self, member: Member) -> GchResult<&H::Handle> {
        self.ensure_module_imported()?;

        let resolved = self.entries.get(&member).map_or(false, Slot::is_resolved);
        if resolved {
            log_cache_hit(member.attr_name());
        } else {
            let handle = self.lookup(member.attr_name())?;
            self.stats.member_resolutions += 1;
            self.entries.entry(member).or_default().fill(handle);
        }

        self.entries
            .get(&member)
            .and_then(Slot::get)
            .ok_or_else(|| GchError::member_unavailable(member.attr_name()))
    }

    /// Call a member with no arguments and return its result
    ///
    /// The result is owned by the caller. `garbage` and `callbacks` are not
    /// callable and fail with a `TypeError` on the host channel.
    pub fn call_no_arg(&mut self, member: Member) -> GchResult<H::Handle> {
        self.invoke(member, CallArgs::Empty)
    }

    /// Turn automatic collection on
    pub fn enable(&mut self) -> GchResult<()> {
        let result = self.call_no_arg(Member::Enable)?;
        self.host.release(result);
        Ok(())
    }

    /// Turn automatic collection off
    pub fn disable(&mut self) -> GchResult<()> {
        let result = self.call_no_arg(Member::Disable)?;
        self.host.release(result);
        Ok(())
    }

    pub fn isenabled(&mut self) -> GchResult<bool> {
        let value = self.call_no_arg(Member::IsEnabled)?;
        let enabled = self.host.to_bool(&value);
        self.host.release(value);
        enabled.ok_or_else(|| GchError::conversion(Member::IsEnabled.attr_name()))
    }

    /// Run a collection and return the host's undecoded result
    ///
    /// `generation == ALL_GENERATIONS` calls `collect()` with no argument.
    /// Any other value is passed through for the host to validate.
    pub fn collect_raw(&mut self, generation: isize) -> GchResult<H::Handle> {
        let args = if generation == ALL_GENERATIONS {
            CallArgs::Empty
        } else {
            CallArgs::Int(generation)
        };
        let result = self.invoke(Member::Collect, args);
        if result.is_ok() {
            self.stats.collections += 1;
        }
        result
    }

    /// Run a collection and return the number of unreachable objects found
    pub fn collect(&mut self, generation: isize) -> GchResult<usize> {
        let value = self.collect_raw(generation)?;
        let found = self.host.to_isize(&value);
        self.host.release(value);

        let found = found.ok_or_else(|| GchError::conversion(Member::Collect.attr_name()))?;
        usize::try_from(found).map_err(|_| {
            self.host.set_error(
                "ValueError",
                &format!("collect() returned a negative count: {}", found),
            );
            GchError::conversion(Member::Collect.attr_name())
        })
    }

    pub fn collect_all(&mut self) -> GchResult<usize> {
        self.collect(ALL_GENERATIONS)
    }

    /// Borrowed handle to the module's list of uncollectable objects
    pub fn garbage(&mut self) -> GchResult<&H::Handle> {
        self.ensure_member_imported(Member::Garbage)
    }

    /// Borrowed handle to the module's list of collection callbacks
    pub fn callbacks(&mut self) -> GchResult<&H::Handle> {
        self.ensure_member_imported(Member::Callbacks)
    }

    /// Read a debug flag, decoding it at most once per cache lifetime
    pub fn get_flag(&mut self, flag: GcFlag) -> GchResult<u64> {
        if let Some(value) = self.flags.get(&flag) {
            log_cache_hit(flag.attr_name());
            return Ok(*value);
        }

        self.ensure_module_imported()?;
        let handle = self.lookup(flag.attr_name())?;
        let decoded = self.host.to_flag_mask(&handle);
        self.host.release(handle);

        let value = decoded.ok_or_else(|| GchError::conversion(flag.attr_name()))?;
        self.stats.flag_decodes += 1;
        self.flags.insert(flag, value);
        Ok(value)
    }

    /// Forget every cached host handle
    ///
    /// Must run right after the host runtime has been torn down. Flag values
    /// are kept or dropped according to the configured `FlagPolicy`.
    pub fn invalidate(&mut self) {
        let mut handles_dropped = 0;

        if let Some(module) = self.module.take() {
            self.host.abandon(module);
            handles_dropped += 1;
        }

        for slot in self.entries.values_mut() {
            if let Some(handle) = slot.take() {
                self.host.abandon(handle);
                handles_dropped += 1;
            }
        }

        let flags_dropped = match self.policy {
            FlagPolicy::ResetOnTeardown => {
                let count = self.flags.len();
                self.flags.clear();
                count
            }
            FlagPolicy::RetainAcrossTeardown => 0,
        };

        self.stats.invalidations += 1;
        log_invalidation(handles_dropped, flags_dropped);
    }

    /// Tear the host runtime down, then invalidate the cache
    ///
    /// The cache is invalidated whatever the teardown status was. A negative
    /// status is reported as `ErrorKind::Teardown`.
    pub fn guarded_teardown(&mut self) -> GchResult<()> {
        let status = self.host.finalize();
        self.invalidate();
        log_teardown(status);

        if status < 0 {
            Err(GchError::teardown(status))
        } else {
            Ok(())
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            module: self.module_name.clone(),
            module_state: self.module.state(),
            members: Member::ALL
                .iter()
                .map(|m| (m.attr_name().to_string(), self.state(*m)))
                .collect(),
            flags: self
                .flags
                .iter()
                .map(|(flag, value)| (flag.attr_name().to_string(), *value))
                .collect(),
            flag_policy: self.policy,
            stats: self.stats,
        }
    }

    /// Read an attribute off the (already imported) module
    fn lookup(&self, name: &str) -> GchResult<H::Handle> {
        let module = self
            .module
            .get()
            .ok_or_else(|| GchError::module_unavailable(&self.module_name))?;

        let handle = self.host.get_attr(module, name);
        log_resolution(name, handle.is_some());
        handle.ok_or_else(|| GchError::member_unavailable(name))
    }

    fn invoke(&mut self, member: Member, args: CallArgs) -> GchResult<H::Handle> {
        if !member.is_callable() {
            self.host
                .set_error("TypeError", &format!("'{}' object is not callable", member));
            return Err(GchError::invocation(member.attr_name()));
        }

        self.ensure_member_imported(member)?;
        let callable = self
            .entries
            .get(&member)
            .and_then(Slot::get)
            .ok_or_else(|| GchError::member_unavailable(member.attr_name()))?;

        // Host collection faults fatally if an error is already pending
        if member == Member::Collect {
            if self.host.error_pending() {
                log_discarded_error(self.host.last_error());
            }
            self.host.clear_error();
        }

        let result = self.host.call(callable, args);
        log_host_call(member.attr_name(), &format!("{:?}", args), result.is_some());
        result.ok_or_else(|| GchError::invocation(member.attr_name()))
    }
}
