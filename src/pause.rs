//! Scope-bound collector pause
//!
//! Numerical code that allocates heavily inside a tight loop can switch the
//! collector off for the loop and restore it afterwards:
//!
//! ```
//! use pygch::{BindingCache, GcPause, SimHost};
//!
//! let mut cache = BindingCache::new(SimHost::initialized());
//! {
//!     let mut pause = GcPause::new(&mut cache).unwrap();
//!     assert!(!pause.isenabled().unwrap());
//! }
//! assert!(cache.isenabled().unwrap());
//! ```

use std::ops::{Deref, DerefMut};

use crate::cache::BindingCache;
use crate::errors::GchResult;
use crate::host::Host;
use crate::logging::{debug, warn};

/// RAII guard that disables collection and restores the previous state on drop
///
/// Collection is only re-enabled if it was enabled when the guard was
/// created, so nested pauses compose.
pub struct GcPause<'a, H: Host> {
    cache: &'a mut BindingCache<H>,
    was_enabled: bool,
    restored: bool,
}

impl<'a, H: Host> GcPause<'a, H> {
    pub fn new(cache: &'a mut BindingCache<H>) -> GchResult<Self> {
        let was_enabled = cache.isenabled()?;
        if was_enabled {
            cache.disable()?;
        }
        debug!(was_enabled, "collector paused");

        Ok(Self {
            cache,
            was_enabled,
            restored: false,
        })
    }

    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }

    /// Restore the previous collector state and report any failure
    pub fn finish(mut self) -> GchResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> GchResult<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        if self.was_enabled {
            self.cache.enable()?;
        }
        debug!(was_enabled = self.was_enabled, "collector pause released");
        Ok(())
    }
}

impl<H: Host> Deref for GcPause<'_, H> {
    type Target = BindingCache<H>;

    fn deref(&self) -> &Self::Target {
        self.cache
    }
}

impl<H: Host> DerefMut for GcPause<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cache
    }
}

impl<H: Host> Drop for GcPause<'_, H> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(error = %err, "failed to re-enable collector after pause");
        }
    }
}
