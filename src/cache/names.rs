//! Statically known names looked up on the collector module

use std::fmt;
use std::str::FromStr;

/// Members whose handles are cached for the lifetime of a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Member {
    Enable,
    Disable,
    IsEnabled,
    Collect,
    Garbage,
    Callbacks,
}

impl Member {
    pub const ALL: [Member; 6] = [
        Member::Enable,
        Member::Disable,
        Member::IsEnabled,
        Member::Collect,
        Member::Garbage,
        Member::Callbacks,
    ];

    /// Attribute name on the host module
    pub fn attr_name(self) -> &'static str {
        match self {
            Member::Enable => "enable",
            Member::Disable => "disable",
            Member::IsEnabled => "isenabled",
            Member::Collect => "collect",
            Member::Garbage => "garbage",
            Member::Callbacks => "callbacks",
        }
    }

    pub fn is_callable(self) -> bool {
        !matches!(self, Member::Garbage | Member::Callbacks)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attr_name())
    }
}

/// Debug flags exported by the collector module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GcFlag {
    DebugStats,
    DebugCollectable,
    DebugUncollectable,
    DebugSaveall,
    DebugLeak,
}

impl GcFlag {
    pub const ALL: [GcFlag; 5] = [
        GcFlag::DebugStats,
        GcFlag::DebugCollectable,
        GcFlag::DebugUncollectable,
        GcFlag::DebugSaveall,
        GcFlag::DebugLeak,
    ];

    pub fn attr_name(self) -> &'static str {
        match self {
            GcFlag::DebugStats => "DEBUG_STATS",
            GcFlag::DebugCollectable => "DEBUG_COLLECTABLE",
            GcFlag::DebugUncollectable => "DEBUG_UNCOLLECTABLE",
            GcFlag::DebugSaveall => "DEBUG_SAVEALL",
            GcFlag::DebugLeak => "DEBUG_LEAK",
        }
    }
}

impl fmt::Display for GcFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attr_name())
    }
}

impl FromStr for GcFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GcFlag::ALL
            .iter()
            .copied()
            .find(|flag| flag.attr_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown gc flag: {}", s))
    }
}
