//! Binding slot - a handle that is either resolved or not

use serde::Serialize;

/// Resolution state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Unresolved,
    Resolved,
}

/// Cached host handle
///
/// Transitions: `Unresolved -> Resolved` on successful lookup,
/// `Resolved -> Unresolved` on invalidation.
#[derive(Debug, Clone)]
pub enum Slot<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unresolved
    }
}

impl<T> Slot<T> {
    pub fn state(&self) -> SlotState {
        match self {
            Slot::Unresolved => SlotState::Unresolved,
            Slot::Resolved(_) => SlotState::Resolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Slot::Resolved(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Resolved(handle) => Some(handle),
            Slot::Unresolved => None,
        }
    }

    /// Store a handle and return a reference to it
    pub fn fill(&mut self, handle: T) -> &T {
        *self = Slot::Resolved(handle);
        match self {
            Slot::Resolved(handle) => handle,
            Slot::Unresolved => unreachable!("slot was just filled"),
        }
    }

    /// Reset to `Unresolved`, yielding the previous handle
    pub fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Slot::Resolved(handle) => Some(handle),
            Slot::Unresolved => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_transitions() {
        let mut slot: Slot<u32> = Slot::default();
        assert_eq!(slot.state(), SlotState::Unresolved);

        assert_eq!(*slot.fill(7), 7);
        assert_eq!(slot.state(), SlotState::Resolved);
        assert_eq!(slot.get(), Some(&7));

        assert_eq!(slot.take(), Some(7));
        assert_eq!(slot.state(), SlotState::Unresolved);
        assert_eq!(slot.take(), None);
    }
}
