//! Exclusive ownership of the drawing surface's pointer input.
//!
//! At most one [`Binding`] exists at any time. Acquiring revokes the previous
//! holder, and only the token issued for the current binding can release it.

use tmt_core::TrialKind;
use tracing::debug;

/// Which trial instance currently receives pointer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub kind: TrialKind,
    pub generation: u64,
}

/// Held by the trial that owns input. Not `Clone`, so there is only ever one.
#[derive(Debug, PartialEq, Eq)]
pub struct InputToken {
    id: u64,
    binding: Binding,
}

#[derive(Debug, Default)]
pub struct InputOwnership {
    next_id: u64,
    current: Option<(u64, Binding)>,
}

impl InputOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, kind: TrialKind, generation: u64) -> InputToken {
        if let Some((_, previous)) = self.current.take() {
            debug!(?previous, "revoking input binding");
        }
        self.next_id += 1;
        let binding = Binding { kind, generation };
        self.current = Some((self.next_id, binding));
        debug!(?binding, "input bound");
        InputToken {
            id: self.next_id,
            binding,
        }
    }

    /// Returns false (and changes nothing) if `token` was already revoked
    pub fn release(&mut self, token: InputToken) -> bool {
        match self.current {
            Some((id, _)) if id == token.id => {
                self.current = None;
                debug!(binding = ?token.binding, "input released");
                true
            }
            _ => false,
        }
    }

    /// Drops whatever binding exists
    pub fn revoke_all(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<Binding> {
        self.current.map(|(_, b)| b)
    }

    pub fn is_current(&self, token: &InputToken) -> bool {
        matches!(self.current, Some((id, _)) if id == token.id)
    }

    pub fn listener_count(&self) -> usize {
        usize::from(self.current.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_replaces_previous_binding() {
        let mut input = InputOwnership::new();
        let first = input.acquire(TrialKind::PracticeA, 1);
        let second = input.acquire(TrialKind::TestA, 2);
        assert_eq!(input.listener_count(), 1);
        assert!(!input.is_current(&first));
        assert!(input.is_current(&second));
        assert_eq!(
            input.current(),
            Some(Binding {
                kind: TrialKind::TestA,
                generation: 2
            })
        );
    }

    #[test]
    fn revoked_token_cannot_release_new_holder() {
        let mut input = InputOwnership::new();
        let stale = input.acquire(TrialKind::PracticeA, 1);
        let live = input.acquire(TrialKind::PracticeA, 2);
        assert!(!input.release(stale));
        assert_eq!(input.listener_count(), 1);
        assert!(input.release(live));
        assert_eq!(input.listener_count(), 0);
        assert_eq!(input.current(), None);
    }

    #[test]
    fn revoke_all_clears_slot() {
        let mut input = InputOwnership::new();
        let token = input.acquire(TrialKind::TestB, 7);
        input.revoke_all();
        assert!(!input.is_current(&token));
        assert_eq!(input.listener_count(), 0);
    }
}
