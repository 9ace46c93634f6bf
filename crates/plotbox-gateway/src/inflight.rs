//! Users with a run between admission and recording.

use plotbox_core::UserId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of users that currently hold a run slot.
///
/// The governor only sees recorded runs, so a user may hold at most one slot
/// from admission until the run is recorded.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    users: Arc<Mutex<HashSet<UserId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `user`, or `None` if a run is already in progress.
    pub fn try_acquire(&self, user: &UserId) -> Option<InFlightGuard> {
        if !self.lock().insert(user.clone()) {
            return None;
        }
        Some(InFlightGuard {
            users: self.users.clone(),
            user: user.clone(),
        })
    }

    /// Whether `user` holds a slot.
    pub fn contains(&self, user: &UserId) -> bool {
        self.lock().contains(user)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<UserId>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the user's slot on drop, including when the request is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    users: Arc<Mutex<HashSet<UserId>>>,
    user: UserId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut users = self
            .users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        users.remove(&self.user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_slot_per_user() {
        let in_flight = InFlight::new();
        let alice = UserId::from("alice");

        let guard = in_flight.try_acquire(&alice);
        assert!(guard.is_some());
        assert!(in_flight.try_acquire(&alice).is_none());
        assert!(in_flight.contains(&alice));

        // Other users have their own slot.
        let bob = in_flight.try_acquire(&UserId::from("bob"));
        assert!(bob.is_some());

        drop(guard);
        assert!(!in_flight.contains(&alice));
        assert!(in_flight.try_acquire(&alice).is_some());
    }
}
