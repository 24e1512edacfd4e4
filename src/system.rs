use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::types::{Energy, System};

/// Identity-stable home of one controller.
///
/// Created once per serial on the first full resync and shared as
/// `Arc<TrackedSystem>` for the coordinator's lifetime. Widgets can hold on
/// to it; every later refresh writes through [`overwrite`](Self::overwrite),
/// [`set_energy`](Self::set_energy) or [`update`](Self::update) instead of
/// swapping the object. The lock serializes poll and push writers.
#[derive(Debug)]
pub struct TrackedSystem {
    serial: String,
    state: RwLock<System>,
    stale: AtomicBool,
}

impl TrackedSystem {
    pub(crate) fn new(system: System) -> Self {
        Self {
            serial: system.profile.serial.clone(),
            state: RwLock::new(system),
            stale: AtomicBool::new(false),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Borrow the live state. Keep the guard short; writers wait on it.
    pub fn read(&self) -> RwLockReadGuard<'_, System> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> System {
        self.read().clone()
    }

    /// True when the last full resync did not include this serial.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub(crate) fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::Release);
    }

    /// Replace profile, status, config and energy from a full fetch.
    pub(crate) fn overwrite(&self, fresh: System) {
        let System {
            profile,
            status,
            config,
            energy,
        } = fresh;
        self.update(|s| {
            s.profile = profile;
            s.status = status;
            s.config = config;
            s.energy = energy;
        });
    }

    pub(crate) fn set_energy(&self, energy: Energy) {
        self.update(|s| s.energy = energy);
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut System) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
