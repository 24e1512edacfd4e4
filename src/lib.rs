mod config;
mod coordinator;
mod debounce;
mod diagnostics;
mod diff;
mod error;
mod journal;
mod listeners;
mod push;
mod readings;
mod remote;
mod system;
mod types;

pub use config::{
    SyncConfig, DEFAULT_BACKOFF_INTERVAL, DEFAULT_DEBOUNCE_COOLDOWN, DEFAULT_PUSH_BUFFER,
    DEFAULT_UPDATE_INTERVAL,
};
pub use coordinator::{Coordinator, CoordinatorBuilder, Snapshot, SyncPhase, SyncStatus};
pub use error::{Error, ErrorClass, Result};
pub use journal::JournalMode;
pub use listeners::{ListenerHandle, ListenerRegistry};
pub use push::{merge_payload, PushBridge, PushEvent, PushMessage};
pub use readings::{HvacAction, TargetTemperatures};
pub use remote::{Command, RemoteClient};
pub use system::TrackedSystem;
pub use types::*;
