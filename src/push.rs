use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::diff::deep_merge;
use crate::types::System;
use crate::Result;

/// A parsed notification for one system.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub serial: String,
    /// Partial system document in the same shape as [`System`]'s serde form.
    pub payload: Value,
}

#[derive(Debug)]
pub enum PushEvent {
    Message(PushMessage),
    /// The transport hit an error and may have missed messages. It keeps running.
    Failed(String),
}

/// The push transport as seen by the coordinator.
///
/// The transport runs its own read loop and forwards everything it parses
/// into the sink handed to [`attach`](Self::attach).
pub trait PushBridge: Send + Sync + 'static {
    fn attach(&self, sink: mpsc::Sender<PushEvent>);

    fn detach(&self);

    /// Apply a message to the live system. Called under the system's write lock.
    fn merge(&self, message: &PushMessage, system: &mut System) -> Result<()> {
        merge_payload(system, &message.payload)
    }
}

/// Deep-merge a partial document into `system`. Arrays (zones, activities)
/// are replaced as a whole. On error `system` is left as it was.
///
/// `profile` is identity and only changes on a full resync; a payload's
/// `profile` section is ignored.
pub fn merge_payload(system: &mut System, payload: &Value) -> Result<()> {
    if payload.get("profile").is_some() {
        debug!("ignoring profile section of push payload");
    }
    let mut doc = serde_json::to_value(&*system)?;
    deep_merge(&mut doc, payload);
    let mut merged: System = serde_json::from_value(doc)?;
    merged.profile = std::mem::take(&mut system.profile);
    *system = merged;
    Ok(())
}
