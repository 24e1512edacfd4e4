use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::diff::{redact, REDACTED};
use crate::push::PushBridge;
use crate::remote::RemoteClient;

impl<C: RemoteClient, B: PushBridge> Coordinator<C, B> {
    /// Support dump of sync state and every system, with identifiers scrubbed.
    pub fn diagnostics(&self) -> Value {
        let status = self.status();
        let systems: Vec<Value> = self
            .systems()
            .iter()
            .map(|tracked| {
                let data = serde_json::to_value(tracked.snapshot())
                    .map(|v| redact(&v))
                    .unwrap_or_default();
                json!({ "stale": tracked.is_stale(), "data": data })
            })
            .collect();

        json!({
            "account": REDACTED,
            "sync": {
                "phase": status.phase.as_str(),
                "next_cycle_full": status.next_cycle_full,
                "next_interval_secs": status.next_interval.as_secs(),
                "push_attached": status.push_attached,
                "last_update_success": status.last_update_success,
                "full_resync_at": status.full_resync_at.map(|t| t.to_rfc3339()),
                "push_message_at": status.push_message_at.map(|t| t.to_rfc3339()),
                "energy_refresh_at": status.energy_refresh_at.map(|t| t.to_rfc3339()),
            },
            "systems": systems,
        })
    }
}
