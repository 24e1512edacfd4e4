use std::future::Future;

use crate::types::{ActivityType, Energy, FanMode, HeatSource, System, SystemMode};
use crate::{Error, Result};

/// The cloud API as seen by the coordinator.
///
/// Implementations own authentication and wire parsing. Unavailability of
/// the service should surface as [`Error::Http`] (status/connect errors) or
/// [`Error::Transport`] so the coordinator can pick the short retry.
pub trait RemoteClient: Send + Sync + 'static {
    /// Complete state of every system on the account.
    fn fetch_full_state(&self) -> impl Future<Output = Result<Vec<System>>> + Send;

    /// Year-to-date energy usage for one system.
    fn fetch_energy(&self, serial: &str) -> impl Future<Output = Result<Energy>> + Send;

    fn send_command(
        &self,
        serial: &str,
        zone_id: Option<&str>,
        command: &Command,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetMode(SystemMode),
    /// Hold an activity, until a local "HH:MM" time or indefinitely.
    Hold {
        activity: ActivityType,
        until: Option<String>,
    },
    ResumeSchedule,
    SetFanMode {
        activity: ActivityType,
        fan: FanMode,
    },
    /// Set points for the manual activity (also holds it).
    SetManualActivity {
        heat_set_point: f64,
        cool_set_point: f64,
        fan: FanMode,
    },
    SetHeatSource(HeatSource),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetMode(_) => "set_mode",
            Command::Hold { .. } => "hold",
            Command::ResumeSchedule => "resume_schedule",
            Command::SetFanMode { .. } => "set_fan_mode",
            Command::SetManualActivity { .. } => "set_manual_activity",
            Command::SetHeatSource(_) => "set_heat_source",
        }
    }

    pub fn requires_zone(&self) -> bool {
        !matches!(self, Command::SetMode(_) | Command::SetHeatSource(_))
    }

    /// Mirror the command into the local config so readers see it before
    /// the next refresh confirms it.
    pub(crate) fn apply_to(&self, system: &mut System, zone_id: Option<&str>) -> Result<()> {
        match self {
            Command::SetMode(mode) => system.config.mode = *mode,
            Command::SetHeatSource(source) => system.config.heat_source = Some(*source),
            Command::Hold { activity, until } => {
                let zone = system.config_zone_mut(require_zone(zone_id)?)?;
                zone.hold = true;
                zone.hold_activity = Some(*activity);
                zone.hold_until = until.clone();
            }
            Command::ResumeSchedule => {
                let zone = system.config_zone_mut(require_zone(zone_id)?)?;
                zone.hold = false;
                zone.hold_activity = None;
                zone.hold_until = None;
            }
            Command::SetFanMode { activity, fan } => {
                let zone_id = require_zone(zone_id)?;
                let zone = system.config_zone_mut(zone_id)?;
                let target = zone
                    .find_activity_mut(*activity)
                    .ok_or_else(|| Error::UnknownActivity {
                        zone_id: zone_id.to_string(),
                        activity: activity.to_string(),
                    })?;
                target.fan = *fan;
            }
            Command::SetManualActivity {
                heat_set_point,
                cool_set_point,
                fan,
            } => {
                let zone_id = require_zone(zone_id)?;
                let zone = system.config_zone_mut(zone_id)?;
                zone.hold = true;
                zone.hold_activity = Some(ActivityType::Manual);
                let manual = zone
                    .find_activity_mut(ActivityType::Manual)
                    .ok_or_else(|| Error::UnknownActivity {
                        zone_id: zone_id.to_string(),
                        activity: ActivityType::Manual.to_string(),
                    })?;
                manual.heat_set_point = *heat_set_point;
                manual.cool_set_point = *cool_set_point;
                manual.fan = *fan;
            }
        }
        Ok(())
    }
}

fn require_zone(zone_id: Option<&str>) -> Result<&str> {
    zone_id.ok_or_else(|| Error::Api("command requires a zone id".to_string()))
}
