//! Widget-agnostic reads over a synchronized [`System`].
//!
//! Presentation code maps these onto its own sensors and climate controls;
//! none of them touch the network.

use chrono::{DateTime, Utc};

use crate::types::{
    Activity, ActivityType, ConfigZone, FanMode, Status, StatusZone, System, SystemMode,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Off,
    Idle,
    Heating,
    Cooling,
    Fan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetTemperatures {
    None,
    Single(f64),
    Range { low: f64, high: f64 },
}

impl ConfigZone {
    pub fn find_activity(&self, kind: ActivityType) -> Option<&Activity> {
        self.activities.iter().find(|a| a.kind == kind)
    }

    pub(crate) fn find_activity_mut(&mut self, kind: ActivityType) -> Option<&mut Activity> {
        self.activities.iter_mut().find(|a| a.kind == kind)
    }
}

impl Status {
    /// Filter life left in percent.
    pub fn filter_remaining(&self) -> Option<u8> {
        self.filter_used.map(|used| 100u8.saturating_sub(used))
    }

    /// Whole minutes since the thermostat last reported to the service.
    pub fn minutes_since_update(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_stamp.map(|ts| (now - ts).num_minutes())
    }
}

impl System {
    pub fn status_zone(&self, zone_id: &str) -> Option<&StatusZone> {
        self.status.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn config_zone(&self, zone_id: &str) -> Option<&ConfigZone> {
        self.config.zones.iter().find(|z| z.id == zone_id)
    }

    pub(crate) fn config_zone_mut(&mut self, zone_id: &str) -> Result<&mut ConfigZone> {
        let serial = self.profile.serial.clone();
        self.config
            .zones
            .iter_mut()
            .find(|z| z.id == zone_id)
            .ok_or(Error::ZoneMismatch {
                serial,
                zone_id: zone_id.to_string(),
            })
    }

    /// Both halves of a zone. Missing either one is a caller error.
    pub fn zone(&self, zone_id: &str) -> Result<(&StatusZone, &ConfigZone)> {
        match (self.status_zone(zone_id), self.config_zone(zone_id)) {
            (Some(status), Some(config)) => Ok((status, config)),
            _ => Err(Error::ZoneMismatch {
                serial: self.profile.serial.clone(),
                zone_id: zone_id.to_string(),
            }),
        }
    }

    /// Activity whose type matches the zone's live indicator.
    pub fn current_activity(&self, zone_id: &str) -> Result<&Activity> {
        let (status, config) = self.zone(zone_id)?;
        let kind = status.current_activity.ok_or_else(|| Error::UnknownActivity {
            zone_id: zone_id.to_string(),
            activity: "none".to_string(),
        })?;
        config.find_activity(kind).ok_or_else(|| Error::UnknownActivity {
            zone_id: zone_id.to_string(),
            activity: kind.to_string(),
        })
    }

    pub fn hvac_action(&self, zone_id: &str) -> Result<HvacAction> {
        let (status, _) = self.zone(zone_id)?;
        if self.config.mode == SystemMode::Off {
            return Ok(HvacAction::Off);
        }
        let action = match status.conditioning.as_deref() {
            None | Some("idle") => HvacAction::Idle,
            Some(c) if c.contains("heat") => HvacAction::Heating,
            Some(c) if c.contains("cool") => HvacAction::Cooling,
            _ if status.fan == Some(FanMode::Off) => HvacAction::Idle,
            _ => HvacAction::Fan,
        };
        Ok(action)
    }

    pub fn target_temperatures(&self, zone_id: &str) -> Result<TargetTemperatures> {
        let activity = self.current_activity(zone_id)?;
        Ok(match self.config.mode {
            SystemMode::Heat => TargetTemperatures::Single(activity.heat_set_point),
            SystemMode::Cool => TargetTemperatures::Single(activity.cool_set_point),
            SystemMode::Auto => TargetTemperatures::Range {
                low: activity.heat_set_point,
                high: activity.cool_set_point,
            },
            SystemMode::Off | SystemMode::FanOnly => TargetTemperatures::None,
        })
    }
}
