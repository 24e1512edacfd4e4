use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    /// Set point granularity the thermostat accepts.
    pub fn step(&self) -> f64 {
        match self {
            TemperatureUnit::Fahrenheit => 1.0,
            TemperatureUnit::Celsius => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemMode {
    #[default]
    Off,
    Cool,
    Heat,
    Auto,
    #[serde(rename = "fanonly")]
    FanOnly,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMode::Off => "off",
            SystemMode::Cool => "cool",
            SystemMode::Heat => "heat",
            SystemMode::Auto => "auto",
            SystemMode::FanOnly => "fanonly",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(SystemMode::Off),
            "cool" => Some(SystemMode::Cool),
            "heat" => Some(SystemMode::Heat),
            "auto" => Some(SystemMode::Auto),
            "fanonly" => Some(SystemMode::FanOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    /// Fan follows the equipment ("auto").
    #[default]
    Off,
    Low,
    Med,
    High,
}

impl FanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanMode::Off => "off",
            FanMode::Low => "low",
            FanMode::Med => "med",
            FanMode::High => "high",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(FanMode::Off),
            "low" => Some(FanMode::Low),
            "med" => Some(FanMode::Med),
            "high" => Some(FanMode::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Home,
    Away,
    Sleep,
    Wake,
    Manual,
    Vacation,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Home => "home",
            ActivityType::Away => "away",
            ActivityType::Sleep => "sleep",
            ActivityType::Wake => "wake",
            ActivityType::Manual => "manual",
            ActivityType::Vacation => "vacation",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(ActivityType::Home),
            "away" => Some(ActivityType::Away),
            "sleep" => Some(ActivityType::Sleep),
            "wake" => Some(ActivityType::Wake),
            "manual" => Some(ActivityType::Manual),
            "vacation" => Some(ActivityType::Vacation),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatSource {
    #[serde(rename = "idu only")]
    IduOnly,
    #[serde(rename = "odu only")]
    OduOnly,
    #[serde(rename = "system")]
    System,
}

/// Immutable identity of a controller. Replaced wholesale, never edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub serial: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub firmware: String,
    #[serde(default)]
    pub indoor_model: Option<String>,
    #[serde(default)]
    pub indoor_serial: Option<String>,
    #[serde(default)]
    pub indoor_unit_type: Option<String>,
    /// Fuel of the indoor unit when it is a furnace ("gas", "propane").
    #[serde(default)]
    pub indoor_unit_source: Option<String>,
    #[serde(default)]
    pub outdoor_model: Option<String>,
    #[serde(default)]
    pub outdoor_serial: Option<String>,
    #[serde(default)]
    pub outdoor_unit_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusZone {
    pub id: String,
    pub name: String,
    pub temperature: Option<f64>,
    pub humidity: Option<u8>,
    pub occupancy: Option<bool>,
    /// Live indicator of which activity the zone is running.
    pub current_activity: Option<ActivityType>,
    /// "idle", "active_heat", "prep_cool", ...
    pub conditioning: Option<String>,
    pub fan: Option<FanMode>,
    #[serde(default)]
    pub damper_position: Option<u8>,
}

/// Telemetry as last reported by the thermostat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub outdoor_temperature: Option<f64>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    /// Equipment-level mode, e.g. "gasheat", "hpheat", "off".
    pub mode: Option<String>,
    /// Filter wear in percent.
    pub filter_used: Option<u8>,
    #[serde(default)]
    pub is_disconnected: bool,
    pub humidifier_on: Option<bool>,
    pub airflow_cfm: Option<f64>,
    pub blower_rpm: Option<u32>,
    pub indoor_unit_operational_status: Option<String>,
    pub outdoor_unit_operational_status: Option<String>,
    pub time_stamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub zones: Vec<StatusZone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub heat_set_point: f64,
    pub cool_set_point: f64,
    pub fan: FanMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigZone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hold: bool,
    pub hold_activity: Option<ActivityType>,
    /// Local time ("HH:MM") the hold ends; `None` holds indefinitely.
    #[serde(default)]
    pub hold_until: Option<String>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// Desired state as configured on the thermostat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub mode: SystemMode,
    pub heat_source: Option<HeatSource>,
    pub static_pressure: Option<f64>,
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub zones: Vec<ConfigZone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyMetric {
    Cooling,
    HpHeat,
    Fan,
    ElectricHeat,
    Reheat,
    FanGas,
    Gas,
    LoopPump,
}

impl EnergyMetric {
    pub const ALL: [EnergyMetric; 8] = [
        EnergyMetric::Cooling,
        EnergyMetric::HpHeat,
        EnergyMetric::Fan,
        EnergyMetric::ElectricHeat,
        EnergyMetric::Reheat,
        EnergyMetric::FanGas,
        EnergyMetric::Gas,
        EnergyMetric::LoopPump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyMetric::Cooling => "cooling",
            EnergyMetric::HpHeat => "hp_heat",
            EnergyMetric::Fan => "fan",
            EnergyMetric::ElectricHeat => "electric_heat",
            EnergyMetric::Reheat => "reheat",
            EnergyMetric::FanGas => "fan_gas",
            EnergyMetric::Gas => "gas",
            EnergyMetric::LoopPump => "loop_pump",
        }
    }

    /// kWh for electric metrics, therms for gas.
    pub fn unit(&self) -> &'static str {
        match self {
            EnergyMetric::Gas => "therm",
            _ => "kWh",
        }
    }
}

/// Year-to-date usage. Refreshed on its own schedule, independent of status/config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub year: Option<i32>,
    pub cooling: Option<f64>,
    pub hp_heat: Option<f64>,
    pub fan: Option<f64>,
    pub electric_heat: Option<f64>,
    pub reheat: Option<f64>,
    pub fan_gas: Option<f64>,
    pub gas: Option<f64>,
    pub loop_pump: Option<f64>,
}

impl Energy {
    pub fn value(&self, metric: EnergyMetric) -> Option<f64> {
        match metric {
            EnergyMetric::Cooling => self.cooling,
            EnergyMetric::HpHeat => self.hp_heat,
            EnergyMetric::Fan => self.fan,
            EnergyMetric::ElectricHeat => self.electric_heat,
            EnergyMetric::Reheat => self.reheat,
            EnergyMetric::FanGas => self.fan_gas,
            EnergyMetric::Gas => self.gas,
            EnergyMetric::LoopPump => self.loop_pump,
        }
    }

    /// Metrics the equipment actually reports.
    pub fn reported(&self) -> impl Iterator<Item = (EnergyMetric, f64)> + '_ {
        EnergyMetric::ALL
            .into_iter()
            .filter_map(|m| self.value(m).map(|v| (m, v)))
    }
}

/// One physical controller as fetched from the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub profile: Profile,
    pub status: Status,
    pub config: Config,
    #[serde(default)]
    pub energy: Energy,
}

impl System {
    pub fn serial(&self) -> &str {
        &self.profile.serial
    }
}
