//! Telemetry snapshot model.
//!
//! Field names serialize in PascalCase so that dashboards written against the
//! simulation's own naming (`Vehicle.PIValue`, `Engine.MaxRPM`, ...) can
//! consume the JSON unchanged. Enumerations serialize as their wire code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Performance class of the current vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CarClass {
    #[default]
    D,
    C,
    B,
    A,
    S1,
    S2,
    X,
    /// Code not known to this build; kept so newer simulations still decode.
    Unknown(i32),
}

impl From<i32> for CarClass {
    fn from(code: i32) -> Self {
        match code {
            0 => CarClass::D,
            1 => CarClass::C,
            2 => CarClass::B,
            3 => CarClass::A,
            4 => CarClass::S1,
            5 => CarClass::S2,
            6 => CarClass::X,
            other => CarClass::Unknown(other),
        }
    }
}

impl From<CarClass> for i32 {
    fn from(class: CarClass) -> Self {
        match class {
            CarClass::D => 0,
            CarClass::C => 1,
            CarClass::B => 2,
            CarClass::A => 3,
            CarClass::S1 => 4,
            CarClass::S2 => 5,
            CarClass::X => 6,
            CarClass::Unknown(code) => code,
        }
    }
}

impl fmt::Display for CarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarClass::D => f.write_str("D"),
            CarClass::C => f.write_str("C"),
            CarClass::B => f.write_str("B"),
            CarClass::A => f.write_str("A"),
            CarClass::S1 => f.write_str("S1"),
            CarClass::S2 => f.write_str("S2"),
            CarClass::X => f.write_str("X"),
            CarClass::Unknown(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Drivetrain {
    #[default]
    Fwd,
    Rwd,
    Awd,
    Unknown(i32),
}

impl From<i32> for Drivetrain {
    fn from(code: i32) -> Self {
        match code {
            0 => Drivetrain::Fwd,
            1 => Drivetrain::Rwd,
            2 => Drivetrain::Awd,
            other => Drivetrain::Unknown(other),
        }
    }
}

impl From<Drivetrain> for i32 {
    fn from(drivetrain: Drivetrain) -> Self {
        match drivetrain {
            Drivetrain::Fwd => 0,
            Drivetrain::Rwd => 1,
            Drivetrain::Awd => 2,
            Drivetrain::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Drivetrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drivetrain::Fwd => f.write_str("FWD"),
            Drivetrain::Rwd => f.write_str("RWD"),
            Drivetrain::Awd => f.write_str("AWD"),
            Drivetrain::Unknown(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleInfo {
    /// Simulation car ordinal; 0 means no car is being driven.
    #[serde(rename = "ID")]
    pub id: i32,
    /// Performance class (D..X)
    #[serde(rename = "Index")]
    pub class: CarClass,
    #[serde(rename = "PIValue")]
    pub pi_value: i32,
    #[serde(rename = "Drivetrain")]
    pub drivetrain: Drivetrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineData {
    #[serde(rename = "MaxRPM")]
    pub max_rpm: f32,
    #[serde(rename = "IdleRPM")]
    pub idle_rpm: f32,
    #[serde(rename = "CurrentRPM")]
    pub current_rpm: f32,
    #[serde(rename = "NumCylinders")]
    pub num_cylinders: i32,
}

/// Three-axis vector (local space for motion, meters for position).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One value per wheel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct WheelData {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

/// One fully decoded telemetry record.
///
/// Missing JSON fields deserialize to zero, so partial updates from other
/// producers are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Snapshot {
    pub vehicle: VehicleInfo,
    /// True while in a session, false in menus
    pub in_race: bool,
    /// Simulation clock in milliseconds; wraps at u32::MAX
    pub timestamp: u32,
    pub engine: EngineData,

    // motion
    pub acceleration: Transform,
    pub velocity: Transform,
    pub angular_velocity: Transform,
    pub position: Transform,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,

    // per wheel
    pub normalized_suspension_travel: WheelData,
    pub suspension_travel: WheelData,
    pub tire_slip_ratio: WheelData,
    pub tire_slip_angle: WheelData,
    pub tire_combined_slip: WheelData,
    pub wheel_rotation_speed: WheelData,
    pub wheel_on_rumble_strip: WheelData,
    pub wheel_puddle_depth: WheelData,
    pub surface_rumble: WheelData,
    pub tire_temp: WheelData,

    // driving state
    pub speed: f32,
    pub power: f32,
    pub torque: f32,
    pub boost: f32,
    pub fuel: f32,
    pub distance_traveled: f32,
    pub best_lap: f32,
    pub last_lap: f32,
    pub current_lap: f32,
    pub total_race_time: f32,
    pub lap_number: u16,
    pub race_position: u8,

    // inputs
    pub accel: u8,
    pub brake: u8,
    pub clutch: u8,
    pub handbrake: u8,
    pub gear: u8,
    pub steering: i8,
    pub normalized_driving_line: i8,
    #[serde(rename = "NormalizedAIBrakeDifference")]
    pub normalized_ai_brake_difference: i8,
}

impl Snapshot {
    /// False for menu / non-driving packets (vehicle id 0).
    #[inline]
    pub fn has_vehicle(&self) -> bool {
        self.vehicle.id != 0
    }

    /// Forward speed in miles per hour
    pub fn mph(&self) -> f32 {
        (self.velocity.z * 2.23694).abs()
    }

    /// Forward speed in kilometers per hour
    pub fn kph(&self) -> f32 {
        (self.velocity.z * 3.6).abs()
    }
}
