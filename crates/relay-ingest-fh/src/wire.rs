//! Fixed-offset "data out" packet decoder.
//!
//! Every field sits at a fixed little-endian byte offset from the start of the
//! datagram. Nothing is length-prefixed, so a single wrong offset shifts every
//! later field; the table below is the whole wire contract. Bytes past
//! [`PACKET_LEN`] are ignored so newer simulation builds that append fields
//! keep working.

use byteorder::{ByteOrder, LittleEndian};
use relay_ingest_core::{
    EngineData, IngestError, Snapshot, Transform, VehicleInfo, WheelData,
};

/// Smallest datagram holding every field we read (last field is the i8 at 310).
pub const PACKET_LEN: usize = 311;

pub mod offset {
    pub const IN_RACE: usize = 0;
    pub const TIMESTAMP: usize = 4;

    pub const MAX_RPM: usize = 8;
    pub const IDLE_RPM: usize = 12;
    pub const CURRENT_RPM: usize = 16;

    pub const ACCELERATION: [usize; 3] = [20, 24, 28];
    pub const VELOCITY: [usize; 3] = [32, 36, 40];
    pub const ANGULAR_VELOCITY: [usize; 3] = [44, 48, 52];
    pub const YAW: usize = 56;
    pub const PITCH: usize = 60;
    pub const ROLL: usize = 64;

    pub const NORMALIZED_SUSPENSION_TRAVEL: [usize; 4] = [68, 72, 76, 80];
    pub const TIRE_SLIP_RATIO: [usize; 4] = [84, 88, 92, 96];
    pub const WHEEL_ROTATION_SPEED: [usize; 4] = [100, 104, 108, 112];
    pub const WHEEL_ON_RUMBLE_STRIP: [usize; 4] = [116, 120, 124, 128];
    pub const WHEEL_PUDDLE_DEPTH: [usize; 4] = [132, 136, 140, 144];
    pub const SURFACE_RUMBLE: [usize; 4] = [148, 152, 156, 160];
    pub const TIRE_SLIP_ANGLE: [usize; 4] = [164, 168, 172, 176];
    pub const TIRE_COMBINED_SLIP: [usize; 4] = [180, 184, 188, 192];
    pub const SUSPENSION_TRAVEL: [usize; 4] = [196, 200, 204, 208];

    pub const VEHICLE_ID: usize = 212;
    pub const CAR_CLASS: usize = 216;
    pub const PI_VALUE: usize = 220;
    pub const DRIVETRAIN: usize = 224;
    pub const NUM_CYLINDERS: usize = 228;

    pub const POSITION: [usize; 3] = [232, 236, 240];
    pub const SPEED: usize = 244;
    pub const POWER: usize = 248;
    pub const TORQUE: usize = 252;
    pub const TIRE_TEMP: [usize; 4] = [256, 260, 264, 268];
    pub const BOOST: usize = 272;
    pub const FUEL: usize = 276;
    pub const DISTANCE_TRAVELED: usize = 280;
    pub const BEST_LAP: usize = 284;
    pub const LAST_LAP: usize = 288;
    pub const CURRENT_LAP: usize = 292;
    pub const TOTAL_RACE_TIME: usize = 296;
    pub const LAP_NUMBER: usize = 300;
    pub const RACE_POSITION: usize = 302;

    pub const ACCEL: usize = 303;
    pub const BRAKE: usize = 304;
    pub const CLUTCH: usize = 305;
    pub const HANDBRAKE: usize = 306;
    pub const GEAR: usize = 307;
    pub const STEERING: usize = 308;
    pub const DRIVING_LINE: usize = 309;
    pub const AI_BRAKE_DIFFERENCE: usize = 310;
}

/// Bounds-checked view over a datagram. Only built once the length check passed.
struct Packet<'a>(&'a [u8]);

impl<'a> Packet<'a> {
    fn new(buf: &'a [u8]) -> Result<Self, IngestError> {
        if buf.len() < PACKET_LEN {
            return Err(IngestError::MalformedPacket {
                len: buf.len(),
                required: PACKET_LEN,
            });
        }
        Ok(Self(&buf[..PACKET_LEN]))
    }

    fn f32(&self, at: usize) -> f32 {
        LittleEndian::read_f32(&self.0[at..at + 4])
    }

    fn i32(&self, at: usize) -> i32 {
        LittleEndian::read_i32(&self.0[at..at + 4])
    }

    fn u32(&self, at: usize) -> u32 {
        LittleEndian::read_u32(&self.0[at..at + 4])
    }

    fn u16(&self, at: usize) -> u16 {
        LittleEndian::read_u16(&self.0[at..at + 2])
    }

    fn u8(&self, at: usize) -> u8 {
        self.0[at]
    }

    fn i8(&self, at: usize) -> i8 {
        self.0[at] as i8
    }

    fn transform(&self, [x, y, z]: [usize; 3]) -> Transform {
        Transform { x: self.f32(x), y: self.f32(y), z: self.f32(z) }
    }

    fn wheels(&self, [fl, fr, rl, rr]: [usize; 4]) -> WheelData {
        WheelData {
            front_left: self.f32(fl),
            front_right: self.f32(fr),
            rear_left: self.f32(rl),
            rear_right: self.f32(rr),
        }
    }
}

/// Decode one datagram. Pure: no state is kept between calls.
pub fn decode(buf: &[u8]) -> Result<Snapshot, IngestError> {
    use offset::*;

    let p = Packet::new(buf)?;

    Ok(Snapshot {
        vehicle: VehicleInfo {
            id: p.i32(VEHICLE_ID),
            class: p.i32(CAR_CLASS).into(),
            pi_value: p.i32(PI_VALUE),
            drivetrain: p.i32(DRIVETRAIN).into(),
        },
        in_race: p.u8(IN_RACE) != 0,
        timestamp: p.u32(TIMESTAMP),
        engine: EngineData {
            max_rpm: p.f32(MAX_RPM),
            idle_rpm: p.f32(IDLE_RPM),
            current_rpm: p.f32(CURRENT_RPM),
            num_cylinders: p.i32(NUM_CYLINDERS),
        },

        acceleration: p.transform(ACCELERATION),
        velocity: p.transform(VELOCITY),
        angular_velocity: p.transform(ANGULAR_VELOCITY),
        position: p.transform(POSITION),
        pitch: p.f32(PITCH),
        yaw: p.f32(YAW),
        roll: p.f32(ROLL),

        normalized_suspension_travel: p.wheels(NORMALIZED_SUSPENSION_TRAVEL),
        suspension_travel: p.wheels(SUSPENSION_TRAVEL),
        tire_slip_ratio: p.wheels(TIRE_SLIP_RATIO),
        tire_slip_angle: p.wheels(TIRE_SLIP_ANGLE),
        tire_combined_slip: p.wheels(TIRE_COMBINED_SLIP),
        wheel_rotation_speed: p.wheels(WHEEL_ROTATION_SPEED),
        wheel_on_rumble_strip: p.wheels(WHEEL_ON_RUMBLE_STRIP),
        wheel_puddle_depth: p.wheels(WHEEL_PUDDLE_DEPTH),
        surface_rumble: p.wheels(SURFACE_RUMBLE),
        tire_temp: p.wheels(TIRE_TEMP),

        speed: p.f32(SPEED),
        power: p.f32(POWER),
        torque: p.f32(TORQUE),
        boost: p.f32(BOOST),
        fuel: p.f32(FUEL),
        distance_traveled: p.f32(DISTANCE_TRAVELED),
        best_lap: p.f32(BEST_LAP),
        last_lap: p.f32(LAST_LAP),
        current_lap: p.f32(CURRENT_LAP),
        total_race_time: p.f32(TOTAL_RACE_TIME),
        lap_number: p.u16(LAP_NUMBER),
        race_position: p.u8(RACE_POSITION),

        accel: p.u8(ACCEL),
        brake: p.u8(BRAKE),
        clutch: p.u8(CLUTCH),
        handbrake: p.u8(HANDBRAKE),
        gear: p.u8(GEAR),
        steering: p.i8(STEERING),
        normalized_driving_line: p.i8(DRIVING_LINE),
        normalized_ai_brake_difference: p.i8(AI_BRAKE_DIFFERENCE),
    })
}
