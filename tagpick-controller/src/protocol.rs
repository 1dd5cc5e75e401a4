//! Wire framing for the arm's serial protocol.
//!
//! Frames look like `[0xFE 0xFE LEN CMD payload.. 0xFA]` where `LEN` counts
//! the command byte, the payload and the footer. Numeric fields are
//! big-endian `i16`: positions in tenths of a millimeter, angles in
//! hundredths of a degree.

use crate::arm_driver::{Coords, JointAngles};

pub const FRAME_HEADER: u8 = 0xFE;
pub const FRAME_FOOTER: u8 = 0xFA;

/// Positions travel as `i16` tenths of a millimeter.
pub const COORD_SCALE: f32 = 10.0;
/// Angles travel as `i16` hundredths of a degree.
pub const ANGLE_SCALE: f32 = 100.0;

/// Cartesian moves are interpolated linearly by the arm firmware.
pub const LINEAR_MODE: u8 = 1;

pub mod command {
    pub const SEND_ANGLES: u8 = 0x22;
    pub const GET_COORDS: u8 = 0x23;
    pub const SEND_COORDS: u8 = 0x25;
    pub const IS_MOVING: u8 = 0x2B;
    pub const SET_GRIPPER_VALUE: u8 = 0x67;
}

pub fn encode(command: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + data.len());
    frame.push(FRAME_HEADER);
    frame.push(FRAME_HEADER);
    frame.push(data.len() as u8 + 2);
    frame.push(command);
    frame.extend_from_slice(data);
    frame.push(FRAME_FOOTER);
    frame
}

/// Extract the next complete frame from `buffer`, draining the bytes it
/// consumed. Garbage before the header and frames with a bad footer are
/// skipped so the parser resyncs on the next header.
pub fn take_frame(buffer: &mut Vec<u8>) -> Option<(u8, Vec<u8>)> {
    loop {
        let start = buffer
            .windows(2)
            .position(|window| window == [FRAME_HEADER, FRAME_HEADER])?;
        if start > 0 {
            buffer.drain(0..start);
        }
        if buffer.len() < 4 {
            return None;
        }
        let len = buffer[2] as usize;
        if len < 2 {
            buffer.drain(0..2);
            continue;
        }
        let frame_len = 3 + len;
        if buffer.len() < frame_len {
            return None;
        }
        if buffer[frame_len - 1] != FRAME_FOOTER {
            buffer.drain(0..2);
            continue;
        }
        let command = buffer[3];
        let data = buffer[4..frame_len - 1].to_vec();
        buffer.drain(0..frame_len);
        return Some((command, data));
    }
}

pub fn put_scaled(data: &mut Vec<u8>, value: f32, scale: f32) {
    let raw = (value * scale).round() as i16;
    data.extend_from_slice(&raw.to_be_bytes());
}

pub fn read_scaled(data: &[u8], index: usize, scale: f32) -> f32 {
    let raw = i16::from_be_bytes([data[2 * index], data[2 * index + 1]]);
    f32::from(raw) / scale
}

pub fn encode_coords(coords: &Coords, speed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(14);
    put_scaled(&mut data, coords.x, COORD_SCALE);
    put_scaled(&mut data, coords.y, COORD_SCALE);
    put_scaled(&mut data, coords.z, COORD_SCALE);
    put_scaled(&mut data, coords.roll, ANGLE_SCALE);
    put_scaled(&mut data, coords.pitch, ANGLE_SCALE);
    put_scaled(&mut data, coords.yaw, ANGLE_SCALE);
    data.push(speed);
    data.push(LINEAR_MODE);
    data
}

pub fn decode_coords(data: &[u8]) -> Option<Coords> {
    if data.len() < 12 {
        return None;
    }
    Some(Coords::new(
        read_scaled(data, 0, COORD_SCALE),
        read_scaled(data, 1, COORD_SCALE),
        read_scaled(data, 2, COORD_SCALE),
        read_scaled(data, 3, ANGLE_SCALE),
        read_scaled(data, 4, ANGLE_SCALE),
        read_scaled(data, 5, ANGLE_SCALE),
    ))
}

pub fn encode_angles(angles: &JointAngles, speed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    for angle in angles.0.iter() {
        put_scaled(&mut data, *angle, ANGLE_SCALE);
    }
    data.push(speed);
    data
}
