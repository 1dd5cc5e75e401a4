use crate::protocol::{self, command};
use async_trait::async_trait;
use serialport::SerialPort;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to open serial port")]
    SerialError(#[from] serialport::Error),
    #[error("error while talking to arm")]
    IoError(#[from] std::io::Error),
    #[error("arm did not reply to command {0:#04x}")]
    ReplyTimeout(u8),
    #[error("arm reply was {0} bytes, expected {1}")]
    MalformedReply(usize, usize),
}

type Result<T> = std::result::Result<T, DriverError>;

/// End effector pose as the arm reports it. Position in millimeters,
/// orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Coords {
    pub fn new(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Coords {
        Coords {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
        }
    }

    /// Pose at the given position with the tool pointing straight down.
    pub fn tool_down(x: f32, y: f32, z: f32) -> Coords {
        Coords::new(x, y, z, 180.0, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles(pub [f32; 6]);

impl JointAngles {
    pub fn new(angles: [f32; 6]) -> JointAngles {
        JointAngles(angles)
    }
}

#[async_trait]
pub trait ArmDriver: Send + Sync {
    async fn read_coords(&mut self) -> Result<Coords>;
    /// Absolute Cartesian move. Fire and forget; the arm does not confirm
    /// completion, poll `is_moving` for that.
    async fn send_coords(&mut self, coords: &Coords, speed: u8) -> Result<()>;
    /// Absolute joint move. Fire and forget.
    async fn send_angles(&mut self, angles: &JointAngles, speed: u8) -> Result<()>;
    /// 0 is fully closed
    /// 100 is fully open
    async fn set_gripper(&mut self, value: u8, speed: u8) -> Result<()>;
    async fn is_moving(&mut self) -> Result<bool>;
}

/// Sleep out the fixed settle delay, then poll the arm until it reports the
/// motion finished or `timeout` expires. The delay stays as a safety margin;
/// completion comes from the arm itself.
pub async fn wait_for_motion(
    driver: &mut dyn ArmDriver,
    settle: Duration,
    timeout: Duration,
) -> Result<()> {
    sleep(settle).await;
    let deadline = Instant::now() + timeout;
    while driver.is_moving().await? {
        if Instant::now() >= deadline {
            tracing::warn!("arm still moving after {:?}, continuing", timeout);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

pub struct SerialArmDriver {
    port: Box<dyn SerialPort>,
    rx_buffer: Vec<u8>,
}

impl SerialArmDriver {
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Box<Self>> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        Ok(Box::new(SerialArmDriver {
            port,
            rx_buffer: Vec::with_capacity(256),
        }))
    }

    fn send_frame(&mut self, command: u8, data: &[u8]) -> Result<()> {
        let frame = protocol::encode(command, data);
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_reply(&mut self, command: u8) -> Result<Vec<u8>> {
        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut read_buf = [0u8; 64];
        loop {
            while let Some((reply_command, data)) = protocol::take_frame(&mut self.rx_buffer) {
                if reply_command == command {
                    return Ok(data);
                }
                // stale reply to an earlier query, drop it
            }
            if Instant::now() >= deadline {
                return Err(DriverError::ReplyTimeout(command));
            }
            match self.port.read(&mut read_buf) {
                Ok(n) if n > 0 => self.rx_buffer.extend_from_slice(&read_buf[..n]),
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl ArmDriver for SerialArmDriver {
    async fn read_coords(&mut self) -> Result<Coords> {
        self.send_frame(command::GET_COORDS, &[])?;
        let data = self.read_reply(command::GET_COORDS)?;
        protocol::decode_coords(&data).ok_or(DriverError::MalformedReply(data.len(), 12))
    }

    async fn send_coords(&mut self, coords: &Coords, speed: u8) -> Result<()> {
        self.send_frame(command::SEND_COORDS, &protocol::encode_coords(coords, speed))
    }

    async fn send_angles(&mut self, angles: &JointAngles, speed: u8) -> Result<()> {
        self.send_frame(command::SEND_ANGLES, &protocol::encode_angles(angles, speed))
    }

    async fn set_gripper(&mut self, value: u8, speed: u8) -> Result<()> {
        self.send_frame(command::SET_GRIPPER_VALUE, &[value, speed])
    }

    async fn is_moving(&mut self) -> Result<bool> {
        self.send_frame(command::IS_MOVING, &[])?;
        let data = self.read_reply(command::IS_MOVING)?;
        Ok(data.first().copied().unwrap_or(0) != 0)
    }
}
