//! Test doubles shared by the control-loop tests.

use crate::arm_driver::{ArmDriver, Coords, DriverError, JointAngles};
use crate::pose_source::PoseSource;
use async_trait::async_trait;
use nalgebra as na;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Coords { target: Coords, speed: u8 },
    Angles { target: JointAngles, speed: u8 },
    Gripper { value: u8, speed: u8 },
}

/// Arm stand-in that records every command and "teleports" to commanded
/// poses so `read_coords` reflects the last move.
pub struct RecordingArmDriver {
    coords: Coords,
    commands: Arc<Mutex<Vec<Command>>>,
    fail_reads: bool,
    fail_sends: bool,
    trip_on_gripper: Option<Arc<AtomicBool>>,
}

impl RecordingArmDriver {
    pub fn new(coords: Coords) -> RecordingArmDriver {
        RecordingArmDriver {
            coords,
            commands: Arc::new(Mutex::new(Vec::new())),
            fail_reads: false,
            fail_sends: false,
            trip_on_gripper: None,
        }
    }

    pub fn failing(coords: Coords) -> RecordingArmDriver {
        RecordingArmDriver {
            fail_reads: true,
            ..RecordingArmDriver::new(coords)
        }
    }

    pub fn failing_sends(coords: Coords) -> RecordingArmDriver {
        RecordingArmDriver {
            fail_sends: true,
            ..RecordingArmDriver::new(coords)
        }
    }

    /// Raise `flag` when the gripper is commanded, to simulate an operator
    /// interrupt arriving mid-sequence.
    pub fn trip_on_gripper(mut self, flag: Arc<AtomicBool>) -> RecordingArmDriver {
        self.trip_on_gripper = Some(flag);
        self
    }

    pub fn command_log(&self) -> Arc<Mutex<Vec<Command>>> {
        self.commands.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn broken_pipe() -> DriverError {
        DriverError::IoError(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "serial line dropped",
        ))
    }
}

#[async_trait]
impl ArmDriver for RecordingArmDriver {
    async fn read_coords(&mut self) -> Result<Coords, DriverError> {
        if self.fail_reads {
            return Err(RecordingArmDriver::broken_pipe());
        }
        Ok(self.coords)
    }

    async fn send_coords(&mut self, coords: &Coords, speed: u8) -> Result<(), DriverError> {
        if self.fail_sends {
            return Err(RecordingArmDriver::broken_pipe());
        }
        self.coords = *coords;
        self.commands.lock().unwrap().push(Command::Coords {
            target: *coords,
            speed,
        });
        Ok(())
    }

    async fn send_angles(&mut self, angles: &JointAngles, speed: u8) -> Result<(), DriverError> {
        if self.fail_sends {
            return Err(RecordingArmDriver::broken_pipe());
        }
        self.commands.lock().unwrap().push(Command::Angles {
            target: *angles,
            speed,
        });
        Ok(())
    }

    async fn set_gripper(&mut self, value: u8, speed: u8) -> Result<(), DriverError> {
        if self.fail_sends {
            return Err(RecordingArmDriver::broken_pipe());
        }
        self.commands
            .lock()
            .unwrap()
            .push(Command::Gripper { value, speed });
        if let Some(flag) = &self.trip_on_gripper {
            flag.store(true, Ordering::Release);
        }
        Ok(())
    }

    async fn is_moving(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }
}

/// Pose source that replays a fixed script, then keeps answering "no
/// marker". The exhausted flag lets a test stop a loop that would otherwise
/// poll forever.
pub struct ScriptedPoseSource {
    script: Mutex<VecDeque<anyhow::Result<Option<na::Vector3<f32>>>>>,
    exhausted: Arc<AtomicBool>,
}

impl ScriptedPoseSource {
    pub fn new(script: Vec<anyhow::Result<Option<na::Vector3<f32>>>>) -> ScriptedPoseSource {
        ScriptedPoseSource {
            script: Mutex::new(script.into()),
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn exhausted_flag(&self) -> Arc<AtomicBool> {
        self.exhausted.clone()
    }
}

#[async_trait]
impl PoseSource for ScriptedPoseSource {
    async fn latest_tvec(&self) -> anyhow::Result<Option<na::Vector3<f32>>> {
        let mut script = self.script.lock().unwrap();
        let next = script.pop_front().unwrap_or(Ok(None));
        if script.is_empty() {
            self.exhausted.store(true, Ordering::Release);
        }
        next
    }
}
