use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, str, time::Duration};

/// Serial link to the arm. Opened once at startup; an unavailable port is a
/// fatal startup error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> SerialConfig {
        SerialConfig {
            port: "/dev/ttyUSB0".to_owned(),
            baud_rate: 1_000_000,
        }
    }
}

/// Where the marker pose service lives and how long a single query may take.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoseServiceConfig {
    pub url: String,
    pub request_timeout_ms: u64,
}

impl PoseServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PoseServiceConfig {
    fn default() -> PoseServiceConfig {
        PoseServiceConfig {
            url: "http://192.168.0.161:5000/pose".to_owned(),
            request_timeout_ms: 1000,
        }
    }
}

/// Calibration for the centering loop.
///
/// Offsets from the camera are in meters, arm coordinates in millimeters.
/// `scale` converts between the two. Per-cycle motion is clamped to
/// `step_limit`/`z_step_limit` on each axis independently so a noisy or
/// momentarily large offset can never command a big jump.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlignConfig {
    pub scale: f32,
    pub step_limit: f32,
    pub z_step_limit: f32,
    pub threshold: f32,
    pub z_threshold: f32,
    pub safe_dist: f32,
    pub speed: u8,
    pub settle_delay_ms: u64,
    pub idle_delay_ms: u64,
    pub hold_delay_ms: u64,
    pub motion_timeout_ms: u64,
    /// Consecutive pose query failures tolerated before the loop gives up.
    /// 0 disables the limit. A marker that is simply not in view does not
    /// count as a failure.
    pub max_pose_failures: u32,
}

impl AlignConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }
}

impl Default for AlignConfig {
    fn default() -> AlignConfig {
        AlignConfig {
            scale: 1000.0,
            step_limit: 10.0,
            z_step_limit: 10.0,
            threshold: 0.003,
            z_threshold: 0.01,
            safe_dist: 0.1,
            speed: 50,
            settle_delay_ms: 300,
            idle_delay_ms: 500,
            hold_delay_ms: 500,
            motion_timeout_ms: 2000,
            max_pose_failures: 40,
        }
    }
}

/// Calibration for the grab-and-drop sequence.
///
/// `gripper_forward_offset`/`gripper_down_offset` translate the hover pose
/// over the marker into the pose where the gripper actually reaches it.
/// Stage delays are tuned to the arm's real motion times.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PickPlaceConfig {
    /// Nominal hover height above the work surface, recorded for
    /// calibration reference.
    pub base_z_reference: f32,
    pub gripper_forward_offset: f32,
    pub gripper_down_offset: f32,
    pub lift_height: f32,
    pub place_lateral_offset: f32,
    pub place_descend: f32,
    pub retreat_height: f32,
    pub grip_value: u8,
    pub open_value: u8,
    pub gripper_speed: u8,
    pub speed: u8,
    pub home_angles: [f32; 6],
    pub ready_angles: [f32; 6],
    pub pre_pick_delay_ms: u64,
    pub pick_delay_ms: u64,
    pub grip_delay_ms: u64,
    pub lift_delay_ms: u64,
    pub approach_delay_ms: u64,
    pub descend_delay_ms: u64,
    pub release_delay_ms: u64,
    pub retreat_delay_ms: u64,
    pub home_delay_ms: u64,
    pub motion_timeout_ms: u64,
}

impl PickPlaceConfig {
    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }
}

impl Default for PickPlaceConfig {
    fn default() -> PickPlaceConfig {
        PickPlaceConfig {
            base_z_reference: 256.6,
            gripper_forward_offset: 42.0,
            gripper_down_offset: 55.0,
            lift_height: 50.0,
            place_lateral_offset: 130.0,
            place_descend: 30.0,
            retreat_height: 70.0,
            grip_value: 50,
            open_value: 100,
            gripper_speed: 50,
            speed: 50,
            home_angles: [0.0; 6],
            ready_angles: [90.0, 0.0, -45.0, -45.0, 0.0, 0.0],
            pre_pick_delay_ms: 2000,
            pick_delay_ms: 2000,
            grip_delay_ms: 2000,
            lift_delay_ms: 1000,
            approach_delay_ms: 1500,
            descend_delay_ms: 1000,
            release_delay_ms: 1000,
            retreat_delay_ms: 800,
            home_delay_ms: 2000,
            motion_timeout_ms: 3000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TagpickConfig {
    pub serial: SerialConfig,
    pub pose_service: PoseServiceConfig,
    pub align: AlignConfig,
    pub pick_place: PickPlaceConfig,
}

impl TagpickConfig {
    /// Tagpick comes with an included config file.
    ///
    /// This file is packaged with the binary
    /// This method retrieves this included version
    pub fn included() -> TagpickConfig {
        let json = str::from_utf8(include_bytes!("../config/tagpick.json")).unwrap();
        TagpickConfig::parse_json(json).unwrap()
    }

    pub fn parse_json(text: &str) -> Result<TagpickConfig> {
        let config = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn parse_yaml(text: &str) -> Result<TagpickConfig> {
        let config = serde_yaml::from_str(text)?;
        Ok(config)
    }

    pub fn serialize_to_json(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    pub fn serialize_to_yaml(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(yaml)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_json()?)?;
        Ok(())
    }

    pub fn save_yaml(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_yaml()?)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<TagpickConfig> {
        let text = fs::read_to_string(path)?;
        let config = TagpickConfig::parse_json(&text)?;
        Ok(config)
    }

    pub fn load_yaml(path: &str) -> Result<TagpickConfig> {
        let text = fs::read_to_string(path)?;
        let config = TagpickConfig::parse_yaml(&text)?;
        Ok(config)
    }
}
