use crate::alignment::{AlignmentController, AlignmentError, AlignmentOutcome};
use crate::arm_driver::{ArmDriver, DriverError};
use crate::config::TagpickConfig;
use crate::pick_place::{PickPlaceSequencer, SequenceOutcome};
use crate::pose_source::PoseSource;
use std::sync::{atomic::AtomicBool, Arc};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MissionError {
    #[error("alignment phase failed")]
    AlignmentError(#[from] AlignmentError),
    #[error("pick and place sequence failed")]
    SequenceError(#[from] DriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionState {
    Idle,
    Approaching,
    Converged,
    Sequencing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    Completed,
    Interrupted,
}

/// One full pick-and-place run: center over the marker, then execute the
/// grab-and-drop sequence once. Alignment handing off to the sequencer is a
/// terminal transition; the mission never re-aligns.
pub struct Mission {
    driver: Box<dyn ArmDriver>,
    poses: Box<dyn PoseSource>,
    config: TagpickConfig,
    shutdown: Arc<AtomicBool>,
    state: MissionState,
}

impl Mission {
    pub fn new(
        driver: Box<dyn ArmDriver>,
        poses: Box<dyn PoseSource>,
        config: TagpickConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Mission {
        Mission {
            driver,
            poses,
            config,
            shutdown,
            state: MissionState::Idle,
        }
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    pub async fn run(&mut self) -> Result<MissionOutcome, MissionError> {
        self.state = MissionState::Approaching;
        info!("approaching marker");
        let mut alignment = AlignmentController::new(
            self.driver.as_mut(),
            self.poses.as_ref(),
            &self.config.align,
            self.shutdown.as_ref(),
        );
        let base = match alignment.run().await? {
            AlignmentOutcome::Converged(base) => base,
            AlignmentOutcome::Interrupted => return Ok(MissionOutcome::Interrupted),
        };

        self.state = MissionState::Converged;
        info!(
            "aligned over marker at x: {:.1} y: {:.1} z: {:.1}",
            base.x, base.y, base.z
        );

        self.state = MissionState::Sequencing;
        let mut sequencer = PickPlaceSequencer::new(
            self.driver.as_mut(),
            &self.config.pick_place,
            self.shutdown.as_ref(),
        );
        let outcome = match sequencer.run(&base).await? {
            SequenceOutcome::Completed => MissionOutcome::Completed,
            SequenceOutcome::Interrupted => MissionOutcome::Interrupted,
        };

        self.state = MissionState::Done;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_driver::Coords;
    use crate::config::{AlignConfig, PickPlaceConfig};
    use crate::test_util::{Command, RecordingArmDriver, ScriptedPoseSource};
    use nalgebra as na;

    fn quick_config() -> TagpickConfig {
        TagpickConfig {
            align: AlignConfig {
                settle_delay_ms: 1,
                idle_delay_ms: 1,
                hold_delay_ms: 1,
                motion_timeout_ms: 5,
                ..AlignConfig::default()
            },
            pick_place: PickPlaceConfig {
                pre_pick_delay_ms: 1,
                pick_delay_ms: 1,
                grip_delay_ms: 1,
                lift_delay_ms: 1,
                approach_delay_ms: 1,
                descend_delay_ms: 1,
                release_delay_ms: 1,
                retreat_delay_ms: 1,
                home_delay_ms: 1,
                motion_timeout_ms: 5,
                ..PickPlaceConfig::default()
            },
            ..TagpickConfig::default()
        }
    }

    #[tokio::test]
    async fn aligns_then_picks_and_places() {
        let driver = RecordingArmDriver::new(Coords::tool_down(150.0, -60.0, 256.6));
        let log = driver.command_log();
        let poses = ScriptedPoseSource::new(vec![Ok(Some(na::Vector3::new(0.0, 0.0, 0.1)))]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut mission = Mission::new(
            Box::new(driver),
            Box::new(poses),
            quick_config(),
            shutdown,
        );

        let outcome = mission.run().await.unwrap();

        assert_eq!(outcome, MissionOutcome::Completed);
        assert_eq!(mission.state(), MissionState::Done);
        let commands = log.lock().unwrap().clone();
        assert_eq!(commands.len(), 9);
        assert!(matches!(commands[0], Command::Coords { .. }));
        assert!(matches!(commands[1], Command::Gripper { value: 50, .. }));
        assert!(matches!(commands[8], Command::Angles { .. }));
    }

    #[tokio::test]
    async fn interrupt_during_alignment_never_picks() {
        let driver = RecordingArmDriver::new(Coords::tool_down(150.0, -60.0, 256.6));
        let log = driver.command_log();
        let poses = ScriptedPoseSource::new(vec![Ok(None), Ok(None), Ok(None)]);
        let shutdown = poses.exhausted_flag();
        let mut mission = Mission::new(
            Box::new(driver),
            Box::new(poses),
            quick_config(),
            shutdown,
        );

        let outcome = mission.run().await.unwrap();

        assert_eq!(outcome, MissionOutcome::Interrupted);
        assert_eq!(mission.state(), MissionState::Approaching);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn driver_fault_surfaces_as_mission_error() {
        let driver = RecordingArmDriver::failing(Coords::tool_down(150.0, -60.0, 256.6));
        let poses = ScriptedPoseSource::new(vec![Ok(Some(na::Vector3::new(0.0, 0.0, 0.1)))]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut mission = Mission::new(
            Box::new(driver),
            Box::new(poses),
            quick_config(),
            shutdown,
        );

        let error = mission.run().await.unwrap_err();
        assert!(matches!(error, MissionError::AlignmentError(_)));
    }
}
