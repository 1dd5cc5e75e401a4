use crate::arm_driver::{self, ArmDriver, Coords, DriverError, JointAngles};
use crate::config::PickPlaceConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed,
    Interrupted,
}

/// Fixed grab-and-drop sequence run once alignment holds.
///
/// Every stage is one absolute command followed by a settle wait. Stages are
/// unconditional once started; there is no re-check of the marker or grip
/// feedback mid-sequence. That is deliberate for a single rigid object of
/// known geometry. A driver failure aborts the sequence and leaves recovery
/// to the operator, since the mechanical state after a partial failure is
/// unknown. Interrupts are honored between stages, never mid-command.
pub struct PickPlaceSequencer<'a> {
    driver: &'a mut dyn ArmDriver,
    config: &'a PickPlaceConfig,
    shutdown: &'a AtomicBool,
}

impl<'a> PickPlaceSequencer<'a> {
    pub fn new(
        driver: &'a mut dyn ArmDriver,
        config: &'a PickPlaceConfig,
        shutdown: &'a AtomicBool,
    ) -> PickPlaceSequencer<'a> {
        PickPlaceSequencer {
            driver,
            config,
            shutdown,
        }
    }

    /// `base` is the arm pose captured at the moment alignment converged.
    pub async fn run(&mut self, base: &Coords) -> Result<SequenceOutcome> {
        info!(
            "starting pick and place from x: {:.1} y: {:.1} z: {:.1}",
            base.x, base.y, base.z
        );

        // stage 1: confirm the arm is still before touching anything
        if self.pause(self.config.pre_pick_delay_ms).await {
            return self.interrupt();
        }

        // stage 2: put the gripper on the marker. The camera looks from
        // behind and above the gripper, so the reach point sits forward and
        // below the aligned hover pose.
        let pick = Coords::tool_down(
            base.x,
            base.y + self.config.gripper_forward_offset,
            base.z - self.config.gripper_down_offset,
        );
        self.driver.send_coords(&pick, self.config.speed).await?;
        if self.settle(self.config.pick_delay_ms).await? {
            return self.interrupt();
        }

        // stage 3: grab
        self.driver
            .set_gripper(self.config.grip_value, self.config.gripper_speed)
            .await?;
        if self.pause(self.config.grip_delay_ms).await {
            return self.interrupt();
        }

        // stage 4: lift clear of the surface
        let lift = Coords::tool_down(pick.x, pick.y, pick.z + self.config.lift_height);
        self.driver.send_coords(&lift, self.config.speed).await?;
        if self.settle(self.config.lift_delay_ms).await? {
            return self.interrupt();
        }

        // stage 5: carry over the drop-off point at hover height
        let approach = Coords::tool_down(
            base.x + self.config.place_lateral_offset,
            base.y + self.config.gripper_forward_offset,
            base.z,
        );
        self.driver.send_coords(&approach, self.config.speed).await?;
        if self.settle(self.config.approach_delay_ms).await? {
            return self.interrupt();
        }

        // stage 6: lower the object to the surface
        let descend = Coords::tool_down(
            approach.x,
            approach.y,
            approach.z - self.config.place_descend,
        );
        self.driver.send_coords(&descend, self.config.speed).await?;
        if self.settle(self.config.descend_delay_ms).await? {
            return self.interrupt();
        }

        // stage 7: release
        self.driver
            .set_gripper(self.config.open_value, self.config.gripper_speed)
            .await?;
        if self.pause(self.config.release_delay_ms).await {
            return self.interrupt();
        }

        // stage 8: back off upward, then fold home and into the ready pose
        let retreat = Coords::tool_down(
            descend.x,
            descend.y,
            descend.z + self.config.retreat_height,
        );
        self.driver.send_coords(&retreat, self.config.speed).await?;
        if self.settle(self.config.retreat_delay_ms).await? {
            return self.interrupt();
        }
        self.driver
            .send_angles(&JointAngles::new(self.config.home_angles), self.config.speed)
            .await?;
        if self.settle(self.config.home_delay_ms).await? {
            return self.interrupt();
        }
        self.driver
            .send_angles(&JointAngles::new(self.config.ready_angles), self.config.speed)
            .await?;
        self.settle(self.config.home_delay_ms).await?;

        info!("pick and place complete");
        Ok(SequenceOutcome::Completed)
    }

    async fn settle(&mut self, delay_ms: u64) -> Result<bool> {
        arm_driver::wait_for_motion(
            &mut *self.driver,
            Duration::from_millis(delay_ms),
            self.config.motion_timeout(),
        )
        .await?;
        Ok(self.interrupted())
    }

    async fn pause(&self, delay_ms: u64) -> bool {
        sleep(Duration::from_millis(delay_ms)).await;
        self.interrupted()
    }

    fn interrupted(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn interrupt(&self) -> Result<SequenceOutcome> {
        info!("pick and place interrupted");
        Ok(SequenceOutcome::Interrupted)
    }
}
