use crate::arm_driver::{self, ArmDriver, Coords, DriverError};
use crate::config::AlignConfig;
use crate::pose_source::PoseSource;
use nalgebra as na;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("arm driver failed during alignment")]
    DriverError(#[from] DriverError),
    #[error("pose service failed {0} consecutive times")]
    PoseServiceDown(u32),
}

type Result<T> = std::result::Result<T, AlignmentError>;

#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome {
    /// Marker centered and at standoff distance. Carries the arm pose read
    /// in the cycle that confirmed it, the base pose for picking.
    Converged(Coords),
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub target: Coords,
    pub move_required: bool,
}

fn clamp_step(value: f32, limit: f32) -> f32 {
    value.clamp(-limit, limit)
}

/// One cycle's worth of correction toward centering the marker.
///
/// Axes inside their tolerance band keep the current value. Each correction
/// is clamped independently so a large or noisy offset never commands more
/// than one step of motion. The camera's Y axis runs opposite the arm's,
/// and closing the depth gap means moving the arm against the error sign,
/// hence the two inversions.
pub fn plan_correction(current: &Coords, tvec: &na::Vector3<f32>, config: &AlignConfig) -> Correction {
    let mut target = Coords::tool_down(current.x, current.y, current.z);
    let mut move_required = false;

    if tvec.x.abs() > config.threshold {
        target.x = current.x + clamp_step(tvec.x * config.scale, config.step_limit);
        move_required = true;
    }

    if tvec.y.abs() > config.threshold {
        target.y = current.y + clamp_step(-tvec.y * config.scale, config.step_limit);
        move_required = true;
    }

    let depth_error = tvec.z - config.safe_dist;
    if depth_error.abs() > config.z_threshold {
        target.z = current.z - clamp_step(depth_error * config.scale, config.z_step_limit);
        move_required = true;
    }

    Correction {
        target,
        move_required,
    }
}

/// All three tolerance checks at once: marker centered laterally and at the
/// standoff distance.
pub fn is_aligned(tvec: &na::Vector3<f32>, config: &AlignConfig) -> bool {
    tvec.x.abs() <= config.threshold
        && tvec.y.abs() <= config.threshold
        && (tvec.z - config.safe_dist).abs() <= config.z_threshold
}

/// Drives the arm until the marker sits centered under the camera at the
/// configured standoff distance.
///
/// Every cycle re-reads the arm's actual pose instead of integrating
/// commanded deltas, so a missed or lagged move cannot accumulate into
/// drift. One motion command at most is outstanding at any time.
pub struct AlignmentController<'a> {
    driver: &'a mut dyn ArmDriver,
    poses: &'a dyn PoseSource,
    config: &'a AlignConfig,
    shutdown: &'a AtomicBool,
}

impl<'a> AlignmentController<'a> {
    pub fn new(
        driver: &'a mut dyn ArmDriver,
        poses: &'a dyn PoseSource,
        config: &'a AlignConfig,
        shutdown: &'a AtomicBool,
    ) -> AlignmentController<'a> {
        AlignmentController {
            driver,
            poses,
            config,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<AlignmentOutcome> {
        let mut pose_failures = 0u32;
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                info!("alignment interrupted");
                return Ok(AlignmentOutcome::Interrupted);
            }

            let current = self.driver.read_coords().await?;

            let tvec = match self.poses.latest_tvec().await {
                Ok(Some(tvec)) => {
                    pose_failures = 0;
                    tvec
                }
                Ok(None) => {
                    pose_failures = 0;
                    info!("marker not detected");
                    sleep(self.config.idle_delay()).await;
                    continue;
                }
                Err(error) => {
                    pose_failures += 1;
                    warn!(
                        "pose query failed ({} in a row): {:#}",
                        pose_failures, error
                    );
                    if self.config.max_pose_failures > 0
                        && pose_failures >= self.config.max_pose_failures
                    {
                        return Err(AlignmentError::PoseServiceDown(pose_failures));
                    }
                    sleep(self.config.idle_delay()).await;
                    continue;
                }
            };

            debug!("tvec x: {:.4} y: {:.4} z: {:.4}", tvec.x, tvec.y, tvec.z);

            let correction = plan_correction(&current, &tvec, self.config);
            if correction.move_required {
                info!(
                    "moving to x: {:.1} y: {:.1} z: {:.1}",
                    correction.target.x, correction.target.y, correction.target.z
                );
                self.driver
                    .send_coords(&correction.target, self.config.speed)
                    .await?;
                arm_driver::wait_for_motion(
                    &mut *self.driver,
                    self.config.settle_delay(),
                    self.config.motion_timeout(),
                )
                .await?;
                continue;
            }

            // No axis asked for a move, but confirm all three tolerances on
            // the same reading before handing off. Kept separate from the
            // per-axis checks so a change to one side cannot quietly skew
            // the other.
            if is_aligned(&tvec, self.config) {
                info!("marker centered at standoff distance");
                return Ok(AlignmentOutcome::Converged(current));
            }
            sleep(self.config.hold_delay()).await;
        }
    }
}
