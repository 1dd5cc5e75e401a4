//! Control library for picking objects marked with a printed fiducial tag.
//!
//! A camera-side service publishes the latest marker translation vector over
//! HTTP. The [`alignment`] loop polls it and steps the arm until the marker
//! sits centered at the configured standoff distance, then [`pick_place`]
//! runs the fixed grab-and-drop sequence. [`mission`] ties the two together.

pub mod alignment;
pub mod arm_driver;
pub mod config;
pub mod mission;
pub mod pick_place;
pub mod pose_source;
pub mod protocol;

#[cfg(test)]
pub(crate) mod test_util;
