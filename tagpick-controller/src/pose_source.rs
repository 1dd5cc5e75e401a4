use anyhow::Result;
use async_trait::async_trait;
use nalgebra as na;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Most recent marker translation vector, meters in the camera frame.
/// `None` means no marker is currently in view.
#[async_trait]
pub trait PoseSource: Send + Sync {
    async fn latest_tvec(&self) -> Result<Option<na::Vector3<f32>>>;
}

#[derive(Deserialize, Debug)]
struct PoseReading {
    #[serde(default)]
    tvec: Option<[f32; 3]>,
}

impl PoseReading {
    fn into_tvec(self) -> Option<na::Vector3<f32>> {
        self.tvec.map(na::Vector3::from)
    }
}

/// Polls the pose estimation service over HTTP.
///
/// The service keeps overwriting a single "latest" slot, so a reading may be
/// slightly stale. That is ordinary here; the caller re-reads every cycle.
pub struct HttpPoseSource {
    client: Client,
    url: String,
}

impl HttpPoseSource {
    /// Every request carries `request_timeout` so a stalled service cannot
    /// wedge the control loop.
    pub fn new(url: &str, request_timeout: Duration) -> Result<HttpPoseSource> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(HttpPoseSource {
            client,
            url: url.to_owned(),
        })
    }
}

#[async_trait]
impl PoseSource for HttpPoseSource {
    async fn latest_tvec(&self) -> Result<Option<na::Vector3<f32>>> {
        let reading: PoseReading = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(reading.into_tvec())
    }
}
