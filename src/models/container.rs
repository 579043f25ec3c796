// ABOUTME: Container data model mirroring the Rexec backend wire format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Creating,
    Running,
    Stopped,
    Error,
}

impl ContainerStatus {
    pub fn is_running(self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    /// The interim status applied while a start/stop call is in flight.
    pub fn busy() -> Self {
        ContainerStatus::Creating
    }
}

/// A remotely-hosted ephemeral compute session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default = "default_status")]
    pub status: ContainerStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

fn default_status() -> ContainerStatus {
    ContainerStatus::Running
}

/// Transient record for the single creation that may be in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatingContainer {
    pub name: String,
    pub image: String,
    pub progress: u8,
    pub message: String,
    pub stage: String,
}

impl CreatingContainer {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            progress: 0,
            message: "Starting...".to_string(),
            stage: "initializing".to_string(),
        }
    }
}

/// One unit of the SSE creation-progress protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub message: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// Body for both creation endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CreateContainerRequest {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,
}

impl CreateContainerRequest {
    /// The backend only honors `custom_image` for the sentinel image name.
    pub fn new(name: impl Into<String>, image: impl Into<String>, custom_image: Option<&str>) -> Self {
        let image = image.into();
        let custom_image = if image == "custom" {
            custom_image.map(str::to_string)
        } else {
            None
        };
        Self {
            name: name.into(),
            image,
            custom_image,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerListResponse {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub count: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    crate::containers::DEFAULT_CONTAINER_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub recreated: bool,
}
