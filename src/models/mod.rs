// ABOUTME: Core data models for Rexec containers and the creation-progress protocol

pub mod container;

pub use container::{
    Container, ContainerListResponse, ContainerStatus, CreateContainerRequest, CreatingContainer,
    ProgressEvent, StartResponse,
};
