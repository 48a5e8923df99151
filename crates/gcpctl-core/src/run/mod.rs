//! Cloud Run Admin v2 client and models

mod client;
pub mod types;

pub use client::{RUN_ENDPOINT, RunClient};
pub use types::{
    Condition, Container, EnvVar, Operation, ResourceRequirements, RevisionScaling,
    RevisionTemplate, Service, TrafficTarget, TrafficTargetStatus,
};
