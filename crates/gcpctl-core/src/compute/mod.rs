//! Compute Engine v1 client and models

mod client;
pub mod types;

pub use client::{COMPUTE_ENDPOINT, ComputeClient};
pub use types::{
    AccessConfig, Allowed, AttachedDisk, Firewall, Image, InitializeParams, Instance, Metadata,
    MetadataItem, NetworkInterface, Operation, Tags,
};
