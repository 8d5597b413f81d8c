//! Azure Resource Manager client and resource handlers.
//!
//! The [`client`] module talks to the ARM REST API. The [`handler`] module
//! maps resource configuration onto those calls and uses `azgate-wait` to
//! block until the remote provisioning state settles.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod resource_id;

pub use client::{ArmClient, ArmConfig, GatewayApi, SearchApi};
pub use config::{ConfigError, FieldKind, FieldSchema, ResourceData};
pub use error::{ArmError, Result};
pub use handler::{ResourceHandler, SearchServiceHandler, VirtualNetworkGatewayHandler, WaitSettings};
pub use resource_id::ResourceId;
