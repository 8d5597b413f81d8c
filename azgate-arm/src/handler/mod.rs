//! Resource handlers.
//!
//! Each handler maps one resource's configuration schema onto the ARM
//! create / read / update / delete calls, and waits for the remote
//! provisioning state to settle after every mutation.

pub mod gateway;
pub mod search;

pub use gateway::VirtualNetworkGatewayHandler;
pub use search::SearchServiceHandler;

use std::time::Duration;

use async_trait::async_trait;
use azgate_wait::{Backoff, DEFAULT_TIMEOUT, WaitSpec};

use crate::config::{FieldSchema, ResourceData};
use crate::error::{ArmError, Result};

/// Trait for resource handlers.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Human-readable resource kind for logs and errors.
    fn kind(&self) -> &'static str;

    fn schema(&self) -> &'static [FieldSchema];

    /// Create the resource and wait until it is provisioned.
    async fn create(&self, d: &mut ResourceData) -> Result<()>;

    /// Refresh `d` from the remote resource. Clears the ID if it is gone.
    async fn read(&self, d: &mut ResourceData) -> Result<()>;

    /// Apply changed fields in place and wait until provisioned.
    async fn update(&self, d: &mut ResourceData) -> Result<()>;

    /// Delete the resource and clear the ID.
    async fn delete(&self, d: &mut ResourceData) -> Result<()>;
}

/// Timeouts and poll policy for waiting on provisioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitSettings {
    pub create_timeout: Duration,
    pub delete_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            create_timeout: DEFAULT_TIMEOUT,
            delete_timeout: DEFAULT_TIMEOUT,
            backoff: Backoff::exponential(Duration::from_secs(2), 2.0, Duration::from_secs(30)),
        }
    }
}

impl WaitSettings {
    fn spec<const N: usize>(
        &self,
        target: &str,
        pending: [&str; N],
        timeout: Duration,
    ) -> Result<WaitSpec> {
        Ok(WaitSpec::builder(target)
            .pending(pending)
            .timeout(timeout)
            .backoff(self.backoff)
            .build()?)
    }
}

/// Normalize an Azure location: "West Europe" and "westeurope" are the same.
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Reject a change to a force-new field.
fn ensure_unchanged(
    field: &'static str,
    current: &str,
    desired: &str,
    same: impl Fn(&str, &str) -> bool,
) -> Result<()> {
    if same(current, desired) {
        Ok(())
    } else {
        Err(ArmError::RequiresReplacement {
            field,
            current: current.to_string(),
            desired: desired.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("westeurope"), "westeurope");
        assert_eq!(normalize_location("East US 2"), "eastus2");
    }

    #[test]
    fn test_ensure_unchanged() {
        ensure_unchanged("resource_group_name", "Net-RG", "net-rg", |a, b| {
            a.eq_ignore_ascii_case(b)
        })
        .unwrap();

        let err = ensure_unchanged("name", "gw1", "gw2", |a, b| a == b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "changing 'name' from 'gw1' to 'gw2' requires replacing the resource"
        );
    }

    #[test]
    fn test_default_settings_build_valid_specs() {
        let settings = WaitSettings::default();
        let spec = settings
            .spec("Succeeded", ["Accepted", "Updating"], settings.create_timeout)
            .unwrap();
        assert_eq!(spec.timeout(), Duration::from_secs(600));
        assert_eq!(spec.backoff().initial(), Duration::from_secs(2));
    }
}
