//! Azure resource ID parsing.
//!
//! IDs look like
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}`,
//! optionally followed by more `{type}/{name}` pairs for child resources.

use std::fmt;

use crate::error::{ArmError, Result};

/// A parsed Azure resource ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: Option<String>,
    /// Remaining `type -> name` pairs in order.
    pub path: Vec<(String, String)>,
}

impl ResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            provider: Some(provider.into()),
            path: Vec::new(),
        }
    }

    /// Append a `type/name` segment.
    pub fn with(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.path.push((kind.into(), name.into()));
        self
    }

    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| ArmError::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let rest = id
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        let components: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        if components.len() % 2 != 0 {
            return Err(invalid("number of path segments is not divisible by 2"));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = Vec::new();

        for pair in components.chunks_exact(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(invalid("contains an empty segment"));
            }
            match key {
                "subscriptions" if subscription_id.is_none() => {
                    subscription_id = Some(value.to_string())
                }
                // Some APIs return the key in lower case.
                "resourceGroups" | "resourcegroups" if resource_group.is_none() => {
                    resource_group = Some(value.to_string())
                }
                "providers" if provider.is_none() => provider = Some(value.to_string()),
                _ => path.push((key.to_string(), value.to_string())),
            }
        }

        Ok(Self {
            subscription_id: subscription_id.ok_or_else(|| invalid("no subscription ID"))?,
            resource_group: resource_group.ok_or_else(|| invalid("no resource group name"))?,
            provider,
            path,
        })
    }

    /// Name stored under `kind`, e.g. `get("virtualNetworkGateways")`.
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get) but missing segments are an error.
    pub fn require(&self, kind: &str) -> Result<&str> {
        self.get(kind).ok_or_else(|| ArmError::InvalidResourceId {
            id: self.to_string(),
            reason: format!("no '{}' segment", kind),
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (kind, name) in &self.path {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAY_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/net-rg/providers/Microsoft.Network/virtualNetworkGateways/gw1";

    #[test]
    fn test_parse_gateway_id() {
        let id = ResourceId::parse(GATEWAY_ID).unwrap();
        assert_eq!(id.subscription_id, "00000000-0000-0000-0000-000000000000");
        assert_eq!(id.resource_group, "net-rg");
        assert_eq!(id.provider.as_deref(), Some("Microsoft.Network"));
        assert_eq!(id.get("virtualNetworkGateways"), Some("gw1"));
        assert_eq!(id.require("virtualNetworkGateways").unwrap(), "gw1");
        assert_eq!(id.to_string(), GATEWAY_ID);
    }

    #[test]
    fn test_parse_child_resource() {
        let id = ResourceId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/GatewaySubnet",
        )
        .unwrap();
        assert_eq!(id.get("virtualNetworks"), Some("vnet"));
        assert_eq!(id.get("subnets"), Some("GatewaySubnet"));
        assert_eq!(id.path.len(), 2);
    }

    #[test]
    fn test_parse_lowercase_resource_groups() {
        let id = ResourceId::parse(
            "/subscriptions/sub/resourcegroups/rg/providers/Microsoft.Search/searchServices/s1",
        )
        .unwrap();
        assert_eq!(id.resource_group, "rg");
        assert_eq!(id.get("searchServices"), Some("s1"));
    }

    #[test]
    fn test_parse_trailing_slash() {
        let id = ResourceId::parse(&format!("{}/", GATEWAY_ID)).unwrap();
        assert_eq!(id.get("virtualNetworkGateways"), Some("gw1"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "subscriptions/sub/resourceGroups/rg",
            "/subscriptions/sub/resourceGroups",
            "/subscriptions/sub/providers/Microsoft.Network",
            "/resourceGroups/rg/providers/Microsoft.Network",
            "/subscriptions//resourceGroups/rg",
            "",
        ] {
            assert!(
                matches!(
                    ResourceId::parse(bad),
                    Err(ArmError::InvalidResourceId { .. })
                ),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_require_missing_segment() {
        let id = ResourceId::parse(GATEWAY_ID).unwrap();
        let err = id.require("searchServices").unwrap_err();
        assert!(err.to_string().contains("no 'searchServices' segment"));
    }

    #[test]
    fn test_build_and_display() {
        let id = ResourceId::new("sub", "rg", "Microsoft.Search").with("searchServices", "s1");
        assert_eq!(
            id.to_string(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Search/searchServices/s1"
        );
        assert_eq!(ResourceId::parse(&id.to_string()).unwrap(), id);
    }
}
