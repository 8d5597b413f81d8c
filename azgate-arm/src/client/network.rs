//! Microsoft.Network: virtual network gateways and public IP addresses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiRequest, ArmClient, null_as_default};
use crate::error::{ArmError, Result};

pub const NETWORK_API_VERSION: &str = "2016-09-01";

/// Reference to another resource by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySku {
    pub name: String,
    pub tier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnClientConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn_client_address_pool: Option<AddressSpace>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayIpConfigurationProperties {
    #[serde(
        rename = "publicIPAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_ip_address: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
    #[serde(
        rename = "privateIPAllocationMethod",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub private_ip_allocation_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIpConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: GatewayIpConfigurationProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    /// `Vpn` or `ExpressRoute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_bgp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<GatewaySku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn_client_configuration: Option<VpnClientConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_default_site: Option<SubResource>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ip_configurations: Vec<GatewayIpConfiguration>,
    /// Read-only; never sent.
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub tags: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: GatewayProperties,
}

impl VirtualNetworkGateway {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddressProperties {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublicIpAddress {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: PublicIpAddressProperties,
}

fn gateway_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworkGateways/{}",
        subscription_id, resource_group, name
    )
}

pub struct CreateOrUpdateVirtualNetworkGateway<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
    pub gateway: &'a VirtualNetworkGateway,
}

impl ApiRequest for CreateOrUpdateVirtualNetworkGateway<'_> {
    type Response = VirtualNetworkGateway;

    const API_VERSION: &'static str = NETWORK_API_VERSION;
    const METHOD: Method = Method::PUT;

    fn url_path(&self, subscription_id: &str) -> String {
        gateway_path(subscription_id, self.resource_group, self.name)
    }

    fn body(&self) -> Result<Option<Value>> {
        serde_json::to_value(self.gateway)
            .map(Some)
            .map_err(ArmError::Encode)
    }
}

pub struct GetVirtualNetworkGateway<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
}

impl ApiRequest for GetVirtualNetworkGateway<'_> {
    type Response = VirtualNetworkGateway;

    const API_VERSION: &'static str = NETWORK_API_VERSION;
    const METHOD: Method = Method::GET;

    fn url_path(&self, subscription_id: &str) -> String {
        gateway_path(subscription_id, self.resource_group, self.name)
    }
}

pub struct DeleteVirtualNetworkGateway<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
}

impl ApiRequest for DeleteVirtualNetworkGateway<'_> {
    type Response = IgnoredAny;

    const API_VERSION: &'static str = NETWORK_API_VERSION;
    const METHOD: Method = Method::DELETE;

    fn url_path(&self, subscription_id: &str) -> String {
        gateway_path(subscription_id, self.resource_group, self.name)
    }
}

/// GET a public IP by its full resource ID.
pub struct GetPublicIpAddress<'a> {
    pub id: &'a str,
}

impl ApiRequest for GetPublicIpAddress<'_> {
    type Response = PublicIpAddress;

    const API_VERSION: &'static str = NETWORK_API_VERSION;
    const METHOD: Method = Method::GET;

    fn url_path(&self, _subscription_id: &str) -> String {
        self.id.to_string()
    }
}

/// Virtual network gateway operations used by the gateway handler.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn create_or_update_gateway(
        &self,
        resource_group: &str,
        name: &str,
        gateway: &VirtualNetworkGateway,
    ) -> Result<VirtualNetworkGateway>;

    async fn get_gateway(&self, resource_group: &str, name: &str) -> Result<VirtualNetworkGateway>;

    async fn delete_gateway(&self, resource_group: &str, name: &str) -> Result<()>;

    async fn get_public_ip(&self, id: &str) -> Result<PublicIpAddress>;
}

#[async_trait]
impl GatewayApi for ArmClient {
    async fn create_or_update_gateway(
        &self,
        resource_group: &str,
        name: &str,
        gateway: &VirtualNetworkGateway,
    ) -> Result<VirtualNetworkGateway> {
        self.send(&CreateOrUpdateVirtualNetworkGateway {
            resource_group,
            name,
            gateway,
        })
        .await
    }

    async fn get_gateway(&self, resource_group: &str, name: &str) -> Result<VirtualNetworkGateway> {
        self.send(&GetVirtualNetworkGateway {
            resource_group,
            name,
        })
        .await
    }

    async fn delete_gateway(&self, resource_group: &str, name: &str) -> Result<()> {
        self.send(&DeleteVirtualNetworkGateway {
            resource_group,
            name,
        })
        .await?;
        Ok(())
    }

    async fn get_public_ip(&self, id: &str) -> Result<PublicIpAddress> {
        self.send(&GetPublicIpAddress { id }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gateway_body_shape() {
        let gateway = VirtualNetworkGateway {
            name: Some("gw1".to_string()),
            location: Some("westeurope".to_string()),
            properties: GatewayProperties {
                gateway_type: Some("Vpn".to_string()),
                enable_bgp: Some(false),
                sku: Some(GatewaySku {
                    name: "Basic".to_string(),
                    tier: "Basic".to_string(),
                }),
                vpn_client_configuration: Some(VpnClientConfiguration {
                    vpn_client_address_pool: Some(AddressSpace {
                        address_prefixes: vec!["172.16.0.0/24".to_string()],
                    }),
                }),
                provisioning_state: Some("Succeeded".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let body = CreateOrUpdateVirtualNetworkGateway {
            resource_group: "rg",
            name: "gw1",
            gateway: &gateway,
        }
        .body()
        .unwrap()
        .unwrap();

        assert_eq!(
            body,
            json!({
                "name": "gw1",
                "location": "westeurope",
                "properties": {
                    "gatewayType": "Vpn",
                    "enableBgp": false,
                    "sku": {"name": "Basic", "tier": "Basic"},
                    "vpnClientConfiguration": {
                        "vpnClientAddressPool": {"addressPrefixes": ["172.16.0.0/24"]}
                    }
                }
            })
        );
    }

    #[test]
    fn test_gateway_response_decoding() {
        let gateway: VirtualNetworkGateway = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworkGateways/gw1",
            "name": "gw1",
            "location": "westeurope",
            "properties": {
                "provisioningState": "Updating",
                "gatewayType": "Vpn",
                "ipConfigurations": [{
                    "name": "default",
                    "properties": {
                        "publicIPAddress": {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/pip"},
                        "privateIPAllocationMethod": "Dynamic"
                    }
                }],
                "gatewayDefaultSite": {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/localNetworkGateways/site"}
            }
        }))
        .unwrap();

        assert_eq!(gateway.provisioning_state(), Some("Updating"));
        assert_eq!(gateway.properties.ip_configurations.len(), 1);
        assert!(
            gateway.properties.ip_configurations[0]
                .properties
                .public_ip_address
                .as_ref()
                .unwrap()
                .id
                .ends_with("/publicIPAddresses/pip")
        );
        assert!(gateway.properties.gateway_default_site.is_some());
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let gateway: VirtualNetworkGateway = serde_json::from_value(json!({
            "name": "gw1",
            "tags": null,
            "properties": {
                "provisioningState": "Succeeded",
                "ipConfigurations": null,
                "vpnClientConfiguration": {
                    "vpnClientAddressPool": {"addressPrefixes": null}
                }
            }
        }))
        .unwrap();

        assert!(gateway.tags.is_empty());
        assert!(gateway.properties.ip_configurations.is_empty());
        assert_eq!(gateway.provisioning_state(), Some("Succeeded"));
        assert_eq!(
            gateway
                .properties
                .vpn_client_configuration
                .and_then(|c| c.vpn_client_address_pool)
                .map(|pool| pool.address_prefixes),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_paths() {
        let get = GetVirtualNetworkGateway {
            resource_group: "rg",
            name: "gw1",
        };
        assert_eq!(
            get.url_path("sub"),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworkGateways/gw1"
        );

        let pip = GetPublicIpAddress {
            id: "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/pip",
        };
        assert_eq!(pip.url_path("ignored"), pip.id);
    }
}
