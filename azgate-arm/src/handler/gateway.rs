//! Virtual network gateway handler.

use std::sync::Arc;

use async_trait::async_trait;
use azgate_wait::{CancellationToken, Observed, wait};
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{ResourceHandler, WaitSettings, ensure_unchanged, normalize_location};
use crate::client::GatewayApi;
use crate::client::network::{
    AddressSpace, GatewayProperties, GatewaySku, SubResource, VirtualNetworkGateway,
    VpnClientConfiguration,
};
use crate::config::{ConfigError, FieldKind, FieldSchema, ResourceData};
use crate::error::{ArmError, Result};
use crate::resource_id::ResourceId;

const KIND: &str = "virtual network gateway";
const ID_SEGMENT: &str = "virtualNetworkGateways";

/// Provisioning states while a PUT is being applied.
const PROVISIONING_PENDING: [&str; 2] = ["Accepted", "Updating"];
const PROVISIONING_TARGET: &str = "Succeeded";

/// States seen while a DELETE is being applied.
const DELETE_PENDING: [&str; 4] = ["Deleting", "Succeeded", "Updating", "Accepted"];
/// Synthetic state reported once GET returns 404.
const DELETED: &str = "Deleted";

pub const GATEWAY_SCHEMA: &[FieldSchema] = &[
    FieldSchema::required("name", FieldKind::String).force_new(),
    FieldSchema::required("location", FieldKind::String).force_new(),
    FieldSchema::required("resource_group_name", FieldKind::String).force_new(),
    FieldSchema::required("gateway_type", FieldKind::String),
    FieldSchema::required("gateway_size", FieldKind::String),
    FieldSchema::required("bgp_enabled", FieldKind::Bool),
    FieldSchema::required("vpn_client_address_pool", FieldKind::StringSet),
    FieldSchema::optional("default_sites", FieldKind::StringSet),
    FieldSchema::computed("vip_address", FieldKind::String),
];

/// Handler for `Microsoft.Network/virtualNetworkGateways`.
pub struct VirtualNetworkGatewayHandler {
    client: Arc<dyn GatewayApi>,
    settings: WaitSettings,
    cancel: CancellationToken,
}

impl VirtualNetworkGatewayHandler {
    pub fn new(client: Arc<dyn GatewayApi>, settings: WaitSettings, cancel: CancellationToken) -> Self {
        Self {
            client,
            settings,
            cancel,
        }
    }

    /// PUT the configured gateway, wait for it to provision, then refresh.
    async fn apply(&self, d: &mut ResourceData) -> Result<()> {
        d.validate(GATEWAY_SCHEMA)?;
        let gateway = expand_gateway(d)?;
        let name = d.get_str("name")?.to_string();
        let resource_group = d.get_str("resource_group_name")?.to_string();

        info!(name = %name, resource_group = %resource_group, "Submitting virtual network gateway");
        let resp = self
            .client
            .create_or_update_gateway(&resource_group, &name, &gateway)
            .await?;
        let id = resp.id.ok_or(ArmError::MissingField("id"))?;
        d.set_id(id);

        debug!(name = %name, "Waiting for virtual network gateway to become available");
        self.wait_provisioned(&resource_group, &name).await?;

        self.read(d).await
    }

    async fn wait_provisioned(&self, resource_group: &str, name: &str) -> Result<()> {
        let spec = self.settings.spec(
            PROVISIONING_TARGET,
            PROVISIONING_PENDING,
            self.settings.create_timeout,
        )?;

        let outcome = wait(
            || {
                let client = Arc::clone(&self.client);
                let (resource_group, name) = (resource_group.to_string(), name.to_string());
                async move {
                    let gateway = client
                        .get_gateway(&resource_group, &name)
                        .await
                        .map_err(Box::new)?;
                    let state = gateway
                        .properties
                        .provisioning_state
                        .clone()
                        .ok_or_else(|| Box::new(ArmError::MissingField("properties.provisioningState")))?;
                    Ok::<_, Box<ArmError>>(Observed::new(state, gateway))
                }
            },
            &spec,
            &self.cancel,
        )
        .instrument(info_span!("wait_provisioned", name = %name, resource_group = %resource_group))
        .await;

        outcome
            .into_result()
            .map(|_| ())
            .map_err(|source| ArmError::Wait {
                kind: KIND,
                name: name.to_string(),
                resource_group: resource_group.to_string(),
                source,
            })
    }

    async fn wait_deleted(&self, resource_group: &str, name: &str) -> Result<()> {
        let spec = self
            .settings
            .spec(DELETED, DELETE_PENDING, self.settings.delete_timeout)?;

        let outcome = wait(
            || {
                let client = Arc::clone(&self.client);
                let (resource_group, name) = (resource_group.to_string(), name.to_string());
                async move {
                    match client.get_gateway(&resource_group, &name).await {
                        Ok(gateway) => {
                            let state = gateway.provisioning_state().unwrap_or("Unknown");
                            Ok(Observed::new(state, ()))
                        }
                        Err(ArmError::NotFound(_)) => Ok(Observed::new(DELETED, ())),
                        Err(e) => Err(Box::new(e)),
                    }
                }
            },
            &spec,
            &self.cancel,
        )
        .instrument(info_span!("wait_deleted", name = %name, resource_group = %resource_group))
        .await;

        outcome.into_result().map_err(|source| ArmError::Wait {
            kind: KIND,
            name: name.to_string(),
            resource_group: resource_group.to_string(),
            source,
        })
    }

    /// Public IP of the first IP configuration, if it has one.
    async fn vip_address(&self, gateway: &VirtualNetworkGateway) -> Result<Option<String>> {
        let Some(pip) = gateway
            .properties
            .ip_configurations
            .first()
            .and_then(|cfg| cfg.properties.public_ip_address.as_ref())
        else {
            return Ok(None);
        };

        match self.client.get_public_ip(&pip.id).await {
            Ok(ip) => Ok(ip.properties.ip_address),
            Err(ArmError::NotFound(_)) => {
                warn!(public_ip = %pip.id, "Public IP referenced by gateway not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn gateway_id(d: &ResourceData) -> Result<ResourceId> {
        ResourceId::parse(d.id().ok_or(ArmError::MissingId)?)
    }
}

/// Build the PUT body from configuration.
fn expand_gateway(d: &ResourceData) -> Result<VirtualNetworkGateway> {
    let size = d.get_str("gateway_size")?.to_string();
    let prefixes = d.get_set("vpn_client_address_pool")?;

    let default_site = match d.get_ok_set("default_sites")? {
        None => None,
        Some(mut sites) if sites.len() == 1 => sites.pop().map(|id| SubResource { id }),
        Some(sites) => {
            return Err(ConfigError::Invalid {
                key: "default_sites".to_string(),
                reason: format!(
                    "accepts at most one local network gateway ID, got {}",
                    sites.len()
                ),
            }
            .into());
        }
    };

    Ok(VirtualNetworkGateway {
        name: Some(d.get_str("name")?.to_string()),
        location: Some(d.get_str("location")?.to_string()),
        properties: GatewayProperties {
            gateway_type: Some(d.get_str("gateway_type")?.to_string()),
            enable_bgp: Some(d.get_bool("bgp_enabled")?),
            sku: Some(GatewaySku {
                name: size.clone(),
                tier: size,
            }),
            vpn_client_configuration: Some(VpnClientConfiguration {
                vpn_client_address_pool: Some(AddressSpace {
                    address_prefixes: prefixes,
                }),
            }),
            gateway_default_site: default_site,
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Write the remote gateway back into `d`.
fn flatten_gateway(
    d: &mut ResourceData,
    id: &ResourceId,
    gateway: &VirtualNetworkGateway,
    vip_address: Option<String>,
) {
    let props = &gateway.properties;

    if let Some(name) = &gateway.name {
        d.set("name", name.as_str());
    }
    d.set("resource_group_name", id.resource_group.as_str());
    if let Some(location) = &gateway.location {
        d.set("location", location.as_str());
    }
    if let Some(gateway_type) = &props.gateway_type {
        d.set("gateway_type", gateway_type.as_str());
    }
    if let Some(sku) = &props.sku {
        d.set("gateway_size", sku.name.as_str());
    }
    d.set("bgp_enabled", props.enable_bgp.unwrap_or(false));

    let mut prefixes = props
        .vpn_client_configuration
        .as_ref()
        .and_then(|c| c.vpn_client_address_pool.as_ref())
        .map(|pool| pool.address_prefixes.clone())
        .unwrap_or_default();
    prefixes.sort();
    prefixes.dedup();
    d.set("vpn_client_address_pool", prefixes);

    let sites: Vec<String> = props
        .gateway_default_site
        .iter()
        .map(|site| site.id.clone())
        .collect();
    d.set("default_sites", sites);

    d.set(
        "vip_address",
        vip_address.map(Value::String).unwrap_or(Value::Null),
    );
}

#[async_trait]
impl ResourceHandler for VirtualNetworkGatewayHandler {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn schema(&self) -> &'static [FieldSchema] {
        GATEWAY_SCHEMA
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        info!("Preparing arguments for virtual network gateway creation");
        self.apply(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id = Self::gateway_id(d)?;
        let name = id.require(ID_SEGMENT)?;

        let gateway = match self.client.get_gateway(&id.resource_group, name).await {
            Ok(gateway) => gateway,
            Err(ArmError::NotFound(_)) => {
                warn!(name = %name, resource_group = %id.resource_group, "Virtual network gateway not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let vip_address = self.vip_address(&gateway).await?;
        flatten_gateway(d, &id, &gateway, vip_address);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        d.validate(GATEWAY_SCHEMA)?;
        let id = Self::gateway_id(d)?;
        let current_name = id.require(ID_SEGMENT)?;

        ensure_unchanged("name", current_name, d.get_str("name")?, |a, b| a == b)?;
        ensure_unchanged(
            "resource_group_name",
            &id.resource_group,
            d.get_str("resource_group_name")?,
            |a, b| a.eq_ignore_ascii_case(b),
        )?;

        let current = self.client.get_gateway(&id.resource_group, current_name).await?;
        if let Some(location) = &current.location {
            ensure_unchanged("location", location, d.get_str("location")?, |a, b| {
                normalize_location(a) == normalize_location(b)
            })?;
        }

        info!(name = %current_name, resource_group = %id.resource_group, "Updating virtual network gateway");
        self.apply(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = Self::gateway_id(d)?;
        let name = id.require(ID_SEGMENT)?;

        info!(name = %name, resource_group = %id.resource_group, "Deleting virtual network gateway");
        match self.client.delete_gateway(&id.resource_group, name).await {
            Ok(()) => self.wait_deleted(&id.resource_group, name).await?,
            Err(ArmError::NotFound(_)) => {
                debug!(name = %name, "Virtual network gateway already gone");
            }
            Err(e) => return Err(e),
        }

        d.clear_id();
        Ok(())
    }
}
