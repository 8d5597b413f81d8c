//! Search service handler.

use std::sync::Arc;

use async_trait::async_trait;
use azgate_wait::{CancellationToken, Observed, wait};
use tracing::{Instrument, debug, info, info_span, warn};

use super::{ResourceHandler, WaitSettings, ensure_unchanged, normalize_location};
use crate::client::SearchApi;
use crate::client::search::{CreateOrUpdateSearchService, SearchService, Sku};
use crate::config::{ConfigError, FieldKind, FieldSchema, ResourceData, map_value};
use crate::error::{ArmError, Result};
use crate::resource_id::ResourceId;

const KIND: &str = "search service";
const ID_SEGMENT: &str = "searchServices";

const PROVISIONING_PENDING: [&str; 1] = ["provisioning"];
const PROVISIONING_TARGET: &str = "succeeded";

pub const SEARCH_SCHEMA: &[FieldSchema] = &[
    FieldSchema::required("name", FieldKind::String).force_new(),
    FieldSchema::required("resource_group_name", FieldKind::String).force_new(),
    FieldSchema::required("location", FieldKind::String).force_new(),
    FieldSchema::required("sku", FieldKind::String),
    FieldSchema::optional("replica_count", FieldKind::Int),
    FieldSchema::optional("partition_count", FieldKind::Int),
    FieldSchema::optional("tags", FieldKind::StringMap),
    FieldSchema::computed("status", FieldKind::String),
    FieldSchema::computed("provisioning_state", FieldKind::String),
];

/// Handler for `Microsoft.Search/searchServices`.
pub struct SearchServiceHandler {
    client: Arc<dyn SearchApi>,
    settings: WaitSettings,
    cancel: CancellationToken,
}

impl SearchServiceHandler {
    pub fn new(client: Arc<dyn SearchApi>, settings: WaitSettings, cancel: CancellationToken) -> Self {
        Self {
            client,
            settings,
            cancel,
        }
    }

    async fn apply(&self, d: &mut ResourceData) -> Result<()> {
        d.validate(SEARCH_SCHEMA)?;
        let request = expand_search_service(d)?;

        info!(name = %request.name, resource_group = %request.resource_group_name, "Submitting search service");
        let resp = self.client.create_or_update_search_service(&request).await?;
        d.set_id(resp.id.ok_or(ArmError::MissingField("id"))?);

        self.wait_provisioned(&request.resource_group_name, &request.name)
            .await?;
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
                    let service = client
                        .get_search_service(&resource_group, &name)
                        .await
                        .map_err(Box::new)?;
                    let state = service
                        .properties
                        .provisioning_state
                        .clone()
                        .ok_or_else(|| Box::new(ArmError::MissingField("properties.provisioningState")))?;
                    Ok::<_, Box<ArmError>>(Observed::new(state, service))
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

    fn service_id(d: &ResourceData) -> Result<ResourceId> {
        ResourceId::parse(d.id().ok_or(ArmError::MissingId)?)
    }
}

fn count(d: &ResourceData, key: &str) -> Result<Option<u32>> {
    d.get_ok_int(key)?
        .map(|n| {
            u32::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("must be a positive integer, got {}", n),
                })
        })
        .transpose()
        .map_err(Into::into)
}

fn expand_search_service(d: &ResourceData) -> Result<CreateOrUpdateSearchService> {
    Ok(CreateOrUpdateSearchService {
        name: d.get_str("name")?.to_string(),
        resource_group_name: d.get_str("resource_group_name")?.to_string(),
        location: d.get_str("location")?.to_string(),
        tags: d.get_ok_map("tags")?.unwrap_or_default(),
        sku: Sku {
            name: d.get_str("sku")?.to_string(),
        },
        replica_count: count(d, "replica_count")?,
        partition_count: count(d, "partition_count")?,
    })
}

fn flatten_search_service(d: &mut ResourceData, id: &ResourceId, service: &SearchService) {
    let props = &service.properties;

    if let Some(name) = &service.name {
        d.set("name", name.as_str());
    }
    d.set("resource_group_name", id.resource_group.as_str());
    if let Some(location) = &service.location {
        d.set("location", location.as_str());
    }
    if let Some(sku) = &service.sku {
        d.set("sku", sku.name.as_str());
    }
    if let Some(n) = props.replica_count {
        d.set("replica_count", n);
    }
    if let Some(n) = props.partition_count {
        d.set("partition_count", n);
    }
    d.set("tags", map_value(&service.tags));
    if let Some(status) = &props.status {
        d.set("status", status.as_str());
    }
    if let Some(state) = &props.provisioning_state {
        d.set("provisioning_state", state.as_str());
    }
}

#[async_trait]
impl ResourceHandler for SearchServiceHandler {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn schema(&self) -> &'static [FieldSchema] {
        SEARCH_SCHEMA
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        self.apply(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id = Self::service_id(d)?;
        let name = id.require(ID_SEGMENT)?;

        match self.client.get_search_service(&id.resource_group, name).await {
            Ok(service) => {
                flatten_search_service(d, &id, &service);
                Ok(())
            }
            Err(ArmError::NotFound(_)) => {
                warn!(name = %name, resource_group = %id.resource_group, "Search service not found, removing from state");
                d.clear_id();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        d.validate(SEARCH_SCHEMA)?;
        let id = Self::service_id(d)?;
        let current_name = id.require(ID_SEGMENT)?;

        ensure_unchanged("name", current_name, d.get_str("name")?, |a, b| a == b)?;
        ensure_unchanged(
            "resource_group_name",
            &id.resource_group,
            d.get_str("resource_group_name")?,
            |a, b| a.eq_ignore_ascii_case(b),
        )?;

        let current = self
            .client
            .get_search_service(&id.resource_group, current_name)
            .await?;
        if let Some(location) = &current.location {
            ensure_unchanged("location", location, d.get_str("location")?, |a, b| {
                normalize_location(a) == normalize_location(b)
            })?;
        }

        self.apply(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = Self::service_id(d)?;
        let name = id.require(ID_SEGMENT)?;

        info!(name = %name, resource_group = %id.resource_group, "Deleting search service");
        match self.client.delete_search_service(&id.resource_group, name).await {
            Ok(()) => {}
            Err(ArmError::NotFound(_)) => debug!(name = %name, "Search service already gone"),
            Err(e) => return Err(e),
        }

        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand() {
        let d: ResourceData = serde_json::from_value(json!({
            "name": "search1",
            "resource_group_name": "rg",
            "location": "westeurope",
            "sku": "standard",
            "replica_count": 3,
            "tags": {"env": "prod"},
        }))
        .unwrap();

        let req = expand_search_service(&d).unwrap();
        assert_eq!(req.sku.name, "standard");
        assert_eq!(req.replica_count, Some(3));
        assert_eq!(req.partition_count, None);
        assert_eq!(req.tags["env"], "prod");
    }

    #[test]
    fn test_expand_rejects_non_positive_counts() {
        for bad in [0, -1, i64::from(u32::MAX) + 1] {
            let d: ResourceData = serde_json::from_value(json!({
                "name": "search1",
                "resource_group_name": "rg",
                "location": "westeurope",
                "sku": "standard",
                "partition_count": bad,
            }))
            .unwrap();

            assert!(
                matches!(
                    expand_search_service(&d),
                    Err(ArmError::Config(ConfigError::Invalid { ref key, .. })) if key == "partition_count"
                ),
                "partition_count = {bad}"
            );
        }
    }
}
