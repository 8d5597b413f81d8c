//! Microsoft.Search: search services.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ApiRequest, ArmClient, null_as_default};
use crate::error::Result;

pub const SEARCH_API_VERSION: &str = "2015-02-28";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
}

/// PUT request creating or updating a search service.
///
/// Name and resource group go into the URL. Location, tags and SKU are
/// top-level envelope fields; replica and partition counts go under
/// `properties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrUpdateSearchService {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub sku: Sku,
    pub replica_count: Option<u32>,
    pub partition_count: Option<u32>,
}

impl ApiRequest for CreateOrUpdateSearchService {
    type Response = SearchService;

    const API_VERSION: &'static str = SEARCH_API_VERSION;
    const METHOD: Method = Method::PUT;

    fn url_path(&self, subscription_id: &str) -> String {
        search_service_path(subscription_id, &self.resource_group_name, &self.name)
    }

    fn body(&self) -> Result<Option<Value>> {
        let mut properties = Map::new();
        if let Some(count) = self.replica_count {
            properties.insert("replicaCount".to_string(), count.into());
        }
        if let Some(count) = self.partition_count {
            properties.insert("partitionCount".to_string(), count.into());
        }

        let mut body = json!({
            "location": self.location,
            "sku": self.sku,
            "properties": properties,
        });
        if !self.tags.is_empty() {
            body["tags"] = json!(self.tags);
        }
        Ok(Some(body))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchServiceProperties {
    #[serde(default)]
    pub replica_count: Option<u32>,
    #[serde(default)]
    pub partition_count: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_details: Option<String>,
    /// `provisioning`, `succeeded` or `failed`.
    #[serde(default, alias = "provisioningStatus")]
    pub provisioning_state: Option<String>,
}

/// Search service as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchService {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: SearchServiceProperties,
}

impl SearchService {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }
}

fn search_service_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Search/searchServices/{}",
        subscription_id, resource_group, name
    )
}

pub struct GetSearchService<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
}

impl ApiRequest for GetSearchService<'_> {
    type Response = SearchService;

    const API_VERSION: &'static str = SEARCH_API_VERSION;
    const METHOD: Method = Method::GET;

    fn url_path(&self, subscription_id: &str) -> String {
        search_service_path(subscription_id, self.resource_group, self.name)
    }
}

pub struct DeleteSearchService<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
}

impl ApiRequest for DeleteSearchService<'_> {
    type Response = IgnoredAny;

    const API_VERSION: &'static str = SEARCH_API_VERSION;
    const METHOD: Method = Method::DELETE;

    fn url_path(&self, subscription_id: &str) -> String {
        search_service_path(subscription_id, self.resource_group, self.name)
    }
}

/// Search service operations used by the search handler.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn create_or_update_search_service(
        &self,
        request: &CreateOrUpdateSearchService,
    ) -> Result<SearchService>;

    async fn get_search_service(&self, resource_group: &str, name: &str) -> Result<SearchService>;

    async fn delete_search_service(&self, resource_group: &str, name: &str) -> Result<()>;
}

#[async_trait]
impl SearchApi for ArmClient {
    async fn create_or_update_search_service(
        &self,
        request: &CreateOrUpdateSearchService,
    ) -> Result<SearchService> {
        self.send(request).await
    }

    async fn get_search_service(&self, resource_group: &str, name: &str) -> Result<SearchService> {
        self.send(&GetSearchService {
            resource_group,
            name,
        })
        .await
    }

    async fn delete_search_service(&self, resource_group: &str, name: &str) -> Result<()> {
        self.send(&DeleteSearchService {
            resource_group,
            name,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrUpdateSearchService {
        CreateOrUpdateSearchService {
            name: "search1".to_string(),
            resource_group_name: "rg".to_string(),
            location: "westeurope".to_string(),
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            sku: Sku {
                name: "standard".to_string(),
            },
            replica_count: Some(2),
            partition_count: None,
        }
    }

    #[test]
    fn test_request_envelope() {
        let req = request();
        assert_eq!(
            req.url_path("sub"),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Search/searchServices/search1"
        );
        assert_eq!(
            req.body().unwrap().unwrap(),
            json!({
                "location": "westeurope",
                "tags": {"env": "prod"},
                "sku": {"name": "standard"},
                "properties": {"replicaCount": 2}
            })
        );
    }

    #[test]
    fn test_request_without_tags_or_counts() {
        let req = CreateOrUpdateSearchService {
            tags: BTreeMap::new(),
            replica_count: None,
            ..request()
        };
        let body = req.body().unwrap().unwrap();
        assert!(body.get("tags").is_none());
        assert_eq!(body["properties"], json!({}));
    }

    #[test]
    fn test_response_decoding() {
        let svc: SearchService = serde_json::from_value(json!({
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Search/searchServices/search1",
            "name": "search1",
            "location": "West Europe",
            "tags": {"env": "prod"},
            "sku": {"name": "standard"},
            "properties": {
                "replicaCount": 2,
                "partitionCount": 1,
                "status": "provisioning",
                "statusDetails": "",
                "provisioningState": "provisioning"
            }
        }))
        .unwrap();

        assert_eq!(svc.provisioning_state(), Some("provisioning"));
        assert_eq!(svc.properties.replica_count, Some(2));
        assert_eq!(svc.sku.unwrap().name, "standard");
    }

    #[test]
    fn test_legacy_provisioning_status_field() {
        let svc: SearchService = serde_json::from_value(json!({
            "name": "search1",
            "properties": {"provisioningStatus": "succeeded"}
        }))
        .unwrap();
        assert_eq!(svc.provisioning_state(), Some("succeeded"));
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let svc: SearchService = serde_json::from_value(json!({
            "name": "s1",
            "tags": null,
            "properties": {"provisioningState": "succeeded"}
        }))
        .unwrap();
        assert!(svc.tags.is_empty());
        assert_eq!(svc.provisioning_state(), Some("succeeded"));

        let svc: SearchService =
            serde_json::from_value(json!({"name": "s1", "properties": null})).unwrap();
        assert_eq!(svc.provisioning_state(), None);
    }
}
