//! CRUD client for one resource kind

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::path;
use super::request::ApiRequest;
use super::transport::HttpTransport;
use crate::codec::{compute_mask, overlay};
use crate::model::{ARCHIVED_STATUS, ENTITY_STATUS_FIELD, Resource, ResourceKind};

/// What an update actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A PATCH was sent with this mask
    Updated { mask: String },
    /// Nothing differed from the server state, no request was sent
    Unchanged,
}

/// Stateless client for the collection of one resource kind
///
/// URIs come from the kind's templates: parameter values are URL-encoded and
/// substituted, and a request is never sent while a placeholder remains.
#[derive(Clone)]
pub struct ResourceClient {
    kind: ResourceKind,
    transport: Arc<dyn HttpTransport>,
    filter: Option<String>,
}

impl ResourceClient {
    pub fn new(kind: ResourceKind, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            kind,
            transport,
            filter: None,
        }
    }

    /// Static filter expression (`key=value[ AND key=value]*`) applied to list calls
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.trim().is_empty());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// List every entity of the collection, following page tokens
    pub async fn list(&self, params: &HashMap<String, String>) -> Result<Vec<Resource>> {
        let uri = self.list_uri(params);
        ensure_resolved(&uri)?;
        log::debug!("Listing {} from {}", self.kind, uri);

        let raw = fetch_all_pages(self.transport.as_ref(), &uri, self.kind.list_field())
            .await
            .with_context(|| format!("Failed to list {} entities", self.kind))?;

        let resources = raw
            .into_iter()
            .map(|value| Resource::from_json(self.kind, value))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Listed {} {} entities", resources.len(), self.kind);
        Ok(resources)
    }

    /// Fetch one entity addressed by `params` (parent ids plus the identifier)
    pub async fn get(&self, params: &HashMap<String, String>) -> Result<Resource> {
        let uri = self.single_uri(params);
        ensure_resolved(&uri)?;
        log::debug!("Fetching {} {}", self.kind, uri);

        let response = self.transport.send(ApiRequest::get(&uri)).await?;
        Resource::from_json(self.kind, response)
    }

    /// Create `entity`, ignoring any identifier it carries
    pub async fn create(&self, entity: &Resource) -> Result<Resource> {
        self.ensure_writable("create")?;

        let mut payload = entity.clone();
        payload.remove(self.kind.id_field());

        let uri = path::resolve(self.kind.collection_template(), &encoded(&payload.params()));
        ensure_resolved(&uri)?;
        log::debug!("Creating {} at {}", self.kind, uri);

        let response = self
            .transport
            .send(ApiRequest::post(&uri, payload.into_json()))
            .await?;
        let created = Resource::from_json(self.kind, response)?;
        log::info!(
            "Created {} {}",
            self.kind,
            created.id().unwrap_or_else(|| "(no id returned)".to_string())
        );
        Ok(created)
    }

    /// Update `entity`, returning the server state afterwards
    pub async fn update(&self, entity: &Resource) -> Result<Resource> {
        Ok(self.update_with_outcome(entity).await?.0)
    }

    /// Update `entity` with a mask of the fields that differ from the server
    ///
    /// The body is the fetched original with `entity` overlaid, so nested
    /// fields the entity leaves out keep their server values. When nothing
    /// differs the original is returned and no PATCH is sent.
    pub async fn update_with_outcome(&self, entity: &Resource) -> Result<(Resource, UpdateOutcome)> {
        self.ensure_writable("update")?;
        let id = self.require_id(entity)?;

        let original = self
            .get(&entity.params())
            .await
            .with_context(|| format!("Failed to fetch current state of {} {}", self.kind, id))?;

        let mask = compute_mask(&original, entity);
        if mask.is_empty() {
            log::info!("{} {} unchanged, skipping update", self.kind, id);
            return Ok((original, UpdateOutcome::Unchanged));
        }

        let uri = path::append_query(
            &self.single_uri(&entity.params()),
            &format!("updateMask={}", urlencoding::encode(&mask)),
        );
        log::debug!("Updating {} {} with mask {}", self.kind, id, mask);

        let response = self
            .transport
            .send(ApiRequest::patch(&uri, overlay(&original, entity).into_json()))
            .await?;
        let updated = Resource::from_json(self.kind, response)?;
        log::info!("Updated {} {} ({})", self.kind, id, mask);
        Ok((updated, UpdateOutcome::Updated { mask }))
    }

    /// Archive `entity`, then delete it
    ///
    /// The two calls are not atomic: when the DELETE fails the entity stays
    /// archived.
    pub async fn delete(&self, entity: &Resource) -> Result<()> {
        self.ensure_writable("delete")?;
        let id = self.require_id(entity)?;

        let mut archived = entity.clone();
        archived.set(ENTITY_STATUS_FIELD, Value::String(ARCHIVED_STATUS.to_string()));
        self.update(&archived)
            .await
            .with_context(|| format!("Failed to archive {} {}", self.kind, id))?;

        let uri = self.single_uri(&entity.params());
        ensure_resolved(&uri)?;
        self.transport.send(ApiRequest::delete(&uri)).await?;
        log::info!("Deleted {} {}", self.kind, id);
        Ok(())
    }

    fn list_uri(&self, params: &HashMap<String, String>) -> String {
        let params_encoded = encoded(params);
        let mut uri = path::resolve(self.kind.collection_template(), &params_encoded);

        if let Some(query) = self.kind.list_query_template() {
            uri = path::append_query(&uri, &path::resolve(query, &params_encoded));
        }
        if let Some(filter) = &self.filter {
            let filter = path::resolve(filter, params);
            uri = path::append_query(&uri, &format!("filter={}", urlencoding::encode(&filter)));
        }
        uri
    }

    fn single_uri(&self, params: &HashMap<String, String>) -> String {
        path::resolve(&self.kind.single_template(), &encoded(params))
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if !self.kind.is_writable() {
            bail!("Cannot {} {}: the collection is read-only", operation, self.kind);
        }
        Ok(())
    }

    fn require_id(&self, entity: &Resource) -> Result<String> {
        entity
            .id()
            .with_context(|| format!("{} has no {}", self.kind, self.kind.id_field()))
    }
}

/// GET `uri` and every following page, concatenating `list_field` arrays
///
/// Stops when `nextPageToken` is absent or empty, or once the transport's
/// page limit is reached.
pub async fn fetch_all_pages(
    transport: &dyn HttpTransport,
    uri: &str,
    list_field: &str,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page_uri = match &page_token {
            Some(token) => path::append_query(uri, &format!("pageToken={}", urlencoding::encode(token))),
            None => uri.to_string(),
        };

        let mut response = transport.send(ApiRequest::get(&page_uri)).await?;
        pages += 1;

        match response.get_mut(list_field).map(Value::take) {
            Some(Value::Array(page)) => items.extend(page),
            Some(Value::Null) | None => {}
            Some(other) => bail!("Expected '{}' to be an array, got {}", list_field, other),
        }

        page_token = response
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        if page_token.is_none() {
            break;
        }
        if let Some(limit) = transport.page_limit()
            && pages >= limit
        {
            log::warn!("Stopped listing {} after {} pages (page limit)", uri, pages);
            break;
        }
    }

    log::debug!("Fetched {} items in {} page(s) from {}", items.len(), pages, uri);
    Ok(items)
}

/// Refuse URIs that still contain `${...}`
pub fn ensure_resolved(uri: &str) -> Result<()> {
    let missing = path::placeholders(uri);
    if !missing.is_empty() {
        bail!(
            "Missing parameter(s) {} for {}",
            missing.join(", "),
            uri
        );
    }
    Ok(())
}

fn encoded(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), urlencoding::encode(value).into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::api::mock::MockTransport;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn client(kind: ResourceKind, mock: &Arc<MockTransport>) -> ResourceClient {
        ResourceClient::new(kind, mock.clone())
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens_in_order() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"campaigns": [{"campaignId": "1"}], "nextPageToken": "p2"}))
            .respond(json!({"campaigns": [{"campaignId": "2"}, {"campaignId": "3"}], "nextPageToken": "p3"}))
            .respond(json!({"campaigns": [{"campaignId": "4"}]}));

        let listed = client(ResourceKind::Campaign, &mock)
            .list(&params(&[("advertiserId", "10")]))
            .await
            .unwrap();

        let ids: Vec<String> = listed.iter().filter_map(Resource::id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(
            mock.calls(),
            vec![
                "GET advertisers/10/campaigns",
                "GET advertisers/10/campaigns?pageToken=p2",
                "GET advertisers/10/campaigns?pageToken=p3",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_respects_page_limit() {
        let mock = Arc::new(MockTransport::new().with_page_limit(1));
        mock.respond(json!({"campaigns": [{"campaignId": "1"}], "nextPageToken": "p2"}));

        let listed = client(ResourceKind::Campaign, &mock)
            .list(&params(&[("advertiserId", "10")]))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_list_empty_collection() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({}));

        let listed = client(ResourceKind::LineItem, &mock)
            .list(&params(&[("advertiserId", "10")]))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_list_query_and_filter() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertisers": []}));

        client(ResourceKind::Advertiser, &mock)
            .with_filter(Some("entityStatus=${status}".to_string()))
            .list(&params(&[("partnerId", "5"), ("status", "ENTITY_STATUS_ACTIVE")]))
            .await
            .unwrap();

        assert_eq!(
            mock.calls(),
            vec!["GET advertisers?partnerId=5&filter=entityStatus%3DENTITY_STATUS_ACTIVE"]
        );
    }

    #[tokio::test]
    async fn test_unresolved_uri_is_never_sent() {
        let mock = Arc::new(MockTransport::new());
        let error = client(ResourceKind::Campaign, &mock)
            .list(&HashMap::new())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("advertiserId"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_parameter_values_are_encoded() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"campaignId": "a/b"}));

        client(ResourceKind::Campaign, &mock)
            .get(&params(&[("advertiserId", "1"), ("campaignId", "a/b")]))
            .await
            .unwrap();
        assert_eq!(mock.calls(), vec!["GET advertisers/1/campaigns/a%2Fb"]);
    }

    #[tokio::test]
    async fn test_create_strips_identifier() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertiserId": "1", "campaignId": "77", "displayName": "New"}));

        let entity = Resource::from_json(
            ResourceKind::Campaign,
            json!({"advertiserId": "1", "campaignId": "stale", "displayName": "New"}),
        )
        .unwrap();
        let created = client(ResourceKind::Campaign, &mock).create(&entity).await.unwrap();

        assert_eq!(created.id().as_deref(), Some("77"));
        let requests = mock.requests();
        assert_eq!(requests[0].uri(), "advertisers/1/campaigns");
        assert_eq!(
            requests[0].body(),
            Some(&json!({"advertiserId": "1", "displayName": "New"}))
        );
    }

    #[tokio::test]
    async fn test_update_without_changes_sends_no_patch() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertiserId": "1", "campaignId": "7", "displayName": "Same", "updateTime": "t"}));

        let entity = Resource::from_json(
            ResourceKind::Campaign,
            json!({"advertiserId": "1", "campaignId": "7", "displayName": "Same"}),
        )
        .unwrap();
        let (result, outcome) = client(ResourceKind::Campaign, &mock)
            .update_with_outcome(&entity)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Unchanged);
        assert_eq!(result.get("updateTime"), Some(&json!("t")));
        assert_eq!(mock.calls(), vec!["GET advertisers/1/campaigns/7"]);
    }

    #[tokio::test]
    async fn test_update_patches_with_mask() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertiserId": "1", "campaignId": "7", "displayName": "Old", "entityStatus": "ENTITY_STATUS_ACTIVE"}))
            .respond(json!({"advertiserId": "1", "campaignId": "7", "displayName": "New", "entityStatus": "ENTITY_STATUS_PAUSED"}));

        let entity = Resource::from_json(
            ResourceKind::Campaign,
            json!({"advertiserId": "1", "campaignId": "7", "displayName": "New", "entityStatus": "ENTITY_STATUS_PAUSED"}),
        )
        .unwrap();
        let (updated, outcome) = client(ResourceKind::Campaign, &mock)
            .update_with_outcome(&entity)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                mask: "displayName,entityStatus".to_string()
            }
        );
        assert_eq!(updated.get("displayName"), Some(&json!("New")));
        assert_eq!(
            mock.calls()[1],
            "PATCH advertisers/1/campaigns/7?updateMask=displayName%2CentityStatus"
        );
        assert_eq!(mock.requests()[1].body(), Some(&entity.to_json()));
    }

    #[tokio::test]
    async fn test_update_of_nested_leaf_sends_merged_object() {
        let mock = Arc::new(MockTransport::new());
        let server = json!({
            "advertiserId": "1",
            "lineItemId": "9",
            "flight": {
                "flightDateType": "LINE_ITEM_FLIGHT_DATE_TYPE_CUSTOM",
                "dateRange": {
                    "startDate": {"year": 2024, "month": 1, "day": 5},
                    "endDate": {"year": 2024, "month": 3, "day": 31}
                }
            }
        });
        mock.respond(server.clone()).respond(server);

        let entity = Resource::from_json(
            ResourceKind::LineItem,
            json!({
                "advertiserId": "1",
                "lineItemId": "9",
                "flight": {"dateRange": {"endDate": {"year": 2024, "month": 4, "day": 30}}}
            }),
        )
        .unwrap();
        let (_, outcome) = client(ResourceKind::LineItem, &mock)
            .update_with_outcome(&entity)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Updated { mask: "flight".to_string() });
        let body = mock.requests()[1].body().cloned().unwrap();
        assert_eq!(body["flight"]["flightDateType"], "LINE_ITEM_FLIGHT_DATE_TYPE_CUSTOM");
        assert_eq!(body["flight"]["dateRange"]["startDate"], json!({"year": 2024, "month": 1, "day": 5}));
        assert_eq!(body["flight"]["dateRange"]["endDate"], json!({"year": 2024, "month": 4, "day": 30}));
    }

    #[tokio::test]
    async fn test_update_requires_identifier() {
        let mock = Arc::new(MockTransport::new());
        let entity =
            Resource::from_json(ResourceKind::Campaign, json!({"advertiserId": "1"})).unwrap();

        let error = client(ResourceKind::Campaign, &mock).update(&entity).await.unwrap_err();
        assert!(error.to_string().contains("campaignId"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_delete_archives_then_deletes() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertiserId": "1", "lineItemId": "55", "entityStatus": "ENTITY_STATUS_PAUSED"}))
            .respond(json!({"advertiserId": "1", "lineItemId": "55", "entityStatus": "ENTITY_STATUS_ARCHIVED"}))
            .respond(json!({}));

        let entity = Resource::from_json(
            ResourceKind::LineItem,
            json!({"advertiserId": "1", "lineItemId": "55"}),
        )
        .unwrap();
        client(ResourceKind::LineItem, &mock).delete(&entity).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                "GET advertisers/1/lineItems/55",
                "PATCH advertisers/1/lineItems/55?updateMask=entityStatus",
                "DELETE advertisers/1/lineItems/55",
            ]
        );
        assert_eq!(
            mock.requests()[1].body().and_then(|b| b.get("entityStatus")),
            Some(&json!("ENTITY_STATUS_ARCHIVED"))
        );
    }

    #[tokio::test]
    async fn test_delete_failure_propagates_api_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(json!({"advertiserId": "1", "lineItemId": "55", "entityStatus": "ENTITY_STATUS_ARCHIVED"}))
            .fail(403, r#"{"error": {"message": "Permission denied"}}"#);

        let entity = Resource::from_json(
            ResourceKind::LineItem,
            json!({"advertiserId": "1", "lineItemId": "55"}),
        )
        .unwrap();
        let error = client(ResourceKind::LineItem, &mock).delete(&entity).await.unwrap_err();

        let api = error.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 403);
        assert_eq!(api.method, "DELETE");
        assert!(error.to_string().contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_read_only_kind_rejects_writes() {
        let mock = Arc::new(MockTransport::new());
        let entity = Resource::from_json(
            ResourceKind::TargetingOption,
            json!({"targetingType": "TARGETING_TYPE_BROWSER"}),
        )
        .unwrap();

        let error = client(ResourceKind::TargetingOption, &mock)
            .create(&entity)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("read-only"));
        assert!(mock.requests().is_empty());
    }
}
