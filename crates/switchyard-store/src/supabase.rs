//! Supabase backend: the three tables through PostgREST.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use switchyard_core::{Bundle, McpRecord, NewBundle, NewRoute, Route};
use tracing::debug;

use crate::{in_request_order, Store, StoreError};

const MCP: &str = "mcp";
const BUNDLES: &str = "bundles";
const ROUTE: &str = "route";

/// PostgREST client authenticated with the project's anon key.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn table(&self, builder: impl FnOnce(&Client, String) -> RequestBuilder, table: &str) -> RequestBuilder {
        builder(&self.client, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn select(&self, table: &str) -> RequestBuilder {
        self.table(|c, url| c.get(url), table).query(&[("select", "*")])
    }

    fn insert(&self, table: &str, body: &impl serde::Serialize) -> RequestBuilder {
        self.table(|c, url| c.post(url), table)
            .header("Prefer", "return=representation")
            .json(body)
    }
}

/// `in.("a","b")` filter value; quotes inside ids are escaped.
pub(crate) fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

async fn check(table: &'static str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        table,
        status: status.as_u16(),
        body,
    })
}

async fn rows<T: DeserializeOwned>(table: &'static str, request: RequestBuilder) -> Result<Vec<T>, StoreError> {
    let response = check(table, request.send().await?).await?;
    let rows = response.json::<Vec<T>>().await?;
    debug!(table, count = rows.len(), "PostgREST rows");
    Ok(rows)
}

async fn first_row<T: DeserializeOwned>(table: &'static str, request: RequestBuilder) -> Result<T, StoreError> {
    rows(table, request)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::EmptyInsert(table))
}

#[async_trait]
impl Store for SupabaseStore {
    async fn mcps_by_ids(&self, ids: &[String]) -> Result<Vec<McpRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self.select(MCP).query(&[("id", in_filter(ids))]);
        let records = rows(MCP, request).await?;
        Ok(in_request_order(ids, records))
    }

    async fn insert_mcp(&self, name: &str, parameters: &serde_json::Value) -> Result<McpRecord, StoreError> {
        let body = json!({ "name": name, "parameters": parameters });
        first_row(MCP, self.insert(MCP, &body)).await
    }

    async fn insert_bundle(&self, bundle: &NewBundle) -> Result<Bundle, StoreError> {
        first_row(BUNDLES, self.insert(BUNDLES, bundle)).await
    }

    async fn get_bundle(&self, id: &str) -> Result<Option<Bundle>, StoreError> {
        let request = self.select(BUNDLES).query(&[("id", format!("eq.{}", id))]);
        Ok(rows(BUNDLES, request).await?.into_iter().next())
    }

    async fn set_bundle_routes(&self, bundle_id: &str, route_ids: &[String]) -> Result<(), StoreError> {
        let request = self
            .table(|c, url| c.patch(url), BUNDLES)
            .query(&[("id", format!("eq.{}", bundle_id))])
            .json(&json!({ "routes": route_ids }));
        check(BUNDLES, request.send().await?).await?;
        Ok(())
    }

    async fn insert_route(&self, route: &NewRoute) -> Result<Route, StoreError> {
        first_row(ROUTE, self.insert(ROUTE, route)).await
    }

    async fn routes_for_bundle(&self, bundle_id: &str) -> Result<Vec<Route>, StoreError> {
        let request = self
            .select(ROUTE)
            .query(&[("bundle_id", format!("eq.{}", bundle_id))])
            .query(&[("order", "execution_order.asc")]);
        rows(ROUTE, request).await
    }
}
