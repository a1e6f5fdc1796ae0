use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client;

use orderstore_core::order::{AttrValue, OrderKey, OrderRecord};
use orderstore_core::storage::{
    Page, PageToken, QueryRequest, RecordKey, Result, ScanFilter, SortDirection, StoreError,
    TableSchema, TableStore, UpdatePatch,
};

use super::conversions::{
    attributes_to_attr_map, item_to_record, key_map_to_order_key, key_map_to_token,
    order_key_to_key_map, record_to_item, token_to_key_map,
};
use super::error::{
    map_batch_write_error, map_put_error, map_query_error, map_scan_error, map_update_error,
};
use super::expressions::{render_filter, render_key_condition, render_update};

/// DynamoDB-backed table store.
///
/// Holds an injected SDK client and the table schema; every trait method is
/// a single request against the remote table.
pub struct DynamoTableStore {
    client: Client,
    schema: TableSchema,
}

impl DynamoTableStore {
    /// Creates a store from an existing SDK client and schema.
    pub fn new(client: Client, schema: TableSchema) -> Self {
        Self { client, schema }
    }

    /// Creates a store from environment configuration.
    ///
    /// Uses the SDK default credential chain. `AWS_ENDPOINT_URL` points the
    /// client at a local DynamoDB, and `ORDERS_TABLE_NAME` overrides the
    /// table name (defaults to "orders").
    pub async fn from_env() -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Ok(endpoint) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let client = Client::new(&config);

        let table_name =
            std::env::var("ORDERS_TABLE_NAME").unwrap_or_else(|_| "orders".to_string());
        Ok(Self::new(
            client,
            TableSchema::orders().with_table_name(table_name),
        ))
    }

    /// The name of the wrapped table.
    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    /// The schema of the wrapped table.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn page_from_output(
        &self,
        items: Vec<HashMap<String, AttributeValue>>,
        last_evaluated_key: Option<&HashMap<String, AttributeValue>>,
    ) -> Result<Page> {
        let items = items
            .iter()
            .map(item_to_record)
            .collect::<Result<Vec<OrderRecord>>>()?;
        let next = match last_evaluated_key {
            Some(key_map) if !key_map.is_empty() => Some(key_map_to_token(key_map)?),
            _ => None,
        };
        Ok(Page { items, next })
    }
}

#[async_trait]
impl TableStore for DynamoTableStore {
    async fn put_record(&self, record: &OrderRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.schema.table_name)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .map_err(map_put_error)?;

        Ok(())
    }

    async fn scan_page(
        &self,
        filter: Option<&ScanFilter>,
        start: Option<PageToken>,
    ) -> Result<Page> {
        let mut request = self.client.scan().table_name(&self.schema.table_name);

        if let Some(filter) = filter {
            let parts = render_filter(filter);
            request = request
                .filter_expression(parts.expression)
                .set_expression_attribute_names(Some(parts.names))
                .set_expression_attribute_values(Some(parts.values));
        }
        if let Some(token) = start {
            request = request.set_exclusive_start_key(Some(token_to_key_map(token)));
        }

        let response = request.send().await.map_err(map_scan_error)?;
        let next_key = response.last_evaluated_key.clone();
        self.page_from_output(response.items.unwrap_or_default(), next_key.as_ref())
    }

    async fn query_page(&self, request: &QueryRequest, start: Option<PageToken>) -> Result<Page> {
        let parts = render_key_condition(&self.schema, request)?;

        let mut call = self
            .client
            .query()
            .table_name(&self.schema.table_name)
            .key_condition_expression(parts.expression)
            .set_expression_attribute_names(Some(parts.names))
            .set_expression_attribute_values(Some(parts.values))
            .scan_index_forward(request.direction == SortDirection::Ascending);

        if let Some(index) = &request.index {
            call = call.index_name(index);
        }
        if let Some(token) = start {
            call = call.set_exclusive_start_key(Some(token_to_key_map(token)));
        }

        let response = call.send().await.map_err(map_query_error)?;
        let next_key = response.last_evaluated_key.clone();
        self.page_from_output(response.items.unwrap_or_default(), next_key.as_ref())
    }

    async fn update_record(
        &self,
        key: &RecordKey,
        patch: &UpdatePatch,
    ) -> Result<HashMap<String, AttrValue>> {
        let Some(sort) = &key.sort else {
            return Err(StoreError::Validation(format!(
                "the '{}' table has a composite primary key; update requires '{}'",
                self.schema.table_name, self.schema.sort_attribute
            )));
        };
        patch.validate(&self.schema)?;

        let parts = render_update(patch);
        // The existence condition makes this update-only: the service's
        // native update-or-create must not resurrect deleted records.
        let mut names = parts.names;
        names.insert("#pk".to_string(), self.schema.partition_attribute.clone());

        let response = self
            .client
            .update_item()
            .table_name(&self.schema.table_name)
            .key(
                self.schema.partition_attribute.clone(),
                AttributeValue::S(key.partition.clone()),
            )
            .key(
                self.schema.sort_attribute.clone(),
                AttributeValue::S(sort.clone()),
            )
            .update_expression(parts.expression)
            .condition_expression("attribute_exists(#pk)")
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(if parts.values.is_empty() {
                None
            } else {
                Some(parts.values)
            })
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(|e| map_update_error(e, key))?;

        attributes_to_attr_map(response.attributes.unwrap_or_default())
    }

    async fn delete_batch(&self, keys: &[OrderKey]) -> Result<Vec<OrderKey>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let write_requests = keys
            .iter()
            .map(|key| {
                let delete = DeleteRequest::builder()
                    .set_key(Some(order_key_to_key_map(key, &self.schema)))
                    .build()
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                Ok(WriteRequest::builder().delete_request(delete).build())
            })
            .collect::<Result<Vec<WriteRequest>>>()?;

        let response = self
            .client
            .batch_write_item()
            .request_items(&self.schema.table_name, write_requests)
            .send()
            .await
            .map_err(map_batch_write_error)?;

        let mut unprocessed = Vec::new();
        if let Some(items) = response.unprocessed_items() {
            for request in items.get(&self.schema.table_name).into_iter().flatten() {
                if let Some(delete) = request.delete_request() {
                    unprocessed.push(key_map_to_order_key(delete.key(), &self.schema)?);
                }
            }
        }

        Ok(unprocessed)
    }
}
