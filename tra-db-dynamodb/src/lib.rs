//! DynamoDB storage backend
//!
//! The single production implementation of [`StorageBackend`], built on
//! `aws-sdk-dynamodb`. One table, five global secondary indexes (see
//! `tra_db_core::schema`), conditional writes for the version guard, and
//! internal pagination on query/scan.
//!
//! ## Usage
//!
//! ```ignore
//! use tra_db_dynamodb::{DynamoBackend, DynamoConfig};
//!
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let backend = DynamoBackend::new(&sdk_config, DynamoConfig {
//!     table_name: "tra-assessments".to_string(),
//!     ..Default::default()
//! });
//! ```

pub mod convert;

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use std::time::Duration;

use convert::{from_dynamo_item, to_dynamo_item};
use tra_db_core::item::{Item, ItemExt};
use tra_db_core::router::{IndexQuery, KeyMatch, ScanPlan, SortCondition};
use tra_db_core::schema::{ATTR_PK, ATTR_SK, ATTR_VERSION, DEFAULT_TABLE_NAME};
use tra_db_core::{Error, Result, StorageBackend, WriteGuard};

/// DynamoDB backend configuration
#[derive(Debug, Clone)]
pub struct DynamoConfig {
    /// Table name
    pub table_name: String,
    /// AWS region override (SDK default if not specified)
    pub region: Option<String>,
    /// Endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: None,
            endpoint: None,
            timeout_ms: None,
        }
    }
}

/// DynamoDB-backed storage adapter
#[derive(Clone)]
pub struct DynamoBackend {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoBackend")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoBackend {
    /// Create a backend from the ambient SDK config plus overrides
    ///
    /// Inherits HTTP client, credentials, and retry policy from `sdk_config`,
    /// then applies region/endpoint/timeout overrides.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name,
        }
    }

    /// Create from a pre-built client (for testing)
    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// Verify the store is reachable
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .list_tables()
            .limit(1)
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB ListTables failed: {e}")))?;
        Ok(())
    }

    /// Check if a PutItem error is a conditional check failure
    fn is_put_conditional_check_failed(err: &SdkError<PutItemError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => matches!(
                service_err.err(),
                PutItemError::ConditionalCheckFailedException(_)
            ),
            _ => false,
        }
    }

    /// Check if a BatchWriteItem error is a throttling signal
    fn is_batch_throttled(err: &SdkError<BatchWriteItemError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => matches!(
                service_err.err(),
                BatchWriteItemError::ProvisionedThroughputExceededException(_)
                    | BatchWriteItemError::RequestLimitExceeded(_)
            ),
            _ => false,
        }
    }

    /// Query one index page after page with an exact partition value
    async fn query_exact(&self, query: &IndexQuery, partition_value: &str) -> Result<Vec<Item>> {
        let index = query.index;
        let mut key_condition = "#p = :p".to_string();
        let mut items = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index.name())
                .expression_attribute_names("#p", index.partition_attr())
                .expression_attribute_values(":p", AttributeValue::S(partition_value.to_string()))
                .scan_index_forward(!query.newest_first);

            match &query.sort {
                None => {}
                Some(SortCondition::Eq(value)) => {
                    key_condition = "#p = :p AND #s = :s".to_string();
                    request = request
                        .expression_attribute_names("#s", index.sort_attr())
                        .expression_attribute_values(":s", AttributeValue::S(value.clone()));
                }
                Some(SortCondition::BeginsWith(prefix)) => {
                    key_condition = "#p = :p AND begins_with(#s, :s)".to_string();
                    request = request
                        .expression_attribute_names("#s", index.sort_attr())
                        .expression_attribute_values(":s", AttributeValue::S(prefix.clone()));
                }
            }
            request = request.key_condition_expression(&key_condition);

            if let Some(limit) = query.limit {
                let remaining = limit.saturating_sub(items.len());
                request = request.limit(remaining.min(i32::MAX as usize) as i32);
            }
            if let Some(key) = last_evaluated_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::storage(format!("DynamoDB Query failed: {e}")))?;

            items.extend(response.items().iter().map(from_dynamo_item));

            if let Some(limit) = query.limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => {
                    last_evaluated_key = Some(key.clone());
                }
                _ => break,
            }
        }

        Ok(items)
    }

    /// Serve a prefix partition condition by scanning the index
    ///
    /// The store's native Query requires partition equality, so the title
    /// index's prefix shape falls through to a filtered index scan. Still
    /// index-scoped, so far cheaper than a base-table scan.
    async fn query_prefix(&self, query: &IndexQuery, prefix: &str) -> Result<Vec<Item>> {
        let index = query.index;
        tracing::debug!(
            index = index.name(),
            prefix,
            "serving prefix partition via index scan"
        );

        let mut items = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .index_name(index.name())
                .filter_expression("begins_with(#p, :p)")
                .expression_attribute_names("#p", index.partition_attr())
                .expression_attribute_values(":p", AttributeValue::S(prefix.to_string()));

            if let Some(key) = last_evaluated_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::storage(format!("DynamoDB Scan failed: {e}")))?;

            items.extend(response.items().iter().map(from_dynamo_item));

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => {
                    last_evaluated_key = Some(key.clone());
                }
                _ => break,
            }
        }

        // Scans do not come back in index order; restore it client-side.
        let sort_attr = index.sort_attr();
        items.sort_by(|a, b| {
            let ka = (a.get_s(sort_attr), a.get_s(ATTR_PK), a.get_s(ATTR_SK));
            let kb = (b.get_s(sort_attr), b.get_s(ATTR_PK), b.get_s(ATTR_SK));
            ka.cmp(&kb)
        });
        if query.newest_first {
            items.reverse();
        }
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }

        Ok(items)
    }
}

#[async_trait]
impl StorageBackend for DynamoBackend {
    async fn put_item(&self, item: Item, guard: WriteGuard) -> Result<()> {
        let pk = item.get_s(ATTR_PK).unwrap_or_default().to_string();
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_dynamo_item(&item)));

        match guard {
            WriteGuard::None => {}
            WriteGuard::MustNotExist => {
                request = request
                    .condition_expression("attribute_not_exists(#pk)")
                    .expression_attribute_names("#pk", ATTR_PK);
            }
            WriteGuard::VersionIs(expected) => {
                request = request
                    .condition_expression("#ver = :expected_version")
                    .expression_attribute_names("#ver", ATTR_VERSION)
                    .expression_attribute_values(
                        ":expected_version",
                        AttributeValue::N(expected.to_string()),
                    );
            }
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_put_conditional_check_failed(&e) => Err(Error::conflict(pk)),
            Err(e) => Err(Error::storage(format!("DynamoDB PutItem failed: {e}"))),
        }
    }

    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_PK, AttributeValue::S(pk.to_string()))
            .key(ATTR_SK, AttributeValue::S(sk.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB GetItem failed: {e}")))?;

        Ok(response.item().map(from_dynamo_item))
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>> {
        match &query.partition {
            KeyMatch::Exact(value) => self.query_exact(query, value).await,
            KeyMatch::Prefix(prefix) => self.query_prefix(query, prefix).await,
        }
    }

    async fn scan(&self, plan: &ScanPlan) -> Result<Vec<Item>> {
        let mut expr_parts: Vec<String> = Vec::new();
        let mut names: HashMap<String, String> = HashMap::new();
        let mut values: HashMap<String, AttributeValue> = HashMap::new();

        if let Some(prefix) = &plan.pk_prefix {
            expr_parts.push("begins_with(#pk, :pkp)".into());
            names.insert("#pk".into(), ATTR_PK.into());
            values.insert(":pkp".into(), AttributeValue::S(prefix.clone()));
        }
        if let Some(prefix) = &plan.sk_prefix {
            expr_parts.push("begins_with(#sk, :skp)".into());
            names.insert("#sk".into(), ATTR_SK.into());
            values.insert(":skp".into(), AttributeValue::S(prefix.clone()));
        }
        for (i, (attr, value)) in plan.equals.iter().enumerate() {
            expr_parts.push(format!("#eq{i} = :eq{i}"));
            names.insert(format!("#eq{i}"), (*attr).to_string());
            values.insert(format!(":eq{i}"), AttributeValue::S(value.clone()));
        }
        for (i, (attr, prefix)) in plan.begins.iter().enumerate() {
            expr_parts.push(format!("begins_with(#bw{i}, :bw{i})"));
            names.insert(format!("#bw{i}"), (*attr).to_string());
            values.insert(format!(":bw{i}"), AttributeValue::S(prefix.clone()));
        }

        let mut items = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self.client.scan().table_name(&self.table_name);

            if !expr_parts.is_empty() {
                request = request
                    .filter_expression(expr_parts.join(" AND "))
                    .set_expression_attribute_names(Some(names.clone()))
                    .set_expression_attribute_values(Some(values.clone()));
            }
            if let Some(key) = last_evaluated_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::storage(format!("DynamoDB Scan failed: {e}")))?;

            items.extend(response.items().iter().map(from_dynamo_item));

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => {
                    last_evaluated_key = Some(key.clone());
                }
                _ => break,
            }
        }

        Ok(items)
    }

    async fn batch_put(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut requests = Vec::with_capacity(items.len());
        for item in &items {
            let put = PutRequest::builder()
                .set_item(Some(to_dynamo_item(item)))
                .build()
                .map_err(|e| Error::storage(format!("invalid batch item: {e}")))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        let response = match self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
        {
            Ok(response) => response,
            // Surfaced as Throttled so the batch writer re-queues the
            // whole chunk instead of failing it.
            Err(e) if Self::is_batch_throttled(&e) => {
                return Err(Error::throttled(format!("DynamoDB BatchWriteItem: {e}")))
            }
            Err(e) => {
                return Err(Error::storage(format!(
                    "DynamoDB BatchWriteItem failed: {e}"
                )))
            }
        };

        let unprocessed = response
            .unprocessed_items()
            .and_then(|map| map.get(&self.table_name))
            .map(|write_requests| {
                write_requests
                    .iter()
                    .filter_map(|wr| wr.put_request())
                    .map(|put| from_dynamo_item(put.item()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(unprocessed)
    }
}
