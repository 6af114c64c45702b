//! SDK-backed client implementing the core's read and schema traits.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
use dynaq_core::{DynaqConfig, KeySchemaProvider, ReadExecutor};
use dynaq_model::{Item, Page, QueryRequest, ScanRequest, TableSchema};
use tracing::debug;

use crate::convert::{SdkItem, from_sdk_item, key_schema, non_empty, to_sdk_item};
use crate::error::AwsError;

/// DynamoDB client.
#[derive(Debug, Clone)]
pub struct DynamoClient {
    inner: aws_sdk_dynamodb::Client,
}

impl DynamoClient {
    /// Build a client from the standard AWS provider chain, overriding region
    /// and endpoint from `config`.
    pub async fn connect(config: &DynaqConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        Self::from_client(aws_sdk_dynamodb::Client::new(&shared))
    }

    /// Wrap an already configured SDK client.
    #[must_use]
    pub fn from_client(inner: aws_sdk_dynamodb::Client) -> Self {
        Self { inner }
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn sdk(&self) -> &aws_sdk_dynamodb::Client {
        &self.inner
    }
}

#[async_trait]
impl ReadExecutor for DynamoClient {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<Page> {
        debug!(
            table = %request.table_name,
            index = ?request.index_name,
            resumed = request.exclusive_start_key.is_some(),
            "query page"
        );
        let table = request.table_name.clone();
        let output = self
            .inner
            .query()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .key_condition_expression(request.key_condition_expression)
            .set_filter_expression(request.filter_expression)
            .set_expression_attribute_names(non_empty(request.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                request.expression_attribute_values,
            )))
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key.map(to_sdk_item))
            .send()
            .await
            .with_context(|| format!("query on table {table} failed"))?;

        Ok(page(output.items, output.last_evaluated_key)?)
    }

    async fn scan(&self, request: ScanRequest) -> anyhow::Result<Page> {
        debug!(
            table = %request.table_name,
            index = ?request.index_name,
            resumed = request.exclusive_start_key.is_some(),
            "scan page"
        );
        let table = request.table_name.clone();
        let output = self
            .inner
            .scan()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .set_filter_expression(request.filter_expression)
            .set_expression_attribute_names(non_empty(request.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                request.expression_attribute_values,
            )))
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key.map(to_sdk_item))
            .send()
            .await
            .with_context(|| format!("scan on table {table} failed"))?;

        Ok(page(output.items, output.last_evaluated_key)?)
    }
}

/// Convert an SDK page; an empty cursor counts as no cursor.
fn page(items: Option<Vec<SdkItem>>, cursor: Option<SdkItem>) -> Result<Page, AwsError> {
    let items = items
        .unwrap_or_default()
        .into_iter()
        .map(from_sdk_item)
        .collect::<Result<Vec<Item>, _>>()?;
    let last_evaluated_key = cursor
        .and_then(non_empty)
        .map(from_sdk_item)
        .transpose()?;
    Ok(Page {
        items,
        last_evaluated_key,
    })
}

#[async_trait]
impl KeySchemaProvider for DynamoClient {
    async fn table_schema(&self, table: &str) -> anyhow::Result<TableSchema> {
        let output = self
            .inner
            .describe_table()
            .table_name(table)
            .send()
            .await
            .with_context(|| format!("failed to describe table {table}"))?;
        let description = output.table.ok_or_else(|| AwsError::MissingKeySchema {
            table: table.to_owned(),
        })?;
        Ok(table_schema(table, &description)?)
    }
}

/// Collect the table's and its secondary indexes' key schemas.
pub(crate) fn table_schema(
    table: &str,
    description: &aws_sdk_dynamodb::types::TableDescription,
) -> Result<TableSchema, AwsError> {
    let definitions = description.attribute_definitions();
    let elements = description.key_schema();
    if elements.is_empty() {
        return Err(AwsError::MissingKeySchema {
            table: table.to_owned(),
        });
    }

    let mut indexes = BTreeMap::new();
    for gsi in description.global_secondary_indexes() {
        if let Some(name) = gsi.index_name() {
            indexes.insert(name.to_owned(), key_schema(gsi.key_schema(), definitions)?);
        }
    }
    for lsi in description.local_secondary_indexes() {
        if let Some(name) = lsi.index_name() {
            indexes.insert(name.to_owned(), key_schema(lsi.key_schema(), definitions)?);
        }
    }

    Ok(TableSchema {
        table_name: table.to_owned(),
        key_schema: key_schema(elements, definitions)?,
        indexes,
    })
}
