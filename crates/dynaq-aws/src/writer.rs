//! Batched puts and deletes.

use std::time::Duration;

use anyhow::Context;
use aws_sdk_dynamodb::types::{DeleteRequest, PutRequest, WriteRequest};
use dynaq_core::config::MAX_WRITE_BATCH;
use dynaq_model::{Item, KeySchema};
use tracing::{debug, info, warn};

use crate::client::DynamoClient;
use crate::convert::to_sdk_item;
use crate::error::AwsError;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Writes records in batches, resubmitting unprocessed writes.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    client: aws_sdk_dynamodb::Client,
    batch_size: usize,
    max_attempts: u32,
    backoff: Duration,
}

impl BatchWriter {
    /// Writer with batches of `batch_size`, clamped to 1..=25.
    #[must_use]
    pub fn new(client: &DynamoClient, batch_size: usize) -> Self {
        Self {
            client: client.sdk().clone(),
            batch_size: batch_size.clamp(1, MAX_WRITE_BATCH),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Number of attempts per batch before giving up on unprocessed writes.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Base delay between retries; retry `n` waits `n * backoff`.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Requests per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Put every item into `table`. Returns the number written.
    pub async fn put_items(&self, table: &str, items: Vec<Item>) -> Result<usize, AwsError> {
        let requests = items
            .into_iter()
            .map(|item| -> Result<WriteRequest, AwsError> {
                let put = PutRequest::builder().set_item(Some(to_sdk_item(item))).build()?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.write(table, requests).await
    }

    /// Delete every key from `table`. Returns the number deleted.
    pub async fn delete_keys(&self, table: &str, keys: Vec<Item>) -> Result<usize, AwsError> {
        let requests = keys
            .into_iter()
            .map(|key| -> Result<WriteRequest, AwsError> {
                let delete = DeleteRequest::builder().set_key(Some(to_sdk_item(key))).build()?;
                Ok(WriteRequest::builder().delete_request(delete).build())
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.write(table, requests).await
    }

    async fn write(&self, table: &str, requests: Vec<WriteRequest>) -> Result<usize, AwsError> {
        let total = requests.len();
        for batch in chunked(requests, self.batch_size) {
            self.write_batch(table, batch).await?;
        }
        if total > 0 {
            info!(table, count = total, "batch write complete");
        }
        Ok(total)
    }

    async fn write_batch(&self, table: &str, batch: Vec<WriteRequest>) -> Result<(), AwsError> {
        let mut pending = batch;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(table, size = pending.len(), attempt, "batch write");
            let output = self
                .client
                .batch_write_item()
                .request_items(table, pending)
                .send()
                .await
                .with_context(|| format!("batch write to table {table} failed"))?;

            pending = output
                .unprocessed_items
                .and_then(|mut unprocessed| unprocessed.remove(table))
                .unwrap_or_default();
            if pending.is_empty() {
                return Ok(());
            }
            if attempt >= self.max_attempts {
                return Err(AwsError::Unprocessed {
                    table: table.to_owned(),
                    count: pending.len(),
                    attempts: attempt,
                });
            }

            warn!(
                table,
                unprocessed = pending.len(),
                attempt,
                "retrying unprocessed writes"
            );
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}

/// Split `items` into consecutive batches of at most `size`.
fn chunked<T>(mut items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    while !items.is_empty() {
        let rest = items.split_off(size.min(items.len()));
        batches.push(std::mem::replace(&mut items, rest));
    }
    batches
}

/// Project `item` onto the primary-key attributes of `schema`.
pub fn key_of(item: &Item, schema: &KeySchema) -> Result<Item, AwsError> {
    schema
        .attribute_names()
        .map(|name| {
            item.get(name)
                .map(|value| (name.to_owned(), value.clone()))
                .ok_or_else(|| AwsError::MissingKeyAttribute {
                    attribute: name.to_owned(),
                })
        })
        .collect()
}
