//! Integration tests for dynaq.
//!
//! These tests require a DynamoDB-compatible endpoint at `localhost:4566`
//! (override with `DYNAQ_ENDPOINT_URL`). They are marked `#[ignore]` so they
//! don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p dynaq-integration -- --ignored
//! ```

use std::sync::Once;

use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use dynaq_aws::{BatchWriter, DynamoClient};
use dynaq_model::{AttributeValue, Item};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the store.
fn endpoint_url() -> String {
    std::env::var("DYNAQ_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create a configured DynamoDB client pointing at the local endpoint.
#[must_use]
pub fn dynamodb_client() -> aws_sdk_dynamodb::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_dynamodb::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .build();

    aws_sdk_dynamodb::Client::from_conf(config)
}

/// dynaq client over [`dynamodb_client`].
#[must_use]
pub fn dynaq_client() -> DynamoClient {
    DynamoClient::from_client(dynamodb_client())
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

fn element(name: &str, key_type: KeyType) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .unwrap()
}

fn definition(name: &str, attr_type: ScalarAttributeType) -> AttributeDefinition {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(attr_type)
        .build()
        .unwrap()
}

/// Create a table keyed by `pk` (S) and `sk` (N), with a `by_status` index
/// keyed by `status` (S) and `sk`.
pub async fn create_orders_table(client: &aws_sdk_dynamodb::Client, table_name: &str) {
    client
        .create_table()
        .table_name(table_name)
        .key_schema(element("pk", KeyType::Hash))
        .key_schema(element("sk", KeyType::Range))
        .attribute_definitions(definition("pk", ScalarAttributeType::S))
        .attribute_definitions(definition("sk", ScalarAttributeType::N))
        .attribute_definitions(definition("status", ScalarAttributeType::S))
        .global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name("by_status")
                .key_schema(element("status", KeyType::Hash))
                .key_schema(element("sk", KeyType::Range))
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                )
                .build()
                .unwrap(),
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create table {table_name}: {e}"));
}

/// One order record: partition `user#{user}`, sort key `n`.
#[must_use]
pub fn order(user: u32, n: u32) -> Item {
    let mut item = Item::new();
    item.insert("pk".to_owned(), AttributeValue::S(format!("user#{user}")));
    item.insert("sk".to_owned(), AttributeValue::N(n.to_string()));
    let status = if n % 3 == 0 { "closed" } else { "open" };
    item.insert("status".to_owned(), AttributeValue::from(status));
    item.insert("total".to_owned(), AttributeValue::N((n * 10).to_string()));
    item
}

/// Create the orders table and seed `users * per_user` orders.
pub async fn seed_orders(client: &DynamoClient, table_name: &str, users: u32, per_user: u32) {
    create_orders_table(client.sdk(), table_name).await;
    let items = (0..users)
        .flat_map(|user| (0..per_user).map(move |n| order(user, n)))
        .collect();
    BatchWriter::new(client, 25)
        .put_items(table_name, items)
        .await
        .unwrap_or_else(|e| panic!("failed to seed {table_name}: {e}"));
}

/// Delete a table, ignoring errors.
pub async fn drop_table(client: &aws_sdk_dynamodb::Client, table_name: &str) {
    let _ = client.delete_table().table_name(table_name).send().await;
}

#[cfg(test)]
mod test_traversal;
