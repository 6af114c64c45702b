//! End-to-end traversal tests against a running DynamoDB-compatible endpoint.

#[cfg(test)]
mod tests {
    use dynaq_aws::{BatchWriter, key_of};
    use dynaq_core::{
        CompiledQuery, KeySchemaProvider, QueryTokens, ReadOptions, compile, traverse,
    };
    use dynaq_model::{AttributeValue, Item};
    use futures::TryStreamExt;

    use crate::{drop_table, dynaq_client, seed_orders, test_table_name};

    async fn collect(
        client: &dynaq_aws::DynamoClient,
        table: &str,
        query: &CompiledQuery,
        page_size: i32,
    ) -> Vec<Item> {
        let options = ReadOptions {
            page_size: Some(page_size),
        };
        traverse(client, table, query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    fn sort_values(items: &[Item]) -> Vec<i64> {
        let mut values: Vec<i64> = items
            .iter()
            .filter_map(|item| item.get("sk")?.as_n()?.parse().ok())
            .collect();
        values.sort_unstable();
        values
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_scan_every_record_across_pages() {
        let client = dynaq_client();
        let table = test_table_name("scan");
        seed_orders(&client, &table, 3, 10).await;

        let items = collect(&client, &table, &CompiledQuery::default(), 4).await;
        assert_eq!(items.len(), 30);

        drop_table(client.sdk(), &table).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_query_partition_with_sort_condition_and_filter() {
        let client = dynaq_client();
        let table = test_table_name("query");
        seed_orders(&client, &table, 2, 20).await;
        let schema = client.table_schema(&table).await.unwrap();

        let tokens = QueryTokens::default().partition("user#1").sort("between(5, 14)");
        let query = compile(&tokens, &schema.key_schema).unwrap();
        let items = collect(&client, &table, &query, 3).await;
        assert_eq!(sort_values(&items), (5..=14).collect::<Vec<_>>());

        let tokens = QueryTokens::default()
            .partition("user#1")
            .sort(">= 10")
            .filter("status = 'closed' AND total > 100");
        let query = compile(&tokens, &schema.key_schema).unwrap();
        let items = collect(&client, &table, &query, 2).await;
        assert_eq!(sort_values(&items), [12, 15, 18]);

        drop_table(client.sdk(), &table).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_query_secondary_index() {
        let client = dynaq_client();
        let table = test_table_name("index");
        seed_orders(&client, &table, 2, 6).await;
        let schema = client.table_schema(&table).await.unwrap();

        let tokens = QueryTokens::default()
            .index("by_status")
            .partition("closed")
            .filter("begins_with(pk, 'user#0')");
        let key_schema = schema.key_schema_for(Some("by_status")).unwrap();
        let query = compile(&tokens, key_schema).unwrap();
        let items = collect(&client, &table, &query, 10).await;
        assert_eq!(sort_values(&items), [0, 3]);

        drop_table(client.sdk(), &table).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_delete_matching_records() {
        let client = dynaq_client();
        let table = test_table_name("delete");
        seed_orders(&client, &table, 1, 9).await;
        let schema = client.table_schema(&table).await.unwrap();

        let query = compile(
            &QueryTokens::default().filter("status IN ('closed')"),
            &schema.key_schema,
        )
        .unwrap();
        let keys: Vec<Item> = collect(&client, &table, &query, 5)
            .await
            .iter()
            .map(|item| key_of(item, &schema.key_schema).unwrap())
            .collect();
        assert_eq!(keys.len(), 3);

        let deleted = BatchWriter::new(&client, 2)
            .delete_keys(&table, keys)
            .await
            .unwrap();
        assert_eq!(deleted, 3);

        let remaining = collect(&client, &table, &CompiledQuery::default(), 100).await;
        assert_eq!(remaining.len(), 6);
        assert!(
            remaining
                .iter()
                .all(|item| item.get("status") == Some(&AttributeValue::from("open")))
        );

        drop_table(client.sdk(), &table).await;
    }
}
