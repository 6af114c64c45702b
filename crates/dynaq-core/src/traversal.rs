//! Paginated traversal of a compiled query.
//!
//! A query with a partition key clause becomes an indexed read (`Query`);
//! anything else becomes a full sweep (`Scan`). The traversal issues one read
//! at a time, yields that page's records one by one, and resumes from the
//! returned cursor until a page arrives without one.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use dynaq_model::{
    AttributeValue, Item, Page, QueryRequest, ReadRequest, ScalarAttributeType, ScanRequest,
};
use futures::Stream;

use crate::compiler::{CompiledQuery, KeyClause, KeyOperator};
use crate::error::TraversalError;

/// Executes the two read shapes against the store.
#[async_trait]
pub trait ReadExecutor: Send + Sync {
    /// Key-conditioned read.
    async fn query(&self, request: QueryRequest) -> anyhow::Result<Page>;

    /// Unconditioned read.
    async fn scan(&self, request: ScanRequest) -> anyhow::Result<Page>;
}

/// Per-traversal read options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Item limit per read request.
    pub page_size: Option<i32>,
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Build the first read request for `query` against `table`.
pub fn plan_read(
    table: &str,
    query: &CompiledQuery,
    options: ReadOptions,
) -> Result<ReadRequest, TraversalError> {
    // Filter placeholders are already baked into the filter expression, so
    // they are fixed and the key condition picks tokens around them.
    let mut names: HashMap<String, String> = query
        .filter_names
        .iter()
        .map(|name| (format!("#{name}"), name.clone()))
        .collect();
    let mut values: HashMap<String, AttributeValue> = query
        .filter_attributes
        .iter()
        .map(|(key, literal)| (format!(":{key}"), literal.to_attribute_value()))
        .collect();

    let key_condition = match (&query.partition_key, &query.sort_key) {
        (Some(partition), sort) => Some(key_condition(
            partition,
            sort.as_ref(),
            &mut names,
            &mut values,
        )?),
        (None, Some(sort)) => {
            return Err(TraversalError::OrphanSortKey {
                attribute: sort.name.clone(),
            });
        }
        (None, None) => None,
    };

    let table_name = table.to_owned();
    let index_name = query.index_name.clone();
    let filter_expression = query.filter_expression.clone();

    Ok(match key_condition {
        Some(key_condition_expression) => ReadRequest::Query(QueryRequest {
            table_name,
            index_name,
            key_condition_expression,
            filter_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            limit: options.page_size,
            exclusive_start_key: None,
        }),
        None => ReadRequest::Scan(ScanRequest {
            table_name,
            index_name,
            filter_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            limit: options.page_size,
            exclusive_start_key: None,
        }),
    })
}

fn key_condition(
    partition: &KeyClause,
    sort: Option<&KeyClause>,
    names: &mut HashMap<String, String>,
    values: &mut HashMap<String, AttributeValue>,
) -> Result<String, TraversalError> {
    if partition.operator != KeyOperator::Eq {
        return Err(TraversalError::UnsupportedOperator {
            attribute: partition.name.clone(),
            operator: partition.operator.to_string(),
        });
    }

    let pk = key_token(&partition.name, false, names, values);
    names.insert(format!("#{pk}"), partition.name.clone());
    bind(values, format!(":{pk}"), encode_key(partition, &partition.value)?)?;
    let mut condition = format!("#{pk} = :{pk}");

    let Some(sort) = sort else {
        return Ok(condition);
    };

    let between = sort.operator == KeyOperator::Between;
    let sk = key_token(&sort.name, between, names, values);
    names.insert(format!("#{sk}"), sort.name.clone());
    bind(values, format!(":{sk}"), encode_key(sort, &sort.value)?)?;
    let clause = match sort.operator {
        KeyOperator::Eq | KeyOperator::Lt | KeyOperator::Le | KeyOperator::Gt | KeyOperator::Ge => {
            format!("#{sk} {} :{sk}", sort.operator)
        }
        KeyOperator::BeginsWith => format!("begins_with(#{sk}, :{sk})"),
        KeyOperator::Between => {
            let upper = sort
                .value2
                .as_deref()
                .ok_or_else(|| TraversalError::IncompleteKeyClause {
                    attribute: sort.name.clone(),
                })?;
            bind(values, format!(":{sk}2"), encode_key(sort, upper)?)?;
            format!("#{sk} BETWEEN :{sk} AND :{sk}2")
        }
    };
    condition.push_str(" AND ");
    condition.push_str(&clause);
    Ok(condition)
}

/// Insert a value placeholder, rejecting a rebinding to a different value.
fn bind(
    values: &mut HashMap<String, AttributeValue>,
    placeholder: String,
    value: AttributeValue,
) -> Result<(), TraversalError> {
    match values.get(&placeholder) {
        Some(existing) if *existing != value => {
            Err(TraversalError::PlaceholderConflict { placeholder })
        }
        Some(_) => Ok(()),
        None => {
            values.insert(placeholder, value);
            Ok(())
        }
    }
}

/// Pick the placeholder token for a key attribute.
///
/// Starts from the sanitized name and appends `_1`, `_2`, ... until `#token`
/// is free or already names this attribute, and the value placeholders the
/// clause needs are free. When the filter references the same attribute, its
/// `:token` is shared and [`bind`] rejects a differing value.
fn key_token(
    name: &str,
    between: bool,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> String {
    let base = placeholder_token(name);
    let mut token = base.clone();
    let mut suffix = 0usize;
    loop {
        let name_free = match names.get(&format!("#{token}")) {
            Some(existing) => existing == name,
            None => !values.contains_key(&format!(":{token}")),
        };
        let upper_free = !between || !values.contains_key(&format!(":{token}2"));
        if name_free && upper_free {
            return token;
        }
        suffix += 1;
        token = format!("{base}_{suffix}");
    }
}

/// Placeholder-safe token for an attribute name.
fn placeholder_token(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn encode_key(clause: &KeyClause, value: &str) -> Result<AttributeValue, TraversalError> {
    match clause.attr_type {
        ScalarAttributeType::S => Ok(AttributeValue::S(value.to_owned())),
        ScalarAttributeType::N => Ok(AttributeValue::N(value.trim().to_owned())),
        ScalarAttributeType::B => STANDARD
            .decode(value.trim())
            .map(|bytes| AttributeValue::B(Bytes::from(bytes)))
            .map_err(|e| TraversalError::InvalidKeyValue {
                attribute: clause.name.clone(),
                attr_type: clause.attr_type,
                message: e.to_string(),
            }),
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Lazily read every record matching `query`.
///
/// The request is planned eagerly, so planning errors surface here. Read
/// failures are yielded once and end the stream. Each call starts from the
/// beginning of the table or partition.
pub fn traverse<'a, E>(
    executor: &'a E,
    table: &str,
    query: &CompiledQuery,
    options: ReadOptions,
) -> Result<impl Stream<Item = Result<Item, TraversalError>> + Send + use<'a, E>, TraversalError>
where
    E: ReadExecutor + ?Sized,
{
    let request = plan_read(table, query, options)?;
    Ok(Traversal::new(executor, request).into_stream())
}

/// Where the next read resumes.
#[derive(Debug)]
enum Resume {
    Start,
    After(Item),
    Finished,
}

struct Traversal<'a, E: ?Sized> {
    executor: &'a E,
    request: ReadRequest,
    buffered: VecDeque<Item>,
    resume: Resume,
}

impl<'a, E> Traversal<'a, E>
where
    E: ReadExecutor + ?Sized,
{
    fn new(executor: &'a E, request: ReadRequest) -> Self {
        Self {
            executor,
            request,
            buffered: VecDeque::new(),
            resume: Resume::Start,
        }
    }

    fn into_stream(self) -> impl Stream<Item = Result<Item, TraversalError>> + Send + use<'a, E> {
        futures::stream::try_unfold(self, |mut traversal| async move {
            let item = traversal.next_item().await?;
            Ok::<_, TraversalError>(item.map(|item| (item, traversal)))
        })
    }

    async fn next_item(&mut self) -> Result<Option<Item>, TraversalError> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Ok(Some(item));
            }

            let cursor = match std::mem::replace(&mut self.resume, Resume::Finished) {
                Resume::Finished => return Ok(None),
                Resume::Start => None,
                Resume::After(cursor) => Some(cursor),
            };
            self.request.set_exclusive_start_key(cursor);

            let page = match &self.request {
                ReadRequest::Query(q) => self.executor.query(q.clone()).await?,
                ReadRequest::Scan(s) => self.executor.scan(s.clone()).await?,
            };
            self.buffered.extend(page.items);
            if let Some(next) = page.last_evaluated_key {
                self.resume = Resume::After(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dynaq_model::{KeyAttribute, KeySchema};
    use futures::{StreamExt, TryStreamExt};

    use super::*;
    use crate::compiler::{QueryTokens, compile};

    /// In-memory table that serves fixed-size pages keyed by `id`.
    struct PagedTable {
        items: Vec<Item>,
        page_size: usize,
        reads: AtomicUsize,
        last_request: Mutex<Option<ReadRequest>>,
        fail_on_read: Option<usize>,
    }

    impl PagedTable {
        fn new(count: usize, page_size: usize) -> Self {
            let items = (0..count)
                .map(|i| {
                    let mut item = Item::new();
                    item.insert("id".to_owned(), AttributeValue::N(i.to_string()));
                    item
                })
                .collect();
            Self {
                items,
                page_size,
                reads: AtomicUsize::new(0),
                last_request: Mutex::new(None),
                fail_on_read: None,
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn page(&self, cursor: Option<&Item>) -> anyhow::Result<Page> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_read == Some(read) {
                anyhow::bail!("throttled");
            }

            let start = match cursor {
                None => 0,
                Some(cursor) => {
                    self.items
                        .iter()
                        .position(|item| item.get("id") == cursor.get("id"))
                        .ok_or_else(|| anyhow::anyhow!("unknown cursor"))?
                        + 1
                }
            };
            let end = (start + self.page_size).min(self.items.len());
            let items = self.items[start..end].to_vec();
            let last_evaluated_key = (end < self.items.len()).then(|| items[items.len() - 1].clone());
            Ok(Page {
                items,
                last_evaluated_key,
            })
        }
    }

    #[async_trait]
    impl ReadExecutor for PagedTable {
        async fn query(&self, request: QueryRequest) -> anyhow::Result<Page> {
            let page = self.page(request.exclusive_start_key.as_ref());
            *self.last_request.lock().unwrap() = Some(ReadRequest::Query(request));
            page
        }

        async fn scan(&self, request: ScanRequest) -> anyhow::Result<Page> {
            let page = self.page(request.exclusive_start_key.as_ref());
            *self.last_request.lock().unwrap() = Some(ReadRequest::Scan(request));
            page
        }
    }

    fn schema() -> KeySchema {
        KeySchema::new(KeyAttribute::string("pk")).with_sort_key(KeyAttribute::number("sk"))
    }

    fn compiled(tokens: QueryTokens) -> CompiledQuery {
        compile(&tokens, &schema()).unwrap()
    }

    #[tokio::test]
    async fn test_should_yield_every_record_across_pages() {
        for (count, page_size, expected_reads) in
            [(0, 3, 1), (1, 3, 1), (3, 3, 1), (10, 3, 4), (10, 1, 10), (7, 100, 1)]
        {
            let table = PagedTable::new(count, page_size);
            let stream =
                traverse(&table, "t", &CompiledQuery::default(), ReadOptions::default()).unwrap();
            let items: Vec<Item> = stream.try_collect().await.unwrap();

            assert_eq!(items.len(), count, "count={count} page={page_size}");
            assert_eq!(table.reads(), expected_reads, "count={count} page={page_size}");
            for (i, item) in items.iter().enumerate() {
                assert_eq!(item["id"], AttributeValue::N(i.to_string()));
            }
        }
    }

    #[tokio::test]
    async fn test_should_read_lazily() {
        let table = PagedTable::new(10, 4);
        let stream =
            traverse(&table, "t", &CompiledQuery::default(), ReadOptions::default()).unwrap();
        assert_eq!(table.reads(), 0);

        let first_five: Vec<_> = stream.take(5).collect().await;
        assert_eq!(first_five.len(), 5);
        assert_eq!(table.reads(), 2);
    }

    /// Serves the first page with its items filtered out but its cursor kept.
    struct EmptyFirstPage(PagedTable);

    #[async_trait]
    impl ReadExecutor for EmptyFirstPage {
        async fn query(&self, request: QueryRequest) -> anyhow::Result<Page> {
            self.0.query(request).await
        }

        async fn scan(&self, request: ScanRequest) -> anyhow::Result<Page> {
            let mut page = self.0.scan(request).await?;
            if self.0.reads() == 1 {
                page.items.clear();
            }
            Ok(page)
        }
    }

    #[tokio::test]
    async fn test_should_continue_past_empty_pages() {
        let executor = EmptyFirstPage(PagedTable::new(4, 2));
        let stream =
            traverse(&executor, "t", &CompiledQuery::default(), ReadOptions::default()).unwrap();
        let items: Vec<Item> = stream.try_collect().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], AttributeValue::N("2".to_owned()));
        assert_eq!(executor.0.reads(), 2);
    }

    #[tokio::test]
    async fn test_should_stop_after_failed_read() {
        let mut table = PagedTable::new(10, 3);
        table.fail_on_read = Some(2);

        let stream =
            traverse(&table, "t", &CompiledQuery::default(), ReadOptions::default()).unwrap();
        let results: Vec<Result<Item, TraversalError>> = stream.collect().await;

        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(matches!(results[3], Err(TraversalError::Read(_))));
        assert_eq!(table.reads(), 2);
    }

    #[tokio::test]
    async fn test_should_choose_query_when_partition_key_present() {
        let table = PagedTable::new(2, 10);
        let query = compiled(QueryTokens::default().partition("user#1").index("by_sk"));
        let options = ReadOptions { page_size: Some(10) };
        let _: Vec<Item> = traverse(&table, "t", &query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let request = table.last_request.lock().unwrap().clone().unwrap();
        let ReadRequest::Query(q) = request else {
            panic!("expected query");
        };
        assert_eq!(q.key_condition_expression, "#pk = :pk");
        assert_eq!(q.index_name.as_deref(), Some("by_sk"));
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.expression_attribute_values[":pk"], AttributeValue::from("user#1"));
    }

    #[test]
    fn test_should_plan_scan_without_partition_key() {
        let query = compiled(QueryTokens::default().filter("age > 18"));
        let request = plan_read("t", &query, ReadOptions::default()).unwrap();
        let ReadRequest::Scan(scan) = request else {
            panic!("expected scan");
        };
        assert_eq!(scan.filter_expression.as_deref(), Some("#age > :age"));
        assert_eq!(scan.expression_attribute_names["#age"], "age");
        assert_eq!(scan.expression_attribute_values[":age"], AttributeValue::N("18".to_owned()));
    }

    #[test]
    fn test_should_plan_sort_key_operators() {
        let cases = [
            ("> 5", "#pk = :pk AND #sk > :sk"),
            ("<=5", "#pk = :pk AND #sk <= :sk"),
            ("begins_with(5)", "#pk = :pk AND begins_with(#sk, :sk)"),
            ("between(1, 9)", "#pk = :pk AND #sk BETWEEN :sk AND :sk2"),
            ("5", "#pk = :pk AND #sk = :sk"),
        ];
        for (token, expected) in cases {
            let query = compiled(QueryTokens::default().partition("a").sort(token));
            let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap()
            else {
                panic!("expected query");
            };
            assert_eq!(q.key_condition_expression, expected, "{token}");
            assert_eq!(q.expression_attribute_names["#sk"], "sk");
        }

        let query = compiled(QueryTokens::default().partition("a").sort("between(1, 9)"));
        let request = plan_read("t", &query, ReadOptions::default()).unwrap();
        let values = request.expression_attribute_values();
        assert_eq!(values[":sk"], AttributeValue::N("1".to_owned()));
        assert_eq!(values[":sk2"], AttributeValue::N("9".to_owned()));
    }

    #[test]
    fn test_should_reference_only_defined_placeholders() {
        let query = compiled(
            QueryTokens::default()
                .partition("a")
                .sort("between(1, 9)")
                .filter("status IN ('x', 'y') AND size(tags) > 1 AND attribute_exists(email)"),
        );
        let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap() else {
            panic!("expected query");
        };

        let text = format!(
            "{} {}",
            q.key_condition_expression,
            q.filter_expression.clone().unwrap()
        );
        for token in text.split(|c: char| c.is_whitespace() || ",()".contains(c)) {
            if token.starts_with('#') {
                assert!(q.expression_attribute_names.contains_key(token), "{token}");
            } else if token.starts_with(':') {
                assert!(q.expression_attribute_values.contains_key(token), "{token}");
            }
        }
        assert_eq!(q.expression_attribute_names.len(), 5);
        assert_eq!(q.expression_attribute_values.len(), 6);
    }

    #[test]
    fn test_should_reject_non_equality_partition_clause() {
        let mut query = compiled(QueryTokens::default().partition("a"));
        if let Some(pk) = query.partition_key.as_mut() {
            pk.operator = KeyOperator::Gt;
        }
        let err = plan_read("t", &query, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TraversalError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_should_reject_between_without_upper_bound() {
        let mut query = compiled(QueryTokens::default().partition("a").sort("between(1,2)"));
        if let Some(sk) = query.sort_key.as_mut() {
            sk.value2 = None;
        }
        let err = plan_read("t", &query, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TraversalError::IncompleteKeyClause { .. }));
    }

    #[test]
    fn test_should_reject_orphan_sort_clause() {
        let mut query = compiled(QueryTokens::default().partition("a").sort("> 1"));
        query.partition_key = None;
        let err = plan_read("t", &query, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TraversalError::OrphanSortKey { .. }));
    }

    #[test]
    fn test_should_reject_conflicting_filter_value() {
        let query = compiled(QueryTokens::default().partition("a").filter("pk = 'b'"));
        let err = plan_read("t", &query, ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TraversalError::PlaceholderConflict { ref placeholder } if placeholder == ":pk"));

        let query = compiled(QueryTokens::default().partition("a").filter("pk = 'a'"));
        assert!(plan_read("t", &query, ReadOptions::default()).is_ok());
    }

    #[test]
    fn test_should_keep_sanitized_key_apart_from_filter_name() {
        let schema = KeySchema::new(KeyAttribute::string("user-id"));
        let query = compile(
            &QueryTokens::default().partition("u1").filter("user_id = 'a'"),
            &schema,
        )
        .unwrap();
        let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap() else {
            panic!("expected query");
        };

        assert_eq!(q.key_condition_expression, "#user_id_1 = :user_id_1");
        assert_eq!(q.filter_expression.as_deref(), Some("#user_id = :user_id"));
        assert_eq!(q.expression_attribute_names["#user_id_1"], "user-id");
        assert_eq!(q.expression_attribute_names["#user_id"], "user_id");
        assert_eq!(q.expression_attribute_values[":user_id_1"], AttributeValue::from("u1"));
        assert_eq!(q.expression_attribute_values[":user_id"], AttributeValue::from("a"));
    }

    #[test]
    fn test_should_keep_between_upper_bound_apart_from_filter_value() {
        let query = compiled(
            QueryTokens::default()
                .partition("a")
                .sort("between(1, 9)")
                .filter("sk2 = 3"),
        );
        let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap() else {
            panic!("expected query");
        };

        assert_eq!(q.key_condition_expression, "#pk = :pk AND #sk_1 BETWEEN :sk_1 AND :sk_12");
        assert_eq!(q.expression_attribute_names["#sk_1"], "sk");
        assert_eq!(q.expression_attribute_names["#sk2"], "sk2");
        let values = &q.expression_attribute_values;
        assert_eq!(values[":sk_1"], AttributeValue::N("1".to_owned()));
        assert_eq!(values[":sk_12"], AttributeValue::N("9".to_owned()));
        assert_eq!(values[":sk2"], AttributeValue::N("3".to_owned()));
    }

    #[test]
    fn test_should_keep_partition_and_sort_tokens_distinct() {
        let schema = KeySchema::new(KeyAttribute::string("a-b"))
            .with_sort_key(KeyAttribute::string("a_b"));
        let query = compile(&QueryTokens::default().partition("x").sort("y"), &schema).unwrap();
        let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap() else {
            panic!("expected query");
        };

        assert_eq!(q.key_condition_expression, "#a_b = :a_b AND #a_b_1 = :a_b_1");
        assert_eq!(q.expression_attribute_names["#a_b"], "a-b");
        assert_eq!(q.expression_attribute_names["#a_b_1"], "a_b");
    }

    #[test]
    fn test_should_encode_binary_keys() {
        let schema = KeySchema::new(KeyAttribute {
            name: "blob-id".to_owned(),
            attr_type: ScalarAttributeType::B,
        });
        let query = compile(&QueryTokens::default().partition("aGk="), &schema).unwrap();
        let ReadRequest::Query(q) = plan_read("t", &query, ReadOptions::default()).unwrap() else {
            panic!("expected query");
        };
        assert_eq!(q.key_condition_expression, "#blob_id = :blob_id");
        assert_eq!(q.expression_attribute_names["#blob_id"], "blob-id");
        assert_eq!(
            q.expression_attribute_values[":blob_id"],
            AttributeValue::B(Bytes::from_static(b"hi"))
        );

        let query = compile(&QueryTokens::default().partition("%%"), &schema).unwrap();
        assert!(matches!(
            plan_read("t", &query, ReadOptions::default()),
            Err(TraversalError::InvalidKeyValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_run_independent_traversals() {
        let table = PagedTable::new(5, 2);
        let query = CompiledQuery::default();
        let a = traverse(&table, "t", &query, ReadOptions::default()).unwrap();
        let b = traverse(&table, "t", &query, ReadOptions::default()).unwrap();
        let (a, b): (Vec<Item>, Vec<Item>) =
            futures::try_join!(a.try_collect(), b.try_collect()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(table.reads(), 6);
    }
}
