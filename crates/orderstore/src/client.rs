use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use futures_util::Stream;

use orderstore_core::order::{AttrValue, OrderKey, OrderRecord, ATTR_UPDATED_DATE};
use orderstore_core::storage::{
    PageToken, QueryRequest, RecordKey, Result, ScanFilter, SortDirection, SortKeyCondition,
    StoreError, TableStore, UpdatePatch,
};

use crate::retry::{with_backoff, RetryPolicy};

/// Maximum keys per batch write request, bounded by the table service.
pub const MAX_DELETE_BATCH_SIZE: usize = 25;

/// Typed client for one orders table.
///
/// Wraps a [`TableStore`] backend and owns everything the backend leaves
/// out: continuation-token loops, batch chunking, retry of throttled
/// requests, and timestamp stamping. The client is stateless between calls;
/// the only state threaded anywhere is the continuation token inside a
/// pagination loop.
pub struct TableClient<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: TableStore> TableClient<S> {
    /// Creates a client over the given backend with the default retry
    /// policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the throttling retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Inserts or overwrites a record (last write wins). No uniqueness
    /// check is performed; supply distinct keys to keep records distinct.
    pub async fn put(&self, record: &OrderRecord) -> Result<()> {
        require_value("customer_id", &record.customer_id)?;
        require_value("order_id", &record.order_id)?;
        self.with_retry(|| self.store.put_record(record)).await
    }

    /// Lazily scans the whole table, yielding records that match the
    /// filter in the service's internal scan order (not meaningful).
    ///
    /// Continuation tokens are followed transparently, including pages the
    /// filter empties out entirely. The stream is finite and restartable
    /// only by calling this method again.
    pub fn scan_filtered(
        &self,
        filter: ScanFilter,
    ) -> impl Stream<Item = Result<OrderRecord>> + '_ {
        async_stream::try_stream! {
            let mut start: Option<PageToken> = None;
            let mut pages = 0usize;
            loop {
                let token = start.take();
                let page = self
                    .with_retry(|| self.store.scan_page(Some(&filter), token.clone()))
                    .await?;
                pages += 1;
                tracing::debug!(page = pages, items = page.items.len(), "fetched scan page");
                for record in page.items {
                    yield record;
                }
                match page.next {
                    Some(next) => start = Some(next),
                    None => break,
                }
            }
        }
    }

    /// Scans the whole table and collects every matching record.
    pub async fn scan_filtered_all(&self, filter: ScanFilter) -> Result<Vec<OrderRecord>> {
        use futures_util::TryStreamExt;

        let stream = self.scan_filtered(filter);
        futures_util::pin_mut!(stream);
        stream.try_collect().await
    }

    /// Returns every record of one partition, ordered by sort key.
    pub async fn query_by_partition(
        &self,
        customer_id: &str,
        direction: SortDirection,
    ) -> Result<Vec<OrderRecord>> {
        require_value("customer_id", customer_id)?;
        self.query_all(QueryRequest::partition(customer_id).with_direction(direction))
            .await
    }

    /// Returns the record with the exact compound key, if it exists.
    pub async fn query_by_key(
        &self,
        customer_id: &str,
        order_id: &str,
    ) -> Result<Option<OrderRecord>> {
        require_value("customer_id", customer_id)?;
        require_value("order_id", order_id)?;
        let mut records = self
            .query_all(
                QueryRequest::partition(customer_id)
                    .with_sort(SortKeyCondition::Equals(order_id.to_string())),
            )
            .await?;
        Ok(records.pop())
    }

    /// Returns the records of one partition whose sort key starts with
    /// `prefix`, ordered by sort key.
    pub async fn query_by_sort_prefix(
        &self,
        customer_id: &str,
        prefix: &str,
        direction: SortDirection,
    ) -> Result<Vec<OrderRecord>> {
        require_value("customer_id", customer_id)?;
        self.query_all(
            QueryRequest::partition(customer_id)
                .with_sort(SortKeyCondition::BeginsWith(prefix.to_string()))
                .with_direction(direction),
        )
        .await
    }

    /// Returns every record whose indexed attribute equals `key_value`,
    /// via the named secondary index, ordered by the index sort key.
    ///
    /// The index is eventually consistent with the base table: results may
    /// omit records written moments ago.
    pub async fn query_by_index(
        &self,
        index_name: &str,
        key_value: &str,
        direction: SortDirection,
    ) -> Result<Vec<OrderRecord>> {
        require_value("index name", index_name)?;
        require_value("key value", key_value)?;
        self.query_all(QueryRequest::index(index_name, key_value).with_direction(direction))
            .await
    }

    /// Applies a partial attribute merge to an existing record and returns
    /// the new values of the assigned attributes.
    ///
    /// `updated_date` is stamped automatically unless the patch assigns it.
    /// Updating a missing record fails with `NotFound`; this client never
    /// upserts.
    pub async fn update(
        &self,
        key: &OrderKey,
        patch: UpdatePatch,
    ) -> Result<HashMap<String, AttrValue>> {
        require_value("customer_id", &key.customer_id)?;
        require_value("order_id", &key.order_id)?;

        let patch = if patch.sets_attribute(ATTR_UPDATED_DATE) {
            patch
        } else {
            patch.set(ATTR_UPDATED_DATE, Utc::now().to_rfc3339())
        };

        let record_key = RecordKey::from(key);
        self.with_retry(|| self.store.update_record(&record_key, &patch))
            .await
    }

    /// Deletes records by key in one logical batch.
    ///
    /// The input is chunked at the service bound of
    /// [`MAX_DELETE_BATCH_SIZE`] keys. Keys the service leaves unprocessed
    /// are retried with backoff; whatever remains after the policy is
    /// exhausted surfaces as [`StoreError::PartialBatchFailure`] so the
    /// caller can retry exactly those keys.
    pub async fn batch_delete(&self, keys: Vec<OrderKey>) -> Result<()> {
        for key in &keys {
            require_value("customer_id", &key.customer_id)?;
            require_value("order_id", &key.order_id)?;
        }

        let mut unprocessed = Vec::new();
        for chunk in keys.chunks(MAX_DELETE_BATCH_SIZE) {
            let mut remaining = self.with_retry(|| self.store.delete_batch(chunk)).await?;

            let mut attempt = 0;
            while !remaining.is_empty() && attempt + 1 < self.retry.max_attempts {
                let delay = self.retry.delay(attempt);
                tracing::warn!(
                    remaining = remaining.len(),
                    attempt,
                    ?delay,
                    "retrying unprocessed deletions"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                remaining = self
                    .with_retry(|| self.store.delete_batch(&remaining))
                    .await?;
            }
            unprocessed.extend(remaining);
        }

        if unprocessed.is_empty() {
            Ok(())
        } else {
            Err(StoreError::PartialBatchFailure { unprocessed })
        }
    }

    async fn query_all(&self, request: QueryRequest) -> Result<Vec<OrderRecord>> {
        let mut records = Vec::new();
        let mut start: Option<PageToken> = None;
        loop {
            let token = start.take();
            let page = self
                .with_retry(|| self.store.query_page(&request, token.clone()))
                .await?;
            records.extend(page.items);
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        Ok(records)
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_backoff(&self.retry, op).await
    }
}

fn require_value(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("'{name}' must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::storage::inmemory::InMemoryTableStore;

    fn fast_client(store: InMemoryTableStore) -> TableClient<InMemoryTableStore> {
        TableClient::new(store).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    #[tokio::test]
    async fn test_put_then_query_by_key_round_trips() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store);

        let record = OrderRecord::new("cus-05", "ord-4")
            .with_status("pending")
            .with_attr("note", "rush delivery")
            .with_attr("quantity", 2i64);
        client.put(&record).await.unwrap();

        let found = client.query_by_key("cus-05", "ord-4").await.unwrap();
        assert_eq!(found, Some(record));

        let missing = client.query_by_key("cus-05", "ord-9").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_double_put_leaves_a_single_record() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store.clone());

        let record = OrderRecord::new("cus-01", "ord-1").with_status("pending");
        client.put(&record).await.unwrap();
        client.put(&record).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&record.key()).await, Some(record));
    }

    #[tokio::test]
    async fn test_put_rejects_missing_key_attributes() {
        let client = fast_client(InMemoryTableStore::new());
        let record = OrderRecord::new("", "ord-1");

        assert!(matches!(
            client.put(&record).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_filtered_is_complete_across_pages() {
        // Seven records over four pages of two; the cus-02 page matches
        // nothing, so the loop has to keep following tokens through it.
        let store = InMemoryTableStore::new().with_page_size(2);
        let client = fast_client(store);

        let seed = [
            ("cus-01", "ord-1", "pending"),
            ("cus-01", "ord-2", "shipped"),
            ("cus-02", "ord-1", "shipped"),
            ("cus-02", "ord-2", "shipped"),
            ("cus-03", "ord-1", "pending"),
            ("cus-03", "ord-2", "pending"),
            ("cus-04", "ord-1", "shipped"),
        ];
        for (customer, order, status) in seed {
            client
                .put(&OrderRecord::new(customer, order).with_status(status))
                .await
                .unwrap();
        }

        let matches = client
            .scan_filtered_all(ScanFilter::attr_eq("status", "pending"))
            .await
            .unwrap();

        assert_eq!(matches.len(), 3);
        let keys: HashSet<(String, String)> = matches
            .iter()
            .map(|r| (r.customer_id.clone(), r.order_id.clone()))
            .collect();
        assert_eq!(keys.len(), 3, "no duplicates across pages");
        assert!(matches.iter().all(|r| r.status.as_deref() == Some("pending")));
    }

    #[tokio::test]
    async fn test_scan_with_no_matches_returns_empty() {
        let store = InMemoryTableStore::new().with_page_size(2);
        let client = fast_client(store);

        for order in 1..=5 {
            client
                .put(&OrderRecord::new("cus-01", format!("ord-{order}")).with_status("shipped"))
                .await
                .unwrap();
        }

        let matches = client
            .scan_filtered_all(ScanFilter::attr_eq("status", "cancelled"))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_query_by_partition_descending_order() {
        let store = InMemoryTableStore::new().with_page_size(2);
        let client = fast_client(store);

        for order in [1, 3, 2, 5, 4] {
            client
                .put(&OrderRecord::new("cus-07", format!("ord-{order}")))
                .await
                .unwrap();
        }
        client.put(&OrderRecord::new("cus-08", "ord-9")).await.unwrap();

        let records = client
            .query_by_partition("cus-07", SortDirection::Descending)
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        let sort_keys: Vec<&str> = records.iter().map(|r| r.order_id.as_str()).collect();
        assert!(
            sort_keys.windows(2).all(|pair| pair[0] > pair[1]),
            "sort keys not strictly descending: {sort_keys:?}"
        );
    }

    #[tokio::test]
    async fn test_query_by_sort_prefix() {
        let client = fast_client(InMemoryTableStore::new());

        client.put(&OrderRecord::new("cus-01", "ord-1")).await.unwrap();
        client.put(&OrderRecord::new("cus-01", "ord-2")).await.unwrap();
        client.put(&OrderRecord::new("cus-01", "inv-1")).await.unwrap();

        let records = client
            .query_by_sort_prefix("cus-01", "ord-", SortDirection::Ascending)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.order_id.starts_with("ord-")));
    }

    #[tokio::test]
    async fn test_query_by_index_tolerates_the_consistency_window() {
        let store = InMemoryTableStore::new().with_index_lag();
        let client = fast_client(store.clone());

        let record = OrderRecord::new("cus-05", "ord-4").with_status("pending");
        client.put(&record).await.unwrap();

        let early = client
            .query_by_index("status-index", "pending", SortDirection::Ascending)
            .await
            .unwrap();
        if early.is_empty() {
            eprintln!("status-index lagged behind the write, as the service allows");
        }

        store.propagate_index().await;
        let settled = client
            .query_by_index("status-index", "pending", SortDirection::Ascending)
            .await
            .unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].key(), record.key());
    }

    #[tokio::test]
    async fn test_update_example_scenario() {
        let client = fast_client(InMemoryTableStore::new());

        let record = OrderRecord::new("cus-05", "ord-4").with_status("pending");
        client.put(&record).await.unwrap();

        let updated = client
            .update(&record.key(), UpdatePatch::new().set("status", "shipped"))
            .await
            .unwrap();
        assert_eq!(
            updated.get("status"),
            Some(&AttrValue::S("shipped".to_string()))
        );
        assert!(updated.contains_key("updated_date"));

        let found = client
            .query_by_key("cus-05", "ord-4")
            .await
            .unwrap()
            .expect("record should still exist");
        assert_eq!(found.status.as_deref(), Some("shipped"));
        assert!(found.updated_date.is_some());
        assert_eq!(found.created_date, record.created_date);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let client = fast_client(InMemoryTableStore::new());

        let result = client
            .update(
                &OrderKey::new("cus-05", "ord-4"),
                UpdatePatch::new().set("status", "shipped"),
            )
            .await;

        assert_eq!(
            result,
            Err(StoreError::NotFound {
                id: "cus-05/ord-4".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_update_rejects_key_attribute_changes() {
        let client = fast_client(InMemoryTableStore::new());
        let record = OrderRecord::new("cus-05", "ord-4");
        client.put(&record).await.unwrap();

        let result = client
            .update(
                &record.key(),
                UpdatePatch::new().set("customer_id", "cus-06"),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_batch_delete_reports_exactly_the_unprocessed_keys() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store.clone());

        let keys: Vec<OrderKey> = (1..=5)
            .map(|i| OrderKey::new(format!("cus-{i:02}"), "ord-1"))
            .collect();
        for key in &keys {
            client
                .put(&OrderRecord::new(&*key.customer_id, &*key.order_id))
                .await
                .unwrap();
        }

        let failing = vec![keys[1].clone(), keys[3].clone()];
        store.fail_deletes_for(failing.clone()).await;

        let result = client.batch_delete(keys.clone()).await;
        match result {
            Err(StoreError::PartialBatchFailure { mut unprocessed }) => {
                unprocessed.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
                assert_eq!(unprocessed, failing);
            }
            other => panic!("expected a partial batch failure, got {other:?}"),
        }

        assert!(store.get(&keys[0]).await.is_none());
        assert!(store.get(&keys[1]).await.is_some());
    }

    #[tokio::test]
    async fn test_batch_delete_chunks_at_the_service_bound() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store.clone());

        let keys: Vec<OrderKey> = (0..60)
            .map(|i| OrderKey::new("cus-01", format!("ord-{i:03}")))
            .collect();

        client.batch_delete(keys).await.unwrap();
        assert_eq!(store.delete_batch_sizes().await, vec![25, 25, 10]);
    }

    #[tokio::test]
    async fn test_batch_delete_of_nothing_is_a_no_op() {
        let client = fast_client(InMemoryTableStore::new());
        client.batch_delete(Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_throttled_requests_recover_within_the_policy() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store.clone());

        client
            .put(&OrderRecord::new("cus-01", "ord-1").with_status("pending"))
            .await
            .unwrap();

        store.throttle_next(2).await;
        let records = client
            .scan_filtered_all(ScanFilter::attr_eq("status", "pending"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_throttling_surfaces() {
        let store = InMemoryTableStore::new();
        let client = fast_client(store.clone());

        store.throttle_next(10).await;
        let result = client
            .query_by_partition("cus-01", SortDirection::Ascending)
            .await;

        assert!(matches!(result, Err(StoreError::Throttled(_))));
    }
}
