//! In-memory implementation of the table service.
//!
//! Behaves like the remote service at the request/response level: it
//! slices scans and queries into pages with continuation tokens, evaluates
//! filters after the page slice, and can inject throttling, unprocessed
//! deletions, and an eventual-consistency window on index reads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use orderstore_core::order::{AttrValue, OrderKey, OrderRecord};
use orderstore_core::storage::{
    Page, PageToken, QueryRequest, RecordKey, Result, ScanFilter, SortDirection, StoreError,
    TableSchema, TableStore, UpdatePatch,
};

/// Maximum items the service accepts in one batch write request.
const SERVICE_BATCH_BOUND: usize = 25;

#[derive(Debug, Default)]
struct Faults {
    failing_deletes: HashSet<OrderKey>,
    throttle_remaining: u32,
    delete_batch_sizes: Vec<usize>,
}

/// In-memory table backend.
///
/// Records live in a `BTreeMap` keyed by `(customer_id, order_id)`, which
/// gives a deterministic scan order and sorted sort keys. Cloning shares
/// the underlying storage, so a test can keep a handle while the client
/// owns another.
#[derive(Debug, Clone)]
pub struct InMemoryTableStore {
    schema: TableSchema,
    page_size: usize,
    index_lag: bool,
    records: Arc<RwLock<BTreeMap<(String, String), OrderRecord>>>,
    index_visible: Arc<RwLock<HashSet<(String, String)>>>,
    faults: Arc<Mutex<Faults>>,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    /// Creates an empty store with the canonical orders schema.
    pub fn new() -> Self {
        Self {
            schema: TableSchema::orders(),
            page_size: 100,
            index_lag: false,
            records: Arc::new(RwLock::new(BTreeMap::new())),
            index_visible: Arc::new(RwLock::new(HashSet::new())),
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Sets how many records a scan or query page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes index reads lag behind writes until [`propagate_index`] is
    /// called, emulating the eventual consistency of a secondary index.
    ///
    /// [`propagate_index`]: InMemoryTableStore::propagate_index
    pub fn with_index_lag(mut self) -> Self {
        self.index_lag = true;
        self
    }

    /// Makes the next `n` requests fail with a throttling error.
    pub async fn throttle_next(&self, n: u32) {
        self.faults.lock().await.throttle_remaining = n;
    }

    /// Marks keys whose deletions the service will persistently leave
    /// unprocessed.
    pub async fn fail_deletes_for(&self, keys: Vec<OrderKey>) {
        self.faults.lock().await.failing_deletes.extend(keys);
    }

    /// Makes every stored record visible to index reads.
    pub async fn propagate_index(&self) {
        let records = self.records.read().await;
        let mut visible = self.index_visible.write().await;
        visible.extend(records.keys().cloned());
    }

    /// Sizes of the delete batches received so far.
    pub async fn delete_batch_sizes(&self) -> Vec<usize> {
        self.faults.lock().await.delete_batch_sizes.clone()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Fetches a record directly, bypassing the request model.
    pub async fn get(&self, key: &OrderKey) -> Option<OrderRecord> {
        self.records
            .read()
            .await
            .get(&(key.customer_id.clone(), key.order_id.clone()))
            .cloned()
    }

    async fn take_throttle(&self) -> Result<()> {
        let mut faults = self.faults.lock().await;
        if faults.throttle_remaining > 0 {
            faults.throttle_remaining -= 1;
            return Err(StoreError::Throttled("injected throttle".to_string()));
        }
        Ok(())
    }

    fn token_for(&self, record: &OrderRecord) -> PageToken {
        let mut key_map = HashMap::new();
        key_map.insert(
            self.schema.partition_attribute.clone(),
            AttrValue::S(record.customer_id.clone()),
        );
        key_map.insert(
            self.schema.sort_attribute.clone(),
            AttrValue::S(record.order_id.clone()),
        );
        PageToken::new(key_map)
    }

    fn token_key(&self, token: &PageToken) -> Result<(String, String)> {
        let partition = token
            .as_map()
            .get(&self.schema.partition_attribute)
            .and_then(|v| v.as_s());
        let sort = token
            .as_map()
            .get(&self.schema.sort_attribute)
            .and_then(|v| v.as_s());
        match (partition, sort) {
            (Some(partition), Some(sort)) => Ok((partition.to_string(), sort.to_string())),
            _ => Err(StoreError::Validation(
                "continuation token does not carry the table key".to_string(),
            )),
        }
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn put_record(&self, record: &OrderRecord) -> Result<()> {
        self.take_throttle().await?;
        if record.customer_id.is_empty() || record.order_id.is_empty() {
            return Err(StoreError::Validation(
                "missing required key attribute".to_string(),
            ));
        }

        let key = (record.customer_id.clone(), record.order_id.clone());
        self.records.write().await.insert(key.clone(), record.clone());
        if !self.index_lag {
            self.index_visible.write().await.insert(key);
        }
        Ok(())
    }

    async fn scan_page(
        &self,
        filter: Option<&ScanFilter>,
        start: Option<PageToken>,
    ) -> Result<Page> {
        self.take_throttle().await?;
        let records = self.records.read().await;

        let start_key = start.map(|token| self.token_key(&token)).transpose()?;
        let scanned: Vec<&OrderRecord> = records
            .iter()
            .filter(|(key, _)| match &start_key {
                Some(start_key) => *key > start_key,
                None => true,
            })
            .map(|(_, record)| record)
            .take(self.page_size)
            .collect();

        let remaining = records
            .keys()
            .filter(|key| match &start_key {
                Some(start_key) => *key > start_key,
                None => true,
            })
            .count();
        let next = if remaining > scanned.len() {
            scanned.last().map(|record| self.token_for(record))
        } else {
            None
        };

        // The filter only narrows what is returned, never what is scanned.
        let items = scanned
            .into_iter()
            .filter(|record| filter.map_or(true, |f| f.matches(record)))
            .cloned()
            .collect();

        Ok(Page { items, next })
    }

    async fn query_page(&self, request: &QueryRequest, start: Option<PageToken>) -> Result<Page> {
        self.take_throttle().await?;
        let records = self.records.read().await;

        let mut matched: Vec<&OrderRecord> = match &request.index {
            None => records
                .values()
                .filter(|r| r.customer_id == request.key_value)
                .filter(|r| request.sort.accepts(&r.order_id))
                .collect(),
            Some(name) => {
                let index = self.schema.index(name).ok_or_else(|| {
                    StoreError::Validation(format!("unknown index '{name}'"))
                })?;
                let visible = self.index_visible.read().await;
                records
                    .values()
                    .filter(|r| {
                        !self.index_lag
                            || visible.contains(&(r.customer_id.clone(), r.order_id.clone()))
                    })
                    .filter(|r| {
                        r.attr(&index.key_attribute)
                            == Some(AttrValue::S(request.key_value.clone()))
                    })
                    .filter(|r| match &index.sort_attribute {
                        Some(attribute) => r
                            .attr(attribute)
                            .and_then(|v| v.as_s().map(str::to_string))
                            .is_some_and(|v| request.sort.accepts(&v)),
                        None => matches!(
                            request.sort,
                            orderstore_core::storage::SortKeyCondition::Any
                        ),
                    })
                    .collect()
            }
        };

        // The service orders index results by the range key and breaks ties
        // on the primary key.
        matched.sort_by(|a, b| {
            (&a.order_id, &a.customer_id).cmp(&(&b.order_id, &b.customer_id))
        });
        if request.direction == SortDirection::Descending {
            matched.reverse();
        }

        let start_pos = match start {
            None => 0,
            Some(token) => {
                let (partition, sort) = self.token_key(&token)?;
                let resume_after = (sort, partition);
                matched
                    .iter()
                    .position(|r| {
                        let entry = (r.order_id.clone(), r.customer_id.clone());
                        match request.direction {
                            SortDirection::Ascending => entry > resume_after,
                            SortDirection::Descending => entry < resume_after,
                        }
                    })
                    .unwrap_or(matched.len())
            }
        };

        let page: Vec<&OrderRecord> = matched
            .iter()
            .skip(start_pos)
            .take(self.page_size)
            .copied()
            .collect();
        let next = if start_pos + page.len() < matched.len() {
            page.last().map(|record| self.token_for(record))
        } else {
            None
        };

        Ok(Page {
            items: page.into_iter().cloned().collect(),
            next,
        })
    }

    async fn update_record(
        &self,
        key: &RecordKey,
        patch: &UpdatePatch,
    ) -> Result<HashMap<String, AttrValue>> {
        self.take_throttle().await?;

        let Some(sort) = &key.sort else {
            return Err(StoreError::Validation(format!(
                "the '{}' table has a composite primary key; update requires '{}'",
                self.schema.table_name, self.schema.sort_attribute
            )));
        };
        patch.validate(&self.schema)?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(key.partition.clone(), sort.clone()))
            .ok_or_else(|| StoreError::NotFound {
                id: key.to_string(),
            })?;

        Ok(patch.apply_to(record))
    }

    async fn delete_batch(&self, keys: &[OrderKey]) -> Result<Vec<OrderKey>> {
        self.take_throttle().await?;
        if keys.len() > SERVICE_BATCH_BOUND {
            return Err(StoreError::Validation(format!(
                "batch write supports at most {SERVICE_BATCH_BOUND} items, got {}",
                keys.len()
            )));
        }

        let mut faults = self.faults.lock().await;
        faults.delete_batch_sizes.push(keys.len());

        let mut records = self.records.write().await;
        let mut visible = self.index_visible.write().await;
        let mut unprocessed = Vec::new();
        for key in keys {
            if faults.failing_deletes.contains(key) {
                unprocessed.push(key.clone());
                continue;
            }
            let entry = (key.customer_id.clone(), key.order_id.clone());
            records.remove(&entry);
            visible.remove(&entry);
        }

        Ok(unprocessed)
    }
}
