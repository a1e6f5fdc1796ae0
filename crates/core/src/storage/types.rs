use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::order::{AttrValue, OrderKey, OrderRecord, ATTR_CUSTOMER_ID, ATTR_ORDER_ID, ATTR_STATUS};

/// The key shape of a storage request.
///
/// The logical request model allows a partition-only key; whether that is
/// acceptable depends on the table schema. The orders table has a composite
/// key, so backends reject `sort: None` instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl RecordKey {
    /// Creates a partition-only key.
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Creates a full composite key.
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

impl From<&OrderKey> for RecordKey {
    fn from(key: &OrderKey) -> Self {
        RecordKey::composite(key.customer_id.clone(), key.order_id.clone())
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sort {
            Some(sort) => write!(f, "{}/{}", self.partition, sort),
            None => write!(f, "{}", self.partition),
        }
    }
}

/// Sort-key ordering of query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Condition applied to the sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    /// No condition: the whole partition.
    Any,
    /// Exact equality: at most one record on the base table.
    Equals(String),
    /// Prefix match.
    BeginsWith(String),
}

impl SortKeyCondition {
    /// Evaluates the condition against a sort-key value.
    pub fn accepts(&self, sort_value: &str) -> bool {
        match self {
            SortKeyCondition::Any => true,
            SortKeyCondition::Equals(value) => sort_value == value,
            SortKeyCondition::BeginsWith(prefix) => sort_value.starts_with(prefix),
        }
    }
}

/// A key-condition query against the base table or a named index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Secondary index to query, or `None` for the base table.
    pub index: Option<String>,
    /// Value the partition (or index key) attribute must equal.
    pub key_value: String,
    /// Condition on the sort key.
    pub sort: SortKeyCondition,
    /// Result ordering along the sort key.
    pub direction: SortDirection,
}

impl QueryRequest {
    /// Query a whole partition of the base table.
    pub fn partition(key_value: impl Into<String>) -> Self {
        Self {
            index: None,
            key_value: key_value.into(),
            sort: SortKeyCondition::Any,
            direction: SortDirection::Ascending,
        }
    }

    /// Query a named secondary index by key equality.
    pub fn index(name: impl Into<String>, key_value: impl Into<String>) -> Self {
        Self {
            index: Some(name.into()),
            key_value: key_value.into(),
            sort: SortKeyCondition::Any,
            direction: SortDirection::Ascending,
        }
    }

    /// Sets the sort-key condition.
    pub fn with_sort(mut self, sort: SortKeyCondition) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the result ordering.
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// A boolean predicate over record attributes.
///
/// The table service evaluates the filter after reading each page, so a
/// filtered scan reads the whole table regardless of how few records match.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanFilter {
    /// `attribute == value`.
    Eq { attribute: String, value: AttrValue },
    /// Conjunction of predicates.
    And(Vec<ScanFilter>),
}

impl ScanFilter {
    /// `attribute == value` predicate.
    pub fn attr_eq(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        ScanFilter::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Conjunction with another predicate.
    pub fn and(self, other: ScanFilter) -> Self {
        match self {
            ScanFilter::And(mut filters) => {
                filters.push(other);
                ScanFilter::And(filters)
            }
            filter => ScanFilter::And(vec![filter, other]),
        }
    }

    /// Evaluates the predicate against a record.
    pub fn matches(&self, record: &OrderRecord) -> bool {
        match self {
            ScanFilter::Eq { attribute, value } => {
                record.attr(attribute).as_ref() == Some(value)
            }
            ScanFilter::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}

/// Opaque continuation token returned with a partial result set.
///
/// Internally the key map of the last evaluated record; callers only thread
/// it back into the next page request.
#[derive(Debug, Clone, PartialEq)]
pub struct PageToken(HashMap<String, AttrValue>);

impl PageToken {
    pub fn new(key_map: HashMap<String, AttrValue>) -> Self {
        Self(key_map)
    }

    pub fn as_map(&self) -> &HashMap<String, AttrValue> {
        &self.0
    }

    pub fn into_map(self) -> HashMap<String, AttrValue> {
        self.0
    }
}

/// One page of records, with the token to fetch the next one.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<OrderRecord>,
    pub next: Option<PageToken>,
}

/// Key attributes of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub key_attribute: String,
    pub sort_attribute: Option<String>,
}

/// Key attributes of the table and its secondary indexes.
///
/// Shared by the client backends and the deploy tooling so there is exactly
/// one description of the table shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub partition_attribute: String,
    pub sort_attribute: String,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// The canonical orders table: partition `customer_id`, sort
    /// `order_id`, and the `status-index` GSI keyed on `status` with
    /// `order_id` as its range key.
    pub fn orders() -> Self {
        Self {
            table_name: "orders".to_string(),
            partition_attribute: ATTR_CUSTOMER_ID.to_string(),
            sort_attribute: ATTR_ORDER_ID.to_string(),
            indexes: vec![IndexSchema {
                name: "status-index".to_string(),
                key_attribute: ATTR_STATUS.to_string(),
                sort_attribute: Some(ATTR_ORDER_ID.to_string()),
            }],
        }
    }

    /// Sets the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Looks up a secondary index by name.
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// True if `name` is one of the primary key attributes.
    pub fn is_key_attribute(&self, name: &str) -> bool {
        name == self.partition_attribute || name == self.sort_attribute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_eq_matches_named_field() {
        let record = OrderRecord::new("cus-01", "ord-1").with_status("pending");
        let filter = ScanFilter::attr_eq("status", "pending");

        assert!(filter.matches(&record));
        assert!(!ScanFilter::attr_eq("status", "shipped").matches(&record));
    }

    #[test]
    fn test_filter_eq_matches_extension_attribute() {
        let record = OrderRecord::new("cus-01", "ord-1").with_attr("carrier", "DHL");

        assert!(ScanFilter::attr_eq("carrier", "DHL").matches(&record));
        assert!(!ScanFilter::attr_eq("carrier", "UPS").matches(&record));
        assert!(!ScanFilter::attr_eq("missing", "x").matches(&record));
    }

    #[test]
    fn test_filter_and_flattens() {
        let filter = ScanFilter::attr_eq("status", "pending")
            .and(ScanFilter::attr_eq("carrier", "DHL"))
            .and(ScanFilter::attr_eq("customer_id", "cus-01"));

        match &filter {
            ScanFilter::And(filters) => assert_eq!(filters.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }

        let record = OrderRecord::new("cus-01", "ord-1")
            .with_status("pending")
            .with_attr("carrier", "DHL");
        assert!(filter.matches(&record));

        let other = OrderRecord::new("cus-02", "ord-1")
            .with_status("pending")
            .with_attr("carrier", "DHL");
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_sort_key_condition() {
        assert!(SortKeyCondition::Any.accepts("ord-1"));
        assert!(SortKeyCondition::Equals("ord-1".to_string()).accepts("ord-1"));
        assert!(!SortKeyCondition::Equals("ord-1".to_string()).accepts("ord-10"));
        assert!(SortKeyCondition::BeginsWith("ord-".to_string()).accepts("ord-10"));
        assert!(!SortKeyCondition::BeginsWith("inv-".to_string()).accepts("ord-10"));
    }

    #[test]
    fn test_orders_schema() {
        let schema = TableSchema::orders();

        assert_eq!(schema.table_name, "orders");
        assert!(schema.is_key_attribute("customer_id"));
        assert!(schema.is_key_attribute("order_id"));
        assert!(!schema.is_key_attribute("status"));

        let index = schema.index("status-index").unwrap();
        assert_eq!(index.key_attribute, "status");
        assert_eq!(index.sort_attribute.as_deref(), Some("order_id"));
        assert!(schema.index("other-index").is_none());
    }

    #[test]
    fn test_record_key_from_order_key() {
        let key = OrderKey::new("cus-05", "ord-4");
        let record_key = RecordKey::from(&key);

        assert_eq!(record_key.partition, "cus-05");
        assert_eq!(record_key.sort.as_deref(), Some("ord-4"));
        assert_eq!(record_key.to_string(), "cus-05/ord-4");
        assert_eq!(RecordKey::partition("cus-05").to_string(), "cus-05");
    }
}
