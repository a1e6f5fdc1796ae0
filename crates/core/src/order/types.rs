use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute name of the partition key.
pub const ATTR_CUSTOMER_ID: &str = "customer_id";
/// Attribute name of the sort key.
pub const ATTR_ORDER_ID: &str = "order_id";
/// Attribute name of the status attribute (the `status-index` key).
pub const ATTR_STATUS: &str = "status";
/// Attribute name of the creation timestamp.
pub const ATTR_CREATED_DATE: &str = "created_date";
/// Attribute name of the last-update timestamp.
pub const ATTR_UPDATED_DATE: &str = "updated_date";

/// A schema-less attribute value.
///
/// Numbers are kept in the table service's decimal string form so values
/// round-trip without precision loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// UTF-8 string.
    S(String),
    /// Number, as a decimal string.
    N(String),
    /// Boolean.
    Bool(bool),
    /// Explicit null.
    Null,
}

impl AttrValue {
    /// Returns the string content if this is a string value.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the decimal string if this is a number value.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttrValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::S(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::S(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::N(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::N(value.to_string())
    }
}

/// The composite primary key of an [`OrderRecord`].
///
/// The pair `(customer_id, order_id)` uniquely identifies a record within
/// the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub customer_id: String,
    pub order_id: String,
}

impl OrderKey {
    /// Creates a key from its two components.
    pub fn new(customer_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: order_id.into(),
        }
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.customer_id, self.order_id)
    }
}

/// A record in the orders table.
///
/// Only the two key attributes are required; everything else is optional
/// and independently mutable. Attributes that have no named field live in
/// the open `attributes` extension map, so records written by newer code
/// survive a round-trip through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Partition key. Immutable once written.
    pub customer_id: String,
    /// Sort key. Immutable once written.
    pub order_id: String,
    /// Mutable status attribute; also the key of the `status-index`.
    pub status: Option<String>,
    /// Stamped when the record is constructed, stored as RFC 3339.
    pub created_date: Option<DateTime<Utc>>,
    /// Stamped by update operations, stored as RFC 3339.
    pub updated_date: Option<DateTime<Utc>>,
    /// Open extension mapping for attributes without a named field.
    #[serde(default)]
    pub attributes: HashMap<String, AttrValue>,
}

impl OrderRecord {
    /// Creates a new record and stamps its creation timestamp.
    pub fn new(customer_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: order_id.into(),
            status: None,
            created_date: Some(Utc::now()),
            updated_date: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the status attribute.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets an extension attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns the composite key of this record.
    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.customer_id.clone(), self.order_id.clone())
    }

    /// Looks up an attribute by name, spanning both the named fields and
    /// the extension map. Timestamps are returned in their stored RFC 3339
    /// string form.
    pub fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            ATTR_CUSTOMER_ID => Some(AttrValue::S(self.customer_id.clone())),
            ATTR_ORDER_ID => Some(AttrValue::S(self.order_id.clone())),
            ATTR_STATUS => self.status.as_deref().map(AttrValue::from),
            ATTR_CREATED_DATE => self.created_date.map(|d| AttrValue::S(d.to_rfc3339())),
            ATTR_UPDATED_DATE => self.updated_date.map(|d| AttrValue::S(d.to_rfc3339())),
            other => self.attributes.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_stamps_created_date() {
        let record = OrderRecord::new("cus-01", "ord-1");

        assert_eq!(record.customer_id, "cus-01");
        assert_eq!(record.order_id, "ord-1");
        assert!(record.created_date.is_some());
        assert!(record.updated_date.is_none());
        assert!(record.status.is_none());
    }

    #[test]
    fn test_builder_helpers() {
        let record = OrderRecord::new("cus-01", "ord-1")
            .with_status("pending")
            .with_attr("note", "rush delivery")
            .with_attr("quantity", 3i64);

        assert_eq!(record.status.as_deref(), Some("pending"));
        assert_eq!(
            record.attributes.get("note"),
            Some(&AttrValue::S("rush delivery".to_string()))
        );
        assert_eq!(
            record.attributes.get("quantity"),
            Some(&AttrValue::N("3".to_string()))
        );
    }

    #[test]
    fn test_attr_lookup_spans_named_fields_and_extension_map() {
        let record = OrderRecord::new("cus-02", "ord-7")
            .with_status("shipped")
            .with_attr("carrier", "DHL");

        assert_eq!(
            record.attr("customer_id"),
            Some(AttrValue::S("cus-02".to_string()))
        );
        assert_eq!(
            record.attr("status"),
            Some(AttrValue::S("shipped".to_string()))
        );
        assert_eq!(record.attr("carrier"), Some(AttrValue::S("DHL".to_string())));
        assert_eq!(record.attr("missing"), None);

        let created = record.attr("created_date").unwrap();
        assert!(created.as_s().is_some());
    }

    #[test]
    fn test_key_display() {
        let key = OrderKey::new("cus-05", "ord-4");
        assert_eq!(key.to_string(), "cus-05/ord-4");
    }

    #[test]
    fn test_attr_value_accessors() {
        assert_eq!(AttrValue::from("x").as_s(), Some("x"));
        assert_eq!(AttrValue::from(42i64).as_n(), Some("42"));
        assert_eq!(AttrValue::from(true).as_bool(), Some(true));
        assert_eq!(AttrValue::Null.as_s(), None);
    }
}
