//! Attribute conversion functions.
//!
//! Pure mappings between DynamoDB `AttributeValue` maps and the record
//! model. Testable in isolation without table access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

use orderstore_core::order::{
    AttrValue, OrderKey, OrderRecord, ATTR_CREATED_DATE, ATTR_CUSTOMER_ID, ATTR_ORDER_ID,
    ATTR_STATUS, ATTR_UPDATED_DATE,
};
use orderstore_core::storage::{PageToken, StoreError, TableSchema};

/// Convert a record to a DynamoDB item.
pub(super) fn record_to_item(record: &OrderRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert(
        ATTR_CUSTOMER_ID.to_string(),
        AttributeValue::S(record.customer_id.clone()),
    );
    item.insert(
        ATTR_ORDER_ID.to_string(),
        AttributeValue::S(record.order_id.clone()),
    );

    if let Some(status) = &record.status {
        item.insert(ATTR_STATUS.to_string(), AttributeValue::S(status.clone()));
    }
    if let Some(created) = record.created_date {
        item.insert(
            ATTR_CREATED_DATE.to_string(),
            AttributeValue::S(created.to_rfc3339()),
        );
    }
    if let Some(updated) = record.updated_date {
        item.insert(
            ATTR_UPDATED_DATE.to_string(),
            AttributeValue::S(updated.to_rfc3339()),
        );
    }

    for (name, value) in &record.attributes {
        item.insert(name.clone(), attr_to_attribute_value(value));
    }

    item
}

/// Convert a DynamoDB item back to a record.
pub(super) fn item_to_record(
    item: &HashMap<String, AttributeValue>,
) -> Result<OrderRecord, StoreError> {
    let mut record = OrderRecord {
        customer_id: get_string(item, ATTR_CUSTOMER_ID)?,
        order_id: get_string(item, ATTR_ORDER_ID)?,
        status: None,
        created_date: None,
        updated_date: None,
        attributes: HashMap::new(),
    };

    for (name, value) in item {
        match name.as_str() {
            ATTR_CUSTOMER_ID | ATTR_ORDER_ID => {}
            ATTR_STATUS => record.status = Some(string_value(name, value)?),
            ATTR_CREATED_DATE => record.created_date = Some(datetime_value(name, value)?),
            ATTR_UPDATED_DATE => record.updated_date = Some(datetime_value(name, value)?),
            other => {
                record
                    .attributes
                    .insert(other.to_string(), attribute_value_to_attr(name, value)?);
            }
        }
    }

    Ok(record)
}

/// Convert a scalar to the SDK shape.
pub(super) fn attr_to_attribute_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s.clone()),
        AttrValue::N(n) => AttributeValue::N(n.clone()),
        AttrValue::Bool(b) => AttributeValue::Bool(*b),
        AttrValue::Null => AttributeValue::Null(true),
    }
}

/// Convert an SDK scalar back. Non-scalar attribute types have no place in
/// the record model and surface as serialization errors.
pub(super) fn attribute_value_to_attr(
    name: &str,
    value: &AttributeValue,
) -> Result<AttrValue, StoreError> {
    match value {
        AttributeValue::S(s) => Ok(AttrValue::S(s.clone())),
        AttributeValue::N(n) => Ok(AttrValue::N(n.clone())),
        AttributeValue::Bool(b) => Ok(AttrValue::Bool(*b)),
        AttributeValue::Null(_) => Ok(AttrValue::Null),
        other => Err(StoreError::Serialization(format!(
            "attribute '{name}' has unsupported type: {other:?}"
        ))),
    }
}

/// Convert the updated-attributes map of an update response.
pub(super) fn attributes_to_attr_map(
    attributes: HashMap<String, AttributeValue>,
) -> Result<HashMap<String, AttrValue>, StoreError> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), attribute_value_to_attr(name, value)?)))
        .collect()
}

/// Convert a continuation token to an exclusive-start-key map.
pub(super) fn token_to_key_map(token: PageToken) -> HashMap<String, AttributeValue> {
    token
        .into_map()
        .iter()
        .map(|(name, value)| (name.clone(), attr_to_attribute_value(value)))
        .collect()
}

/// Convert a last-evaluated-key map to a continuation token.
pub(super) fn key_map_to_token(
    key_map: &HashMap<String, AttributeValue>,
) -> Result<PageToken, StoreError> {
    let map = key_map
        .iter()
        .map(|(name, value)| Ok((name.clone(), attribute_value_to_attr(name, value)?)))
        .collect::<Result<HashMap<_, _>, StoreError>>()?;
    Ok(PageToken::new(map))
}

/// The key map of a delete request.
pub(super) fn order_key_to_key_map(
    key: &OrderKey,
    schema: &TableSchema,
) -> HashMap<String, AttributeValue> {
    let mut map = HashMap::new();
    map.insert(
        schema.partition_attribute.clone(),
        AttributeValue::S(key.customer_id.clone()),
    );
    map.insert(
        schema.sort_attribute.clone(),
        AttributeValue::S(key.order_id.clone()),
    );
    map
}

/// Recover an order key from an unprocessed delete request.
pub(super) fn key_map_to_order_key(
    key_map: &HashMap<String, AttributeValue>,
    schema: &TableSchema,
) -> Result<OrderKey, StoreError> {
    let customer_id = get_string(key_map, &schema.partition_attribute)?;
    let order_id = get_string(key_map, &schema.sort_attribute)?;
    Ok(OrderKey::new(customer_id, order_id))
}

fn get_string(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<String, StoreError> {
    let value = item
        .get(name)
        .ok_or_else(|| StoreError::Serialization(format!("item is missing '{name}'")))?;
    string_value(name, value)
}

fn string_value(name: &str, value: &AttributeValue) -> Result<String, StoreError> {
    value
        .as_s()
        .map(|s| s.to_string())
        .map_err(|_| StoreError::Serialization(format!("attribute '{name}' is not a string")))
}

fn datetime_value(name: &str, value: &AttributeValue) -> Result<DateTime<Utc>, StoreError> {
    let raw = string_value(name, value)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("attribute '{name}' is not RFC 3339: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_item_round_trip() {
        let record = OrderRecord::new("cus-05", "ord-4")
            .with_status("pending")
            .with_attr("note", "rush delivery")
            .with_attr("quantity", 3i64)
            .with_attr("gift", true);

        let item = record_to_item(&record);
        let restored = item_to_record(&item).unwrap();

        assert_eq!(restored, record);
    }

    #[test]
    fn test_item_without_keys_is_a_serialization_error() {
        let mut item = HashMap::new();
        item.insert(
            "customer_id".to_string(),
            AttributeValue::S("cus-01".to_string()),
        );

        let result = item_to_record(&item);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_malformed_timestamp_is_a_serialization_error() {
        let record = OrderRecord::new("cus-01", "ord-1");
        let mut item = record_to_item(&record);
        item.insert(
            "created_date".to_string(),
            AttributeValue::S("yesterday".to_string()),
        );

        let result = item_to_record(&item);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_unsupported_attribute_type_is_rejected() {
        let record = OrderRecord::new("cus-01", "ord-1");
        let mut item = record_to_item(&record);
        item.insert(
            "tags".to_string(),
            AttributeValue::L(vec![AttributeValue::S("x".to_string())]),
        );

        let result = item_to_record(&item);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_token_round_trip() {
        let mut key_map = HashMap::new();
        key_map.insert(
            "customer_id".to_string(),
            AttributeValue::S("cus-02".to_string()),
        );
        key_map.insert(
            "order_id".to_string(),
            AttributeValue::S("ord-9".to_string()),
        );

        let token = key_map_to_token(&key_map).unwrap();
        assert_eq!(token_to_key_map(token), key_map);
    }

    #[test]
    fn test_order_key_maps() {
        let schema = TableSchema::orders();
        let key = OrderKey::new("cus-05", "ord-4");

        let key_map = order_key_to_key_map(&key, &schema);
        assert_eq!(key_map_to_order_key(&key_map, &schema).unwrap(), key);
    }
}
