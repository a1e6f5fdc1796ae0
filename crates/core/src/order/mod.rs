//! The order record model.

mod types;

pub use types::{
    AttrValue, OrderKey, OrderRecord, ATTR_CREATED_DATE, ATTR_CUSTOMER_ID, ATTR_ORDER_ID,
    ATTR_STATUS, ATTR_UPDATED_DATE,
};
