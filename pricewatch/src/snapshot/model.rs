use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached last observation of one product.
///
/// Invariant: `lowest_price <= price`, and `lowest_price` never increases
/// over the lifetime of the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub price: u64,
    pub is_sold_out: bool,
    pub lowest_price: u64,
}

impl SnapshotEntry {
    /// Entry for a product seen for the first time.
    pub fn first(price: u64, is_sold_out: bool) -> Self {
        Self {
            price,
            is_sold_out,
            lowest_price: price,
        }
    }

    /// True when the observation matches this entry exactly.
    pub fn matches(&self, price: u64, is_sold_out: bool) -> bool {
        self.price == price && self.is_sold_out == is_sold_out
    }

    /// Successor entry after observing `price`.
    pub fn advance(&self, price: u64, is_sold_out: bool) -> Self {
        Self {
            price,
            is_sold_out,
            lowest_price: self.lowest_price.min(price),
        }
    }
}

pub fn product_key(product_id: &Uuid) -> String {
    format!("product:{product_id}")
}

pub fn token_key(user_id: &Uuid) -> String {
    format!("token:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let e = SnapshotEntry::first(12_900, false);
        let json = serde_json::to_string(&e).unwrap();

        assert_eq!(json, r#"{"price":12900,"isSoldOut":false,"lowestPrice":12900}"#);
        assert_eq!(serde_json::from_str::<SnapshotEntry>(&json).unwrap(), e);
    }

    #[test]
    fn keys_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            product_key(&id),
            "product:00000000-0000-0000-0000-000000000000"
        );
        assert!(token_key(&id).starts_with("token:"));
    }
}
