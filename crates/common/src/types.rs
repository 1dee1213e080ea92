use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a row identifier backed by a storage-assigned `i64`.
///
/// Each identifier is a distinct type so a product id can never be passed
/// where an order id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw storage identifier.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw storage identifier.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a catalog product.
    ProductId
);
row_id!(
    /// Identifier of a product category.
    CategoryId
);
row_id!(
    /// Identifier of a product brand.
    BrandId
);
row_id!(
    /// Identifier of an order header.
    OrderId
);
row_id!(
    /// Identifier of a single order line.
    OrderLineId
);
row_id!(
    /// Reference to the user owning an order. Never validated by this backend.
    UserId
);

/// Client-chosen key that makes order placement safe to retry.
///
/// Two placements carrying the same key resolve to the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    /// Creates a new random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a key from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::str::FromStr for IdempotencyKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_preserve_value() {
        let id = ProductId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(OrderId::from(7).to_string(), "7");
    }

    #[test]
    fn row_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&ProductId::new(12)).unwrap();
        assert_eq!(json, "12");
        let id: BrandId = serde_json::from_str("3").unwrap();
        assert_eq!(id, BrandId::new(3));
    }

    #[test]
    fn idempotency_key_new_creates_unique_keys() {
        assert_ne!(IdempotencyKey::new(), IdempotencyKey::new());
    }

    #[test]
    fn idempotency_key_parses_uuid_strings() {
        let uuid = Uuid::new_v4();
        let key: IdempotencyKey = uuid.to_string().parse().unwrap();
        assert_eq!(key.as_uuid(), uuid);
        assert!("not-a-uuid".parse::<IdempotencyKey>().is_err());
    }
}
