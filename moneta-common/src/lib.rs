pub mod amount;
pub mod currency;
pub mod page;

pub use amount::{Amount, AmountError};
pub use currency::{is_valid_blockchain_key, CurrencyKey, CurrencyKeyError};
pub use page::{Page, PageRequest};

use uuid::Uuid;

/// Generates an opaque entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
