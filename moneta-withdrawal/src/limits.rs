use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use moneta_common::{Amount, CurrencyKey};

/// Per-currency daily withdrawal caps, keyed by currency key. A currency
/// without an entry is uncapped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyLimits {
    limits: HashMap<String, Amount>,
}

impl DailyLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, currency: &CurrencyKey, limit: Amount) {
        self.limits.insert(currency.sort_key(), limit);
    }

    pub fn get(&self, currency: &CurrencyKey) -> Option<Amount> {
        self.limits.get(&currency.sort_key()).copied()
    }
}
