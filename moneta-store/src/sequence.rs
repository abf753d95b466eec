use redb::{ReadableTable, TableDefinition, WriteTransaction};

use crate::error::StoreError;

/// Named monotonic counters, persisted alongside the data they order.
pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Returns the next value of the named sequence, starting at 1.
///
/// Sequences disambiguate rows that carry identical dates, so composite
/// date-ordered keys stay total. Must be called inside the write transaction
/// that inserts the row; an aborted transaction also rolls the counter back.
pub fn next_seq(txn: &WriteTransaction, name: &str) -> Result<u64, StoreError> {
    let mut table = txn.open_table(SEQUENCES)?;
    let current = table.get(name)?.map(|g| g.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(name, next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn sequences_are_monotonic_and_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let values: Vec<u64> = (0..3)
            .map(|_| {
                store
                    .write(|txn| next_seq(txn, "mutations"))
                    .unwrap()
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3]);

        let other: u64 = store.write(|txn| next_seq(txn, "payments")).unwrap();
        assert_eq!(other, 1);
    }
}
