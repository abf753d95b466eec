use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition};
use tracing::{info, warn};

use moneta_common::{new_id, Amount, CurrencyKey, Page, PageRequest};
use moneta_store::{decode, encode, next_seq, prefix_bounds, Store, StoreError};

use crate::account::{Account, AccountMutation, AccountType, HistoryFilter, MutationKind, MutationLinks};
use crate::error::{LedgerError, Result};

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
// owner|token_id|type -> account id
const ACCOUNTS_BY_OWNER: TableDefinition<&str, &str> = TableDefinition::new("accounts_by_owner");
// account_id|date_millis|seq -> mutation
const MUTATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("account_mutations");

const MUTATION_SEQ: &str = "account_mutations";

/// The append-only account ledger and its derived balances.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    store: Store,
}

impl AccountLedger {
    pub fn new(store: Store) -> Result<Self> {
        store.write(|txn| {
            txn.open_table(ACCOUNTS).map_err(StoreError::from)?;
            txn.open_table(ACCOUNTS_BY_OWNER).map_err(StoreError::from)?;
            txn.open_table(MUTATIONS).map_err(StoreError::from)?;
            Ok::<_, LedgerError>(())
        })?;
        Ok(Self { store })
    }

    /// Idempotent upsert: returns the existing account unchanged when the
    /// (owner, currency, type) tuple is already present, otherwise creates it
    /// with a zero balance. Lookup and insert share one write transaction so
    /// two concurrent callers cannot both create.
    pub async fn get_or_create_account(
        &self,
        owner_id: &str,
        currency: &CurrencyKey,
        account_type: AccountType,
    ) -> Result<Account> {
        let index_key = account_index_key(owner_id, currency, account_type);
        self.store.write(|txn| {
            let mut index = txn.open_table(ACCOUNTS_BY_OWNER).map_err(StoreError::from)?;
            let mut accounts = txn.open_table(ACCOUNTS).map_err(StoreError::from)?;

            if let Some(existing_id) = index.get(index_key.as_str()).map_err(StoreError::from)? {
                let id = existing_id.value().to_string();
                drop(existing_id);
                let row = accounts
                    .get(id.as_str())
                    .map_err(StoreError::from)?
                    .ok_or_else(|| StoreError::Storage(format!("dangling account index {}", index_key)))?;
                return Ok(decode::<Account>(row.value())?);
            }

            let account = Account {
                id: new_id(),
                owner_id: owner_id.to_string(),
                currency: currency.clone(),
                account_type,
                balance: Amount::zero(),
            };
            accounts
                .insert(account.id.as_str(), encode(&account)?.as_slice())
                .map_err(StoreError::from)?;
            index
                .insert(index_key.as_str(), account.id.as_str())
                .map_err(StoreError::from)?;
            info!(
                owner = owner_id,
                currency = %currency,
                account_type = %account_type,
                "created account {}",
                account.id
            );
            Ok(account)
        })
    }

    /// Appends an immutable mutation and updates the maintained balance in
    /// the same transaction. The committed balance always equals the sum of
    /// the account's mutation amounts.
    pub async fn record_mutation(
        &self,
        account_id: &str,
        kind: MutationKind,
        amount: Amount,
        date: DateTime<Utc>,
        links: MutationLinks,
    ) -> Result<AccountMutation> {
        self.store.write(|txn| {
            let mut accounts = txn.open_table(ACCOUNTS).map_err(StoreError::from)?;
            let mut account = match accounts.get(account_id).map_err(StoreError::from)? {
                Some(row) => decode::<Account>(row.value())?,
                None => return Err(LedgerError::NotFound(account_id.to_string())),
            };

            account.balance = account.balance.checked_add(&amount)?;
            if account.balance.is_negative() {
                warn!(
                    account = account_id,
                    balance = %account.balance,
                    "account balance went negative"
                );
            }

            let seq = next_seq(txn, MUTATION_SEQ)?;
            let mutation = AccountMutation {
                id: new_id(),
                account_id: account_id.to_string(),
                kind,
                date,
                amount,
                links,
            };

            let mut mutations = txn.open_table(MUTATIONS).map_err(StoreError::from)?;
            mutations
                .insert(
                    mutation_key(account_id, date, seq).as_str(),
                    encode(&mutation)?.as_slice(),
                )
                .map_err(StoreError::from)?;
            accounts
                .insert(account_id, encode(&account)?.as_slice())
                .map_err(StoreError::from)?;

            info!(
                account = account_id,
                kind = ?kind,
                amount = %mutation.amount,
                balance = %account.balance,
                "recorded mutation"
            );
            Ok(mutation)
        })
    }

    /// All accounts of an owner, ordered by currency key. Empty when the
    /// owner has none.
    pub async fn get_balances(&self, owner_id: &str) -> Result<Vec<Account>> {
        let (start, end) = prefix_bounds(&format!("{}|", owner_id));
        self.store.read(|txn| {
            let index = txn.open_table(ACCOUNTS_BY_OWNER).map_err(StoreError::from)?;
            let accounts = txn.open_table(ACCOUNTS).map_err(StoreError::from)?;

            let mut result = Vec::new();
            for item in index
                .range(start.as_str()..end.as_str())
                .map_err(StoreError::from)?
            {
                let (_, id) = item.map_err(StoreError::from)?;
                let row = accounts
                    .get(id.value())
                    .map_err(StoreError::from)?
                    .ok_or_else(|| StoreError::Storage(format!("dangling account index for {}", id.value())))?;
                result.push(decode::<Account>(row.value())?);
            }
            Ok(result)
        })
    }

    /// Mutation history ordered by date descending.
    pub async fn get_transaction_history(
        &self,
        account_id: &str,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<AccountMutation>> {
        let mut matching = self.load_mutations(account_id, |m| filter.matches(m))?;
        matching.reverse();

        let total_count = matching.len();
        let items: Vec<AccountMutation> = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Ok(Page::new(items, total_count, page.offset))
    }

    /// Recomputes the balance from the mutation log. Audit hook: the result
    /// must equal the maintained balance on the account row.
    pub async fn replay_balance(&self, account_id: &str) -> Result<Amount> {
        let mutations = self.load_mutations(account_id, |_| true)?;
        let amounts: Vec<Amount> = mutations.iter().map(|m| m.amount).collect();
        Ok(Amount::sum(amounts.iter())?)
    }

    /// Loads an account by id.
    pub async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.store.read(|txn| {
            let accounts = txn.open_table(ACCOUNTS).map_err(StoreError::from)?;
            let result = match accounts.get(account_id).map_err(StoreError::from)? {
                Some(row) => Ok(decode::<Account>(row.value())?),
                None => Err(LedgerError::NotFound(account_id.to_string())),
            };
            result
        })
    }

    fn load_mutations(
        &self,
        account_id: &str,
        keep: impl Fn(&AccountMutation) -> bool,
    ) -> Result<Vec<AccountMutation>> {
        let (start, end) = prefix_bounds(&format!("{}|", account_id));
        self.store.read(|txn| {
            let mutations = txn.open_table(MUTATIONS).map_err(StoreError::from)?;
            let mut result = Vec::new();
            for item in mutations
                .range(start.as_str()..end.as_str())
                .map_err(StoreError::from)?
            {
                let (_, row) = item.map_err(StoreError::from)?;
                let mutation = decode::<AccountMutation>(row.value())?;
                if keep(&mutation) {
                    result.push(mutation);
                }
            }
            Ok(result)
        })
    }
}

fn account_index_key(owner_id: &str, currency: &CurrencyKey, account_type: AccountType) -> String {
    format!("{}|{}|{}", owner_id, currency.sort_key(), account_type.as_str())
}

fn mutation_key(account_id: &str, date: DateTime<Utc>, seq: u64) -> String {
    let millis = date.timestamp_millis().max(0) as u64;
    format!("{}|{:020}|{:012}", account_id, millis, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mutation_keys_order_by_date_then_seq() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let a = mutation_key("acct", early, 2);
        let b = mutation_key("acct", late, 1);
        let c = mutation_key("acct", late, 3);
        assert!(a < b && b < c);
    }
}
