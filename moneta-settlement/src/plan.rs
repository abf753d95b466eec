use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use moneta_common::Amount;

use crate::aggregator::{AggregatedBalances, ChainFailure};
use crate::config::SettlementConfig;
use crate::error::{Result, SettlementError};

fn check_ratio(ratio: Decimal) -> Result<()> {
    if ratio < Decimal::ZERO || ratio >= Decimal::ONE {
        return Err(SettlementError::Config(format!(
            "settlement ratio must be in [0, 1): {}",
            ratio
        )));
    }
    Ok(())
}

/// Exchange balance required for the given hot-wallet total, where `ratio`
/// is the exchange's target share of the combined (hot + exchange) balance:
/// `hot_total * ratio / (1 - ratio)`.
pub fn required_exchange_balance(hot_total: Decimal, ratio: Decimal) -> Result<Decimal> {
    check_ratio(ratio)?;
    Ok(hot_total * ratio / (Decimal::ONE - ratio))
}

/// Signed amount to move between hot wallets and the exchange: the gap
/// between the required exchange balance for the current hot-wallet total
/// and what the exchange currently holds. Positive moves funds to the
/// exchange, negative withdraws from it, zero is a no-op.
pub fn settlement_amount(
    hot_total: Decimal,
    exchange_balance: Decimal,
    ratio: Decimal,
) -> Result<Decimal> {
    Ok(required_exchange_balance(hot_total, ratio)? - exchange_balance)
}

/// Splits `amount` across chains in proportion to each chain's share of the
/// total. Shares are rounded to `scale` decimal places; the last chain takes
/// the remainder so the parts always sum to `amount` exactly. A zero total
/// distributes nothing.
pub fn proportional_distribution(
    amount: Decimal,
    per_chain_balances: &[Decimal],
    scale: u32,
) -> Vec<Decimal> {
    let total: Decimal = per_chain_balances.iter().sum();
    if per_chain_balances.is_empty() || total.is_zero() {
        return vec![Decimal::ZERO; per_chain_balances.len()];
    }

    let mut shares = Vec::with_capacity(per_chain_balances.len());
    let mut distributed = Decimal::ZERO;
    for (i, balance) in per_chain_balances.iter().enumerate() {
        let share = if i + 1 == per_chain_balances.len() {
            amount - distributed
        } else {
            (amount * balance / total).round_dp(scale)
        };
        distributed += share;
        shares.push(share);
    }
    shares
}

/// One chain's slice of a settlement plan. A positive amount leaves the hot
/// wallet for the exchange; a negative one comes back from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTransfer {
    pub blockchain_key: String,
    pub hot_wallet_address: String,
    pub amount: Amount,
    pub original_balance: Amount,
}

/// A computed rebalancing plan. Pure data: building one performs no I/O, so
/// the math is testable without live chains and a scheduler can log or
/// dry-run it before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub asset: String,
    pub hot_total: Amount,
    pub exchange_balance: Amount,
    /// Signed total to move; positive toward the exchange.
    pub amount: Amount,
    pub transfers: Vec<PlannedTransfer>,
    /// Transfers below the dust minimum, dropped from execution. Their
    /// amounts are deliberately not redistributed over the other chains.
    pub skipped_dust: Vec<PlannedTransfer>,
    /// Chains whose balance query failed; excluded from the plan entirely.
    pub failures: Vec<ChainFailure>,
}

impl SettlementPlan {
    pub fn is_noop(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Computes the rebalancing plan for one asset from a balance snapshot.
pub fn compute_plan(
    asset: &str,
    snapshot: &AggregatedBalances,
    exchange_balance: Decimal,
    config: &SettlementConfig,
) -> Result<SettlementPlan> {
    let hot_total = snapshot.total();
    let amount = settlement_amount(hot_total, exchange_balance, config.ratio)?;

    let balances: Vec<Decimal> = snapshot
        .balances
        .iter()
        .map(|b| b.balance.as_decimal())
        .collect();
    let shares = proportional_distribution(amount, &balances, config.distribution_scale);

    let dust_minimum = config.dust_minimum(asset).as_decimal();
    let mut transfers = Vec::new();
    let mut skipped_dust = Vec::new();
    for (chain, share) in snapshot.balances.iter().zip(shares) {
        if share.is_zero() {
            continue;
        }
        let transfer = PlannedTransfer {
            blockchain_key: chain.blockchain_key.clone(),
            hot_wallet_address: chain.address.clone(),
            amount: Amount::new(share),
            original_balance: chain.balance,
        };
        if share.abs() < dust_minimum {
            skipped_dust.push(transfer);
        } else {
            transfers.push(transfer);
        }
    }

    Ok(SettlementPlan {
        asset: asset.to_string(),
        hot_total: Amount::new(hot_total),
        exchange_balance: Amount::new(exchange_balance),
        amount: Amount::new(amount),
        transfers,
        skipped_dust,
        failures: snapshot.failures.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::HotWalletBalance;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn required_balance_matches_target_share() {
        assert_eq!(required_exchange_balance(d("100"), d("0.5")).unwrap(), d("100"));
        assert_eq!(required_exchange_balance(d("300"), d("0.25")).unwrap(), d("100"));
        assert!(required_exchange_balance(d("100"), d("1")).is_err());
        assert!(required_exchange_balance(d("100"), d("-0.1")).is_err());
    }

    #[test]
    fn settlement_amount_fixtures() {
        assert_eq!(settlement_amount(d("100"), d("50"), d("0.5")).unwrap(), d("50"));
        assert_eq!(settlement_amount(d("100"), d("150"), d("0.5")).unwrap(), d("-50"));
        assert_eq!(settlement_amount(d("0"), d("0"), d("0.5")).unwrap(), d("0"));
    }

    #[test]
    fn distribution_is_proportional_and_sums_exactly() {
        let shares = proportional_distribution(
            d("1000"),
            &[d("1000"), d("2000"), d("500")],
            2,
        );
        assert_eq!(shares, vec![d("285.71"), d("571.43"), d("142.86")]);
        let sum: Decimal = shares.iter().sum();
        assert_eq!(sum, d("1000"));
    }

    #[test]
    fn distribution_keeps_sign_for_withdrawals() {
        let shares = proportional_distribution(d("-900"), &[d("100"), d("200")], 2);
        assert_eq!(shares, vec![d("-300"), d("-600")]);
    }

    #[test]
    fn zero_total_distributes_nothing() {
        let shares = proportional_distribution(d("1000"), &[d("0"), d("0")], 2);
        assert_eq!(shares, vec![Decimal::ZERO, Decimal::ZERO]);
        assert!(proportional_distribution(d("1000"), &[], 2).is_empty());
    }

    fn snapshot(balances: &[(&str, &str)]) -> AggregatedBalances {
        AggregatedBalances {
            balances: balances
                .iter()
                .map(|(key, balance)| HotWalletBalance {
                    blockchain_key: key.to_string(),
                    address: format!("hot-{}", key),
                    balance: Amount::parse(balance).unwrap(),
                })
                .collect(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn plan_drops_dust_without_redistributing() {
        let config = SettlementConfig {
            ratio: d("0.5"),
            default_dust_minimum: Amount::parse("100").unwrap(),
            dust_minimums: Default::default(),
            distribution_scale: 2,
        };
        // Hot total 2050, exchange 0 => move 2050 to exchange, split
        // [1000, 1000, 50]; the tron leg is under the minimum.
        let snapshot = snapshot(&[
            ("eip155:1", "1000"),
            ("eip155:56", "1000"),
            ("tron:mainnet", "50"),
        ]);
        let plan = compute_plan("USDT", &snapshot, d("0"), &config).unwrap();

        assert_eq!(plan.transfers.len(), 2);
        assert_eq!(plan.skipped_dust.len(), 1);
        assert_eq!(plan.skipped_dust[0].blockchain_key, "tron:mainnet");

        // Dust is skipped, not redistributed: executed total is short by the
        // dust leg's share.
        let executed: Decimal = plan.transfers.iter().map(|t| t.amount.as_decimal()).sum();
        let skipped: Decimal = plan
            .skipped_dust
            .iter()
            .map(|t| t.amount.as_decimal())
            .sum();
        assert_eq!(executed + skipped, plan.amount.as_decimal());
    }

    #[test]
    fn balanced_book_is_a_noop_plan() {
        let config = SettlementConfig {
            ratio: d("0.5"),
            default_dust_minimum: Amount::parse("1").unwrap(),
            dust_minimums: Default::default(),
            distribution_scale: 2,
        };
        let snapshot = snapshot(&[("eip155:1", "100")]);
        let plan = compute_plan("USDT", &snapshot, d("100"), &config).unwrap();
        assert!(plan.is_noop());
        assert!(plan.amount.is_zero());
    }
}
