//! Platform fee calculation
//!
//! Fees come from the active [`FeeConfig`](ledger_core::FeeConfig) for
//! (territory, item type); no active row means no fee. Per-line fees are
//! kept at full precision and summed before any rounding.

use crate::error::Result;
use crate::types::{CheckoutLine, CheckoutTotals};
use ledger_core::{FeeMode, ItemType, Ledger, TerritoryId};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

/// Minor-unit precision of quoted totals
const MONEY_SCALE: u32 = 2;

/// Fee for one line under `mode`
///
/// Fixed: amount × quantity. Percentage: subtotal × rate.
pub fn line_fee(mode: Option<&FeeMode>, line_subtotal: Decimal, quantity: u32) -> Decimal {
    match mode {
        None => Decimal::ZERO,
        Some(FeeMode::Fixed { amount }) => *amount * Decimal::from(quantity),
        Some(FeeMode::Percentage { rate }) => line_subtotal * *rate,
    }
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Looks up fee configuration and prices lines
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    ledger: Arc<Ledger>,
}

impl FeeCalculator {
    /// Create calculator
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Platform fee for one line (major units, unrounded)
    pub fn fee(
        &self,
        territory: &TerritoryId,
        item_type: &ItemType,
        line_subtotal: Decimal,
        quantity: u32,
    ) -> Result<Decimal> {
        let config = self.ledger.active_fee_config(territory, item_type)?;
        Ok(line_fee(
            config.as_ref().map(|c| &c.mode),
            line_subtotal,
            quantity,
        ))
    }

    /// Checkout totals for a store's lines
    ///
    /// The fee is borne by the seller, so the buyer's grand total is the items subtotal.
    pub fn quote(&self, territory: &TerritoryId, lines: &[CheckoutLine]) -> Result<CheckoutTotals> {
        let mut items_subtotal = Decimal::ZERO;
        let mut platform_fee = Decimal::ZERO;

        for line in lines {
            let subtotal = line.subtotal();
            items_subtotal += subtotal;
            platform_fee += self.fee(territory, &line.item_type, subtotal, line.quantity)?;
        }

        let items_subtotal = round_money(items_subtotal);
        Ok(CheckoutTotals {
            items_subtotal,
            platform_fee: round_money(platform_fee),
            grand_total: items_subtotal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Actor, Config};
    use tempfile::TempDir;

    fn ledger() -> (Arc<Ledger>, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.sync_writes = false;
        (Arc::new(Ledger::open(config).unwrap()), temp_dir)
    }

    #[test]
    fn test_percentage_fee() {
        let mode = FeeMode::Percentage { rate: Decimal::new(5, 2) };
        let fee = line_fee(Some(&mode), Decimal::from(20_000), 1);
        assert_eq!(fee, Decimal::from(1_000));
    }

    #[test]
    fn test_fixed_fee_scales_with_quantity() {
        let mode = FeeMode::Fixed { amount: Decimal::new(150, 2) };
        assert_eq!(line_fee(Some(&mode), Decimal::from(99), 4), Decimal::new(600, 2));
    }

    #[test]
    fn test_no_config_no_fee() {
        assert_eq!(line_fee(None, Decimal::from(500), 3), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_quote_sums_before_rounding() {
        let (ledger, _temp) = ledger();
        let territory = TerritoryId::new_v4();
        let item = ItemType::new("product");
        ledger
            .activate_fee_config(
                territory,
                item.clone(),
                FeeMode::Percentage { rate: Decimal::new(25, 3) }, // 2.5%
                Actor::System,
            )
            .await
            .unwrap();

        // Each line fee is 0.025 (half a cent); summed they make 0.05
        let line = CheckoutLine {
            item_type: item,
            unit_price: Decimal::new(100, 2),
            quantity: 1,
        };
        let calculator = FeeCalculator::new(ledger);
        let totals = calculator.quote(&territory, &[line.clone(), line]).unwrap();

        assert_eq!(totals.items_subtotal, Decimal::new(200, 2));
        assert_eq!(totals.platform_fee, Decimal::new(5, 2));
        assert_eq!(totals.grand_total, totals.items_subtotal);
    }

    #[tokio::test]
    async fn test_fee_uses_item_type_config() {
        let (ledger, _temp) = ledger();
        let territory = TerritoryId::new_v4();
        ledger
            .activate_fee_config(
                territory,
                ItemType::new("service"),
                FeeMode::Fixed { amount: Decimal::from(2) },
                Actor::System,
            )
            .await
            .unwrap();

        let calculator = FeeCalculator::new(ledger);
        let service = calculator
            .fee(&territory, &ItemType::new("service"), Decimal::from(50), 3)
            .unwrap();
        let product = calculator
            .fee(&territory, &ItemType::new("product"), Decimal::from(50), 3)
            .unwrap();

        assert_eq!(service, Decimal::from(6));
        assert_eq!(product, Decimal::ZERO);
    }
}
