use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::models::{ClassFee, FeeTotals, MarketClass, PnlTotals};

/// Profit-share on positive realized PnL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeCalculator {
    rate: Decimal,
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self { rate: dec!(0.25) }
    }
}

impl FeeCalculator {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    pub fn compute_fee(&self, total: Decimal) -> Decimal {
        if total > Decimal::ZERO {
            total * self.rate
        } else {
            Decimal::ZERO
        }
    }

    /// Fees for every fee-bearing class; an incomplete total gives an incomplete fee
    pub fn fees_for(&self, totals: &PnlTotals) -> FeeTotals {
        let classes: BTreeMap<MarketClass, ClassFee> = MarketClass::ALL
            .iter()
            .filter(|class| class.is_fee_bearing())
            .map(|class| {
                let total = totals.get(*class);
                let fee = ClassFee {
                    fee: self.compute_fee(total.pnl),
                    incomplete: total.incomplete,
                };
                (*class, fee)
            })
            .collect();

        FeeTotals::from_classes(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassTotal;

    #[test]
    fn test_fee_is_quarter_of_profit() {
        let calc = FeeCalculator::default();
        assert_eq!(calc.compute_fee(dec!(100)), dec!(25));
        assert_eq!(calc.compute_fee(dec!(0.00000001)), dec!(0.0000000025));
    }

    #[test]
    fn test_no_fee_on_loss_or_flat() {
        let calc = FeeCalculator::default();
        for total in [dec!(0), dec!(-0.00000001), dec!(-1000000)] {
            assert_eq!(calc.compute_fee(total), Decimal::ZERO);
        }
    }

    #[test]
    fn test_fee_never_negative_and_monotonic() {
        let calc = FeeCalculator::new(dec!(0.3));
        let mut previous = Decimal::ZERO;
        for step in -50..=50 {
            let total = Decimal::new(step * 137, 2);
            let fee = calc.compute_fee(total);
            assert!(fee >= Decimal::ZERO);
            assert!(fee >= previous);
            previous = fee;
        }
    }

    #[test]
    fn test_spot_is_never_fee_bearing() {
        let mut classes = BTreeMap::new();
        classes.insert(MarketClass::Spot, ClassTotal { pnl: dec!(1000), ..Default::default() });
        classes.insert(
            MarketClass::LinearPerpetual,
            ClassTotal { pnl: dec!(100), ..Default::default() },
        );
        classes.insert(
            MarketClass::InversePerpetual,
            ClassTotal {
                pnl: dec!(40),
                incomplete: true,
                failed_instruments: vec!["BTC-USD-SWAP".to_string()],
            },
        );

        let fees = FeeCalculator::default().fees_for(&PnlTotals::from_classes(classes));

        assert_eq!(fees.get(MarketClass::Spot), ClassFee::default());
        assert_eq!(fees.get(MarketClass::LinearPerpetual).fee, dec!(25));
        assert!(fees.get(MarketClass::InversePerpetual).incomplete);
    }
}
