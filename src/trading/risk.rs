// src/trading/risk.rs
use crate::domain::models::{NextTier, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One take-profit rung: at `trigger_pct` above entry, sell `amount_pct`
/// of the quantity remaining at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTier {
    pub trigger_pct: Decimal,
    pub amount_pct: Decimal,
}

/// Exit instruction for the current cycle. Stop-loss outranks take-profit;
/// both outrank whatever the strategy wants.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskAction {
    /// Sell the entire remaining quantity at market.
    ForceExit,
    /// Sell `amount_pct` of the remaining quantity for tier `tier`.
    PartialExit { tier: usize, amount_pct: Decimal },
    None,
}

/// Computes stop-loss and take-profit thresholds for one asset's position.
/// Tier invariants are enforced at construction, before any worker starts.
#[derive(Debug, Clone)]
pub struct RiskManager {
    stop_loss_pct: Decimal,
    acceptable_loss_pct: Decimal,
    tiers: Vec<TakeProfitTier>,
}

impl RiskManager {
    pub fn new(
        stop_loss_pct: Decimal,
        acceptable_loss_pct: Decimal,
        tiers: Vec<TakeProfitTier>,
    ) -> Result<Self, String> {
        if stop_loss_pct < Decimal::ZERO || stop_loss_pct >= Decimal::ONE_HUNDRED {
            return Err(format!(
                "Stop-loss percentage must lie in [0, 100), got {}",
                stop_loss_pct
            ));
        }
        if acceptable_loss_pct < Decimal::ZERO || acceptable_loss_pct >= Decimal::ONE_HUNDRED {
            return Err(format!(
                "Acceptable-loss percentage must lie in [0, 100), got {}",
                acceptable_loss_pct
            ));
        }

        let mut previous_trigger = Decimal::ZERO;
        for (i, tier) in tiers.iter().enumerate() {
            if tier.trigger_pct <= previous_trigger {
                return Err(format!(
                    "Take-profit triggers must be positive and strictly ascending; tier {} has {}",
                    i, tier.trigger_pct
                ));
            }
            if tier.amount_pct <= Decimal::ZERO || tier.amount_pct > Decimal::ONE_HUNDRED {
                return Err(format!(
                    "Take-profit amounts must lie in (0, 100]; tier {} has {}",
                    i, tier.amount_pct
                ));
            }
            previous_trigger = tier.trigger_pct;
        }

        Ok(Self {
            stop_loss_pct,
            acceptable_loss_pct,
            tiers,
        })
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Price at or below which the position is force-exited.
    pub fn stop_loss_threshold(&self, entry_price: Decimal) -> Decimal {
        entry_price * (Decimal::ONE - self.stop_loss_pct / Decimal::ONE_HUNDRED)
    }

    /// Minimum price a strategy-driven sell may execute at. Applies only to
    /// strategy signals; the stop-loss ignores it.
    pub fn sell_floor(&self, entry_price: Decimal) -> Decimal {
        entry_price * (Decimal::ONE - self.acceptable_loss_pct / Decimal::ONE_HUNDRED)
    }

    fn tier_trigger_price(&self, entry_price: Decimal, tier: usize) -> Decimal {
        entry_price * (Decimal::ONE + self.tiers[tier].trigger_pct / Decimal::ONE_HUNDRED)
    }

    /// Evaluate forced exits for the current price. At most one take-profit
    /// tier fires per cycle, in ascending order, even when price gapped past
    /// several thresholds at once.
    pub fn assess(&self, price: Decimal, position: &Position) -> RiskAction {
        if !position.is_long() {
            return RiskAction::None;
        }

        if price <= self.stop_loss_threshold(position.entry_price) {
            return RiskAction::ForceExit;
        }

        for (i, tier) in self.tiers.iter().enumerate() {
            if position.tiers_triggered.get(i).copied().unwrap_or(true) {
                continue;
            }
            if price >= self.tier_trigger_price(position.entry_price, i) {
                return RiskAction::PartialExit {
                    tier: i,
                    amount_pct: tier.amount_pct,
                };
            }
            // Lower tiers gate higher ones; stop at the first pending tier.
            break;
        }

        RiskAction::None
    }

    /// Next untriggered tier for reporting.
    pub fn next_tier(&self, position: &Position) -> NextTier {
        for (i, tier) in self.tiers.iter().enumerate() {
            if !position.tiers_triggered.get(i).copied().unwrap_or(true) {
                return NextTier::Pending {
                    index: i,
                    trigger_price: self.tier_trigger_price(position.entry_price, i),
                    amount_pct: tier.amount_pct,
                };
            }
        }
        NextTier::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrderFill;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn tiers(raw: &[(Decimal, Decimal)]) -> Vec<TakeProfitTier> {
        raw.iter()
            .map(|&(trigger_pct, amount_pct)| TakeProfitTier {
                trigger_pct,
                amount_pct,
            })
            .collect()
    }

    fn long_position(entry: Decimal, quantity: Decimal, tier_count: usize) -> Position {
        let mut position = Position::flat(tier_count);
        position.open(&OrderFill {
            price: entry,
            quantity,
            timestamp: Utc::now(),
        });
        position
    }

    #[test]
    fn test_stop_loss_exact_boundary() {
        let risk = RiskManager::new(dec!(2), dec!(0), vec![]).unwrap();
        let position = long_position(dec!(100), dec!(10), 0);

        assert_eq!(risk.assess(dec!(98.00), &position), RiskAction::ForceExit);
        assert_eq!(risk.assess(dec!(97.50), &position), RiskAction::ForceExit);
        assert_eq!(risk.assess(dec!(98.01), &position), RiskAction::None);
    }

    #[test]
    fn test_stop_loss_ignores_tier_state() {
        let risk = RiskManager::new(
            dec!(2),
            dec!(0),
            tiers(&[(dec!(1), dec!(50))]),
        )
        .unwrap();
        let mut position = long_position(dec!(100), dec!(10), 1);
        position.tiers_triggered[0] = true;

        assert_eq!(risk.assess(dec!(98), &position), RiskAction::ForceExit);
    }

    #[test]
    fn test_first_untriggered_tier_fires() {
        let risk = RiskManager::new(
            dec!(2),
            dec!(0),
            tiers(&[(dec!(1), dec!(50)), (dec!(2), dec!(50)), (dec!(4), dec!(100))]),
        )
        .unwrap();
        let mut position = long_position(dec!(100), dec!(10), 3);

        // Price gapped past tiers 1 and 2: only tier 0 fires this cycle.
        assert_eq!(
            risk.assess(dec!(103), &position),
            RiskAction::PartialExit {
                tier: 0,
                amount_pct: dec!(50)
            }
        );

        position.tiers_triggered[0] = true;
        assert_eq!(
            risk.assess(dec!(103), &position),
            RiskAction::PartialExit {
                tier: 1,
                amount_pct: dec!(50)
            }
        );
    }

    #[test]
    fn test_pending_lower_tier_gates_higher() {
        let risk = RiskManager::new(
            dec!(2),
            dec!(0),
            tiers(&[(dec!(1), dec!(50)), (dec!(2), dec!(50))]),
        )
        .unwrap();
        let position = long_position(dec!(100), dec!(10), 2);

        // Price sits below tier 0 but above nothing else; nothing fires.
        assert_eq!(risk.assess(dec!(100.5), &position), RiskAction::None);
    }

    #[test]
    fn test_flat_position_never_signals() {
        let risk = RiskManager::new(dec!(2), dec!(0), tiers(&[(dec!(1), dec!(50))])).unwrap();
        let position = Position::flat(1);
        assert_eq!(risk.assess(dec!(1), &position), RiskAction::None);
    }

    #[test]
    fn test_next_tier_reporting() {
        let risk = RiskManager::new(
            dec!(2),
            dec!(0),
            tiers(&[(dec!(1), dec!(50)), (dec!(2), dec!(50))]),
        )
        .unwrap();
        let mut position = long_position(dec!(100), dec!(10), 2);

        match risk.next_tier(&position) {
            NextTier::Pending {
                index,
                trigger_price,
                amount_pct,
            } => {
                assert_eq!(index, 0);
                assert_eq!(trigger_price, dec!(101));
                assert_eq!(amount_pct, dec!(50));
            }
            NextTier::Exhausted => panic!("expected pending tier"),
        }

        position.tiers_triggered = vec![true, true];
        assert!(matches!(risk.next_tier(&position), NextTier::Exhausted));
    }

    #[test]
    fn test_invariant_validation() {
        // Non-ascending triggers.
        assert!(RiskManager::new(
            dec!(2),
            dec!(0),
            tiers(&[(dec!(2), dec!(50)), (dec!(1), dec!(50))])
        )
        .is_err());
        // Amount outside (0, 100].
        assert!(RiskManager::new(dec!(2), dec!(0), tiers(&[(dec!(1), dec!(0))])).is_err());
        assert!(RiskManager::new(dec!(2), dec!(0), tiers(&[(dec!(1), dec!(101))])).is_err());
        // Stop-loss outside [0, 100).
        assert!(RiskManager::new(dec!(100), dec!(0), vec![]).is_err());
        assert!(RiskManager::new(dec!(-1), dec!(0), vec![]).is_err());
    }

    #[test]
    fn test_sell_floor() {
        let risk = RiskManager::new(dec!(5), dec!(1), vec![]).unwrap();
        assert_eq!(risk.sell_floor(dec!(100)), dec!(99));
        // Zero tolerance floors at the entry price itself.
        let risk = RiskManager::new(dec!(5), dec!(0), vec![]).unwrap();
        assert_eq!(risk.sell_floor(dec!(100)), dec!(100));
    }
}
