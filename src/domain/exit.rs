//! Exit condition state machine
//!
//! Per-position evaluation of stop-loss, take-profit and trailing-stop
//! against each observed price. The durable record stays minimal (nullable
//! close fields); this explicit OPEN -> TRAILING_ARMED -> CLOSING -> CLOSED
//! machine is derived from stored fields so illegal states cannot be
//! persisted.
//!
//! The trailing level ratchets: it only ever moves in the favorable
//! direction, even when price observations arrive out of order.

use serde::{Deserialize, Serialize};

use crate::domain::position::{CloseReason, Position};
use crate::domain::signal::Side;

/// Monitoring state for one open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitState {
    Open,
    TrailingArmed,
    Closing,
    Closed,
}

/// Verdict for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    Hold,
    Close(CloseReason),
}

/// Tracks exit conditions for one position between ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitTracker {
    side: Side,
    entry_price: f64,
    stop_loss_price: f64,
    take_profit_price: Option<f64>,
    trailing_pct: Option<f64>,
    trailing_activation_pct: Option<f64>,
    state: ExitState,
    /// Best price seen since entry, direction-aware.
    high_water_mark: f64,
    /// Current trailing-stop level once armed.
    trailing_level: Option<f64>,
    /// Reason of the in-flight close while CLOSING; drives retries.
    close_reason: Option<CloseReason>,
}

impl ExitTracker {
    pub fn from_position(position: &Position) -> Self {
        Self {
            side: position.side,
            entry_price: position.entry_price,
            stop_loss_price: position.risk.stop_loss_price,
            take_profit_price: position.risk.take_profit_price,
            trailing_pct: position.risk.trailing_pct,
            trailing_activation_pct: position.risk.trailing_activation_pct,
            state: ExitState::Open,
            // Resume from the persisted mark so a restart does not loosen
            // an already-tightened trailing stop.
            high_water_mark: position.risk.high_water_mark.max(0.0),
            trailing_level: None,
            close_reason: None,
        }
    }

    pub fn state(&self) -> ExitState {
        self.state
    }

    pub fn high_water_mark(&self) -> f64 {
        self.high_water_mark
    }

    pub fn trailing_level(&self) -> Option<f64> {
        self.trailing_level
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ExitState::Closed
    }

    /// Evaluate one price observation. Hard stop-loss wins over everything,
    /// then take-profit, then trailing arm/update/trigger.
    pub fn observe(&mut self, price: f64) -> ExitDecision {
        match self.state {
            ExitState::Closing | ExitState::Closed => return ExitDecision::Hold,
            ExitState::Open | ExitState::TrailingArmed => {}
        }

        if self.stop_loss_hit(price) {
            return self.close(CloseReason::StopLoss);
        }

        if self.take_profit_hit(price) {
            return self.close(CloseReason::TakeProfit);
        }

        self.update_high_water_mark(price);

        if self.state == ExitState::Open && self.activation_reached() {
            self.state = ExitState::TrailingArmed;
            self.ratchet_trailing_level();
            tracing::debug!(
                hwm = self.high_water_mark,
                level = self.trailing_level,
                "trailing stop armed"
            );
        } else if self.state == ExitState::TrailingArmed {
            self.ratchet_trailing_level();
        }

        if self.state == ExitState::TrailingArmed && self.trailing_hit(price) {
            return self.close(CloseReason::TrailingStop);
        }

        ExitDecision::Hold
    }

    fn close(&mut self, reason: CloseReason) -> ExitDecision {
        self.state = ExitState::Closing;
        self.close_reason = Some(reason);
        ExitDecision::Close(reason)
    }

    /// The close still owed while CLOSING. A failed attempt leaves the
    /// tracker here so every subsequent tick retries the same close.
    pub fn pending_close_reason(&self) -> Option<CloseReason> {
        match self.state {
            ExitState::Closing => self.close_reason,
            _ => None,
        }
    }

    /// Re-enter CLOSING after a failed close attempt (idempotent).
    pub fn mark_closing(&mut self) {
        if self.state != ExitState::Closed {
            self.state = ExitState::Closing;
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = ExitState::Closed;
    }

    fn stop_loss_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss_price,
            Side::Short => price >= self.stop_loss_price,
        }
    }

    fn take_profit_hit(&self, price: f64) -> bool {
        match (self.take_profit_price, self.side) {
            (Some(tp), Side::Long) => price >= tp,
            (Some(tp), Side::Short) => price <= tp,
            (None, _) => false,
        }
    }

    fn update_high_water_mark(&mut self, price: f64) {
        if self.side.is_favorable(price, self.high_water_mark) {
            self.high_water_mark = price;
        }
    }

    /// Favorable excursion from entry, in percent of entry price.
    fn favorable_excursion_pct(&self) -> f64 {
        (self.high_water_mark - self.entry_price) / self.entry_price
            * self.side.direction_sign()
            * 100.0
    }

    fn activation_reached(&self) -> bool {
        match (self.trailing_pct, self.trailing_activation_pct) {
            (Some(_), Some(activation)) => self.favorable_excursion_pct() >= activation,
            _ => false,
        }
    }

    /// Move the trailing level with the high-water-mark, never backward.
    fn ratchet_trailing_level(&mut self) {
        let Some(trailing_pct) = self.trailing_pct else {
            return;
        };
        let sign = self.side.direction_sign();
        let candidate = self.high_water_mark * (100.0 - sign * trailing_pct) / 100.0;
        self.trailing_level = Some(match (self.trailing_level, self.side) {
            (Some(current), Side::Long) => current.max(candidate),
            (Some(current), Side::Short) => current.min(candidate),
            (None, _) => candidate,
        });
    }

    fn trailing_hit(&self, price: f64) -> bool {
        match (self.trailing_level, self.side) {
            (Some(level), Side::Long) => price <= level,
            (Some(level), Side::Short) => price >= level,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Fill, RiskSnapshot};
    use crate::domain::signal::RiskModel;
    use crate::domain::venue::Venue;
    use uuid::Uuid;

    fn tracker(side: Side, entry: f64, risk: RiskModel) -> ExitTracker {
        let snap = RiskSnapshot::from_risk_model(&risk, side, entry);
        let pos = Position::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Venue::Hyperliquid,
            "ETH",
            side,
            &Fill::new(1.0, entry, "tx"),
            snap,
        )
        .unwrap();
        ExitTracker::from_position(&pos)
    }

    #[test]
    fn test_trailing_scenario_long() {
        // Entry $100, LONG, trailing 1%, activation +3%.
        let mut t = tracker(
            Side::Long,
            100.0,
            RiskModel::stop_loss_only(10.0).with_trailing(1.0, 3.0),
        );

        // 102: below activation, still OPEN.
        assert_eq!(t.observe(102.0), ExitDecision::Hold);
        assert_eq!(t.state(), ExitState::Open);

        // 104: arms trailing. hwm=104, level=102.96.
        assert_eq!(t.observe(104.0), ExitDecision::Hold);
        assert_eq!(t.state(), ExitState::TrailingArmed);
        assert!((t.high_water_mark() - 104.0).abs() < 1e-9);
        assert!((t.trailing_level().unwrap() - 102.96).abs() < 1e-9);

        // 103: above the level, stays armed, does not close.
        assert_eq!(t.observe(103.0), ExitDecision::Hold);
        assert_eq!(t.state(), ExitState::TrailingArmed);

        // 102.9: through the level, closes.
        assert_eq!(
            t.observe(102.9),
            ExitDecision::Close(CloseReason::TrailingStop)
        );
        assert_eq!(t.state(), ExitState::Closing);
    }

    #[test]
    fn test_stop_loss_overrides_trailing() {
        // Entry $100, LONG, 10% SL. Drop to $89 closes immediately.
        let mut t = tracker(
            Side::Long,
            100.0,
            RiskModel::stop_loss_only(10.0).with_trailing(1.0, 3.0),
        );
        t.observe(104.0); // armed
        assert_eq!(t.observe(89.0), ExitDecision::Close(CloseReason::StopLoss));
    }

    #[test]
    fn test_stop_loss_short() {
        let mut t = tracker(Side::Short, 100.0, RiskModel::stop_loss_only(10.0));
        assert_eq!(t.observe(105.0), ExitDecision::Hold);
        assert_eq!(t.observe(110.0), ExitDecision::Close(CloseReason::StopLoss));
    }

    #[test]
    fn test_take_profit() {
        let mut t = tracker(
            Side::Long,
            100.0,
            RiskModel::stop_loss_only(10.0).with_take_profit(20.0),
        );
        assert_eq!(t.observe(119.0), ExitDecision::Hold);
        assert_eq!(
            t.observe(120.0),
            ExitDecision::Close(CloseReason::TakeProfit)
        );
    }

    #[test]
    fn test_trailing_level_never_decreases_long() {
        let mut t = tracker(
            Side::Long,
            100.0,
            RiskModel::stop_loss_only(50.0).with_trailing(2.0, 1.0),
        );
        // Out-of-order observations after arming.
        let prices = [105.0, 110.0, 104.0, 108.0, 103.5, 111.0];
        let mut last_level = f64::MIN;
        for p in prices {
            let decision = t.observe(p);
            if decision != ExitDecision::Hold {
                break;
            }
            if let Some(level) = t.trailing_level() {
                assert!(level >= last_level, "level moved backward at price {}", p);
                last_level = level;
            }
        }
        // hwm is the max seen before the first trigger.
        assert!(t.high_water_mark() >= 110.0);
    }

    #[test]
    fn test_trailing_level_never_increases_short() {
        let mut t = tracker(
            Side::Short,
            100.0,
            RiskModel::stop_loss_only(50.0).with_trailing(2.0, 1.0),
        );
        let prices = [95.0, 90.0, 96.0, 92.0];
        let mut last_level = f64::MAX;
        for p in prices {
            let decision = t.observe(p);
            if decision != ExitDecision::Hold {
                break;
            }
            if let Some(level) = t.trailing_level() {
                assert!(level <= last_level, "level moved backward at price {}", p);
                last_level = level;
            }
        }
    }

    #[test]
    fn test_short_trailing_triggers_on_bounce() {
        // Entry $100 SHORT, trailing 2%, activation 3%.
        let mut t = tracker(
            Side::Short,
            100.0,
            RiskModel::stop_loss_only(50.0).with_trailing(2.0, 3.0),
        );
        assert_eq!(t.observe(96.0), ExitDecision::Hold); // armed, hwm=96, level=97.92
        assert_eq!(t.state(), ExitState::TrailingArmed);
        assert_eq!(t.observe(97.0), ExitDecision::Hold);
        assert_eq!(
            t.observe(98.0),
            ExitDecision::Close(CloseReason::TrailingStop)
        );
    }

    #[test]
    fn test_no_trailing_without_config() {
        let mut t = tracker(Side::Long, 100.0, RiskModel::stop_loss_only(10.0));
        assert_eq!(t.observe(200.0), ExitDecision::Hold);
        assert_eq!(t.state(), ExitState::Open);
        assert!(t.trailing_level().is_none());
    }

    #[test]
    fn test_closing_state_suppresses_further_decisions() {
        let mut t = tracker(Side::Long, 100.0, RiskModel::stop_loss_only(10.0));
        assert_eq!(t.observe(89.0), ExitDecision::Close(CloseReason::StopLoss));
        // Still closing; does not emit a second close.
        assert_eq!(t.observe(85.0), ExitDecision::Hold);
        assert_eq!(t.state(), ExitState::Closing);

        t.mark_closed();
        assert!(t.is_terminal());
        assert_eq!(t.observe(80.0), ExitDecision::Hold);
    }

    #[test]
    fn test_pending_close_survives_failed_attempts() {
        let mut t = tracker(Side::Long, 100.0, RiskModel::stop_loss_only(10.0));
        assert_eq!(t.observe(89.0), ExitDecision::Close(CloseReason::StopLoss));

        // A failed attempt leaves the tracker CLOSING; the owed reason must
        // stay visible across later observations so each tick can retry.
        t.mark_closing();
        assert_eq!(t.observe(88.0), ExitDecision::Hold);
        assert_eq!(t.pending_close_reason(), Some(CloseReason::StopLoss));

        t.mark_closed();
        assert_eq!(t.pending_close_reason(), None);
    }
}
