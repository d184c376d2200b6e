// 4.0: one tradable unit: a standalone trade or a spread leg. owns its lot ledger
// and walks the approval workflow:
//   pending -> approved -> order_placed -> {partial_fills_received <-> fills_received}
// with rejected reachable from pending/approved, and a two-phase close on top
// (trader requests, manager accepts). every transition timestamp is set exactly
// once; re-running a legal transition never rewrites history.

use crate::errors::{EngineError, InvalidTransitionError, ValidationError};
use crate::ledger::{LotEntry, LotLedger};
use crate::types::{stamp_once, Lots, Side, Timestamp, TradeId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Approved,
    OrderPlaced,
    PartialFillsReceived,
    FillsReceived,
    Rejected,
    Closed,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Rejected | TradeStatus::Closed)
    }

    /// Fills may only arrive after the order is on the market.
    pub fn accepts_fills(&self) -> bool {
        matches!(
            self,
            TradeStatus::OrderPlaced | TradeStatus::PartialFillsReceived
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Approved => "approved",
            TradeStatus::OrderPlaced => "order_placed",
            TradeStatus::PartialFillsReceived => "partial_fills_received",
            TradeStatus::FillsReceived => "fills_received",
            TradeStatus::Rejected => "rejected",
            TradeStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAccount {
    pub id: TradeId,
    /// market label for display, e.g. "RBOB Jan26-Feb26"
    pub contract: String,
    pub direction: Side,
    pub ledger: LotLedger,
    pub status: TradeStatus,
    pub created_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub order_placed_at: Option<Timestamp>,
    pub fills_received_at: Option<Timestamp>,
    pub close_requested_at: Option<Timestamp>,
    /// close requested by trader, awaiting manager acceptance
    pub is_closed: bool,
    /// manager accepted the close; position is frozen
    pub close_accepted: bool,
}

impl PositionAccount {
    pub fn new(
        id: TradeId,
        contract: impl Into<String>,
        direction: Side,
        entries: Vec<LotEntry>,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            contract: contract.into(),
            direction,
            ledger: LotLedger::from_entries(entries)?,
            status: TradeStatus::Pending,
            created_at,
            approved_at: None,
            order_placed_at: None,
            fills_received_at: None,
            close_requested_at: None,
            is_closed: false,
            close_accepted: false,
        })
    }

    pub fn approve(&mut self, now: Timestamp) -> Result<(), InvalidTransitionError> {
        if self.status != TradeStatus::Pending {
            return Err(InvalidTransitionError::new("approve", self.status));
        }
        self.status = TradeStatus::Approved;
        stamp_once(&mut self.approved_at, now);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), InvalidTransitionError> {
        if !matches!(self.status, TradeStatus::Pending | TradeStatus::Approved) {
            return Err(InvalidTransitionError::new("reject", self.status));
        }
        self.status = TradeStatus::Rejected;
        Ok(())
    }

    pub fn place_order(&mut self, now: Timestamp) -> Result<(), InvalidTransitionError> {
        if self.status != TradeStatus::Approved {
            return Err(InvalidTransitionError::new("place_order", self.status));
        }
        self.status = TradeStatus::OrderPlaced;
        stamp_once(&mut self.order_placed_at, now);
        Ok(())
    }

    /// Append new tranches. Legal until the position reaches a terminal state or a
    /// close has been requested.
    pub fn append_entries(&mut self, entries: Vec<LotEntry>) -> Result<(), EngineError> {
        if self.status.is_terminal() || self.is_closed {
            return Err(InvalidTransitionError::new("append_entries", self.status).into());
        }
        self.ledger.append_entries(entries)?;
        Ok(())
    }

    // 4.1: the manager reports a tranche's cumulative fill count. the ledger
    // enforces monotonicity/bounds; here we gate on status and re-derive whether
    // fills are partial or complete.
    pub fn record_fill(
        &mut self,
        tranche: usize,
        new_fills: Lots,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if !self.status.accepts_fills() {
            return Err(InvalidTransitionError::new("record_fill", self.status).into());
        }
        self.ledger.record_fill(tranche, new_fills)?;
        self.apply_fill_progress(now);
        Ok(())
    }

    /// Re-derive partial/complete fill status from ledger totals. Only meaningful
    /// while fills are flowing.
    pub(crate) fn apply_fill_progress(&mut self, now: Timestamp) {
        if self.ledger.is_fully_filled() {
            self.status = TradeStatus::FillsReceived;
        } else if !self.ledger.total_fills().is_zero() {
            self.status = TradeStatus::PartialFillsReceived;
        }
        if !self.ledger.total_fills().is_zero() {
            stamp_once(&mut self.fills_received_at, now);
        }
    }

    /// Trader asks to liquidate the position. First phase of the two-phase close;
    /// the position keeps trading state until a manager accepts.
    pub fn request_close(&mut self, now: Timestamp) -> Result<(), InvalidTransitionError> {
        if self.is_closed {
            return Err(InvalidTransitionError::new("request_close", "close_requested"));
        }
        if !matches!(
            self.status,
            TradeStatus::FillsReceived | TradeStatus::PartialFillsReceived
        ) {
            return Err(InvalidTransitionError::new("request_close", self.status));
        }
        self.is_closed = true;
        stamp_once(&mut self.close_requested_at, now);
        Ok(())
    }

    /// Manager accepts the close. Idempotent: accepting an already-closed position
    /// is a no-op with identical observable state.
    pub fn accept_close(&mut self) -> Result<(), InvalidTransitionError> {
        if self.close_accepted {
            return Ok(());
        }
        if !self.is_closed {
            return Err(InvalidTransitionError::new("accept_close", self.status));
        }
        self.close_accepted = true;
        self.status = TradeStatus::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lots, Price};
    use rust_decimal_macros::dec;

    fn entry(lots: u32, price: rust_decimal::Decimal) -> LotEntry {
        LotEntry::new(
            Lots::new(lots),
            Price::new_unchecked(price),
            Timestamp::from_millis(0),
        )
    }

    fn test_position() -> PositionAccount {
        PositionAccount::new(
            TradeId(1),
            "RBOB Jan26-Feb26",
            Side::Long,
            vec![entry(10, dec!(100)), entry(5, dec!(130))],
            Timestamp::from_millis(0),
        )
        .unwrap()
    }

    fn filled_position() -> PositionAccount {
        let mut pos = test_position();
        pos.approve(Timestamp::from_millis(1)).unwrap();
        pos.place_order(Timestamp::from_millis(2)).unwrap();
        pos.record_fill(0, Lots::new(10), Timestamp::from_millis(3))
            .unwrap();
        pos.record_fill(1, Lots::new(5), Timestamp::from_millis(4))
            .unwrap();
        pos
    }

    #[test]
    fn happy_path_transitions() {
        let mut pos = test_position();
        assert_eq!(pos.status, TradeStatus::Pending);

        pos.approve(Timestamp::from_millis(10)).unwrap();
        assert_eq!(pos.status, TradeStatus::Approved);
        assert_eq!(pos.approved_at, Some(Timestamp::from_millis(10)));

        pos.place_order(Timestamp::from_millis(20)).unwrap();
        assert_eq!(pos.status, TradeStatus::OrderPlaced);
        assert_eq!(pos.order_placed_at, Some(Timestamp::from_millis(20)));
    }

    #[test]
    fn approve_only_from_pending() {
        let mut pos = test_position();
        pos.approve(Timestamp::from_millis(1)).unwrap();

        let err = pos.approve(Timestamp::from_millis(2)).unwrap_err();
        assert_eq!(err.operation, "approve");
        assert_eq!(err.from, "approved");
        // first timestamp survives
        assert_eq!(pos.approved_at, Some(Timestamp::from_millis(1)));
    }

    #[test]
    fn record_fill_from_pending_fails() {
        let mut pos = test_position();
        let err = pos
            .record_fill(0, Lots::new(5), Timestamp::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
        assert_eq!(pos.ledger.total_fills(), Lots::zero());
    }

    #[test]
    fn partial_then_complete_fills() {
        let mut pos = test_position();
        pos.approve(Timestamp::from_millis(1)).unwrap();
        pos.place_order(Timestamp::from_millis(2)).unwrap();

        pos.record_fill(0, Lots::new(4), Timestamp::from_millis(3))
            .unwrap();
        assert_eq!(pos.status, TradeStatus::PartialFillsReceived);
        assert_eq!(pos.fills_received_at, Some(Timestamp::from_millis(3)));

        pos.record_fill(0, Lots::new(10), Timestamp::from_millis(4))
            .unwrap();
        pos.record_fill(1, Lots::new(5), Timestamp::from_millis(5))
            .unwrap();
        assert_eq!(pos.status, TradeStatus::FillsReceived);
        // fills_received_at stamped when fills first arrived
        assert_eq!(pos.fills_received_at, Some(Timestamp::from_millis(3)));
    }

    #[test]
    fn decreasing_fill_leaves_state_unchanged() {
        let mut pos = test_position();
        pos.approve(Timestamp::from_millis(1)).unwrap();
        pos.place_order(Timestamp::from_millis(2)).unwrap();
        pos.record_fill(0, Lots::new(6), Timestamp::from_millis(3))
            .unwrap();

        let before = pos.clone();
        let err = pos
            .record_fill(0, Lots::new(2), Timestamp::from_millis(4))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(pos, before);
    }

    #[test]
    fn close_requires_fills() {
        let mut pos = test_position();
        pos.approve(Timestamp::from_millis(1)).unwrap();
        assert!(pos.request_close(Timestamp::from_millis(2)).is_err());

        let mut pos = filled_position();
        pos.request_close(Timestamp::from_millis(10)).unwrap();
        assert!(pos.is_closed);
        assert!(!pos.close_accepted);
        assert_eq!(pos.close_requested_at, Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn duplicate_close_request_rejected() {
        let mut pos = filled_position();
        pos.request_close(Timestamp::from_millis(10)).unwrap();
        assert!(pos.request_close(Timestamp::from_millis(11)).is_err());
        assert_eq!(pos.close_requested_at, Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn accept_close_is_idempotent() {
        let mut pos = filled_position();
        pos.request_close(Timestamp::from_millis(10)).unwrap();
        pos.accept_close().unwrap();
        assert_eq!(pos.status, TradeStatus::Closed);

        let after_first = pos.clone();
        pos.accept_close().unwrap();
        assert_eq!(pos, after_first);
    }

    #[test]
    fn accept_close_requires_request() {
        let mut pos = filled_position();
        assert!(pos.accept_close().is_err());
    }

    #[test]
    fn closed_position_is_frozen() {
        let mut pos = filled_position();
        pos.request_close(Timestamp::from_millis(10)).unwrap();
        pos.accept_close().unwrap();

        assert!(pos
            .append_entries(vec![entry(1, dec!(99))])
            .is_err());
        assert!(pos
            .record_fill(0, Lots::new(10), Timestamp::from_millis(11))
            .is_err());
    }

    #[test]
    fn reject_from_pending_or_approved_only() {
        let mut pos = test_position();
        pos.reject().unwrap();
        assert_eq!(pos.status, TradeStatus::Rejected);

        let mut pos = filled_position();
        assert!(pos.reject().is_err());
    }
}
