// 5.0: composite position. a spread holds 2+ legs under a ratio; leg count is
// fixed by spread type at creation. unlike a standalone position, the spread's
// lifecycle milestones are manager-set workflow gates, not fill-count
// derivations: ratio-weighted multi-leg fills do not reduce to one completion
// boolean. fill progress still flips partial/complete once fills are flowing.
// 5.1 has the flattened aggregate projections.

use crate::errors::{EngineError, InvalidTransitionError, NotFoundError, ValidationError};
use crate::ledger::{weighted_average_price, LotEntry};
use crate::position::{PositionAccount, TradeStatus};
use crate::types::{stamp_once, Lots, Price, Side, SpreadId, Timestamp, TradeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadType {
    /// butterfly: exactly two legs
    Fly,
    /// custom: three or more legs
    Custom,
}

impl fmt::Display for SpreadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadType::Fly => write!(f, "fly"),
            SpreadType::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadAccount {
    pub id: SpreadId,
    pub spread_type: SpreadType,
    pub direction: Side,
    /// relative weighting between legs; display/economics only, never ledger math
    pub ratio: Decimal,
    /// fixed after creation; workflow state lives on the spread, not the legs
    legs: Vec<PositionAccount>,
    pub status: TradeStatus,
    pub created_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub order_placed_at: Option<Timestamp>,
    pub fills_received_at: Option<Timestamp>,
    pub close_requested_at: Option<Timestamp>,
    pub is_closed: bool,
    pub close_accepted: bool,
}

impl SpreadAccount {
    pub fn new(
        id: SpreadId,
        spread_type: SpreadType,
        direction: Side,
        ratio: Decimal,
        legs: Vec<PositionAccount>,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        if ratio <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveRatio { ratio });
        }
        match spread_type {
            SpreadType::Fly if legs.len() != 2 => {
                return Err(ValidationError::FlyLegCount { got: legs.len() })
            }
            SpreadType::Custom if legs.len() < 3 => {
                return Err(ValidationError::CustomLegCount { got: legs.len() })
            }
            _ => {}
        }
        Ok(Self {
            id,
            spread_type,
            direction,
            ratio,
            legs,
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

    pub fn legs(&self) -> &[PositionAccount] {
        &self.legs
    }

    pub fn leg(&self, leg_id: TradeId) -> Option<&PositionAccount> {
        self.legs.iter().find(|l| l.id == leg_id)
    }

    fn leg_mut(&mut self, leg_id: TradeId) -> Result<&mut PositionAccount, NotFoundError> {
        let spread = self.id;
        self.legs
            .iter_mut()
            .find(|l| l.id == leg_id)
            .ok_or(NotFoundError::Leg { spread, leg: leg_id })
    }

    // 5.1: aggregates flatten every tranche of every leg. a leg with more ordered
    // lots contributes proportionally more to the spread's average price.
    pub fn aggregate_lots(&self) -> Lots {
        self.legs.iter().map(|l| l.ledger.total_lots()).sum()
    }

    pub fn aggregate_fills(&self) -> Lots {
        self.legs.iter().map(|l| l.ledger.total_fills()).sum()
    }

    pub fn aggregate_average_price(&self) -> Price {
        let all: Vec<LotEntry> = self
            .legs
            .iter()
            .flat_map(|l| l.ledger.entries().iter().cloned())
            .collect();
        weighted_average_price(&all)
    }

    /// What the fill-derived status would be, given aggregate progress. Pure
    /// query; `None` when no fills have arrived yet.
    pub fn derive_fill_status(&self) -> Option<TradeStatus> {
        let fills = self.aggregate_fills();
        if fills.is_zero() {
            None
        } else if fills >= self.aggregate_lots() {
            Some(TradeStatus::FillsReceived)
        } else {
            Some(TradeStatus::PartialFillsReceived)
        }
    }

    /// Manager-driven workflow gate. Unlike `PositionAccount`, fill statuses are
    /// also settable here so a manager can reconcile against the broker report.
    pub fn update_status(
        &mut self,
        new_status: TradeStatus,
        now: Timestamp,
    ) -> Result<(), InvalidTransitionError> {
        match new_status {
            TradeStatus::Approved => {
                if self.status != TradeStatus::Pending {
                    return Err(InvalidTransitionError::new("approve", self.status));
                }
                self.status = TradeStatus::Approved;
                stamp_once(&mut self.approved_at, now);
            }
            TradeStatus::OrderPlaced => {
                if self.status != TradeStatus::Approved {
                    return Err(InvalidTransitionError::new("place_order", self.status));
                }
                self.status = TradeStatus::OrderPlaced;
                stamp_once(&mut self.order_placed_at, now);
            }
            TradeStatus::FillsReceived | TradeStatus::PartialFillsReceived => {
                if !self.status.accepts_fills() {
                    return Err(InvalidTransitionError::new("set_fill_status", self.status));
                }
                self.status = new_status;
                stamp_once(&mut self.fills_received_at, now);
            }
            TradeStatus::Rejected => {
                if !matches!(self.status, TradeStatus::Pending | TradeStatus::Approved) {
                    return Err(InvalidTransitionError::new("reject", self.status));
                }
                self.status = TradeStatus::Rejected;
            }
            TradeStatus::Pending | TradeStatus::Closed => {
                return Err(InvalidTransitionError::new("update_status", self.status));
            }
        }
        Ok(())
    }

    /// Append tranches to one leg's ledger. Fails with `NotFoundError` when the
    /// leg is not part of this spread.
    pub fn add_lots_to_leg(
        &mut self,
        leg_id: TradeId,
        entries: Vec<LotEntry>,
    ) -> Result<(), EngineError> {
        if self.status.is_terminal() || self.is_closed {
            return Err(InvalidTransitionError::new("add_lots_to_leg", self.status).into());
        }
        let leg = self.leg_mut(leg_id)?;
        leg.ledger.append_entries(entries)?;
        Ok(())
    }

    /// Record a fill against one tranche of one leg, then re-derive the spread's
    /// partial/complete fill status from aggregate progress.
    pub fn record_leg_fill(
        &mut self,
        leg_id: TradeId,
        tranche: usize,
        new_fills: Lots,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if !self.status.accepts_fills() {
            return Err(InvalidTransitionError::new("record_fill", self.status).into());
        }
        let leg = self.leg_mut(leg_id)?;
        leg.ledger.record_fill(tranche, new_fills)?;

        if let Some(derived) = self.derive_fill_status() {
            self.status = derived;
            stamp_once(&mut self.fills_received_at, now);
        }
        Ok(())
    }

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
