// 6.0: exit requests and allocation. an exit liquidates FILLED lots only; the
// matcher tracks how many filled lots each position/spread has already promised
// to active exit requests, and refuses over-subscription. availability is
// checked at request creation, never retroactively (fill counts cannot shrink).
// 6.1 has the batch path (atomic), 6.2 the settlement P/L formula.

use crate::errors::{
    EngineError, InsufficientLotsError, InvalidTransitionError, NotFoundError, ValidationError,
};
use crate::types::{
    stamp_once, ExitId, Lots, Money, PositionRef, Price, Side, SpreadId, Timestamp, TradeId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Pending,
    Approved,
    OrderPlaced,
    PartialFilled,
    Filled,
    Rejected,
    Cancelled,
}

impl ExitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExitStatus::Filled | ExitStatus::Rejected | ExitStatus::Cancelled
        )
    }

    /// Rejected and cancelled requests release their allocation; everything else
    /// (including fully filled) keeps the lots it consumed.
    pub fn holds_allocation(&self) -> bool {
        !matches!(self, ExitStatus::Rejected | ExitStatus::Cancelled)
    }

    pub fn accepts_fills(&self) -> bool {
        matches!(
            self,
            ExitStatus::Pending
                | ExitStatus::Approved
                | ExitStatus::OrderPlaced
                | ExitStatus::PartialFilled
        )
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitStatus::Pending => "pending",
            ExitStatus::Approved => "approved",
            ExitStatus::OrderPlaced => "order_placed",
            ExitStatus::PartialFilled => "partial_filled",
            ExitStatus::Filled => "filled",
            ExitStatus::Rejected => "rejected",
            ExitStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
    pub id: ExitId,
    pub target: PositionRef,
    pub requested_exit_lots: Lots,
    /// None means exit at market
    pub exit_price: Option<Price>,
    pub received_lots: Lots,
    pub status: ExitStatus,
    /// None until settlement price is known
    pub profit_loss: Option<Money>,
    pub requested_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub order_placed_at: Option<Timestamp>,
    pub filled_at: Option<Timestamp>,
}

impl ExitRequest {
    fn new(
        id: ExitId,
        target: PositionRef,
        requested_exit_lots: Lots,
        exit_price: Option<Price>,
        requested_at: Timestamp,
    ) -> Self {
        Self {
            id,
            target,
            requested_exit_lots,
            exit_price,
            received_lots: Lots::zero(),
            status: ExitStatus::Pending,
            profit_loss: None,
            requested_at,
            approved_at: None,
            order_placed_at: None,
            filled_at: None,
        }
    }
}

// 6.2: realized P/L for the received lots. entry average is the source's RUNNING
// cost basis at settlement time, so later fills propagate into P/L by design.
pub fn settlement_pnl(
    exit_price: Price,
    entry_average: Price,
    received: Lots,
    direction: Side,
) -> Money {
    let delta = exit_price.value() - entry_average.value();
    Money::new(delta * received.as_decimal() * direction.sign())
}

/// Validates and allocates exit requests against a source's filled lots, tracks
/// partial exit fulfillment, and computes realized P/L at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitMatcher {
    requests: Vec<ExitRequest>,
    next_id: u64,
}

impl Default for ExitMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitMatcher {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            next_id: 1,
        }
    }

    pub fn requests(&self) -> &[ExitRequest] {
        &self.requests
    }

    pub fn request(&self, id: ExitId) -> Option<&ExitRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    fn request_mut(&mut self, id: ExitId) -> Result<&mut ExitRequest, NotFoundError> {
        self.requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(NotFoundError::Exit(id))
    }

    pub fn requests_for(&self, target: PositionRef) -> impl Iterator<Item = &ExitRequest> {
        self.requests.iter().filter(move |r| r.target == target)
    }

    /// Filled lots already promised to active exit requests on this source.
    pub fn allocated(&self, target: PositionRef) -> Lots {
        self.requests_for(target)
            .filter(|r| r.status.holds_allocation())
            .map(|r| r.requested_exit_lots)
            .sum()
    }

    /// Filled lots still free to exit, given the source's current fill total.
    pub fn available_for_exit(&self, target: PositionRef, source_fills: Lots) -> Lots {
        source_fills.saturating_sub(self.allocated(target))
    }

    /// Create one exit request. `source_fills` is the source's `total_fills()`
    /// (or `aggregate_fills()` for a spread) at this moment.
    pub fn create_exit_request(
        &mut self,
        target: PositionRef,
        source_fills: Lots,
        requested: Lots,
        exit_price: Option<Price>,
        now: Timestamp,
    ) -> Result<ExitId, EngineError> {
        if requested.is_zero() {
            return Err(ValidationError::ZeroExitLots.into());
        }
        let available = self.available_for_exit(target, source_fills);
        if requested > available {
            return Err(InsufficientLotsError {
                requested,
                available,
            }
            .into());
        }
        Ok(self.push_request(target, requested, exit_price, now))
    }

    // 6.1: batch creation validates the SUM against availability before creating
    // anything, so an over-subscribed batch is rejected whole.
    pub fn create_batch_exit_request(
        &mut self,
        target: PositionRef,
        source_fills: Lots,
        requests: Vec<(Lots, Option<Price>)>,
        now: Timestamp,
    ) -> Result<Vec<ExitId>, EngineError> {
        if requests.is_empty() {
            return Err(ValidationError::EmptyExitBatch.into());
        }
        if requests.iter().any(|(lots, _)| lots.is_zero()) {
            return Err(ValidationError::ZeroExitLots.into());
        }

        let total: Lots = requests.iter().map(|(lots, _)| *lots).sum();
        let available = self.available_for_exit(target, source_fills);
        if total > available {
            return Err(InsufficientLotsError {
                requested: total,
                available,
            }
            .into());
        }

        let ids = requests
            .into_iter()
            .map(|(lots, price)| self.push_request(target, lots, price, now))
            .collect();
        Ok(ids)
    }

    fn push_request(
        &mut self,
        target: PositionRef,
        requested: Lots,
        exit_price: Option<Price>,
        now: Timestamp,
    ) -> ExitId {
        let id = ExitId(self.next_id);
        self.next_id += 1;
        self.requests
            .push(ExitRequest::new(id, target, requested, exit_price, now));
        id
    }

    pub fn approve(&mut self, id: ExitId, now: Timestamp) -> Result<(), EngineError> {
        let req = self.request_mut(id)?;
        if req.status != ExitStatus::Pending {
            return Err(InvalidTransitionError::new("approve_exit", req.status).into());
        }
        req.status = ExitStatus::Approved;
        stamp_once(&mut req.approved_at, now);
        Ok(())
    }

    pub fn place_order(&mut self, id: ExitId, now: Timestamp) -> Result<(), EngineError> {
        let req = self.request_mut(id)?;
        if req.status != ExitStatus::Approved {
            return Err(InvalidTransitionError::new("place_exit_order", req.status).into());
        }
        req.status = ExitStatus::OrderPlaced;
        stamp_once(&mut req.order_placed_at, now);
        Ok(())
    }

    /// Manager reports the cumulative exited quantity. Monotonic and bounded by
    /// the requested amount; flips to `filled` when they meet.
    pub fn record_exit_fill(
        &mut self,
        id: ExitId,
        new_received: Lots,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let req = self.request_mut(id)?;
        if !req.status.accepts_fills() {
            return Err(InvalidTransitionError::new("record_exit_fill", req.status).into());
        }
        if new_received < req.received_lots {
            return Err(ValidationError::FillsDecreased {
                current: req.received_lots,
                requested: new_received,
            }
            .into());
        }
        if new_received > req.requested_exit_lots {
            return Err(ValidationError::ReceivedExceedRequested {
                received: new_received,
                requested: req.requested_exit_lots,
            }
            .into());
        }

        req.received_lots = new_received;
        if new_received == req.requested_exit_lots {
            req.status = ExitStatus::Filled;
        } else if !new_received.is_zero() {
            req.status = ExitStatus::PartialFilled;
        }
        if !new_received.is_zero() {
            stamp_once(&mut req.filled_at, now);
        }
        Ok(())
    }

    /// Assign the settlement price and compute realized P/L over the received
    /// lots. `entry_average` is the source's current average price.
    pub fn settle(
        &mut self,
        id: ExitId,
        settlement_price: Price,
        entry_average: Price,
        direction: Side,
    ) -> Result<Money, EngineError> {
        let req = self.request_mut(id)?;
        if matches!(req.status, ExitStatus::Rejected | ExitStatus::Cancelled) {
            return Err(InvalidTransitionError::new("settle", req.status).into());
        }
        let pnl = settlement_pnl(settlement_price, entry_average, req.received_lots, direction);
        req.profit_loss = Some(pnl);
        Ok(pnl)
    }

    /// Compensating action for an in-flight request; releases its allocation.
    pub fn cancel(&mut self, id: ExitId) -> Result<(), EngineError> {
        self.terminate(id, ExitStatus::Cancelled, "cancel_exit")
    }

    pub fn reject(&mut self, id: ExitId) -> Result<(), EngineError> {
        self.terminate(id, ExitStatus::Rejected, "reject_exit")
    }

    fn terminate(
        &mut self,
        id: ExitId,
        terminal: ExitStatus,
        operation: &'static str,
    ) -> Result<(), EngineError> {
        let req = self.request_mut(id)?;
        if req.status.is_terminal() {
            return Err(InvalidTransitionError::new(operation, req.status).into());
        }
        req.status = terminal;
        Ok(())
    }
}
