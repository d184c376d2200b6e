// 10.6 engine/exits.rs: exit allocation and settlement against live sources.
// the engine resolves a PositionRef to its current fill total, average price
// and direction, then delegates allocation arithmetic to the matcher.

use super::core::Engine;
use super::results::ExitSettlement;
use crate::errors::{EngineError, NotFoundError, ValidationError};
use crate::events::{
    EventPayload, ExitFillRecordedEvent, ExitRequestedEvent, ExitSettledEvent,
    ExitStatusChangedEvent,
};
use crate::exit::ExitStatus;
use crate::types::{ExitId, Lots, Money, PositionRef, Price, Side};

impl Engine {
    /// Current fill total, running average price and direction of the source
    /// behind a `PositionRef`.
    fn source_view(&self, target: PositionRef) -> Result<(Lots, Price, Side), EngineError> {
        match target {
            PositionRef::Trade { id } => {
                let trade = self.get_trade(id).ok_or(NotFoundError::Trade(id))?;
                Ok((
                    trade.ledger.total_fills(),
                    trade.ledger.average_price(),
                    trade.direction,
                ))
            }
            PositionRef::Spread { id } => {
                let spread = self.get_spread(id).ok_or(NotFoundError::Spread(id))?;
                Ok((
                    spread.aggregate_fills(),
                    spread.aggregate_average_price(),
                    spread.direction,
                ))
            }
        }
    }

    /// Filled lots not yet promised to an active exit request.
    pub fn available_for_exit(&self, target: PositionRef) -> Result<Lots, EngineError> {
        let (fills, _, _) = self.source_view(target)?;
        Ok(self.exits.available_for_exit(target, fills))
    }

    pub fn request_exit(
        &mut self,
        target: PositionRef,
        requested: Lots,
        exit_price: Option<Price>,
    ) -> Result<ExitId, EngineError> {
        let (fills, _, _) = self.source_view(target)?;
        let now = self.current_time;
        let id = self
            .exits
            .create_exit_request(target, fills, requested, exit_price, now)?;

        self.emit_event(EventPayload::ExitRequested(ExitRequestedEvent {
            exit_id: id,
            target,
            requested_exit_lots: requested,
            exit_price,
        }));
        Ok(id)
    }

    /// Create several exit requests against one source atomically: either every
    /// request is created or none is.
    pub fn request_exit_batch(
        &mut self,
        target: PositionRef,
        requests: Vec<(Lots, Option<Price>)>,
    ) -> Result<Vec<ExitId>, EngineError> {
        if requests.len() > self.config.max_exit_batch {
            return Err(ValidationError::ExitBatchTooLarge {
                got: requests.len(),
                max: self.config.max_exit_batch,
            }
            .into());
        }
        let (fills, _, _) = self.source_view(target)?;
        let now = self.current_time;
        let requested: Vec<(Lots, Option<Price>)> = requests.clone();
        let ids = self
            .exits
            .create_batch_exit_request(target, fills, requests, now)?;

        for (id, (lots, price)) in ids.iter().zip(requested) {
            self.emit_event(EventPayload::ExitRequested(ExitRequestedEvent {
                exit_id: *id,
                target,
                requested_exit_lots: lots,
                exit_price: price,
            }));
        }
        Ok(ids)
    }

    pub fn approve_exit(&mut self, exit_id: ExitId) -> Result<(), EngineError> {
        let now = self.current_time;
        let from = self.exit_status(exit_id)?;
        self.exits.approve(exit_id, now)?;
        self.emit_exit_status(exit_id, from, ExitStatus::Approved);
        Ok(())
    }

    pub fn place_exit_order(&mut self, exit_id: ExitId) -> Result<(), EngineError> {
        let now = self.current_time;
        let from = self.exit_status(exit_id)?;
        self.exits.place_order(exit_id, now)?;
        self.emit_exit_status(exit_id, from, ExitStatus::OrderPlaced);
        Ok(())
    }

    pub fn cancel_exit(&mut self, exit_id: ExitId) -> Result<(), EngineError> {
        let from = self.exit_status(exit_id)?;
        self.exits.cancel(exit_id)?;
        self.emit_exit_status(exit_id, from, ExitStatus::Cancelled);
        Ok(())
    }

    pub fn reject_exit(&mut self, exit_id: ExitId) -> Result<(), EngineError> {
        let from = self.exit_status(exit_id)?;
        self.exits.reject(exit_id)?;
        self.emit_exit_status(exit_id, from, ExitStatus::Rejected);
        Ok(())
    }

    /// Record the manager's cumulative exited quantity for one request.
    pub fn record_exit_fill(
        &mut self,
        exit_id: ExitId,
        new_received: Lots,
    ) -> Result<(), EngineError> {
        let now = self.current_time;
        self.exits.record_exit_fill(exit_id, new_received, now)?;

        let req = self
            .exits
            .request(exit_id)
            .ok_or(NotFoundError::Exit(exit_id))?;
        let payload = ExitFillRecordedEvent {
            exit_id,
            received_lots: req.received_lots,
            requested_exit_lots: req.requested_exit_lots,
            status: req.status,
        };
        self.emit_event(EventPayload::ExitFillRecorded(payload));
        Ok(())
    }

    // 10.6.1: settlement. P/L is computed over the lots actually received, at
    // the source's running average price as of now.
    pub fn settle_exit(
        &mut self,
        exit_id: ExitId,
        settlement_price: Price,
    ) -> Result<ExitSettlement, EngineError> {
        let req = self
            .exits
            .request(exit_id)
            .ok_or(NotFoundError::Exit(exit_id))?;
        let target = req.target;
        let received = req.received_lots;
        let (_, entry_average, direction) = self.source_view(target)?;

        let profit_loss: Money = self
            .exits
            .settle(exit_id, settlement_price, entry_average, direction)?;

        self.emit_event(EventPayload::ExitSettled(ExitSettledEvent {
            exit_id,
            settlement_price,
            entry_average_price: entry_average,
            profit_loss,
        }));

        Ok(ExitSettlement {
            exit_id,
            settlement_price,
            entry_average_price: entry_average,
            received_lots: received,
            profit_loss,
        })
    }

    fn exit_status(&self, exit_id: ExitId) -> Result<ExitStatus, NotFoundError> {
        self.exits
            .request(exit_id)
            .map(|r| r.status)
            .ok_or(NotFoundError::Exit(exit_id))
    }

    fn emit_exit_status(&mut self, exit_id: ExitId, from: ExitStatus, to: ExitStatus) {
        self.emit_event(EventPayload::ExitStatusChanged(ExitStatusChangedEvent {
            exit_id,
            from,
            to,
        }));
    }
}
