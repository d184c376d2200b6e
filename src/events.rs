// 9.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::exit::ExitStatus;
use crate::position::TradeStatus;
use crate::spread::SpreadType;
use crate::types::{ExitId, Lots, Money, PositionRef, Price, Side, SpreadId, Timestamp, TradeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // intake events
    TradeSubmitted(TradeSubmittedEvent),
    SpreadSubmitted(SpreadSubmittedEvent),

    // workflow events
    StatusChanged(StatusChangedEvent),
    CloseRequested(CloseRequestedEvent),
    CloseAccepted(CloseAcceptedEvent),

    // ledger events
    LotsAdded(LotsAddedEvent),
    FillRecorded(FillRecordedEvent),

    // exit events
    ExitRequested(ExitRequestedEvent),
    ExitStatusChanged(ExitStatusChangedEvent),
    ExitFillRecorded(ExitFillRecordedEvent),
    ExitSettled(ExitSettledEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSubmittedEvent {
    pub trade_id: TradeId,
    pub contract: String,
    pub direction: Side,
    pub total_lots: Lots,
    pub average_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadSubmittedEvent {
    pub spread_id: SpreadId,
    pub spread_type: SpreadType,
    pub direction: Side,
    pub leg_count: usize,
    pub total_lots: Lots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub target: PositionRef,
    pub from: TradeStatus,
    pub to: TradeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequestedEvent {
    pub target: PositionRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseAcceptedEvent {
    pub target: PositionRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotsAddedEvent {
    pub target: PositionRef,
    /// set when the tranches landed on a spread leg
    pub leg: Option<TradeId>,
    pub total_lots: Lots,
    pub average_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecordedEvent {
    pub target: PositionRef,
    pub leg: Option<TradeId>,
    pub tranche: usize,
    pub fills_received: Lots,
    pub total_fills: Lots,
    pub total_lots: Lots,
    pub status: TradeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRequestedEvent {
    pub exit_id: ExitId,
    pub target: PositionRef,
    pub requested_exit_lots: Lots,
    /// None means exit at market
    pub exit_price: Option<Price>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitStatusChangedEvent {
    pub exit_id: ExitId,
    pub from: ExitStatus,
    pub to: ExitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitFillRecordedEvent {
    pub exit_id: ExitId,
    pub received_lots: Lots,
    pub requested_exit_lots: Lots,
    pub status: ExitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSettledEvent {
    pub exit_id: ExitId,
    pub settlement_price: Price,
    pub entry_average_price: Price,
    pub profit_loss: Money,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

#[derive(Debug)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn event_collector() {
        let mut collector = EventCollector::new();

        let event = Event::new(
            collector.next_id(),
            Timestamp::from_millis(1000),
            EventPayload::StatusChanged(StatusChangedEvent {
                target: PositionRef::Trade { id: TradeId(1) },
                from: TradeStatus::Pending,
                to: TradeStatus::Approved,
            }),
        );

        collector.emit(event);
        assert_eq!(collector.events().len(), 1);

        collector.clear();
        assert!(collector.events().is_empty());
    }

    #[test]
    fn fill_event_creation() {
        let fill = FillRecordedEvent {
            target: PositionRef::Trade { id: TradeId(1) },
            leg: None,
            tranche: 0,
            fills_received: Lots::new(4),
            total_fills: Lots::new(4),
            total_lots: Lots::new(15),
            status: TradeStatus::PartialFillsReceived,
        };

        assert_eq!(fill.total_lots, Lots::new(15));
        assert!(fill.total_fills < fill.total_lots);
    }

    #[test]
    fn settle_event_creation() {
        let settled = ExitSettledEvent {
            exit_id: ExitId(3),
            settlement_price: Price::new_unchecked(dec!(120)),
            entry_average_price: Price::new_unchecked(dec!(110)),
            profit_loss: Money::new(dec!(50)),
        };

        assert!(!settled.profit_loss.is_negative());
    }
}
