// 10.1 engine/core.rs: main engine. holds every trade, spread and exit request,
// owns id allocation, the clock and the audit log. intake and workflow
// transitions live here; fill recording and exit handling are in the sibling
// modules.

use crate::config::EngineConfig;
use crate::errors::{EngineError, NotFoundError, ValidationError};
use crate::events::{
    CloseAcceptedEvent, CloseRequestedEvent, Event, EventId, EventPayload, SpreadSubmittedEvent,
    StatusChangedEvent, TradeSubmittedEvent,
};
use crate::exit::{ExitMatcher, ExitRequest};
use crate::ledger::LotEntry;
use crate::position::{PositionAccount, TradeStatus};
use crate::spread::{SpreadAccount, SpreadType};
use crate::types::{ExitId, PositionRef, Side, SpreadId, Timestamp, TradeId};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) trades: HashMap<TradeId, PositionAccount>,
    pub(super) spreads: HashMap<SpreadId, SpreadAccount>,
    pub(super) exits: ExitMatcher,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_trade_id: u64,
    pub(super) next_spread_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            trades: HashMap::new(),
            spreads: HashMap::new(),
            exits: ExitMatcher::new(),
            events: Vec::new(),
            next_event_id: 1,
            next_trade_id: 1,
            next_spread_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    // 10.2: intake. a trade enters pending with its opening tranches already on
    // the ledger.
    pub fn submit_trade(
        &mut self,
        contract: impl Into<String>,
        direction: Side,
        entries: Vec<LotEntry>,
    ) -> Result<TradeId, EngineError> {
        self.check_tranche_limit(entries.len())?;

        let id = TradeId(self.next_trade_id);
        let trade = PositionAccount::new(id, contract, direction, entries, self.current_time)?;
        self.next_trade_id += 1;

        self.emit_event(EventPayload::TradeSubmitted(TradeSubmittedEvent {
            trade_id: id,
            contract: trade.contract.clone(),
            direction,
            total_lots: trade.ledger.total_lots(),
            average_price: trade.ledger.average_price(),
        }));

        self.trades.insert(id, trade);
        Ok(id)
    }

    /// Submit a spread: each element of `legs` is a contract label plus its
    /// opening tranches. Leg ids are allocated from the same sequence as
    /// standalone trades but committed only if the whole spread validates.
    pub fn submit_spread(
        &mut self,
        spread_type: SpreadType,
        direction: Side,
        ratio: Decimal,
        legs: Vec<(String, Vec<LotEntry>)>,
    ) -> Result<SpreadId, EngineError> {
        if legs.len() > self.config.max_legs_per_spread {
            return Err(ValidationError::TooManyLegs {
                got: legs.len(),
                max: self.config.max_legs_per_spread,
            }
            .into());
        }
        for (_, entries) in &legs {
            self.check_tranche_limit(entries.len())?;
        }

        let leg_count = legs.len();
        let leg_accounts = legs
            .into_iter()
            .enumerate()
            .map(|(i, (contract, entries))| {
                PositionAccount::new(
                    TradeId(self.next_trade_id + i as u64),
                    contract,
                    direction,
                    entries,
                    self.current_time,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let id = SpreadId(self.next_spread_id);
        let spread = SpreadAccount::new(
            id,
            spread_type,
            direction,
            ratio,
            leg_accounts,
            self.current_time,
        )?;
        self.next_trade_id += leg_count as u64;
        self.next_spread_id += 1;

        self.emit_event(EventPayload::SpreadSubmitted(SpreadSubmittedEvent {
            spread_id: id,
            spread_type,
            direction,
            leg_count,
            total_lots: spread.aggregate_lots(),
        }));

        self.spreads.insert(id, spread);
        Ok(id)
    }

    pub fn get_trade(&self, trade_id: TradeId) -> Option<&PositionAccount> {
        self.trades.get(&trade_id)
    }

    pub fn get_spread(&self, spread_id: SpreadId) -> Option<&SpreadAccount> {
        self.spreads.get(&spread_id)
    }

    pub fn trades_iter(&self) -> impl Iterator<Item = (&TradeId, &PositionAccount)> {
        self.trades.iter()
    }

    pub fn spreads_iter(&self) -> impl Iterator<Item = (&SpreadId, &SpreadAccount)> {
        self.spreads.iter()
    }

    pub fn exit_requests(&self) -> &[ExitRequest] {
        self.exits.requests()
    }

    pub fn get_exit(&self, exit_id: ExitId) -> Option<&ExitRequest> {
        self.exits.request(exit_id)
    }

    pub(super) fn trade_mut(
        &mut self,
        trade_id: TradeId,
    ) -> Result<&mut PositionAccount, NotFoundError> {
        self.trades
            .get_mut(&trade_id)
            .ok_or(NotFoundError::Trade(trade_id))
    }

    pub(super) fn spread_mut(
        &mut self,
        spread_id: SpreadId,
    ) -> Result<&mut SpreadAccount, NotFoundError> {
        self.spreads
            .get_mut(&spread_id)
            .ok_or(NotFoundError::Spread(spread_id))
    }

    // 10.3: approval workflow. trades walk fixed transitions; spreads take a
    // manager-set target status.
    pub fn approve_trade(&mut self, trade_id: TradeId) -> Result<(), EngineError> {
        let now = self.current_time;
        let trade = self.trade_mut(trade_id)?;
        let from = trade.status;
        trade.approve(now)?;
        self.emit_status_changed(PositionRef::Trade { id: trade_id }, from, TradeStatus::Approved);
        Ok(())
    }

    pub fn reject_trade(&mut self, trade_id: TradeId) -> Result<(), EngineError> {
        let trade = self.trade_mut(trade_id)?;
        let from = trade.status;
        trade.reject()?;
        self.emit_status_changed(PositionRef::Trade { id: trade_id }, from, TradeStatus::Rejected);
        Ok(())
    }

    pub fn place_trade_order(&mut self, trade_id: TradeId) -> Result<(), EngineError> {
        let now = self.current_time;
        let trade = self.trade_mut(trade_id)?;
        let from = trade.status;
        trade.place_order(now)?;
        self.emit_status_changed(
            PositionRef::Trade { id: trade_id },
            from,
            TradeStatus::OrderPlaced,
        );
        Ok(())
    }

    pub fn update_spread_status(
        &mut self,
        spread_id: SpreadId,
        new_status: TradeStatus,
    ) -> Result<(), EngineError> {
        let now = self.current_time;
        let spread = self.spread_mut(spread_id)?;
        let from = spread.status;
        spread.update_status(new_status, now)?;
        self.emit_status_changed(PositionRef::Spread { id: spread_id }, from, new_status);
        Ok(())
    }

    // 10.4: two-phase close, addressed through a PositionRef so trades and
    // spreads share one entry point.
    pub fn request_close(&mut self, target: PositionRef) -> Result<(), EngineError> {
        let now = self.current_time;
        match target {
            PositionRef::Trade { id } => self.trade_mut(id)?.request_close(now)?,
            PositionRef::Spread { id } => self.spread_mut(id)?.request_close(now)?,
        }
        self.emit_event(EventPayload::CloseRequested(CloseRequestedEvent { target }));
        Ok(())
    }

    /// Idempotent: re-accepting an accepted close succeeds without emitting a
    /// second event.
    pub fn accept_close(&mut self, target: PositionRef) -> Result<(), EngineError> {
        let already = match target {
            PositionRef::Trade { id } => {
                let trade = self.trade_mut(id)?;
                let already = trade.close_accepted;
                trade.accept_close()?;
                already
            }
            PositionRef::Spread { id } => {
                let spread = self.spread_mut(id)?;
                let already = spread.close_accepted;
                spread.accept_close()?;
                already
            }
        };
        if !already {
            self.emit_event(EventPayload::CloseAccepted(CloseAcceptedEvent { target }));
        }
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub(super) fn check_tranche_limit(&self, len: usize) -> Result<(), ValidationError> {
        if len > self.config.max_tranches_per_ledger {
            return Err(ValidationError::TooManyTranches {
                len,
                max: self.config.max_tranches_per_ledger,
            });
        }
        Ok(())
    }

    fn emit_status_changed(&mut self, target: PositionRef, from: TradeStatus, to: TradeStatus) {
        self.emit_event(EventPayload::StatusChanged(StatusChangedEvent {
            target,
            from,
            to,
        }));
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lots, Price};
    use rust_decimal_macros::dec;

    fn entry(lots: u32, price: Decimal) -> LotEntry {
        LotEntry::new(
            Lots::new(lots),
            Price::new_unchecked(price),
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn submit_trade_starts_pending() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade("RBOB Jan26-Feb26", Side::Long, vec![entry(10, dec!(100))])
            .unwrap();

        let trade = engine.get_trade(id).unwrap();
        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.ledger.total_lots(), Lots::new(10));
        assert!(matches!(
            engine.events()[0].payload,
            EventPayload::TradeSubmitted(_)
        ));
    }

    #[test]
    fn trade_ids_are_sequential() {
        let mut engine = Engine::new(EngineConfig::default());
        let a = engine
            .submit_trade("a", Side::Long, vec![entry(1, dec!(1))])
            .unwrap();
        let b = engine
            .submit_trade("b", Side::Short, vec![entry(1, dec!(1))])
            .unwrap();
        assert_eq!(a, TradeId(1));
        assert_eq!(b, TradeId(2));
    }

    #[test]
    fn failed_spread_consumes_no_ids() {
        let mut engine = Engine::new(EngineConfig::default());

        // fly needs exactly 2 legs
        let err = engine
            .submit_spread(
                SpreadType::Fly,
                Side::Long,
                dec!(100),
                vec![("only".into(), vec![entry(1, dec!(1))])],
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let id = engine
            .submit_trade("next", Side::Long, vec![entry(1, dec!(1))])
            .unwrap();
        assert_eq!(id, TradeId(1));
    }

    #[test]
    fn spread_legs_share_trade_id_sequence() {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .submit_trade("solo", Side::Long, vec![entry(1, dec!(1))])
            .unwrap();
        let spread_id = engine
            .submit_spread(
                SpreadType::Fly,
                Side::Long,
                dec!(100),
                vec![
                    ("near".into(), vec![entry(10, dec!(100))]),
                    ("far".into(), vec![entry(20, dec!(130))]),
                ],
            )
            .unwrap();

        let spread = engine.get_spread(spread_id).unwrap();
        let leg_ids: Vec<TradeId> = spread.legs().iter().map(|l| l.id).collect();
        assert_eq!(leg_ids, vec![TradeId(2), TradeId(3)]);

        let next = engine
            .submit_trade("after", Side::Long, vec![entry(1, dec!(1))])
            .unwrap();
        assert_eq!(next, TradeId(4));
    }

    #[test]
    fn tranche_limit_enforced_at_intake() {
        let config = EngineConfig {
            max_tranches_per_ledger: 2,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config);
        let err = engine
            .submit_trade(
                "too many",
                Side::Long,
                vec![entry(1, dec!(1)), entry(1, dec!(1)), entry(1, dec!(1))],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::TooManyTranches { len: 3, max: 2 })
        ));
    }

    #[test]
    fn approval_workflow_emits_status_events() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade("wf", Side::Long, vec![entry(10, dec!(100))])
            .unwrap();

        engine.approve_trade(id).unwrap();
        engine.place_trade_order(id).unwrap();

        let statuses: Vec<(TradeStatus, TradeStatus)> = engine
            .events()
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::StatusChanged(s) => Some((s.from, s.to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                (TradeStatus::Pending, TradeStatus::Approved),
                (TradeStatus::Approved, TradeStatus::OrderPlaced),
            ]
        );
    }

    #[test]
    fn unknown_trade_is_not_found() {
        let mut engine = Engine::new(EngineConfig::default());
        let err = engine.approve_trade(TradeId(99)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn repeated_accept_close_emits_one_event() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade("c", Side::Long, vec![entry(10, dec!(100))])
            .unwrap();
        engine.approve_trade(id).unwrap();
        engine.place_trade_order(id).unwrap();
        engine
            .record_trade_fill(id, 0, Lots::new(10))
            .unwrap();

        let target = PositionRef::Trade { id };
        engine.request_close(target).unwrap();
        engine.accept_close(target).unwrap();
        engine.accept_close(target).unwrap();

        let accepted = engine
            .events()
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::CloseAccepted(_)))
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn event_log_is_bounded() {
        let config = EngineConfig {
            max_events: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config);
        for i in 0..5 {
            engine
                .submit_trade(format!("t{i}"), Side::Long, vec![entry(1, dec!(1))])
                .unwrap();
        }
        assert_eq!(engine.events().len(), 3);
        // oldest dropped, ids keep counting
        assert_eq!(engine.events()[0].id, EventId(3));
    }
}
