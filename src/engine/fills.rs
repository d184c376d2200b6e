// 10.5 engine/fills.rs: ledger mutations. adding tranches and recording the
// manager's cumulative fill reports, for standalone trades and spread legs.

use super::core::Engine;
use super::results::LedgerSnapshot;
use crate::errors::EngineError;
use crate::events::{EventPayload, FillRecordedEvent, LotsAddedEvent};
use crate::ledger::LotEntry;
use crate::position::PositionAccount;
use crate::spread::SpreadAccount;
use crate::types::{Lots, PositionRef, SpreadId, TradeId};

fn trade_snapshot(trade: &PositionAccount) -> LedgerSnapshot {
    LedgerSnapshot {
        total_lots: trade.ledger.total_lots(),
        total_fills: trade.ledger.total_fills(),
        average_price: trade.ledger.average_price(),
        status: trade.status,
    }
}

fn spread_snapshot(spread: &SpreadAccount) -> LedgerSnapshot {
    LedgerSnapshot {
        total_lots: spread.aggregate_lots(),
        total_fills: spread.aggregate_fills(),
        average_price: spread.aggregate_average_price(),
        status: spread.status,
    }
}

impl Engine {
    /// Append tranches to a trade's ledger and return the updated aggregates.
    pub fn add_trade_lots(
        &mut self,
        trade_id: TradeId,
        entries: Vec<LotEntry>,
    ) -> Result<LedgerSnapshot, EngineError> {
        let new_len = self
            .get_trade(trade_id)
            .map(|t| t.ledger.len() + entries.len())
            .unwrap_or(entries.len());
        self.check_tranche_limit(new_len)?;

        let trade = self.trade_mut(trade_id)?;
        trade.append_entries(entries)?;
        let snapshot = trade_snapshot(trade);

        self.emit_event(EventPayload::LotsAdded(LotsAddedEvent {
            target: PositionRef::Trade { id: trade_id },
            leg: None,
            total_lots: snapshot.total_lots,
            average_price: snapshot.average_price,
        }));
        Ok(snapshot)
    }

    /// Record a cumulative fill report against one tranche of a trade.
    pub fn record_trade_fill(
        &mut self,
        trade_id: TradeId,
        tranche: usize,
        new_fills: Lots,
    ) -> Result<LedgerSnapshot, EngineError> {
        let now = self.current_time;
        let trade = self.trade_mut(trade_id)?;
        trade.record_fill(tranche, new_fills, now)?;
        let snapshot = trade_snapshot(trade);

        self.emit_event(EventPayload::FillRecorded(FillRecordedEvent {
            target: PositionRef::Trade { id: trade_id },
            leg: None,
            tranche,
            fills_received: new_fills,
            total_fills: snapshot.total_fills,
            total_lots: snapshot.total_lots,
            status: snapshot.status,
        }));
        Ok(snapshot)
    }

    /// Append tranches to one leg of a spread and return the flattened
    /// aggregates across all legs.
    pub fn add_spread_leg_lots(
        &mut self,
        spread_id: SpreadId,
        leg_id: TradeId,
        entries: Vec<LotEntry>,
    ) -> Result<LedgerSnapshot, EngineError> {
        let new_len = self
            .get_spread(spread_id)
            .and_then(|s| s.leg(leg_id))
            .map(|l| l.ledger.len() + entries.len())
            .unwrap_or(entries.len());
        self.check_tranche_limit(new_len)?;

        let spread = self.spread_mut(spread_id)?;
        spread.add_lots_to_leg(leg_id, entries)?;
        let snapshot = spread_snapshot(spread);

        self.emit_event(EventPayload::LotsAdded(LotsAddedEvent {
            target: PositionRef::Spread { id: spread_id },
            leg: Some(leg_id),
            total_lots: snapshot.total_lots,
            average_price: snapshot.average_price,
        }));
        Ok(snapshot)
    }

    /// Record a cumulative fill report against one tranche of one spread leg.
    /// The spread's partial/complete status is re-derived from aggregate
    /// progress.
    pub fn record_spread_leg_fill(
        &mut self,
        spread_id: SpreadId,
        leg_id: TradeId,
        tranche: usize,
        new_fills: Lots,
    ) -> Result<LedgerSnapshot, EngineError> {
        let now = self.current_time;
        let spread = self.spread_mut(spread_id)?;
        spread.record_leg_fill(leg_id, tranche, new_fills, now)?;
        let snapshot = spread_snapshot(spread);

        self.emit_event(EventPayload::FillRecorded(FillRecordedEvent {
            target: PositionRef::Spread { id: spread_id },
            leg: Some(leg_id),
            tranche,
            fills_received: new_fills,
            total_fills: snapshot.total_fills,
            total_lots: snapshot.total_lots,
            status: snapshot.status,
        }));
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::errors::ValidationError;
    use crate::position::TradeStatus;
    use crate::spread::SpreadType;
    use crate::types::{Price, Side, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn entry(lots: u32, price: Decimal) -> LotEntry {
        LotEntry::new(
            Lots::new(lots),
            Price::new_unchecked(price),
            Timestamp::from_millis(0),
        )
    }

    fn engine_with_trade() -> (Engine, TradeId) {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade(
                "RBOB Jan26-Feb26",
                Side::Long,
                vec![entry(10, dec!(100)), entry(5, dec!(130))],
            )
            .unwrap();
        engine.approve_trade(id).unwrap();
        engine.place_trade_order(id).unwrap();
        (engine, id)
    }

    #[test]
    fn add_lots_updates_average() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade("t", Side::Long, vec![entry(10, dec!(100))])
            .unwrap();

        // (10*100 + 5*130) / 15 = 110
        let snapshot = engine
            .add_trade_lots(id, vec![entry(5, dec!(130))])
            .unwrap();
        assert_eq!(snapshot.total_lots, Lots::new(15));
        assert_eq!(snapshot.average_price.value(), dec!(110));
    }

    #[test]
    fn fill_flips_trade_status() {
        let (mut engine, id) = engine_with_trade();

        let snapshot = engine.record_trade_fill(id, 0, Lots::new(4)).unwrap();
        assert_eq!(snapshot.status, TradeStatus::PartialFillsReceived);
        assert_eq!(snapshot.total_fills, Lots::new(4));

        engine.record_trade_fill(id, 0, Lots::new(10)).unwrap();
        let snapshot = engine.record_trade_fill(id, 1, Lots::new(5)).unwrap();
        assert_eq!(snapshot.status, TradeStatus::FillsReceived);
    }

    #[test]
    fn tranche_limit_counts_existing_entries() {
        let config = EngineConfig {
            max_tranches_per_ledger: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config);
        let id = engine
            .submit_trade("t", Side::Long, vec![entry(1, dec!(1)), entry(1, dec!(1))])
            .unwrap();

        let err = engine
            .add_trade_lots(id, vec![entry(1, dec!(1)), entry(1, dec!(1))])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::TooManyTranches { len: 4, max: 3 })
        ));
        assert_eq!(engine.get_trade(id).unwrap().ledger.len(), 2);
    }

    #[test]
    fn spread_leg_fill_updates_aggregates() {
        let mut engine = Engine::new(EngineConfig::default());
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
        engine
            .update_spread_status(spread_id, TradeStatus::Approved)
            .unwrap();
        engine
            .update_spread_status(spread_id, TradeStatus::OrderPlaced)
            .unwrap();

        let leg = engine.get_spread(spread_id).unwrap().legs()[0].id;
        let snapshot = engine
            .record_spread_leg_fill(spread_id, leg, 0, Lots::new(10))
            .unwrap();
        assert_eq!(snapshot.total_fills, Lots::new(10));
        assert_eq!(snapshot.status, TradeStatus::PartialFillsReceived);
        assert_eq!(snapshot.average_price.value(), dec!(120));
    }

    #[test]
    fn unknown_leg_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
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

        let err = engine
            .add_spread_leg_lots(spread_id, TradeId(99), vec![entry(1, dec!(1))])
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
