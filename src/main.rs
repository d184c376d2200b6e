//! Position Ledger Simulation.
//!
//! Demonstrates the full ledger lifecycle including trade approval, tranche
//! accumulation, fill reconciliation, exit allocation and settlement, and
//! realtime view reconciliation.

use lots_core::*;
use rust_decimal_macros::dec;

fn main() {
    println!("Commodity Position Ledger Simulation");
    println!("Fills-First Reconciliation, Full Lifecycle\n");

    scenario_1_trade_lifecycle();
    scenario_2_tranche_accumulation();
    scenario_3_spread_lifecycle();
    scenario_4_exit_allocation();
    scenario_5_settlement_pnl();
    scenario_6_realtime_views();

    println!("\nAll simulations completed successfully.");
}

fn entry(lots: u32, price: rust_decimal::Decimal) -> LotEntry {
    LotEntry::new(Lots::new(lots), Price::new_unchecked(price), Timestamp::from_millis(0))
}

/// Standalone trade from submission to accepted close.
fn scenario_1_trade_lifecycle() {
    println!("Scenario 1: Trade Lifecycle\n");

    let mut engine = Engine::new(EngineConfig::default());

    let id = engine
        .submit_trade("RBOB Jan26-Feb26", Side::Long, vec![entry(10, dec!(100))])
        .unwrap();
    println!(
        "  Trader submits 10 lots RBOB Jan26-Feb26 @ $100, status: {}",
        engine.get_trade(id).unwrap().status
    );

    engine.approve_trade(id).unwrap();
    engine.place_trade_order(id).unwrap();
    println!("  Manager approves and places the order");

    engine.advance_time(1000);
    let snapshot = engine.record_trade_fill(id, 0, Lots::new(4)).unwrap();
    println!("  Broker reports 4 of 10 filled, status: {}", snapshot.status);

    engine.advance_time(1000);
    let snapshot = engine.record_trade_fill(id, 0, Lots::new(10)).unwrap();
    println!("  Broker reports 10 of 10 filled, status: {}", snapshot.status);

    let target = PositionRef::Trade { id };
    engine.request_close(target).unwrap();
    println!("  Trader requests close");
    engine.accept_close(target).unwrap();
    println!("  Manager accepts, status: {}\n", engine.get_trade(id).unwrap().status);
}

/// Tranche accumulation and the running average price.
fn scenario_2_tranche_accumulation() {
    println!("Scenario 2: Tranche Accumulation\n");

    let mut engine = Engine::new(EngineConfig::default());
    let id = engine
        .submit_trade("HO Mar26", Side::Short, vec![entry(10, dec!(100))])
        .unwrap();

    println!("  Opening tranche: 10 lots @ $100");

    let snapshot = engine.add_trade_lots(id, vec![entry(5, dec!(130))]).unwrap();
    println!("  Added 5 lots @ $130");
    println!("  Ledger: {} lots, average ${}", snapshot.total_lots, snapshot.average_price);

    let snapshot = engine.add_trade_lots(id, vec![entry(15, dec!(110))]).unwrap();
    println!("  Added 15 lots @ $110");
    println!("  Ledger: {} lots, average ${}\n", snapshot.total_lots, snapshot.average_price);
}

/// Fly spread with manager-gated workflow and leg-level fills.
fn scenario_3_spread_lifecycle() {
    println!("Scenario 3: Spread Lifecycle\n");

    let mut engine = Engine::new(EngineConfig::default());
    let spread_id = engine
        .submit_spread(
            SpreadType::Fly,
            Side::Long,
            dec!(100),
            vec![
                ("RBOB Jan26".into(), vec![entry(10, dec!(100))]),
                ("RBOB Feb26".into(), vec![entry(20, dec!(130))]),
            ],
        )
        .unwrap();

    let spread = engine.get_spread(spread_id).unwrap();
    println!(
        "  Fly spread submitted: {} legs, {} lots total",
        spread.legs().len(),
        spread.aggregate_lots()
    );
    println!("  Aggregate average: ${}", spread.aggregate_average_price());

    engine.update_spread_status(spread_id, TradeStatus::Approved).unwrap();
    engine.update_spread_status(spread_id, TradeStatus::OrderPlaced).unwrap();
    println!("  Manager walks the spread to order_placed");

    let spread = engine.get_spread(spread_id).unwrap();
    let legs: Vec<TradeId> = spread.legs().iter().map(|l| l.id).collect();

    engine.advance_time(1000);
    let snapshot = engine.record_spread_leg_fill(spread_id, legs[0], 0, Lots::new(10)).unwrap();
    println!("  Near leg fully filled, spread status: {}", snapshot.status);

    engine.advance_time(1000);
    let snapshot = engine.record_spread_leg_fill(spread_id, legs[1], 0, Lots::new(20)).unwrap();
    println!("  Far leg fully filled, spread status: {}\n", snapshot.status);
}

/// Exit allocation against filled lots, including the atomic batch path.
fn scenario_4_exit_allocation() {
    println!("Scenario 4: Exit Allocation\n");

    let mut engine = Engine::new(EngineConfig::default());
    let id = engine
        .submit_trade("WTI Jun26", Side::Long, vec![entry(10, dec!(100))])
        .unwrap();
    engine.approve_trade(id).unwrap();
    engine.place_trade_order(id).unwrap();
    engine.record_trade_fill(id, 0, Lots::new(8)).unwrap();

    let target = PositionRef::Trade { id };
    println!(
        "  8 of 10 lots filled, available for exit: {}",
        engine.available_for_exit(target).unwrap()
    );

    engine.request_exit(target, Lots::new(5), None).unwrap();
    println!(
        "  Exit requested for 5 lots, available now: {}",
        engine.available_for_exit(target).unwrap()
    );

    match engine.request_exit(target, Lots::new(4), None) {
        Err(e) => println!("  Requesting 4 more: {e}"),
        Ok(_) => unreachable!(),
    }

    match engine.request_exit_batch(target, vec![(Lots::new(2), None), (Lots::new(2), None)]) {
        Err(e) => println!("  Batch of 2+2: {e}"),
        Ok(_) => unreachable!(),
    }

    let ids = engine
        .request_exit_batch(target, vec![(Lots::new(2), None), (Lots::new(1), None)])
        .unwrap();
    println!("  Batch of 2+1 accepted, {} requests created", ids.len());
    println!("  Available now: {}\n", engine.available_for_exit(target).unwrap());
}

/// Exit fills and realized P/L at settlement, long and short.
fn scenario_5_settlement_pnl() {
    println!("Scenario 5: Settlement P/L\n");

    for direction in [Side::Long, Side::Short] {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .submit_trade("NG Jul26", direction, vec![entry(10, dec!(100)), entry(5, dec!(130))])
            .unwrap();
        engine.approve_trade(id).unwrap();
        engine.place_trade_order(id).unwrap();
        engine.record_trade_fill(id, 0, Lots::new(10)).unwrap();
        engine.record_trade_fill(id, 1, Lots::new(5)).unwrap();

        let target = PositionRef::Trade { id };
        let exit = engine
            .request_exit(target, Lots::new(5), Some(Price::new_unchecked(dec!(120))))
            .unwrap();
        engine.approve_exit(exit).unwrap();
        engine.place_exit_order(exit).unwrap();
        engine.record_exit_fill(exit, Lots::new(5)).unwrap();

        let settlement = engine.settle_exit(exit, Price::new_unchecked(dec!(120))).unwrap();
        println!(
            "  {} 5 lots: entry average ${}, exit ${}, P/L ${}",
            direction,
            settlement.entry_average_price,
            settlement.settlement_price,
            settlement.profit_loss
        );
    }
    println!();
}

/// Server-push reconciliation into the active board and the close queue.
fn scenario_6_realtime_views() {
    println!("Scenario 6: Realtime Views\n");

    let mut engine = Engine::new(EngineConfig::default());
    let id = engine
        .submit_trade("RBOB Jan26-Feb26", Side::Long, vec![entry(10, dec!(100))])
        .unwrap();
    engine.approve_trade(id).unwrap();
    engine.place_trade_order(id).unwrap();
    engine.record_trade_fill(id, 0, Lots::new(10)).unwrap();

    let mut board = RealtimeReconciler::new(ViewScope::ActiveBoard);
    let mut queue = RealtimeReconciler::new(ViewScope::CloseRequestQueue);

    let push = |engine: &Engine, board: &mut RealtimeReconciler, queue: &mut RealtimeReconciler| {
        let update = PushUpdate::TradeUpdate(engine.get_trade(id).unwrap().clone());
        board.apply_update(update.clone());
        queue.apply_update(update);
    };

    push(&engine, &mut board, &mut queue);
    println!(
        "  Filled trade pushed: board {} / queue {}",
        board.trades().len(),
        queue.trades().len()
    );

    engine.request_close(PositionRef::Trade { id }).unwrap();
    push(&engine, &mut board, &mut queue);
    println!("  Close requested: board {} / queue {}", board.trades().len(), queue.trades().len());

    engine.accept_close(PositionRef::Trade { id }).unwrap();
    push(&engine, &mut board, &mut queue);
    println!("  Close accepted: board {} / queue {}", board.trades().len(), queue.trades().len());

    println!("  Events generated: {}", engine.events().len());
}
