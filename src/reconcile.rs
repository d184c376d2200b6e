// 8.0: folds server-pushed snapshots into local view collections. the server is
// the sole writer of truth and pushes whole entities, so reconciliation is
// last-writer-wins BY ARRIVAL ORDER: replace wholesale, prepend when new,
// remove when the entity no longer belongs in the view. never merges
// field-by-field; an optimistic local edit not yet echoed by the server is
// overwritten, which is acceptable at sub-second push latency.
//
// delivery is assumed ordered and at-least-once; redelivery of the same
// snapshot is harmless (replace with itself) and reordering is the transport's
// contract to prevent, not ours.

use crate::exit::ExitRequest;
use crate::position::PositionAccount;
use crate::spread::SpreadAccount;
use serde::{Deserialize, Serialize};

/// One inbound push message, already decoded by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushUpdate {
    TradeUpdate(PositionAccount),
    SpreadUpdate(SpreadAccount),
    ExitUpdate(ExitRequest),
}

/// Which queue this reconciler maintains. Scope decides whether a pushed entity
/// belongs in the collection at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewScope {
    /// the working board: everything still alive; drops entities once their
    /// close is accepted
    ActiveBoard,
    /// the manager's close queue: only entities with a requested but not yet
    /// accepted close
    CloseRequestQueue,
}

impl ViewScope {
    fn retains(&self, is_closed: bool, close_accepted: bool) -> bool {
        match self {
            ViewScope::ActiveBoard => !close_accepted,
            ViewScope::CloseRequestQueue => is_closed && !close_accepted,
        }
    }
}

/// In-memory view collections fed exclusively by `apply_update`. Newest entries
/// sit at the front, matching how the queues are displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeReconciler {
    scope: ViewScope,
    trades: Vec<PositionAccount>,
    spreads: Vec<SpreadAccount>,
    exits: Vec<ExitRequest>,
}

impl RealtimeReconciler {
    pub fn new(scope: ViewScope) -> Self {
        Self {
            scope,
            trades: Vec::new(),
            spreads: Vec::new(),
            exits: Vec::new(),
        }
    }

    pub fn scope(&self) -> ViewScope {
        self.scope
    }

    pub fn trades(&self) -> &[PositionAccount] {
        &self.trades
    }

    pub fn spreads(&self) -> &[SpreadAccount] {
        &self.spreads
    }

    pub fn exits(&self) -> &[ExitRequest] {
        &self.exits
    }

    /// Load the initial fetch result, filtered to this view's scope.
    pub fn seed_trades(&mut self, trades: Vec<PositionAccount>) {
        let scope = self.scope;
        self.trades = trades
            .into_iter()
            .filter(|t| scope.retains(t.is_closed, t.close_accepted))
            .collect();
    }

    pub fn seed_spreads(&mut self, spreads: Vec<SpreadAccount>) {
        let scope = self.scope;
        self.spreads = spreads
            .into_iter()
            .filter(|s| scope.retains(s.is_closed, s.close_accepted))
            .collect();
    }

    pub fn seed_exits(&mut self, exits: Vec<ExitRequest>) {
        self.exits = exits;
    }

    /// The single entry point for externally-sourced truth. Applied strictly in
    /// arrival order.
    pub fn apply_update(&mut self, update: PushUpdate) {
        match update {
            PushUpdate::TradeUpdate(trade) => self.apply_trade(trade),
            PushUpdate::SpreadUpdate(spread) => self.apply_spread(spread),
            PushUpdate::ExitUpdate(exit) => self.apply_exit(exit),
        }
    }

    fn apply_trade(&mut self, trade: PositionAccount) {
        let retain = self.scope.retains(trade.is_closed, trade.close_accepted);
        let existing = self.trades.iter().position(|t| t.id == trade.id);
        match (existing, retain) {
            (Some(i), true) => self.trades[i] = trade,
            (Some(i), false) => {
                self.trades.remove(i);
            }
            (None, true) => self.trades.insert(0, trade),
            (None, false) => {}
        }
    }

    fn apply_spread(&mut self, spread: SpreadAccount) {
        let retain = self.scope.retains(spread.is_closed, spread.close_accepted);
        let existing = self.spreads.iter().position(|s| s.id == spread.id);
        match (existing, retain) {
            (Some(i), true) => self.spreads[i] = spread,
            (Some(i), false) => {
                self.spreads.remove(i);
            }
            (None, true) => self.spreads.insert(0, spread),
            (None, false) => {}
        }
    }

    // exits are history: every status (including terminal) stays listed
    fn apply_exit(&mut self, exit: ExitRequest) {
        match self.exits.iter().position(|e| e.id == exit.id) {
            Some(i) => self.exits[i] = exit,
            None => self.exits.insert(0, exit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LotEntry;
    use crate::position::TradeStatus;
    use crate::types::{Lots, Price, Side, Timestamp, TradeId};
    use rust_decimal_macros::dec;

    fn trade(id: u64) -> PositionAccount {
        PositionAccount::new(
            TradeId(id),
            format!("contract-{id}"),
            Side::Long,
            vec![LotEntry::new(
                Lots::new(10),
                Price::new_unchecked(dec!(100)),
                Timestamp::from_millis(0),
            )],
            Timestamp::from_millis(0),
        )
        .unwrap()
    }

    #[test]
    fn new_trade_is_prepended() {
        let mut view = RealtimeReconciler::new(ViewScope::ActiveBoard);
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));
        view.apply_update(PushUpdate::TradeUpdate(trade(2)));

        let ids: Vec<u64> = view.trades().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn existing_trade_replaced_wholesale_in_place() {
        let mut view = RealtimeReconciler::new(ViewScope::ActiveBoard);
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));
        view.apply_update(PushUpdate::TradeUpdate(trade(2)));

        let mut updated = trade(1);
        updated.status = TradeStatus::Approved;
        updated.approved_at = Some(Timestamp::from_millis(50));
        view.apply_update(PushUpdate::TradeUpdate(updated.clone()));

        // position in the list is stable, content is the payload verbatim
        assert_eq!(view.trades()[1], updated);
        assert_eq!(view.trades().len(), 2);
    }

    #[test]
    fn arrival_order_wins_over_any_local_state() {
        let mut view = RealtimeReconciler::new(ViewScope::ActiveBoard);

        let mut newer = trade(1);
        newer.status = TradeStatus::OrderPlaced;
        view.apply_update(PushUpdate::TradeUpdate(newer));

        // a later arrival with an "older looking" payload still wins
        let older = trade(1);
        view.apply_update(PushUpdate::TradeUpdate(older.clone()));
        assert_eq!(view.trades()[0], older);
    }

    #[test]
    fn accepted_close_removed_from_active_board() {
        let mut view = RealtimeReconciler::new(ViewScope::ActiveBoard);
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));

        let mut closed = trade(1);
        closed.is_closed = true;
        closed.close_accepted = true;
        closed.status = TradeStatus::Closed;
        view.apply_update(PushUpdate::TradeUpdate(closed));

        assert!(view.trades().is_empty());
    }

    #[test]
    fn close_queue_lists_only_pending_closes() {
        let mut view = RealtimeReconciler::new(ViewScope::CloseRequestQueue);

        // not requested yet: ignored
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));
        assert!(view.trades().is_empty());

        // requested: listed
        let mut requested = trade(1);
        requested.is_closed = true;
        view.apply_update(PushUpdate::TradeUpdate(requested));
        assert_eq!(view.trades().len(), 1);

        // accepted: removed
        let mut accepted = trade(1);
        accepted.is_closed = true;
        accepted.close_accepted = true;
        view.apply_update(PushUpdate::TradeUpdate(accepted));
        assert!(view.trades().is_empty());
    }

    #[test]
    fn seed_filters_by_scope() {
        let mut queue = RealtimeReconciler::new(ViewScope::CloseRequestQueue);
        let mut requested = trade(2);
        requested.is_closed = true;
        queue.seed_trades(vec![trade(1), requested]);

        assert_eq!(queue.trades().len(), 1);
        assert_eq!(queue.trades()[0].id, TradeId(2));
    }

    #[test]
    fn redelivery_is_harmless() {
        let mut view = RealtimeReconciler::new(ViewScope::ActiveBoard);
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));
        view.apply_update(PushUpdate::TradeUpdate(trade(1)));

        assert_eq!(view.trades().len(), 1);
    }

    #[test]
    fn push_update_decodes_from_tagged_json() {
        let json = serde_json::to_string(&PushUpdate::TradeUpdate(trade(9))).unwrap();
        assert!(json.contains("\"kind\":\"trade_update\""));

        let decoded: PushUpdate = serde_json::from_str(&json).unwrap();
        match decoded {
            PushUpdate::TradeUpdate(t) => assert_eq!(t.id, TradeId(9)),
            _ => panic!("wrong kind"),
        }
    }
}
