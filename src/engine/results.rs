// 10.0.2: result views for engine operations.

use crate::position::TradeStatus;
use crate::types::{ExitId, Lots, Money, Price};

/// Aggregate view of a source's ledger after a mutation. For a spread this is
/// the flattened view across all legs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub total_lots: Lots,
    pub total_fills: Lots,
    pub average_price: Price,
    pub status: TradeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitSettlement {
    pub exit_id: ExitId,
    pub settlement_price: Price,
    pub entry_average_price: Price,
    pub received_lots: Lots,
    pub profit_loss: Money,
}
