// 2.0: typed failures for every engine operation. four recoverable kinds:
//   ValidationError       - malformed or out-of-range input
//   InvalidTransitionError- operation attempted from a state that forbids it
//   InsufficientLotsError - exit/fill request exceeds what is available
//   NotFoundError         - referenced entity id unknown (stale local view)
// no operation mutates state before its checks pass, so a returned error always
// means "nothing happened".

use crate::types::{ExitId, Lots, SpreadId, TradeId};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("tranche {index}: lots must be a positive integer")]
    ZeroLots { index: usize },

    #[error("tranche {index}: price must be positive, got {price}")]
    NonPositivePrice { index: usize, price: Decimal },

    #[error("tranche {index}: fills_received {fills} exceeds ordered lots {lots}")]
    FillsExceedLots { index: usize, fills: Lots, lots: Lots },

    #[error("fill count cannot decrease: current {current}, requested {requested}")]
    FillsDecreased { current: Lots, requested: Lots },

    #[error("fill count {requested} exceeds ordered lots {ordered}")]
    FillsExceedOrdered { requested: Lots, ordered: Lots },

    #[error("tranche index {index} out of range, ledger has {len} tranches")]
    TrancheOutOfRange { index: usize, len: usize },

    #[error("ledger holds {len} tranches, limit is {max}")]
    TooManyTranches { len: usize, max: usize },

    #[error("ledger would hold {total} lots, limit is {max}")]
    TooManyLots { total: u64, max: u32 },

    #[error("requested exit lots must be positive")]
    ZeroExitLots,

    #[error("received lots {received} exceed requested exit lots {requested}")]
    ReceivedExceedRequested { received: Lots, requested: Lots },

    #[error("fly spread requires exactly 2 legs, got {got}")]
    FlyLegCount { got: usize },

    #[error("custom spread requires at least 3 legs, got {got}")]
    CustomLegCount { got: usize },

    #[error("spread has {got} legs, limit is {max}")]
    TooManyLegs { got: usize, max: usize },

    #[error("ratio must be positive, got {ratio}")]
    NonPositiveRatio { ratio: Decimal },

    #[error("exit batch is empty")]
    EmptyExitBatch,

    #[error("exit batch has {got} requests, limit is {max}")]
    ExitBatchTooLarge { got: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{operation}' is not permitted from status '{from}'")]
pub struct InvalidTransitionError {
    pub operation: &'static str,
    pub from: String,
}

impl InvalidTransitionError {
    pub fn new(operation: &'static str, from: impl ToString) -> Self {
        Self {
            operation,
            from: from.to_string(),
        }
    }
}

// carries the computed availability so the caller can surface it verbatim
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("requested {requested} lots but only {available} filled lots are available")]
pub struct InsufficientLotsError {
    pub requested: Lots,
    pub available: Lots,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("trade {0:?} not found")]
    Trade(TradeId),

    #[error("spread {0:?} not found")]
    Spread(SpreadId),

    #[error("leg {leg:?} does not belong to spread {spread:?}")]
    Leg { spread: SpreadId, leg: TradeId },

    #[error("exit request {0:?} not found")]
    Exit(ExitId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] InvalidTransitionError),

    #[error("insufficient lots: {0}")]
    InsufficientLots(#[from] InsufficientLotsError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),
}
