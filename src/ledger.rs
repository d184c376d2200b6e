// 3.0: the lot ledger. append-only sequence of priced tranches for one position
// or spread leg. separates ORDERED lots from FILLED lots: average price weights
// ordered lots (the cost basis of what was placed), while only filled lots are
// eligible to exit.
// 3.1 has the weighted-average formula, 3.2 the per-tranche fill update.

use crate::errors::ValidationError;
use crate::types::{Lots, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One order/fill tranche: a priced batch of lots that may fill incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotEntry {
    pub lots: Lots,
    pub price: Price,
    /// zero means no stop set
    pub stop_loss: Price,
    /// when the tranche was opened
    pub fired_at: Timestamp,
    /// cumulative filled quantity, never exceeds `lots`
    pub fills_received: Lots,
}

impl LotEntry {
    pub fn new(lots: Lots, price: Price, fired_at: Timestamp) -> Self {
        Self {
            lots,
            price,
            stop_loss: Price::zero(),
            fired_at,
            fills_received: Lots::zero(),
        }
    }

    pub fn with_stop_loss(mut self, stop_loss: Price) -> Self {
        self.stop_loss = stop_loss;
        self
    }

    pub fn with_fills(mut self, fills: Lots) -> Self {
        self.fills_received = fills;
        self
    }

    pub fn is_fully_filled(&self) -> bool {
        self.fills_received == self.lots
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.lots.is_zero() {
            return Err(ValidationError::ZeroLots { index });
        }
        if self.price.value() <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice {
                index,
                price: self.price.value(),
            });
        }
        if self.fills_received > self.lots {
            return Err(ValidationError::FillsExceedLots {
                index,
                fills: self.fills_received,
                lots: self.lots,
            });
        }
        Ok(())
    }
}

/// Ceiling on a ledger's total ordered lots. Keeps every aggregate lot sum,
/// including flattened spread aggregates, well inside `u32` range.
pub const MAX_TOTAL_LOTS: u32 = 10_000_000;

/// Append-only tranche sequence. Insertion order matters for audit/display only;
/// every aggregate is a plain sum and therefore order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotLedger {
    entries: Vec<LotEntry>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_entries(entries: Vec<LotEntry>) -> Result<Self, ValidationError> {
        let mut ledger = Self::new();
        ledger.append_entries(entries)?;
        Ok(ledger)
    }

    pub fn entries(&self) -> &[LotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append new tranches. All-or-nothing: every entry is validated before any
    /// is written, and the first violated constraint is returned. The total
    /// ordered lots are bounded so aggregation can never overflow.
    pub fn append_entries(&mut self, new_entries: Vec<LotEntry>) -> Result<(), ValidationError> {
        let mut total = u64::from(self.total_lots().value());
        for (offset, entry) in new_entries.iter().enumerate() {
            entry.validate(self.entries.len() + offset)?;
            total += u64::from(entry.lots.value());
        }
        if total > u64::from(MAX_TOTAL_LOTS) {
            return Err(ValidationError::TooManyLots {
                total,
                max: MAX_TOTAL_LOTS,
            });
        }
        self.entries.extend(new_entries);
        Ok(())
    }

    pub fn total_lots(&self) -> Lots {
        self.entries.iter().map(|e| e.lots).sum()
    }

    pub fn total_fills(&self) -> Lots {
        self.entries.iter().map(|e| e.fills_received).sum()
    }

    pub fn is_fully_filled(&self) -> bool {
        !self.is_empty() && self.total_fills() == self.total_lots()
    }

    // 3.1: lots-weighted mean over ORDERED lots. a partially filled tranche still
    // counts in full here: the whole order was placed at that price.
    pub fn average_price(&self) -> Price {
        weighted_average_price(&self.entries)
    }

    // 3.2: set the cumulative fill count for one tranche. monotonic and bounded;
    // a failed update leaves the ledger untouched.
    pub fn record_fill(&mut self, tranche: usize, new_fills: Lots) -> Result<(), ValidationError> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(tranche)
            .ok_or(ValidationError::TrancheOutOfRange { index: tranche, len })?;

        if new_fills < entry.fills_received {
            return Err(ValidationError::FillsDecreased {
                current: entry.fills_received,
                requested: new_fills,
            });
        }
        if new_fills > entry.lots {
            return Err(ValidationError::FillsExceedOrdered {
                requested: new_fills,
                ordered: entry.lots,
            });
        }

        entry.fills_received = new_fills;
        Ok(())
    }
}

/// Pure projection used both by `LotLedger::average_price` and by UI-side previews
/// of not-yet-submitted tranche lists. Returns zero for an empty slice instead of
/// dividing by zero.
pub fn weighted_average_price(entries: &[LotEntry]) -> Price {
    let total: Decimal = entries.iter().map(|e| e.lots.as_decimal()).sum();
    if total.is_zero() {
        return Price::zero();
    }
    let weighted: Decimal = entries
        .iter()
        .map(|e| e.lots.as_decimal() * e.price.value())
        .sum();
    Price::new_unchecked(weighted / total)
}
