// 10.0: the ledger engine. coordinates trade and spread intake, approval
// workflow, fill recording, exit allocation and settlement.
// deterministic and event-driven with no external I/O.

mod core;
mod exits;
mod fills;
mod results;

pub use core::Engine;
pub use results::{ExitSettlement, LedgerSnapshot};
