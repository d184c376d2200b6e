// lots-core: commodity position ledger and fill/exit reconciliation engine.
// fills-first architecture: what was actually executed takes priority over
// what was ordered. all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: TradeId, SpreadId, Lots, Price, Money, Side
//   2.x  errors.rs: validation, transition, allocation and lookup failures
//   3.x  ledger.rs: append-only lot ledger, weighted average, fill tracking
//   4.x  position.rs: standalone trade account + approval workflow
//   5.x  spread.rs: multi-leg spreads, manager gates, aggregate projections
//   6.x  exit.rs: exit requests, allocation matcher, settlement P/L
//   7.x  config.rs: structural limits and event log settings
//   8.x  reconcile.rs: server-push reconciliation into view collections
//   9.x  events.rs: state transition events for audit
//   10.x engine/: engine core: intake, workflow, fills, exits

// core ledger modules
pub mod engine;
pub mod errors;
pub mod events;
pub mod exit;
pub mod ledger;
pub mod position;
pub mod spread;
pub mod types;

// integration modules
pub mod config;
pub mod reconcile;

// re exports for convenience
pub use config::EngineConfig;
pub use engine::*;
pub use errors::*;
pub use events::*;
pub use exit::*;
pub use ledger::*;
pub use position::*;
pub use reconcile::*;
pub use spread::*;
pub use types::*;
