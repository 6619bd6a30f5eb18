//! Settlement engine: periodic batch conversion of fulfilled sales into
//! vendor earnings

mod engine;

pub use engine::{SettlementEngine, SettlementError, SettlementFailure, SettlementReport};
