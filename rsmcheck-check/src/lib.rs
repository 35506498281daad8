//! The checking engine: local and existential evaluators plus the two
//! drivers that decide when to unpack boxes.

mod checker;
mod config;
mod exhaustive;
mod existential;
mod lazy;
mod local;
pub mod logging;

pub use checker::Checker;
pub use config::{CheckConfig, ExpansionHeuristic, Strategy};
pub use existential::check_existential;
pub use local::check_locally;
