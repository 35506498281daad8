//! Parsers for the two input formats: CTL property files and the JSON
//! machine description. Parsed formulas are lowered to existential normal
//! form into the shared formula store; machine descriptions are validated
//! and built into a [`rsmcheck_ir::Machine`].

pub mod ast;
mod enf;
mod parser;
mod rsm;

pub use enf::lower;
pub use parser::CtlParser;
pub use rsm::{parse_rsm, parse_rsm_str};
