//! In-memory representation of recursive state machines and CTL formulas.
//!
//! Base components, nodes, boxes and contextualised components live in
//! index-keyed arenas owned by the [`Machine`]; every cross-reference is an
//! integer index, which avoids ownership cycles between components, boxes
//! and the contextualised components their boxes map to.

mod context;
mod formula;
pub mod idx;
mod machine;
mod structure;

pub use context::{Context, Instance};
pub use formula::{Formula, FormulaDisplay, FormulaIdx, FormulaStore};
pub use machine::Machine;
pub use structure::{
    BaseComponent, BoxDef, BoxIdx, ComponentIdx, InstanceIdx, NodeIdx,
    NodeInfo, NodeKind, PortRole,
};
