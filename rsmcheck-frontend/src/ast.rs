//! AST for CTL formulas as written in the input syntax, before the
//! reduction to existential normal form.

use rsmcheck_utils::Id;

/// A state formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctl {
    Bool(bool),
    Atom(Id),
    Not(Box<Ctl>),
    And(Box<Ctl>, Box<Ctl>),
    Or(Box<Ctl>, Box<Ctl>),
    Exists(Box<Path>),
    Forall(Box<Path>),
}

/// A path formula under a quantifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Path {
    Next(Ctl),
    Globally(Ctl),
    Finally(Ctl),
    Until(Ctl, Ctl),
}
