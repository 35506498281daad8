//! Reduction of surface CTL to existential normal form.
//!
//! The evaluators only understand `~`, `|`, `E X`, `E G` and `E (U)`, so
//! everything else is rewritten here using the standard dualities:
//!
//! - `a & b`      becomes `~(~a | ~b)`
//! - `E F p`      becomes `E (true U p)`
//! - `A X p`      becomes `~E X ~p`
//! - `A G p`      becomes `~E (true U ~p)`
//! - `A F p`      becomes `~E G ~p`
//! - `A (p U q)`  becomes `~(E (~q U ~(p | q)) | E G ~q)`

use crate::ast::{Ctl, Path};
use rsmcheck_ir::{Formula, FormulaIdx, FormulaStore};

/// Lower a parsed formula into `store`, returning the interned root.
pub fn lower(formula: &Ctl, store: &mut FormulaStore) -> FormulaIdx {
    match formula {
        Ctl::Bool(b) => store.intern(Formula::Bool(*b)),
        Ctl::Atom(p) => store.intern(Formula::Atom(*p)),
        Ctl::Not(x) => {
            let x = lower(x, store);
            neg(x, store)
        }
        Ctl::Or(a, b) => {
            let a = lower(a, store);
            let b = lower(b, store);
            store.intern(Formula::Or(a, b))
        }
        Ctl::And(a, b) => {
            let a = lower(a, store);
            let b = lower(b, store);
            let na = neg(a, store);
            let nb = neg(b, store);
            let or = store.intern(Formula::Or(na, nb));
            neg(or, store)
        }
        Ctl::Exists(path) => match &**path {
            Path::Next(x) => {
                let x = lower(x, store);
                store.intern(Formula::ExistsNext(x))
            }
            Path::Globally(x) => {
                let x = lower(x, store);
                store.intern(Formula::ExistsGlobally(x))
            }
            Path::Finally(x) => {
                let t = store.intern(Formula::Bool(true));
                let x = lower(x, store);
                store.intern(Formula::ExistsUntil(t, x))
            }
            Path::Until(a, b) => {
                let a = lower(a, store);
                let b = lower(b, store);
                store.intern(Formula::ExistsUntil(a, b))
            }
        },
        Ctl::Forall(path) => match &**path {
            // A X p = ~E X ~p
            Path::Next(x) => {
                let x = lower(x, store);
                let nx = neg(x, store);
                let ex = store.intern(Formula::ExistsNext(nx));
                neg(ex, store)
            }
            // A G p = ~E F ~p = ~E (true U ~p)
            Path::Globally(x) => {
                let t = store.intern(Formula::Bool(true));
                let x = lower(x, store);
                let nx = neg(x, store);
                let eu = store.intern(Formula::ExistsUntil(t, nx));
                neg(eu, store)
            }
            // A F p = ~E G ~p
            Path::Finally(x) => {
                let x = lower(x, store);
                let nx = neg(x, store);
                let eg = store.intern(Formula::ExistsGlobally(nx));
                neg(eg, store)
            }
            // A (p U q) = ~(E (~q U ~(p | q)) | E G ~q)
            Path::Until(a, b) => {
                let a = lower(a, store);
                let b = lower(b, store);
                let nb = neg(b, store);
                let or_ab = store.intern(Formula::Or(a, b));
                let n_or = neg(or_ab, store);
                let eu = store.intern(Formula::ExistsUntil(nb, n_or));
                let eg = store.intern(Formula::ExistsGlobally(nb));
                let or = store.intern(Formula::Or(eu, eg));
                neg(or, store)
            }
        },
    }
}

/// Negate a formula, cancelling double negation instead of stacking it.
fn neg(formula: FormulaIdx, store: &mut FormulaStore) -> FormulaIdx {
    if let Formula::Not(inner) = store.get(formula) {
        *inner
    } else {
        store.intern(Formula::Not(formula))
    }
}
