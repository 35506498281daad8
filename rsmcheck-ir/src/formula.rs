//! Interned CTL formulas in existential normal form.
//!
//! Formulas are hash-consed: structurally identical subformulas share one
//! index, so interpretation maps and contexts can key on [`FormulaIdx`]
//! rather than comparing formula trees.

use ahash::{HashMap, HashMapExt};
use rsmcheck_utils::Id;
use std::fmt;

use crate::idx::{IndexRef, IndexedMap};

/// The identifier of an interned formula.
#[derive(Debug, Eq, Copy, Clone, PartialEq, Hash, PartialOrd, Ord)]
pub struct FormulaIdx(u32);
crate::impl_index!(FormulaIdx);

/// A CTL state formula in existential normal form.
///
/// The frontend lowers universal quantifiers, `F`, and (normally) `&` away;
/// `And` is still represented so the evaluators accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formula {
    Bool(bool),
    Atom(Id),
    Not(FormulaIdx),
    And(FormulaIdx, FormulaIdx),
    Or(FormulaIdx, FormulaIdx),
    /// `E X φ`
    ExistsNext(FormulaIdx),
    /// `E G φ`
    ExistsGlobally(FormulaIdx),
    /// `E (φ U ψ)`
    ExistsUntil(FormulaIdx, FormulaIdx),
}

impl Formula {
    pub fn is_existential(&self) -> bool {
        matches!(
            self,
            Formula::ExistsNext(_)
                | Formula::ExistsGlobally(_)
                | Formula::ExistsUntil(..)
        )
    }

    /// The immediate state subformulas. For the existential operators these
    /// are the operands of the path formula under the quantifier.
    fn children(&self) -> Vec<FormulaIdx> {
        match *self {
            Formula::Bool(_) | Formula::Atom(_) => vec![],
            Formula::Not(x)
            | Formula::ExistsNext(x)
            | Formula::ExistsGlobally(x) => vec![x],
            Formula::And(a, b)
            | Formula::Or(a, b)
            | Formula::ExistsUntil(a, b) => vec![a, b],
        }
    }
}

/// Arena of hash-consed formulas.
#[derive(Debug, Clone, Default)]
pub struct FormulaStore {
    table: IndexedMap<FormulaIdx, Formula>,
    depths: Vec<usize>,
    dedup: HashMap<Formula, FormulaIdx>,
}

impl FormulaStore {
    pub fn new() -> Self {
        Self {
            table: IndexedMap::new(),
            depths: Vec::new(),
            dedup: HashMap::new(),
        }
    }

    /// Intern a formula. Its operands must already be interned in this store.
    pub fn intern(&mut self, formula: Formula) -> FormulaIdx {
        if let Some(&idx) = self.dedup.get(&formula) {
            return idx;
        }
        let depth = formula
            .children()
            .into_iter()
            .map(|c| self.depth(c) + 1)
            .max()
            .unwrap_or(0);
        let idx = self.table.push(formula);
        self.depths.push(depth);
        self.dedup.insert(formula, idx);
        idx
    }

    pub fn get(&self, idx: FormulaIdx) -> &Formula {
        &self.table[idx]
    }

    /// Quantifier depth: atoms sit at 0, every other formula one above its
    /// deepest operand.
    pub fn depth(&self, idx: FormulaIdx) -> usize {
        self.depths[idx.index()]
    }

    pub fn is_existential(&self, idx: FormulaIdx) -> bool {
        self.get(idx).is_existential()
    }

    /// All state subformulas reachable from `root` (inclusive), grouped by
    /// quantifier depth in increasing order. Each group is sorted by index so
    /// iteration is deterministic.
    pub fn layers(&self, root: FormulaIdx) -> Vec<Vec<FormulaIdx>> {
        let mut seen = vec![];
        let mut stack = vec![root];
        while let Some(f) = stack.pop() {
            if seen.contains(&f) {
                continue;
            }
            seen.push(f);
            stack.extend(self.get(f).children());
        }
        let max_depth = seen.iter().map(|&f| self.depth(f)).max().unwrap_or(0);
        let mut layers = vec![vec![]; max_depth + 1];
        for f in seen {
            layers[self.depth(f)].push(f);
        }
        for layer in &mut layers {
            layer.sort();
        }
        layers
    }

    /// All state subformulas reachable from `root`, inclusive, in increasing
    /// depth order.
    pub fn subformulas(&self, root: FormulaIdx) -> Vec<FormulaIdx> {
        self.layers(root).into_iter().flatten().collect()
    }

    pub fn display(&self, idx: FormulaIdx) -> FormulaDisplay<'_> {
        FormulaDisplay { store: self, idx }
    }

    /// The formula's text with all whitespace stripped, as used in context
    /// encodings.
    pub fn compact_text(&self, idx: FormulaIdx) -> String {
        self.display(idx).to_string().replace(' ', "")
    }

    fn fmt_formula(
        &self,
        idx: FormulaIdx,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match *self.get(idx) {
            Formula::Bool(true) => write!(f, "true"),
            Formula::Bool(false) => write!(f, "false"),
            Formula::Atom(p) => write!(f, "{p}"),
            Formula::Not(x) => {
                write!(f, "~")?;
                self.fmt_operand(x, f)
            }
            Formula::And(a, b) => {
                self.fmt_operand(a, f)?;
                write!(f, " & ")?;
                self.fmt_operand(b, f)
            }
            Formula::Or(a, b) => {
                self.fmt_operand(a, f)?;
                write!(f, " | ")?;
                self.fmt_operand(b, f)
            }
            Formula::ExistsNext(x) => {
                write!(f, "E X ")?;
                self.fmt_operand(x, f)
            }
            Formula::ExistsGlobally(x) => {
                write!(f, "E G ")?;
                self.fmt_operand(x, f)
            }
            Formula::ExistsUntil(a, b) => {
                write!(f, "E (")?;
                self.fmt_formula(a, f)?;
                write!(f, " U ")?;
                self.fmt_formula(b, f)?;
                write!(f, ")")
            }
        }
    }

    fn fmt_operand(
        &self,
        idx: FormulaIdx,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if matches!(self.get(idx), Formula::And(..) | Formula::Or(..)) {
            write!(f, "(")?;
            self.fmt_formula(idx, f)?;
            write!(f, ")")
        } else {
            self.fmt_formula(idx, f)
        }
    }
}

/// Borrowing [`fmt::Display`] adapter for a formula in a store.
pub struct FormulaDisplay<'a> {
    store: &'a FormulaStore,
    idx: FormulaIdx,
}

impl fmt::Display for FormulaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.store.fmt_formula(self.idx, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(store: &mut FormulaStore, name: &str) -> FormulaIdx {
        store.intern(Formula::Atom(Id::new(name)))
    }

    #[test]
    fn interning_shares_structure() {
        let mut store = FormulaStore::new();
        let a1 = atom(&mut store, "a");
        let a2 = atom(&mut store, "a");
        assert_eq!(a1, a2);

        let ex1 = store.intern(Formula::ExistsNext(a1));
        let ex2 = store.intern(Formula::ExistsNext(a2));
        assert_eq!(ex1, ex2);

        let b = atom(&mut store, "b");
        assert_ne!(a1, b);
    }

    #[test]
    fn depths_count_operators() {
        let mut store = FormulaStore::new();
        let a = atom(&mut store, "a");
        let b = atom(&mut store, "b");
        let until = store.intern(Formula::ExistsUntil(a, b));
        let neg = store.intern(Formula::Not(until));
        assert_eq!(store.depth(a), 0);
        assert_eq!(store.depth(until), 1);
        assert_eq!(store.depth(neg), 2);
    }

    #[test]
    fn layers_are_depth_ordered() {
        let mut store = FormulaStore::new();
        let a = atom(&mut store, "a");
        let b = atom(&mut store, "b");
        let until = store.intern(Formula::ExistsUntil(a, b));
        let or = store.intern(Formula::Or(until, a));

        let layers = store.layers(or);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec![a, b]);
        assert_eq!(layers[1], vec![until]);
        assert_eq!(layers[2], vec![or]);
    }

    #[test]
    fn display_matches_input_syntax() {
        let mut store = FormulaStore::new();
        let a = atom(&mut store, "a");
        let b = atom(&mut store, "b");
        let until = store.intern(Formula::ExistsUntil(a, b));
        assert_eq!(store.display(until).to_string(), "E (a U b)");

        let eg = store.intern(Formula::ExistsGlobally(a));
        assert_eq!(store.display(eg).to_string(), "E G a");
        assert_eq!(store.compact_text(eg), "EGa");

        let or = store.intern(Formula::Or(a, b));
        let neg = store.intern(Formula::Not(or));
        assert_eq!(store.display(neg).to_string(), "~(a | b)");
    }
}
