//! Interned names.

use std::fmt;

/// The name of a component, node, box or atomic proposition.
///
/// Names are interned as global symbols: machine construction resolves
/// transition endpoints and box selections by name, and label lookups
/// compare atom names against node label sets on every local evaluation,
/// so copies must be cheap and equality a symbol comparison. The backing
/// strings live for the whole process, which suits names that are parsed
/// once and referenced until exit.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub struct Id(symbol_table::GlobalSymbol);

impl Id {
    pub fn new<S: ToString>(name: S) -> Self {
        Id(symbol_table::GlobalSymbol::from(name.to_string()))
    }

    /// The interned text. Orderings over names (sorting exit nodes for a
    /// context encoding) must go through this: symbol order reflects
    /// interning order, not the text.
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A trait for entities that carry a name.
pub trait GetName {
    /// Return the entity's name.
    fn name(&self) -> Id;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = Id::new("p0");
        let b = Id::new(String::from("p0"));
        assert_eq!(a, b);
        assert_ne!(a, Id::new("p1"));
        assert_eq!(a.as_str(), "p0");
        assert_eq!(a.to_string(), "p0");
    }
}
