//! Configuration for a single check run.

use argh::FromArgValue;

/// How the checker explores the machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Unpack every box whose referenced component is missing information
    /// until the formula is decided in every node.
    Exhaustive,
    /// Deduce everything deducible, then unpack only what the expansion
    /// heuristic selects, until the initial node is decided.
    #[default]
    Lazy,
}

/// Which boxes the lazy driver unpacks when deduction gets stuck.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpansionHeuristic {
    /// Walk the request tree from the initial node and unpack the single
    /// box it surfaces. Also enables cycle detection through double
    /// requests.
    #[default]
    GetNext,
    /// Pick one contextualisable box uniformly at random.
    Random,
    /// Contextualise every contextualisable box.
    All,
}

impl FromArgValue for ExpansionHeuristic {
    fn from_arg_value(value: &str) -> Result<Self, String> {
        match value.to_lowercase().as_str() {
            "getnext" => Ok(ExpansionHeuristic::GetNext),
            "random" => Ok(ExpansionHeuristic::Random),
            "all" => Ok(ExpansionHeuristic::All),
            _ => Err(format!(
                "Invalid expansion heuristic: '{value}'. Expected 'getnext', \
                 'random', or 'all'."
            )),
        }
    }
}

/// Options controlling one check run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckConfig {
    pub strategy: Strategy,
    pub heuristic: ExpansionHeuristic,
    /// Randomize operand and successor orders inside the GetNext search.
    pub randomize: bool,
}
