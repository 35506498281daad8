#![allow(clippy::upper_case_acronyms)]

//! Parser for CTL property files.
//!
//! A property file holds one formula per line; blank lines and lines
//! starting with `#` are skipped.

use crate::ast::{Ctl, Path};
use crate::enf;
use pest_consume::{Error, Parser, match_nodes};
use rsmcheck_ir::{FormulaIdx, FormulaStore};
use rsmcheck_utils::{self, Id, RsmResult};
use std::fs;

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("ctl.pest");

#[derive(Parser)]
#[grammar = "ctl.pest"]
pub struct CtlParser;

impl CtlParser {
    /// Parse a property file and lower every formula into `store`.
    pub fn parse_file(
        path: &std::path::Path,
        store: &mut FormulaStore,
    ) -> RsmResult<Vec<FormulaIdx>> {
        let content = fs::read_to_string(path).map_err(|err| {
            rsmcheck_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let mut formulas = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            formulas.push(Self::parse_and_lower(line, store)?);
        }
        Ok(formulas)
    }

    /// Parse a single formula and lower it to existential normal form.
    pub fn parse_and_lower(
        line: &str,
        store: &mut FormulaStore,
    ) -> RsmResult<FormulaIdx> {
        Ok(enf::lower(&Self::parse_formula(line)?, store))
    }

    /// Parse a single formula into its surface AST.
    pub fn parse_formula(line: &str) -> RsmResult<Ctl> {
        let inputs = CtlParser::parse(Rule::line, line).map_err(|e| {
            rsmcheck_utils::Error::parse_error(format!(
                "Failed to parse `{line}': {e}"
            ))
        })?;
        let input = inputs.single().map_err(|e| {
            rsmcheck_utils::Error::parse_error(format!(
                "Failed to parse `{line}': {e}"
            ))
        })?;
        CtlParser::line(input).map_err(|e| {
            rsmcheck_utils::Error::parse_error(format!(
                "Failed to parse `{line}': {e}"
            ))
        })
    }
}

#[pest_consume::parser]
impl CtlParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn ident(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn bool_true(_input: Node) -> ParseResult<Ctl> {
        Ok(Ctl::Bool(true))
    }

    fn bool_false(_input: Node) -> ParseResult<Ctl> {
        Ok(Ctl::Bool(false))
    }

    fn primary(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [bool_true(b)] => b,
            [bool_false(b)] => b,
            [ident(p)] => Ctl::Atom(p),
            [formula(f)] => f,
        ))
    }

    fn not_expr(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [unary(f)] => Ctl::Not(Box::new(f)),
        ))
    }

    fn exists_expr(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [path_formula(p)] => Ctl::Exists(Box::new(p)),
        ))
    }

    fn forall_expr(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [path_formula(p)] => Ctl::Forall(Box::new(p)),
        ))
    }

    fn path_formula(input: Node) -> ParseResult<Path> {
        Ok(match_nodes!(input.into_children();
            [next_path(p)] => p,
            [globally_path(p)] => p,
            [finally_path(p)] => p,
            [until_path(p)] => p,
        ))
    }

    fn next_path(input: Node) -> ParseResult<Path> {
        Ok(match_nodes!(input.into_children();
            [unary(f)] => Path::Next(f),
        ))
    }

    fn globally_path(input: Node) -> ParseResult<Path> {
        Ok(match_nodes!(input.into_children();
            [unary(f)] => Path::Globally(f),
        ))
    }

    fn finally_path(input: Node) -> ParseResult<Path> {
        Ok(match_nodes!(input.into_children();
            [unary(f)] => Path::Finally(f),
        ))
    }

    fn until_path(input: Node) -> ParseResult<Path> {
        Ok(match_nodes!(input.into_children();
            [formula(a), formula(b)] => Path::Until(a, b),
        ))
    }

    fn unary(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [not_expr(f)] => f,
            [exists_expr(f)] => f,
            [forall_expr(f)] => f,
            [primary(f)] => f,
        ))
    }

    fn and_expr(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [unary(operands)..] => {
                let mut operands = operands;
                let first = operands.next().expect("and_expr has an operand");
                operands.fold(first, |acc, f| {
                    Ctl::And(Box::new(acc), Box::new(f))
                })
            },
        ))
    }

    fn or_expr(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [and_expr(operands)..] => {
                let mut operands = operands;
                let first = operands.next().expect("or_expr has an operand");
                operands.fold(first, |acc, f| {
                    Ctl::Or(Box::new(acc), Box::new(f))
                })
            },
        ))
    }

    fn formula(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [or_expr(f)] => f,
        ))
    }

    fn line(input: Node) -> ParseResult<Ctl> {
        Ok(match_nodes!(input.into_children();
            [formula(f), EOI(_)] => f,
        ))
    }
}
