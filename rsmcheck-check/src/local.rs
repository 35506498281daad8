//! Per-node evaluation of propositional formulas.

use rsmcheck_ir::{Formula, FormulaIdx, FormulaStore, InstanceIdx, Machine, NodeIdx};

/// Deduce a propositional formula at one node from the values already
/// recorded there. Conjunction and disjunction short-circuit on a decisive
/// operand; otherwise they need all operands decided.
///
/// Returns whether the formula is decided at the node after the call (a
/// `false` result counts as decided).
///
/// Panics when handed a temporal operator; those go through the existential
/// evaluator.
pub fn check_locally(
    machine: &mut Machine,
    instance: InstanceIdx,
    node: NodeIdx,
    formula: FormulaIdx,
    store: &FormulaStore,
) -> bool {
    let value = match *store.get(formula) {
        Formula::Bool(b) => Some(b),
        Formula::Atom(p) => Some(machine.has_label(node, p)),
        Formula::Not(x) => {
            machine.instance(instance).truth(node, x).map(|v| !v)
        }
        Formula::And(a, b) => {
            let va = machine.instance(instance).truth(node, a);
            let vb = machine.instance(instance).truth(node, b);
            if va == Some(false) || vb == Some(false) {
                Some(false)
            } else if va.is_some() && vb.is_some() {
                Some(true)
            } else {
                None
            }
        }
        Formula::Or(a, b) => {
            let va = machine.instance(instance).truth(node, a);
            let vb = machine.instance(instance).truth(node, b);
            if va == Some(true) || vb == Some(true) {
                Some(true)
            } else if va.is_some() && vb.is_some() {
                Some(false)
            } else {
                None
            }
        }
        Formula::ExistsNext(_)
        | Formula::ExistsGlobally(_)
        | Formula::ExistsUntil(..) => {
            panic!("can't check temporal operators locally")
        }
    };
    if let Some(value) = value {
        machine.instance_mut(instance).decide(node, formula, value);
    }
    machine.instance(instance).knows(node, formula)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsmcheck_utils::Id;

    fn machine_with_labels(labels: &[&str]) -> (Machine, NodeIdx) {
        let mut machine = Machine::new();
        let c = machine.add_component(Id::new("C")).unwrap();
        let n = machine
            .add_node(
                c,
                Id::new("n"),
                labels.iter().map(Id::new),
                true,
                false,
            )
            .unwrap();
        machine.set_initial(c, n);
        machine.instantiate().unwrap();
        (machine, n)
    }

    #[test]
    fn atoms_and_booleans_always_decide() {
        let (mut machine, n) = machine_with_labels(&["a"]);
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let b = store.intern(Formula::Atom(Id::new("b")));
        let t = store.intern(Formula::Bool(true));
        let ci = machine.initial_instance();

        assert!(check_locally(&mut machine, ci, n, a, &store));
        assert!(check_locally(&mut machine, ci, n, b, &store));
        assert!(check_locally(&mut machine, ci, n, t, &store));
        assert_eq!(machine.instance(ci).truth(n, a), Some(true));
        assert_eq!(machine.instance(ci).truth(n, b), Some(false));
        assert_eq!(machine.instance(ci).truth(n, t), Some(true));
    }

    #[test]
    fn connectives_match_classical_semantics() {
        let (mut machine, n) = machine_with_labels(&["a"]);
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let b = store.intern(Formula::Atom(Id::new("b")));
        let not_a = store.intern(Formula::Not(a));
        let a_or_b = store.intern(Formula::Or(a, b));
        let a_and_b = store.intern(Formula::And(a, b));
        let ci = machine.initial_instance();

        check_locally(&mut machine, ci, n, a, &store);
        check_locally(&mut machine, ci, n, b, &store);
        assert!(check_locally(&mut machine, ci, n, not_a, &store));
        assert!(check_locally(&mut machine, ci, n, a_or_b, &store));
        assert!(check_locally(&mut machine, ci, n, a_and_b, &store));
        assert_eq!(machine.instance(ci).truth(n, not_a), Some(false));
        assert_eq!(machine.instance(ci).truth(n, a_or_b), Some(true));
        assert_eq!(machine.instance(ci).truth(n, a_and_b), Some(false));
    }

    #[test]
    fn connectives_short_circuit_on_decisive_operands() {
        let (mut machine, n) = machine_with_labels(&["a"]);
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let eg = store.intern(Formula::ExistsGlobally(a));
        let or = store.intern(Formula::Or(a, eg));
        let and = store.intern(Formula::And(a, eg));
        let not_eg = store.intern(Formula::Not(eg));
        let ci = machine.initial_instance();

        check_locally(&mut machine, ci, n, a, &store);
        // `a | E G a` decides from `a` alone, `a & E G a` cannot
        assert!(check_locally(&mut machine, ci, n, or, &store));
        assert_eq!(machine.instance(ci).truth(n, or), Some(true));
        assert!(!check_locally(&mut machine, ci, n, and, &store));
        assert!(!check_locally(&mut machine, ci, n, not_eg, &store));
    }
}
