//! Fixed-point evaluation of the existential operators over the whole
//! contextualised machine.
//!
//! `EU` and `EG` run two passes per call (see Godefroid-style three-valued
//! model checking): a pessimistic pass whose fixed point yields sound
//! `true` decisions, and an optimistic pass whose complement yields sound
//! `false` decisions. Nodes in between stay unknown until more contexts
//! are built.

use ahash::{HashSet, HashSetExt};
use rsmcheck_ir::{
    Formula, FormulaIdx, FormulaStore, InstanceIdx, Machine, NodeIdx,
};

/// Produce every decision currently derivable for an `EX`, `EU` or `EG`
/// formula. Previously decided values are never changed.
pub fn check_existential(
    machine: &mut Machine,
    store: &FormulaStore,
    formula: FormulaIdx,
) {
    match *store.get(formula) {
        Formula::ExistsNext(sub) => check_next(machine, formula, sub),
        Formula::ExistsUntil(sub1, sub2) => {
            check_until(machine, formula, sub1, sub2)
        }
        Formula::ExistsGlobally(sub) => check_always(machine, formula, sub),
        _ => panic!("existential evaluation requires an EX, EU or EG formula"),
    }
}

/// All (instance, node) pairs of the live machine.
fn all_states(machine: &Machine) -> Vec<(InstanceIdx, NodeIdx)> {
    machine
        .live_instances()
        .iter()
        .flat_map(|&ci| {
            machine
                .component(machine.instance(ci).base)
                .nodes
                .iter()
                .map(move |&n| (ci, n))
        })
        .collect()
}

fn check_next(machine: &mut Machine, formula: FormulaIdx, sub: FormulaIdx) {
    let mut decisions = Vec::new();
    for (ci, node) in all_states(machine) {
        let inst = machine.instance(ci);
        if inst.knows(node, formula) {
            continue;
        }
        // exit nodes can only be deduced via context
        if machine.is_exit(node) {
            if let Some(v) = inst.context.get(node, formula) {
                decisions.push((ci, node, v));
            }
            continue;
        }
        let mut has_unknown = false;
        let mut holds = false;
        for (si, s) in machine.flow_successors(ci, node) {
            match machine.instance(si).truth(s, sub) {
                Some(true) => {
                    holds = true;
                    break;
                }
                Some(false) => {}
                None => has_unknown = true,
            }
        }
        if holds {
            decisions.push((ci, node, true));
        } else if !has_unknown {
            decisions.push((ci, node, false));
        }
    }
    for (ci, node, value) in decisions {
        machine.instance_mut(ci).decide(node, formula, value);
    }
}

fn check_until(
    machine: &mut Machine,
    formula: FormulaIdx,
    sub1: FormulaIdx,
    sub2: FormulaIdx,
) {
    /* pessimistic run: a node only enters the satisfying set with a
     * concrete reason */

    let mut sat = HashSet::new();
    let mut to_determine = HashSet::new();

    for (ci, node) in all_states(machine) {
        let inst = machine.instance(ci);
        match inst.truth(node, formula) {
            Some(true) => {
                sat.insert((ci, node));
                continue;
            }
            Some(false) => continue,
            None => {}
        }
        // an exit whose context promises an outside path satisfies the
        // formula; one whose context denies it never will
        if machine.is_exit(node) && inst.context.has(node, formula) {
            if inst.context.get(node, formula) == Some(true) {
                sat.insert((ci, node));
            }
            continue;
        }
        if inst.truth(node, sub2) == Some(true) {
            sat.insert((ci, node));
            continue;
        }
        if inst.truth(node, sub1) != Some(true) {
            continue;
        }
        to_determine.insert((ci, node));
    }

    grow(machine, &mut sat, &mut to_determine);

    let decided: Vec<_> = sat.iter().copied().collect();
    for (ci, node) in decided {
        machine.instance_mut(ci).decide(node, formula, true);
    }

    /* optimistic run: a node is assumed satisfying unless proved
     * otherwise */

    let mut sat = HashSet::new();
    let mut to_determine = HashSet::new();

    for (ci, node) in all_states(machine) {
        let inst = machine.instance(ci);
        match inst.truth(node, formula) {
            Some(true) => {
                sat.insert((ci, node));
                continue;
            }
            Some(false) => continue,
            None => {}
        }
        if machine.is_exit(node) {
            if inst.context.get(node, formula) != Some(false) {
                sat.insert((ci, node));
            }
            continue;
        }
        if inst.truth(node, sub2) != Some(false) {
            sat.insert((ci, node));
            continue;
        }
        if inst.truth(node, sub1) == Some(false) {
            continue;
        }
        to_determine.insert((ci, node));
    }

    grow(machine, &mut sat, &mut to_determine);

    // what is false optimistically is definitely false
    for (ci, node) in all_states(machine) {
        if machine.instance(ci).knows(node, formula)
            || sat.contains(&(ci, node))
        {
            continue;
        }
        machine.instance_mut(ci).decide(node, formula, false);
    }
}

/// Move candidates into `sat` while they have a satisfying successor, until
/// the set stops growing.
fn grow(
    machine: &Machine,
    sat: &mut HashSet<(InstanceIdx, NodeIdx)>,
    to_determine: &mut HashSet<(InstanceIdx, NodeIdx)>,
) {
    loop {
        let mut remaining = HashSet::new();
        for &(ci, node) in to_determine.iter() {
            if machine
                .flow_successors(ci, node)
                .iter()
                .any(|p| sat.contains(p))
            {
                sat.insert((ci, node));
            } else {
                remaining.insert((ci, node));
            }
        }
        if remaining.len() == to_determine.len() {
            break;
        }
        *to_determine = remaining;
    }
}

fn check_always(machine: &mut Machine, formula: FormulaIdx, sub: FormulaIdx) {
    /* pessimistic run */

    let mut sat = HashSet::new();

    for (ci, node) in all_states(machine) {
        let inst = machine.instance(ci);
        match inst.truth(node, formula) {
            Some(true) => {
                sat.insert((ci, node));
                continue;
            }
            Some(false) => continue,
            None => {}
        }
        if machine.is_exit(node) {
            if inst.context.get(node, formula) == Some(true) {
                sat.insert((ci, node));
            }
        } else if inst.truth(node, sub) == Some(true) {
            sat.insert((ci, node));
        }
    }

    shrink(machine, formula, &mut sat);

    let decided: Vec<_> = sat.iter().copied().collect();
    for (ci, node) in decided {
        machine.instance_mut(ci).decide(node, formula, true);
    }

    /* optimistic run */

    let mut sat = HashSet::new();

    for (ci, node) in all_states(machine) {
        let inst = machine.instance(ci);
        match inst.truth(node, formula) {
            Some(true) => {
                sat.insert((ci, node));
                continue;
            }
            Some(false) => continue,
            None => {}
        }
        if machine.is_exit(node) && inst.context.has(node, formula) {
            if inst.context.get(node, formula) == Some(true) {
                sat.insert((ci, node));
            }
            continue;
        }
        if inst.truth(node, sub) != Some(false) {
            sat.insert((ci, node));
        }
    }

    shrink(machine, formula, &mut sat);

    // what is false optimistically is definitely false
    for (ci, node) in all_states(machine) {
        if machine.instance(ci).knows(node, formula)
            || sat.contains(&(ci, node))
        {
            continue;
        }
        machine.instance_mut(ci).decide(node, formula, false);
    }
}

/// Drop set members without a satisfying successor until the set stops
/// shrinking, preserving nodes whose value is pinned: recorded decisions,
/// exits promised `true` by their context, and nodes without successors
/// (implicit self-loop).
fn shrink(
    machine: &Machine,
    formula: FormulaIdx,
    sat: &mut HashSet<(InstanceIdx, NodeIdx)>,
) {
    loop {
        let mut removed = Vec::new();
        for &(ci, node) in sat.iter() {
            let inst = machine.instance(ci);
            if machine.is_exit(node)
                && inst.context.get(node, formula) == Some(true)
            {
                continue;
            }
            if inst.knows(node, formula) {
                continue;
            }
            let successors = machine.flow_successors(ci, node);
            if successors.is_empty() {
                continue;
            }
            if !successors.iter().any(|p| sat.contains(p)) {
                removed.push((ci, node));
            }
        }
        if removed.is_empty() {
            break;
        }
        for pair in removed {
            sat.remove(&pair);
        }
    }
}
