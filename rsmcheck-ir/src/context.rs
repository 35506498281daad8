//! Contexts and contextualised components.
//!
//! A context records, per exit node, assumed truth values of existential
//! subformulas: what the caller will observe once control returns. The
//! checker refines box targets by swapping them for instances whose context
//! matches what is currently known at the box's return ports.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use itertools::Itertools;
use rsmcheck_utils::Id;
use std::collections::BTreeMap;

use crate::formula::{FormulaIdx, FormulaStore};
use crate::machine::Machine;
use crate::structure::{
    BoxIdx, ComponentIdx, InstanceIdx, NodeIdx, NodeKind,
};

/// Truth assumptions at the exit nodes of a component.
///
/// Always carries one entry per exit node of its base component, possibly
/// empty, so value equality between contexts over the same base is total.
/// Keys are ordered, which makes equality and hashing canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Context(BTreeMap<NodeIdx, BTreeMap<FormulaIdx, bool>>);

impl Context {
    /// The context making no assumptions at any of the given exits.
    pub fn empty_for(exits: &[NodeIdx]) -> Self {
        Context(exits.iter().map(|&ex| (ex, BTreeMap::new())).collect())
    }

    pub fn get(&self, exit: NodeIdx, formula: FormulaIdx) -> Option<bool> {
        self.0.get(&exit).and_then(|m| m.get(&formula)).copied()
    }

    pub fn has(&self, exit: NodeIdx, formula: FormulaIdx) -> bool {
        self.get(exit, formula).is_some()
    }

    pub fn set(&mut self, exit: NodeIdx, formula: FormulaIdx, value: bool) {
        self.0.entry(exit).or_default().insert(formula, value);
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (NodeIdx, &BTreeMap<FormulaIdx, bool>)> {
        self.0.iter().map(|(&ex, m)| (ex, m))
    }

    /// All formulas assigned anywhere in the context, in index order.
    pub fn formulas(&self) -> Vec<FormulaIdx> {
        self.0
            .values()
            .flat_map(|m| m.keys().copied())
            .sorted()
            .dedup()
            .collect()
    }

    /// Whether every assignment of `other` is present with the same value.
    pub fn extends(&self, other: &Context) -> bool {
        other.iter().all(|(ex, m)| {
            m.iter().all(|(&f, &v)| self.get(ex, f) == Some(v))
        })
    }
}

/// A contextualised component: a base component, a context, a mapping from
/// each box to its target instance, and the three-valued interpretation of
/// formulas at each node (absent means unknown).
#[derive(Debug, Clone)]
pub struct Instance {
    pub base: ComponentIdx,
    /// Base name plus the context appendix, for logging.
    pub name: Id,
    pub context: Context,
    pub box_map: HashMap<BoxIdx, InstanceIdx>,
    interp: HashMap<NodeIdx, HashMap<FormulaIdx, bool>>,
}

impl Instance {
    pub(crate) fn new(
        base: ComponentIdx,
        name: Id,
        context: Context,
        nodes: &[NodeIdx],
    ) -> Self {
        let mut interp: HashMap<_, _> =
            nodes.iter().map(|&n| (n, HashMap::new())).collect();
        for (ex, assignments) in context.iter() {
            interp
                .get_mut(&ex)
                .expect("context assigns a node outside the component")
                .extend(assignments.iter().map(|(&f, &v)| (f, v)));
        }
        Instance {
            base,
            name,
            context,
            box_map: HashMap::new(),
            interp,
        }
    }

    pub fn truth(&self, node: NodeIdx, formula: FormulaIdx) -> Option<bool> {
        self.interp.get(&node).and_then(|m| m.get(&formula)).copied()
    }

    pub fn knows(&self, node: NodeIdx, formula: FormulaIdx) -> bool {
        self.truth(node, formula).is_some()
    }

    /// Record a truth value. Writes are monotone: a value that is already
    /// present is never replaced.
    pub fn decide(&mut self, node: NodeIdx, formula: FormulaIdx, value: bool) {
        let prev = self
            .interp
            .get_mut(&node)
            .expect("node does not belong to this instance")
            .entry(formula)
            .or_insert(value);
        debug_assert_eq!(
            *prev, value,
            "conflicting decision for a formula at a node"
        );
    }

    /// The recorded (formula, value) pairs at one node.
    pub fn recorded(&self, node: NodeIdx) -> Vec<(FormulaIdx, bool)> {
        self.interp
            .get(&node)
            .map(|m| m.iter().map(|(&f, &v)| (f, v)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn release(&mut self) {
        self.interp = HashMap::new();
        self.box_map = HashMap::new();
    }
}

impl Machine {
    /// The unique live instance of `base` under `context`, if any.
    pub fn get_contextualised(
        &self,
        base: ComponentIdx,
        context: &Context,
    ) -> Option<InstanceIdx> {
        self.lookup.get(&base).and_then(|m| m.get(context)).copied()
    }

    /// Create a copy of `source` carrying `context`, which must extend the
    /// source's context. Interpretation and box mapping are copied, then the
    /// new context is overlaid onto the interpretation.
    ///
    /// Panics when `context` does not extend the source's context: contexts
    /// never regress, so that indicates a bug in the checker.
    pub fn extend(
        &mut self,
        source: InstanceIdx,
        appendix: &str,
        context: Context,
    ) -> InstanceIdx {
        let src = &self.instances[source];
        assert!(
            context.extends(&src.context),
            "context {context:?} is not an extension of {:?}",
            src.context
        );

        let base = src.base;
        let mut instance = Instance {
            base,
            name: Id::new(format!("{}{appendix}", self.components[base].name)),
            context: context.clone(),
            box_map: src.box_map.clone(),
            interp: src.interp.clone(),
        };
        for (ex, assignments) in context.iter() {
            instance
                .interp
                .get_mut(&ex)
                .expect("context assigns a node outside the component")
                .extend(assignments.iter().map(|(&f, &v)| (f, v)));
        }

        let idx = self.instances.push(instance);
        self.lookup.entry(base).or_default().insert(context, idx);
        self.live.push(idx);
        idx
    }

    /// Unpack a box: rewire it to an instance whose context matches the
    /// truth values of existential formulas currently recorded at the box's
    /// return ports, creating that instance first if necessary.
    ///
    /// Returns whether the target instance already existed.
    pub fn contextualise_box(
        &mut self,
        instance: InstanceIdx,
        bx: BoxIdx,
        store: &FormulaStore,
    ) -> bool {
        let target = self.instances[instance].box_map[&bx];
        let callee = self.boxes[bx].callee;

        let mut context = Context::empty_for(&self.components[callee].exits);
        for rn in self.boxes[bx].return_ports.clone() {
            let NodeKind::Port { inner, .. } = self.nodes[rn].kind else {
                unreachable!("return port is not a port")
            };
            for (f, v) in self.instances[instance].recorded(rn) {
                if store.is_existential(f) {
                    context.set(inner, f, v);
                }
            }
        }

        if let Some(existing) = self.get_contextualised(callee, &context) {
            self.instances[instance].box_map.insert(bx, existing);
            return true;
        }

        let appendix = self.context_appendix(&context, callee, store);
        let fresh = self.extend(target, &appendix, context);
        self.instances[instance].box_map.insert(bx, fresh);
        false
    }

    /// Drop every instance that is not reachable from the initial instance
    /// through box mappings.
    pub fn remove_unreachable(&mut self) {
        let mut reach = HashSet::new();
        let mut next = vec![self.initial_instance];
        while let Some(ci) = next.pop() {
            if !reach.insert(ci) {
                continue;
            }
            next.extend(self.instances[ci].box_map.values().copied());
        }

        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(|ci| reach.contains(ci));
        self.live = kept;
        for table in self.lookup.values_mut() {
            table.retain(|_, ci| reach.contains(ci));
        }
        for ci in dropped {
            self.instances[ci].release();
        }
    }

    /// Replace the initial instance by one whose context records, for every
    /// existential subformula of `root`, the formula's value at each exit
    /// under the semantics of the exit being the last state of a path that
    /// stays inside the component.
    pub fn initialize(&mut self, store: &FormulaStore, root: FormulaIdx) {
        use crate::formula::Formula;

        let source = self.initial_instance;
        let base = self.instances[source].base;
        let exits = self.components[base].exits.clone();

        let mut values: HashMap<NodeIdx, HashMap<FormulaIdx, bool>> =
            exits.iter().map(|&ex| (ex, HashMap::new())).collect();
        let mut context = Context::empty_for(&exits);

        for f in store.subformulas(root) {
            for &ex in &exits {
                let value = match *store.get(f) {
                    Formula::Bool(b) => b,
                    Formula::Atom(p) => self.has_label(ex, p),
                    Formula::Not(x) => !values[&ex][&x],
                    Formula::Or(a, b) => values[&ex][&a] || values[&ex][&b],
                    Formula::ExistsNext(x) | Formula::ExistsGlobally(x) => {
                        values[&ex][&x]
                    }
                    Formula::ExistsUntil(_, y) => values[&ex][&y],
                    Formula::And(..) => panic!(
                        "can only initialise wrt a CTL in existential normal \
                         form (not, or, exists)"
                    ),
                };
                values.get_mut(&ex).unwrap().insert(f, value);
                if store.is_existential(f) {
                    context.set(ex, f, value);
                }
            }
        }

        self.initial_instance = self.extend(source, "_init", context);
    }

    /// Like [`Machine::initialize`] but for a single existential formula
    /// whose subformulas are already decided at the exits of the initial
    /// instance. Used by the exhaustive driver.
    pub fn initialize_single(
        &mut self,
        store: &FormulaStore,
        formula: FormulaIdx,
        appendix: &str,
    ) {
        use crate::formula::Formula;

        let source = self.initial_instance;
        let base = self.instances[source].base;
        let exits = self.components[base].exits.clone();

        let mut context = self.instances[source].context.clone();
        for &ex in &exits {
            let sub = match *store.get(formula) {
                Formula::ExistsNext(x) | Formula::ExistsGlobally(x) => x,
                Formula::ExistsUntil(_, y) => y,
                _ => panic!(
                    "can only single-initialise wrt an existential formula"
                ),
            };
            let value =
                self.instances[source].truth(ex, sub).unwrap_or_else(|| {
                    panic!(
                        "cannot initialise wrt {}: its subformula is not \
                         known in all exit nodes of the initial component",
                        store.display(formula)
                    )
                });
            context.set(ex, formula, value);
        }

        self.initial_instance = self.extend(source, appendix, context);
    }

    /// The canonical name appendix for a context: formulas in a stable
    /// order, then one `1`/`0`/`?` digest per exit node in name order.
    pub fn context_appendix(
        &self,
        context: &Context,
        base: ComponentIdx,
        store: &FormulaStore,
    ) -> String {
        let mut exits = self.components[base].exits.clone();
        exits.sort_by(|&a, &b| {
            self.nodes[a].name.as_str().cmp(self.nodes[b].name.as_str())
        });
        let formulas = context.formulas();

        let mut out = String::from("_");
        for &f in &formulas {
            out.push_str(&store.compact_text(f));
            out.push('/');
        }
        for (i, &ex) in exits.iter().enumerate() {
            for &f in &formulas {
                out.push(match context.get(ex, f) {
                    None => '?',
                    Some(true) => '1',
                    Some(false) => '0',
                });
            }
            if i + 1 < exits.len() {
                out.push('/');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;

    /// One component with two exits and a box-free body, used to exercise
    /// the context machinery directly.
    fn two_exit_machine() -> (Machine, ComponentIdx, NodeIdx, NodeIdx) {
        let mut machine = Machine::new();
        let c = machine.add_component(Id::new("C")).unwrap();
        let n0 = machine
            .add_node(c, Id::new("n0"), [Id::new("a")], true, false)
            .unwrap();
        let e0 = machine
            .add_node(c, Id::new("e0"), [], false, true)
            .unwrap();
        let e1 = machine
            .add_node(c, Id::new("e1"), [], false, true)
            .unwrap();
        machine.add_transition(n0, e0);
        machine.add_transition(n0, e1);
        machine.set_initial(c, n0);
        machine.instantiate().unwrap();
        (machine, c, e0, e1)
    }

    #[test]
    fn encoding_digest() {
        let (machine, c, e0, e1) = two_exit_machine();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let b = store.intern(Formula::Atom(Id::new("b")));
        let eg_a = store.intern(Formula::ExistsGlobally(a));
        let ex_b = store.intern(Formula::ExistsNext(b));

        let mut context = Context::empty_for(&[e0, e1]);
        context.set(e0, eg_a, true);
        context.set(e1, ex_b, false);

        assert_eq!(
            machine.context_appendix(&context, c, &store),
            "_EGa/EXb/1?/?0"
        );
    }

    #[test]
    fn contexts_are_canonical() {
        let (mut machine, c, e0, e1) = two_exit_machine();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let eg_a = store.intern(Formula::ExistsGlobally(a));

        let empty = Context::empty_for(&[e0, e1]);
        let first = machine.get_contextualised(c, &empty).unwrap();
        assert_eq!(machine.get_contextualised(c, &empty), Some(first));

        let mut refined = empty.clone();
        refined.set(e0, eg_a, true);
        assert!(machine.get_contextualised(c, &refined).is_none());

        let fresh = machine.extend(first, "_x", refined.clone());
        assert_eq!(machine.get_contextualised(c, &refined), Some(fresh));
        assert_eq!(machine.get_contextualised(c, &refined), Some(fresh));
    }

    #[test]
    #[should_panic(expected = "not an extension")]
    fn extend_rejects_regressing_contexts() {
        let (mut machine, _, e0, e1) = two_exit_machine();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let eg_a = store.intern(Formula::ExistsGlobally(a));

        let mut first = Context::empty_for(&[e0, e1]);
        first.set(e0, eg_a, true);
        let src = machine.initial_instance();
        let refined = machine.extend(src, "_x", first);

        // flipping a recorded value is a regression
        let mut conflicting = Context::empty_for(&[e0, e1]);
        conflicting.set(e0, eg_a, false);
        machine.extend(refined, "_y", conflicting);
    }

    #[test]
    fn decisions_are_monotone() {
        let (mut machine, _, e0, _) = two_exit_machine();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let ci = machine.initial_instance();

        machine.instance_mut(ci).decide(e0, a, true);
        machine.instance_mut(ci).decide(e0, a, true);
        assert_eq!(machine.instance(ci).truth(e0, a), Some(true));
    }

    #[test]
    fn unpacking_twice_relabels() {
        // M calls P through box B; unpacking twice with unchanged port
        // information must find the existing instance the second time.
        let mut machine = Machine::new();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let eg_a = store.intern(Formula::ExistsGlobally(a));

        let p = machine.add_component(Id::new("P")).unwrap();
        let p0 = machine
            .add_node(p, Id::new("p0"), [Id::new("a")], true, false)
            .unwrap();
        let p1 = machine
            .add_node(p, Id::new("p1"), [Id::new("a")], false, true)
            .unwrap();
        machine.add_transition(p0, p1);

        let m = machine.add_component(Id::new("M")).unwrap();
        let m0 = machine
            .add_node(m, Id::new("m0"), [Id::new("a")], true, false)
            .unwrap();
        let m1 = machine
            .add_node(m, Id::new("m1"), [Id::new("a")], false, true)
            .unwrap();
        let bx = machine
            .add_box(m, Id::new("B"), p, &[p0], &[p1])
            .unwrap();
        let call = machine.box_def(bx).call_ports[0];
        let ret = machine.box_def(bx).return_ports[0];
        machine.add_transition(m0, call);
        machine.add_transition(ret, m1);
        machine.set_initial(m, m0);
        machine.instantiate().unwrap();

        let mi = machine.initial_instance();
        machine.instance_mut(mi).decide(ret, eg_a, true);

        assert!(!machine.contextualise_box(mi, bx, &store));
        let target = machine.instance(mi).box_map[&bx];
        assert_eq!(
            machine.instance(target).context.get(p1, eg_a),
            Some(true)
        );
        // context injection: the new target's context is visible at its exit
        assert_eq!(machine.instance(target).truth(p1, eg_a), Some(true));

        assert!(machine.contextualise_box(mi, bx, &store));
        assert_eq!(machine.instance(mi).box_map[&bx], target);
    }

    #[test]
    fn sweep_drops_unreferenced_instances() {
        let (mut machine, c, e0, e1) = two_exit_machine();
        let mut store = FormulaStore::new();
        let a = store.intern(Formula::Atom(Id::new("a")));
        let eg_a = store.intern(Formula::ExistsGlobally(a));

        let mut refined = Context::empty_for(&[e0, e1]);
        refined.set(e0, eg_a, true);
        let old = machine.initial_instance();
        let fresh = machine.extend(old, "_x", refined.clone());
        assert_eq!(machine.live_instances().len(), 2);

        // the old empty-context instance is no longer referenced once the
        // refined one becomes initial
        machine.initial_instance = fresh;
        machine.remove_unreachable();
        assert_eq!(machine.live_instances(), &[fresh]);
        assert!(machine.get_contextualised(c, &refined).is_some());
        assert!(
            machine
                .get_contextualised(c, &Context::empty_for(&[e0, e1]))
                .is_none()
        );
    }
}
