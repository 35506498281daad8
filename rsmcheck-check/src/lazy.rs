//! The lazy driver: deduce everything deducible, then unpack only the
//! boxes an expansion heuristic selects, until the initial node is decided.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use rand::seq::{IndexedRandom, SliceRandom};
use rsmcheck_ir::{
    BoxIdx, Formula, FormulaIdx, InstanceIdx, NodeIdx, NodeKind,
};

use crate::checker::Checker;
use crate::config::ExpansionHeuristic;

/// Per-invocation state of the GetNext request protocol: which formulas
/// were requested where, the current recursive chain per formula, the boxes
/// and instances entered on the way, and the requests that were observed
/// twice (the cycle signal).
struct RequestState {
    requested: HashMap<FormulaIdx, HashSet<(InstanceIdx, NodeIdx)>>,
    chain: HashMap<FormulaIdx, Vec<(InstanceIdx, NodeIdx)>>,
    box_stack: Vec<BoxIdx>,
    component_stack: Vec<InstanceIdx>,
    double_requests: HashSet<((InstanceIdx, NodeIdx), FormulaIdx)>,
}

impl RequestState {
    fn new(initial: InstanceIdx) -> Self {
        RequestState {
            requested: HashMap::new(),
            chain: HashMap::new(),
            box_stack: Vec::new(),
            component_stack: vec![initial],
            double_requests: HashSet::new(),
        }
    }

    fn was_requested(
        &self,
        formula: FormulaIdx,
        pair: (InstanceIdx, NodeIdx),
    ) -> bool {
        self.requested
            .get(&formula)
            .is_some_and(|set| set.contains(&pair))
    }

    fn record(&mut self, formula: FormulaIdx, pair: (InstanceIdx, NodeIdx)) {
        self.requested.entry(formula).or_default().insert(pair);
        self.chain.entry(formula).or_default().push(pair);
    }

    fn pop_chain(&mut self, formula: FormulaIdx) {
        self.chain
            .get_mut(&formula)
            .expect("chain entry exists for every recorded request")
            .pop();
    }

    /// Register every chain entry from `pair` onwards as a double request
    /// for `formula`.
    fn mark_cycle(
        &mut self,
        formula: FormulaIdx,
        pair: (InstanceIdx, NodeIdx),
    ) {
        let chain = &self.chain[&formula];
        if let Some(pos) = chain.iter().position(|&p| p == pair) {
            for &entry in &chain[pos..] {
                self.double_requests.insert((entry, formula));
            }
        }
    }
}

impl Checker<'_> {
    /// Decide `root` at the initial node with as little unpacking as the
    /// configured heuristic manages.
    pub(crate) fn check_lazy(&mut self, root: FormulaIdx) {
        // initialization in exit nodes is only necessary for existential
        // subformulas
        if self
            .store
            .subformulas(root)
            .iter()
            .any(|&f| self.store.is_existential(f))
        {
            self.machine.initialize(self.store, root);
            self.contexts_built += 1;
        }
        self.machine.remove_unreachable();
        self.deduce_all(root);

        while !self.initial_decided(root) {
            let mut to_contextualise: Vec<(BoxIdx, InstanceIdx)> = Vec::new();
            let mut request = None;

            match self.config.heuristic {
                ExpansionHeuristic::GetNext => {
                    let mut state =
                        RequestState::new(self.machine.initial_instance());
                    let found =
                        self.find_next(self.machine.initial_node(), root, &mut state);
                    to_contextualise.extend(found);
                    request = Some(state);
                }
                ExpansionHeuristic::Random => {
                    let candidates = self.contextualisable_boxes(root);
                    to_contextualise
                        .extend(candidates.choose(&mut rand::rng()).copied());
                }
                ExpansionHeuristic::All => {
                    to_contextualise = self.contextualisable_boxes(root);
                }
            }

            if !to_contextualise.is_empty() {
                for (bx, ci) in to_contextualise {
                    self.unpack(ci, bx);
                }
            } else if let Some(state) = request {
                // GetNext came back empty-handed: the only legitimate
                // reason is that every remaining dependency loops back on
                // itself, which the double requests record
                assert!(
                    !state.double_requests.is_empty(),
                    "failed to compute the next box to unpack"
                );
                for ((ci, node), f) in state.double_requests {
                    match self.store.get(f) {
                        // a cycle on which the subformula holds throughout
                        // satisfies EG by definition
                        Formula::ExistsGlobally(_) => {
                            self.machine.instance_mut(ci).decide(node, f, true)
                        }
                        // every branch was explored without reaching the
                        // goal formula, so the until fails
                        Formula::ExistsUntil(..) => self
                            .machine
                            .instance_mut(ci)
                            .decide(node, f, false),
                        _ => unreachable!(
                            "double requests are only recorded for EG and EU"
                        ),
                    }
                }
            } else {
                self.resolve_global_cycles(root);
            }

            self.machine.remove_unreachable();
            self.deduce_all(root);
        }

        self.log_context_totals();
    }

    fn initial_decided(&self, root: FormulaIdx) -> bool {
        self.machine
            .instance(self.machine.initial_instance())
            .knows(self.machine.initial_node(), root)
    }

    /// Boxes whose referenced component is missing a subformula value at a
    /// return node while the enclosing component has it at the return port.
    fn contextualisable_boxes(
        &self,
        root: FormulaIdx,
    ) -> Vec<(BoxIdx, InstanceIdx)> {
        let subformulas = self.store.subformulas(root);
        let mut out = Vec::new();
        for &ci in self.machine.live_instances() {
            let base = self.machine.instance(ci).base;
            for &bx in &self.machine.component(base).boxes {
                let target = self.machine.instance(ci).box_map[&bx];
                let missing = self
                    .machine
                    .box_def(bx)
                    .return_ports
                    .iter()
                    .any(|&rn| {
                        let NodeKind::Port { inner, .. } =
                            self.machine.node(rn).kind
                        else {
                            unreachable!("return port is not a port")
                        };
                        subformulas.iter().any(|&f| {
                            !self.machine.instance(target).knows(inner, f)
                                && self.machine.instance(ci).knows(rn, f)
                        })
                    });
                if missing {
                    out.push((bx, ci));
                }
            }
        }
        out
    }

    /// Without GetNext's request tracking, cycles can only be resolved
    /// globally once a formula's subformulas are known everywhere: find the
    /// smallest-depth formula still open and default all its occurrences.
    fn resolve_global_cycles(&mut self, root: FormulaIdx) {
        for layer in self.store.layers(root) {
            let mut found_unknown = false;
            for f in layer {
                let default = match self.store.get(f) {
                    Formula::ExistsGlobally(_) => true,
                    Formula::ExistsUntil(..) => false,
                    _ => continue,
                };
                for (ci, node) in self.all_states() {
                    if !self.machine.instance(ci).knows(node, f) {
                        found_unknown = true;
                        self.machine
                            .instance_mut(ci)
                            .decide(node, f, default);
                    }
                }
            }
            if found_unknown {
                break;
            }
        }
    }

    /// Walk the abstract dependency graph of the CTL semantics depth-first,
    /// starting from `node`, and return the first box whose unpacking would
    /// let the search make progress. Returns `None` when every path loops;
    /// the loops are then recorded in the request state.
    fn find_next(
        &mut self,
        node: NodeIdx,
        formula: FormulaIdx,
        state: &mut RequestState,
    ) -> Option<(BoxIdx, InstanceIdx)> {
        let current = *state
            .component_stack
            .last()
            .expect("component stack is never empty");
        let pair = (current, node);
        state.record(formula, pair);

        assert!(
            !self.machine.instance(current).knows(node, formula),
            "requested {} in node {} where it is already decided",
            self.store.display(formula),
            self.machine.node(node).name
        );

        // local connectives delegate to an undecided operand
        let operands = match *self.store.get(formula) {
            Formula::Not(x) => Some(vec![x]),
            Formula::And(a, b) | Formula::Or(a, b) => Some(vec![a, b]),
            _ => None,
        };
        if let Some(mut operands) = operands {
            if self.config.randomize {
                operands.shuffle(&mut rand::rng());
            }
            for sub in operands {
                if !self.machine.instance(current).knows(node, sub)
                    && !state.was_requested(sub, pair)
                {
                    if let Some(result) = self.find_next(node, sub, state) {
                        state.pop_chain(formula);
                        return Some(result);
                    }
                }
            }
            state.pop_chain(formula);
            return None;
        }

        // an exit node resolves through the box it was entered from: if the
        // formula is known at the matching return port, that box is the one
        // to unpack; otherwise continue the search from the return port
        if self.machine.is_exit(node) {
            let depth = state.component_stack.len();
            assert!(
                depth >= 2,
                "requested an undecided formula at an exit of the initial \
                 component"
            );
            let enclosing = state.component_stack[depth - 2];
            let entered = *state
                .box_stack
                .last()
                .expect("box stack matches component stack");
            let rn = self
                .machine
                .box_def(entered)
                .return_ports
                .iter()
                .copied()
                .find(|&rp| {
                    matches!(
                        self.machine.node(rp).kind,
                        NodeKind::Port { inner, .. } if inner == node
                    )
                })
                .unwrap_or_else(|| {
                    panic!(
                        "could not match exit {} to any return port of box {}",
                        self.machine.node(node).name,
                        self.machine.box_def(entered).name
                    )
                });
            if self.machine.instance(enclosing).knows(rn, formula) {
                state.pop_chain(formula);
                return Some((entered, enclosing));
            }
            let saved_box = state.box_stack.pop().unwrap();
            let saved_component = state.component_stack.pop().unwrap();
            if let Some(result) = self.find_next(rn, formula, state) {
                state.pop_chain(formula);
                return Some(result);
            }
            // backtrack: restore the stacks and keep searching from here
            state.box_stack.push(saved_box);
            state.component_stack.push(saved_component);
        }

        // a call port propagates the request to the entry node inside the
        // box's target instance
        if let Some((owner, inner)) = self.machine.node(node).as_call_port() {
            let target = self.machine.instance(current).box_map[&owner];
            if !state.was_requested(formula, (target, inner)) {
                state.box_stack.push(owner);
                state.component_stack.push(target);
                if let Some(result) = self.find_next(inner, formula, state) {
                    state.pop_chain(formula);
                    return Some(result);
                }
                state.box_stack.pop();
                state.component_stack.pop();
            }
        }

        match *self.store.get(formula) {
            Formula::ExistsGlobally(sub) => {
                if !self.machine.instance(current).knows(node, sub)
                    && !state.was_requested(sub, pair)
                {
                    if let Some(result) = self.find_next(node, sub, state) {
                        state.pop_chain(formula);
                        return Some(result);
                    }
                }
                if let Some(result) =
                    self.request_successors(node, formula, state)
                {
                    state.pop_chain(formula);
                    return Some(result);
                }
            }
            Formula::ExistsUntil(sub1, sub2) => {
                for sub in [sub2, sub1] {
                    if !self.machine.instance(current).knows(node, sub)
                        && !state.was_requested(sub, pair)
                    {
                        if let Some(result) = self.find_next(node, sub, state)
                        {
                            state.pop_chain(formula);
                            return Some(result);
                        }
                    }
                }
                if let Some(result) =
                    self.request_successors(node, formula, state)
                {
                    state.pop_chain(formula);
                    return Some(result);
                }
            }
            Formula::ExistsNext(sub) => {
                let mut successors = self.machine.successors(node).to_vec();
                if self.config.randomize {
                    successors.shuffle(&mut rand::rng());
                }
                for succ in successors {
                    if !self.machine.instance(current).knows(succ, sub)
                        && !state.was_requested(formula, (current, succ))
                    {
                        if let Some(result) =
                            self.find_next(succ, sub, state)
                        {
                            state.pop_chain(formula);
                            return Some(result);
                        }
                    }
                }
            }
            _ => {}
        }

        state.pop_chain(formula);
        None
    }

    /// The successor rule shared by the EG and EU arms: request the formula
    /// in an undecided successor, or record a double request when the
    /// successor already sits on the current chain.
    fn request_successors(
        &mut self,
        node: NodeIdx,
        formula: FormulaIdx,
        state: &mut RequestState,
    ) -> Option<(BoxIdx, InstanceIdx)> {
        let current = *state
            .component_stack
            .last()
            .expect("component stack is never empty");
        let pair = (current, node);
        let mut successors = self.machine.successors(node).to_vec();
        if self.config.randomize {
            successors.shuffle(&mut rand::rng());
        }
        for succ in successors {
            if self.machine.instance(current).knows(succ, formula) {
                continue;
            }
            if !state.was_requested(formula, (current, succ)) {
                if let Some(result) = self.find_next(succ, formula, state) {
                    return Some(result);
                }
            } else {
                state.mark_cycle(formula, pair);
            }
        }
        None
    }
}
