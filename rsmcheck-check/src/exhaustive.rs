//! The exhaustive driver: unpack every box whose referenced component is
//! missing information until the formula is decided in every node.

use ahash::{HashSet, HashSetExt};
use rsmcheck_ir::{BoxIdx, Formula, FormulaIdx, InstanceIdx, NodeKind};
use slog::debug;

use crate::checker::Checker;
use crate::existential::check_existential;
use crate::local::check_locally;

impl Checker<'_> {
    /// Decide `root` in every node of every reachable instance, walking the
    /// subformula DAG bottom-up and fully contextualising the machine for
    /// each existential subformula.
    pub(crate) fn check_exhaustive(&mut self, root: FormulaIdx) {
        let mut init_contexts_built = 0;
        for layer in self.store.layers(root) {
            for f in layer {
                if !self.store.is_existential(f) {
                    for (ci, node) in self.all_states() {
                        check_locally(self.machine, ci, node, f, self.store);
                    }
                    continue;
                }
                let appendix = format!("_init{init_contexts_built}");
                init_contexts_built += 1;
                self.machine.initialize_single(self.store, f, &appendix);
                self.machine.remove_unreachable();

                let mut last_to_unpack = HashSet::new();
                while self.exhaustive_step(f, &mut last_to_unpack) {}
            }
        }
        self.contexts_built += init_contexts_built;
        self.log_context_totals();
    }

    /// One evaluate-then-unpack round for `formula`. Returns whether another
    /// round is necessary.
    fn exhaustive_step(
        &mut self,
        formula: FormulaIdx,
        last_to_unpack: &mut HashSet<(InstanceIdx, BoxIdx)>,
    ) -> bool {
        check_existential(self.machine, self.store, formula);
        self.machine.remove_unreachable();

        // boxes which have information their referenced component lacks
        let mut to_unpack = HashSet::new();
        for &ci in self.machine.live_instances() {
            let base = self.machine.instance(ci).base;
            for &bx in &self.machine.component(base).boxes {
                let target = self.machine.instance(ci).box_map[&bx];
                for &rn in &self.machine.box_def(bx).return_ports {
                    let NodeKind::Port { inner, .. } =
                        self.machine.node(rn).kind
                    else {
                        unreachable!("return port is not a port")
                    };
                    if !self.machine.instance(target).knows(inner, formula) {
                        to_unpack.insert((ci, bx));
                        break;
                    }
                }
            }
        }

        if self.machine.known_everywhere(formula) {
            debug!(
                self.logger,
                "Determined CTL ({}) in all nodes",
                self.store.display(formula)
            );
            return false;
        }

        for &(ci, bx) in &to_unpack {
            self.unpack(ci, bx);
        }

        if *last_to_unpack == to_unpack {
            // the unpacking fixed point was reached while some occurrences
            // are still open, which means they depend on a global cycle:
            // greatest fixed point for EG, least for EU
            let default = match self.store.get(formula) {
                Formula::ExistsGlobally(_) => true,
                Formula::ExistsUntil(..) => false,
                _ => panic!(
                    "unpacking fixed point reached for {}, which is neither \
                     EG nor EU",
                    self.store.display(formula)
                ),
            };
            for (ci, node) in self.all_states() {
                if !self.machine.instance(ci).knows(node, formula) {
                    self.machine
                        .instance_mut(ci)
                        .decide(node, formula, default);
                }
            }
        }
        *last_to_unpack = to_unpack;

        true
    }
}
