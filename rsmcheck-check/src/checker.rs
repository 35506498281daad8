//! The driver object tying the evaluators together.

use ahash::{HashSet, HashSetExt};
use slog::{Logger, debug};

use rsmcheck_ir::{BoxIdx, FormulaIdx, FormulaStore, InstanceIdx, Machine};

use crate::config::{CheckConfig, Strategy};
use crate::existential::check_existential;
use crate::local::check_locally;

/// One check of one formula against one machine.
///
/// Owns the state the drivers thread through their iterations: the set of
/// formulas already known everywhere and the context counters.
pub struct Checker<'a> {
    pub(crate) machine: &'a mut Machine,
    pub(crate) store: &'a FormulaStore,
    pub(crate) config: CheckConfig,
    pub(crate) logger: Logger,
    /// Formulas decided at every node of every live instance.
    known: HashSet<FormulaIdx>,
    /// Contexts created, the initial context included.
    pub contexts_built: u64,
    /// `contextualise_box` calls that found an existing instance.
    pub contexts_relabeled: u64,
}

impl<'a> Checker<'a> {
    pub fn new(
        machine: &'a mut Machine,
        store: &'a FormulaStore,
        config: CheckConfig,
        logger: Logger,
    ) -> Self {
        Checker {
            machine,
            store,
            config,
            logger,
            known: HashSet::new(),
            contexts_built: 0,
            contexts_relabeled: 0,
        }
    }

    /// Run the configured driver and return the decision at the initial
    /// node.
    pub fn check(&mut self, root: FormulaIdx) -> bool {
        match self.config.strategy {
            Strategy::Exhaustive => self.check_exhaustive(root),
            Strategy::Lazy => self.check_lazy(root),
        }
        let initial = self.machine.initial_instance();
        let node = self.machine.initial_node();
        self.machine
            .instance(initial)
            .truth(node, root)
            .expect("driver finished without deciding the initial node")
    }

    /// Deduce every subformula of `root` in every node of every live
    /// instance as far as currently possible, walking the subformula DAG in
    /// increasing quantifier depth. Formulas already known everywhere are
    /// skipped.
    pub(crate) fn deduce_all(&mut self, root: FormulaIdx) {
        let mut handled = HashSet::new();
        for layer in self.store.layers(root) {
            for f in layer {
                if handled.contains(&f) || self.known.contains(&f) {
                    continue;
                }
                handled.insert(f);
                if self.store.is_existential(f) {
                    check_existential(self.machine, self.store, f);
                    if self.machine.known_everywhere(f) {
                        self.known.insert(f);
                    }
                } else {
                    let mut everywhere = true;
                    for (ci, node) in self.all_states() {
                        everywhere &= check_locally(
                            self.machine,
                            ci,
                            node,
                            f,
                            self.store,
                        );
                    }
                    if everywhere {
                        self.known.insert(f);
                    }
                }
            }
        }
    }

    /// Unpack one box, updating the context counters.
    pub(crate) fn unpack(&mut self, instance: InstanceIdx, bx: BoxIdx) {
        if self.machine.contextualise_box(instance, bx, self.store) {
            self.contexts_relabeled += 1;
        } else {
            self.contexts_built += 1;
        }
    }

    pub(crate) fn all_states(
        &self,
    ) -> Vec<(InstanceIdx, rsmcheck_ir::NodeIdx)> {
        self.machine
            .live_instances()
            .iter()
            .flat_map(|&ci| {
                self.machine
                    .component(self.machine.instance(ci).base)
                    .nodes
                    .iter()
                    .map(move |&n| (ci, n))
            })
            .collect()
    }

    pub(crate) fn log_context_totals(&self) {
        debug!(
            self.logger,
            "Built a total of {} contexts (plus {} context relabels)",
            self.contexts_built,
            self.contexts_relabeled
        );
    }
}
