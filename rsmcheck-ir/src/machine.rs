//! The top-level machine object owning every arena.

use ahash::{HashMap, HashMapExt};
use rsmcheck_utils::{Error, Id, RsmResult};

use crate::context::{Context, Instance};
use crate::idx::{IndexRef, IndexedMap};
use crate::structure::{
    BaseComponent, BoxDef, BoxIdx, ComponentIdx, InstanceIdx, NodeIdx,
    NodeInfo, NodeKind, PortRole,
};

/// A recursive state machine: the immutable base structure built by the
/// frontend plus the mutable set of contextualised components the checker
/// refines.
///
/// Construction happens in phases, mirroring the input format: components
/// first, then their nodes, then boxes, then transitions, and finally
/// [`Machine::instantiate`] creates the empty-context instance of every base
/// component and wires up the box mappings.
#[derive(Debug, Clone)]
pub struct Machine {
    pub(crate) nodes: IndexedMap<NodeIdx, NodeInfo>,
    pub(crate) boxes: IndexedMap<BoxIdx, BoxDef>,
    pub(crate) components: IndexedMap<ComponentIdx, BaseComponent>,
    pub(crate) instances: IndexedMap<InstanceIdx, Instance>,
    /// Reachable instances in ascending index order.
    pub(crate) live: Vec<InstanceIdx>,
    /// Canonicalisation table: at most one live instance per (base, context).
    pub(crate) lookup: HashMap<ComponentIdx, HashMap<Context, InstanceIdx>>,

    // Name tables used while building and for box-node endpoint lookups.
    component_names: HashMap<Id, ComponentIdx>,
    node_names: HashMap<(ComponentIdx, Id), NodeIdx>,
    call_port_names: HashMap<(ComponentIdx, Id, Id), NodeIdx>,
    return_port_names: HashMap<(ComponentIdx, Id, Id), NodeIdx>,

    initial: Option<(ComponentIdx, NodeIdx)>,
    pub(crate) initial_instance: InstanceIdx,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            nodes: IndexedMap::new(),
            boxes: IndexedMap::new(),
            components: IndexedMap::new(),
            instances: IndexedMap::new(),
            live: Vec::new(),
            lookup: HashMap::new(),
            component_names: HashMap::new(),
            node_names: HashMap::new(),
            call_port_names: HashMap::new(),
            return_port_names: HashMap::new(),
            initial: None,
            initial_instance: InstanceIdx::from(0usize),
        }
    }

    /* ========================== construction ========================== */

    pub fn add_component(&mut self, name: Id) -> RsmResult<ComponentIdx> {
        if self.component_names.contains_key(&name) {
            return Err(Error::malformed(format!(
                "component `{name}' defined twice"
            )));
        }
        let idx = self.components.push(BaseComponent {
            name,
            nodes: Vec::new(),
            boxes: Vec::new(),
            entries: Vec::new(),
            exits: Vec::new(),
        });
        self.component_names.insert(name, idx);
        Ok(idx)
    }

    pub fn add_node(
        &mut self,
        component: ComponentIdx,
        name: Id,
        labels: impl IntoIterator<Item = Id>,
        is_entry: bool,
        is_exit: bool,
    ) -> RsmResult<NodeIdx> {
        if is_entry && is_exit {
            return Err(Error::malformed(format!(
                "node `{name}' is declared both entry and exit"
            )));
        }
        if self.node_names.contains_key(&(component, name)) {
            return Err(Error::malformed(format!(
                "node `{name}' defined twice in component `{}'",
                self.components[component].name
            )));
        }
        let idx = self.nodes.push(NodeInfo {
            name,
            parent: component,
            labels: labels.into_iter().collect(),
            kind: NodeKind::State { is_entry, is_exit },
            successors: Vec::new(),
        });
        let comp = &mut self.components[component];
        comp.nodes.push(idx);
        if is_entry {
            comp.entries.push(idx);
        }
        if is_exit {
            comp.exits.push(idx);
        }
        self.node_names.insert((component, name), idx);
        Ok(idx)
    }

    /// Add a box referencing `callee`, selecting `call_nodes` among its
    /// entries and `return_nodes` among its exits, and create the
    /// corresponding ports inside `component`.
    pub fn add_box(
        &mut self,
        component: ComponentIdx,
        name: Id,
        callee: ComponentIdx,
        call_nodes: &[NodeIdx],
        return_nodes: &[NodeIdx],
    ) -> RsmResult<BoxIdx> {
        for &n in call_nodes {
            if !self.nodes[n].is_entry() || self.nodes[n].parent != callee {
                return Err(Error::malformed(format!(
                    "call node `{}' of box `{name}' is not an entry node of \
                     component `{}'",
                    self.nodes[n].name, self.components[callee].name
                )));
            }
        }
        for &n in return_nodes {
            if !self.nodes[n].is_exit() || self.nodes[n].parent != callee {
                return Err(Error::malformed(format!(
                    "return node `{}' of box `{name}' is not an exit node of \
                     component `{}'",
                    self.nodes[n].name, self.components[callee].name
                )));
            }
        }

        let bx = self.boxes.push(BoxDef {
            name,
            parent: component,
            callee,
            call_ports: Vec::new(),
            return_ports: Vec::new(),
        });
        self.components[component].boxes.push(bx);

        for &inner in call_nodes {
            let port = self.add_port(component, bx, inner, PortRole::Call);
            self.boxes[bx].call_ports.push(port);
        }
        for &inner in return_nodes {
            let port = self.add_port(component, bx, inner, PortRole::Return);
            self.boxes[bx].return_ports.push(port);
        }
        Ok(bx)
    }

    fn add_port(
        &mut self,
        component: ComponentIdx,
        owner: BoxIdx,
        inner: NodeIdx,
        role: PortRole,
    ) -> NodeIdx {
        let box_name = self.boxes[owner].name;
        let inner_name = self.nodes[inner].name;
        let name = Id::new(format!("{box_name}-{inner_name}"));
        let idx = self.nodes.push(NodeInfo {
            name,
            parent: component,
            labels: Default::default(),
            kind: NodeKind::Port { owner, inner, role },
            successors: Vec::new(),
        });
        self.components[component].nodes.push(idx);
        let key = (component, box_name, inner_name);
        match role {
            PortRole::Call => self.call_port_names.insert(key, idx),
            PortRole::Return => self.return_port_names.insert(key, idx),
        };
        idx
    }

    pub fn add_transition(&mut self, source: NodeIdx, target: NodeIdx) {
        self.nodes[source].successors.push(target);
    }

    pub fn set_initial(&mut self, component: ComponentIdx, node: NodeIdx) {
        self.initial = Some((component, node));
    }

    /// Create the empty-context instance of every base component, point all
    /// box mappings at them, and mark the initial instance.
    pub fn instantiate(&mut self) -> RsmResult<()> {
        let (initial_base, _) = self.initial.ok_or_else(|| {
            Error::malformed("no initial component and node declared")
        })?;

        let mut empty_instances = Vec::with_capacity(self.components.len());
        for base in self.components.keys().collect::<Vec<_>>() {
            let context = Context::empty_for(&self.components[base].exits);
            let instance = Instance::new(
                base,
                self.components[base].name,
                context.clone(),
                &self.components[base].nodes,
            );
            let idx = self.instances.push(instance);
            self.lookup.entry(base).or_default().insert(context, idx);
            self.live.push(idx);
            empty_instances.push(idx);
        }

        for (pos, &idx) in empty_instances.iter().enumerate() {
            let base = ComponentIdx::from(pos);
            for bx in self.components[base].boxes.clone() {
                let callee = self.boxes[bx].callee;
                let target = empty_instances[callee.index()];
                self.instances[idx].box_map.insert(bx, target);
            }
        }

        self.initial_instance = empty_instances[initial_base.index()];
        Ok(())
    }

    /* ============================ queries ============================= */

    pub fn node(&self, idx: NodeIdx) -> &NodeInfo {
        &self.nodes[idx]
    }

    pub fn box_def(&self, idx: BoxIdx) -> &BoxDef {
        &self.boxes[idx]
    }

    pub fn component(&self, idx: ComponentIdx) -> &BaseComponent {
        &self.components[idx]
    }

    pub fn instance(&self, idx: InstanceIdx) -> &Instance {
        &self.instances[idx]
    }

    pub fn instance_mut(&mut self, idx: InstanceIdx) -> &mut Instance {
        &mut self.instances[idx]
    }

    /// The reachable contextualised components, in ascending index order.
    pub fn live_instances(&self) -> &[InstanceIdx] {
        &self.live
    }

    pub fn initial_instance(&self) -> InstanceIdx {
        self.initial_instance
    }

    pub fn initial_node(&self) -> NodeIdx {
        self.initial
            .expect("machine has not been instantiated")
            .1
    }

    pub fn is_exit(&self, node: NodeIdx) -> bool {
        self.nodes[node].is_exit()
    }

    pub fn successors(&self, node: NodeIdx) -> &[NodeIdx] {
        &self.nodes[node].successors
    }

    /// The labels of a node. Box ports inherit the labels of the node they
    /// wrap.
    pub fn labels(&self, node: NodeIdx) -> &ahash::HashSet<Id> {
        match self.nodes[node].kind {
            NodeKind::Port { inner, .. } => &self.nodes[inner].labels,
            NodeKind::State { .. } => &self.nodes[node].labels,
        }
    }

    pub fn has_label(&self, node: NodeIdx, label: Id) -> bool {
        self.labels(node).contains(&label)
    }

    /// The successor states of `node` seen from `instance`: its
    /// intra-component successors plus, for a call port, the successors of
    /// the wrapped entry node inside the box's target instance.
    pub fn flow_successors(
        &self,
        instance: InstanceIdx,
        node: NodeIdx,
    ) -> Vec<(InstanceIdx, NodeIdx)> {
        let mut out: Vec<_> = self.nodes[node]
            .successors
            .iter()
            .map(|&s| (instance, s))
            .collect();
        if let Some((owner, inner)) = self.nodes[node].as_call_port() {
            let target = self.instances[instance].box_map[&owner];
            out.extend(
                self.nodes[inner].successors.iter().map(|&s| (target, s)),
            );
        }
        out
    }

    /// Whether `formula` is decided at every node of every live instance.
    pub fn known_everywhere(
        &self,
        formula: crate::formula::FormulaIdx,
    ) -> bool {
        self.live.iter().all(|&ci| {
            let inst = &self.instances[ci];
            self.components[inst.base]
                .nodes
                .iter()
                .all(|&n| inst.knows(n, formula))
        })
    }

    /// Total number of states over all live instances.
    pub fn state_count(&self) -> usize {
        self.live
            .iter()
            .map(|&ci| {
                self.components[self.instances[ci].base].nodes.len()
            })
            .sum()
    }

    /* ========================= name lookups =========================== */

    pub fn find_component(&self, name: Id) -> Option<ComponentIdx> {
        self.component_names.get(&name).copied()
    }

    pub fn find_node(
        &self,
        component: ComponentIdx,
        name: Id,
    ) -> Option<NodeIdx> {
        self.node_names.get(&(component, name)).copied()
    }

    pub fn find_call_port(
        &self,
        component: ComponentIdx,
        box_name: Id,
        node_name: Id,
    ) -> Option<NodeIdx> {
        self.call_port_names
            .get(&(component, box_name, node_name))
            .copied()
    }

    pub fn find_return_port(
        &self,
        component: ComponentIdx,
        box_name: Id,
        node_name: Id,
    ) -> Option<NodeIdx> {
        self.return_port_names
            .get(&(component, box_name, node_name))
            .copied()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
