//! Core structures describing the static shape of a recursive state machine.

use ahash::HashSet;
use rsmcheck_utils::{GetName, Id};

/// The identifier for a base component.
#[derive(Debug, Eq, Copy, Clone, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentIdx(u32);
crate::impl_index!(ComponentIdx);

/// The identifier for a node. Nodes of all components, including the
/// synthetic box ports, share one arena.
#[derive(Debug, Eq, Copy, Clone, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(u32);
crate::impl_index!(NodeIdx);

/// The identifier for a box.
#[derive(Debug, Eq, Copy, Clone, PartialEq, Hash, PartialOrd, Ord)]
pub struct BoxIdx(u32);
crate::impl_index!(BoxIdx);

/// The identifier for a contextualised component.
#[derive(Debug, Eq, Copy, Clone, PartialEq, Hash, PartialOrd, Ord)]
pub struct InstanceIdx(u32);
crate::impl_index!(InstanceIdx);

/// Which side of a box a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// The port wraps an entry node of the referenced component.
    Call,
    /// The port wraps an exit node of the referenced component.
    Return,
}

/// What a node is: an ordinary state, or the call/return port of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    State {
        is_entry: bool,
        is_exit: bool,
    },
    /// A synthetic node acting as the local view of `inner` (an entry or
    /// exit node of the component `owner` references).
    Port {
        owner: BoxIdx,
        inner: NodeIdx,
        role: PortRole,
    },
}

/// A node together with its labels and outgoing transitions.
///
/// Box ports carry no labels of their own; they inherit the label set of the
/// node they wrap (resolved through [`Machine::labels`]).
///
/// [`Machine::labels`]: crate::Machine::labels
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: Id,
    pub parent: ComponentIdx,
    pub labels: HashSet<Id>,
    pub kind: NodeKind,
    pub successors: Vec<NodeIdx>,
}

impl NodeInfo {
    pub fn is_entry(&self) -> bool {
        matches!(self.kind, NodeKind::State { is_entry: true, .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, NodeKind::State { is_exit: true, .. })
    }

    /// The box and wrapped entry node, if this is a call port.
    pub fn as_call_port(&self) -> Option<(BoxIdx, NodeIdx)> {
        match self.kind {
            NodeKind::Port {
                owner,
                inner,
                role: PortRole::Call,
            } => Some((owner, inner)),
            _ => None,
        }
    }
}

impl GetName for NodeInfo {
    fn name(&self) -> Id {
        self.name
    }
}

/// A call site embedded in a base component.
#[derive(Debug, Clone)]
pub struct BoxDef {
    pub name: Id,
    pub parent: ComponentIdx,
    /// The component this box references.
    pub callee: ComponentIdx,
    /// Ports wrapping the selected entry nodes of the callee.
    pub call_ports: Vec<NodeIdx>,
    /// Ports wrapping the selected exit nodes of the callee.
    pub return_ports: Vec<NodeIdx>,
}

impl GetName for BoxDef {
    fn name(&self) -> Id {
        self.name
    }
}

/// The context-free skeleton of one procedure-like unit.
#[derive(Debug, Clone)]
pub struct BaseComponent {
    pub name: Id,
    /// All nodes of the component, box ports included, in creation order.
    pub nodes: Vec<NodeIdx>,
    pub boxes: Vec<BoxIdx>,
    pub entries: Vec<NodeIdx>,
    pub exits: Vec<NodeIdx>,
}

impl GetName for BaseComponent {
    fn name(&self) -> Id {
        self.name
    }
}
