//! Parser for the JSON machine description.

use rsmcheck_ir::Machine;
use rsmcheck_utils::{Error, Id, RsmResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct RsmFile {
    initial_component: String,
    initial_node: String,
    components: Vec<ComponentDef>,
}

#[derive(Deserialize)]
struct ComponentDef {
    name: String,
    nodes: Vec<NodeDef>,
    boxes: Vec<BoxDef>,
    transitions: Vec<TransitionDef>,
}

#[derive(Deserialize)]
struct NodeDef {
    name: String,
    labels: Vec<String>,
    is_entry: bool,
    is_exit: bool,
}

#[derive(Deserialize)]
struct BoxDef {
    name: String,
    component: String,
    call_nodes: Vec<String>,
    return_nodes: Vec<String>,
}

#[derive(Deserialize)]
struct TransitionDef {
    source: EndpointDef,
    targets: Vec<EndpointDef>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum EndpointDef {
    #[serde(rename = "node")]
    Node { name: String },
    #[serde(rename = "box_node")]
    BoxNode {
        box_name: String,
        node_name: String,
    },
}

/// Parse a machine description file.
pub fn parse_rsm(path: &Path) -> RsmResult<Machine> {
    let content = fs::read_to_string(path).map_err(|err| {
        Error::invalid_file(format!(
            "Failed to read {}: {err}",
            path.to_string_lossy(),
        ))
    })?;
    parse_rsm_str(&content)
}

/// Parse a machine description from a JSON string.
pub fn parse_rsm_str(content: &str) -> RsmResult<Machine> {
    let file: RsmFile = serde_json::from_str(content)?;
    build(&file)
}

fn resolve_nodes(
    machine: &Machine,
    callee: rsmcheck_ir::ComponentIdx,
    bx: &BoxDef,
    names: &[String],
) -> RsmResult<Vec<rsmcheck_ir::NodeIdx>> {
    names
        .iter()
        .map(|n| {
            machine.find_node(callee, Id::new(n)).ok_or_else(|| {
                Error::malformed(format!(
                    "box `{}' references invalid node `{n}' in component \
                     `{}'",
                    bx.name, bx.component
                ))
            })
        })
        .collect()
}

fn build(file: &RsmFile) -> RsmResult<Machine> {
    let mut machine = Machine::new();

    // components and their nodes first, so that boxes can resolve
    // forward references between components
    for def in &file.components {
        machine.add_component(Id::new(&def.name))?;
    }
    for def in &file.components {
        let comp = machine.find_component(Id::new(&def.name)).unwrap();
        for node in &def.nodes {
            machine.add_node(
                comp,
                Id::new(&node.name),
                node.labels.iter().map(Id::new),
                node.is_entry,
                node.is_exit,
            )?;
        }
    }

    for def in &file.components {
        let comp = machine.find_component(Id::new(&def.name)).unwrap();
        for bx in &def.boxes {
            let callee =
                machine.find_component(Id::new(&bx.component)).ok_or_else(
                    || {
                        Error::malformed(format!(
                            "box `{}' references unknown component `{}'",
                            bx.name, bx.component
                        ))
                    },
                )?;
            let call_nodes = resolve_nodes(&machine, callee, bx, &bx.call_nodes)?;
            let return_nodes =
                resolve_nodes(&machine, callee, bx, &bx.return_nodes)?;
            machine.add_box(
                comp,
                Id::new(&bx.name),
                callee,
                &call_nodes,
                &return_nodes,
            )?;
        }
    }

    for def in &file.components {
        let comp = machine.find_component(Id::new(&def.name)).unwrap();
        for trans in &def.transitions {
            let source = match &trans.source {
                EndpointDef::Node { name } => machine
                    .find_node(comp, Id::new(name))
                    .ok_or_else(|| {
                        Error::malformed(format!(
                            "source node of transition not found: `{name}' \
                             in component `{}'",
                            def.name
                        ))
                    })?,
                EndpointDef::BoxNode {
                    box_name,
                    node_name,
                } => {
                    // a return port with no outgoing transitions is allowed
                    // to appear with an empty target list
                    if trans.targets.is_empty() {
                        continue;
                    }
                    machine
                        .find_return_port(
                            comp,
                            Id::new(box_name),
                            Id::new(node_name),
                        )
                        .ok_or_else(|| {
                            Error::malformed(format!(
                                "source node of transition not found: \
                                 `{box_name}-{node_name}' in component `{}'",
                                def.name
                            ))
                        })?
                }
            };
            for target in &trans.targets {
                let target = match target {
                    EndpointDef::Node { name } => machine
                        .find_node(comp, Id::new(name))
                        .ok_or_else(|| {
                            Error::malformed(format!(
                                "target node of transition not found: \
                                 `{name}' in component `{}'",
                                def.name
                            ))
                        })?,
                    EndpointDef::BoxNode {
                        box_name,
                        node_name,
                    } => machine
                        .find_call_port(
                            comp,
                            Id::new(box_name),
                            Id::new(node_name),
                        )
                        .ok_or_else(|| {
                            Error::malformed(format!(
                                "target node of transition not found: \
                                 `{box_name}-{node_name}' in component `{}'",
                                def.name
                            ))
                        })?,
                };
                machine.add_transition(source, target);
            }
        }
    }

    let initial_component = machine
        .find_component(Id::new(&file.initial_component))
        .ok_or_else(|| {
            Error::malformed(format!(
                "initial component `{}' is not defined",
                file.initial_component
            ))
        })?;
    let initial_node = machine
        .find_node(initial_component, Id::new(&file.initial_node))
        .ok_or_else(|| {
            Error::malformed(format!(
                "initial node `{}' is not defined in component `{}'",
                file.initial_node, file.initial_component
            ))
        })?;
    machine.set_initial(initial_component, initial_node);
    machine.instantiate()?;
    Ok(machine)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_COMPONENT: &str = r#"{
        "initial_component": "M",
        "initial_node": "m0",
        "components": [
            {
                "name": "M",
                "nodes": [
                    {"name": "m0", "labels": ["a"], "is_entry": true, "is_exit": false},
                    {"name": "m1", "labels": ["b"], "is_entry": false, "is_exit": true}
                ],
                "boxes": [
                    {"name": "B", "component": "P", "call_nodes": ["p0"], "return_nodes": ["p1"]}
                ],
                "transitions": [
                    {"source": {"type": "node", "name": "m0"},
                     "targets": [{"type": "box_node", "box_name": "B", "node_name": "p0"}]},
                    {"source": {"type": "box_node", "box_name": "B", "node_name": "p1"},
                     "targets": [{"type": "node", "name": "m1"}]}
                ]
            },
            {
                "name": "P",
                "nodes": [
                    {"name": "p0", "labels": ["a"], "is_entry": true, "is_exit": false},
                    {"name": "p1", "labels": ["a"], "is_entry": false, "is_exit": true}
                ],
                "boxes": [],
                "transitions": [
                    {"source": {"type": "node", "name": "p0"},
                     "targets": [{"type": "node", "name": "p1"}]}
                ]
            }
        ]
    }"#;

    #[test]
    fn builds_components_boxes_and_ports() {
        let machine = parse_rsm_str(TWO_COMPONENT).unwrap();
        let m = machine.find_component(Id::new("M")).unwrap();
        let p = machine.find_component(Id::new("P")).unwrap();

        // M has two states plus the two ports of B
        assert_eq!(machine.component(m).nodes.len(), 4);
        assert_eq!(machine.component(p).nodes.len(), 2);
        assert_eq!(machine.component(m).boxes.len(), 1);

        let call = machine
            .find_call_port(m, Id::new("B"), Id::new("p0"))
            .unwrap();
        let ret = machine
            .find_return_port(m, Id::new("B"), Id::new("p1"))
            .unwrap();
        // ports inherit the labels of the node they wrap
        assert!(machine.has_label(call, Id::new("a")));
        assert!(machine.has_label(ret, Id::new("a")));

        let m0 = machine.find_node(m, Id::new("m0")).unwrap();
        assert_eq!(machine.successors(m0), &[call]);
        assert_eq!(machine.initial_node(), m0);

        // one empty-context instance per component, wired through the box
        assert_eq!(machine.live_instances().len(), 2);
        let mi = machine.initial_instance();
        let bx = machine.component(m).boxes[0];
        let target = machine.instance(mi).box_map[&bx];
        assert_eq!(machine.instance(target).base, p);
    }

    #[test]
    fn rejects_dangling_references() {
        let bad = TWO_COMPONENT.replace("\"component\": \"P\"", "\"component\": \"Q\"");
        assert!(parse_rsm_str(&bad).is_err());

        let bad = TWO_COMPONENT.replace("\"initial_node\": \"m0\"", "\"initial_node\": \"zz\"");
        assert!(parse_rsm_str(&bad).is_err());
    }

    #[test]
    fn rejects_entry_exit_overlap() {
        let bad = TWO_COMPONENT.replace(
            "{\"name\": \"m0\", \"labels\": [\"a\"], \"is_entry\": true, \"is_exit\": false}",
            "{\"name\": \"m0\", \"labels\": [\"a\"], \"is_entry\": true, \"is_exit\": true}",
        );
        assert!(parse_rsm_str(&bad).is_err());
    }

    #[test]
    fn rejects_call_node_that_is_not_an_entry() {
        let bad = TWO_COMPONENT.replace(
            "\"call_nodes\": [\"p0\"]",
            "\"call_nodes\": [\"p1\"]",
        );
        assert!(parse_rsm_str(&bad).is_err());
    }
}
