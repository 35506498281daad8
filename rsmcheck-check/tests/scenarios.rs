//! End-to-end checks of small machines against CTL properties, under every
//! strategy and expansion heuristic.

use rsmcheck_check::{
    CheckConfig, Checker, ExpansionHeuristic, Strategy, logging,
};
use rsmcheck_frontend::{CtlParser, parse_rsm_str};
use rsmcheck_ir::FormulaStore;

/// Check `formula` against `rsm` under the given configuration, returning
/// the decision and the context counters.
fn run(rsm: &str, formula: &str, config: CheckConfig) -> (bool, u64, u64) {
    let mut store = FormulaStore::new();
    let root = CtlParser::parse_and_lower(formula, &mut store).unwrap();
    let mut machine = parse_rsm_str(rsm).unwrap();
    machine.remove_unreachable();
    let mut checker = Checker::new(
        &mut machine,
        &store,
        config,
        logging::discard_logger(),
    );
    let result = checker.check(root);
    (result, checker.contexts_built, checker.contexts_relabeled)
}

/// Check under lazy GetNext, the default configuration.
fn check(rsm: &str, formula: &str) -> bool {
    run(rsm, formula, CheckConfig::default()).0
}

/// Every strategy and heuristic must agree on the decision.
fn check_all_ways(rsm: &str, formula: &str) -> bool {
    let lazy = |heuristic| CheckConfig {
        strategy: Strategy::Lazy,
        heuristic,
        randomize: false,
    };
    let reference = check(rsm, formula);
    for config in [
        CheckConfig {
            strategy: Strategy::Exhaustive,
            ..Default::default()
        },
        lazy(ExpansionHeuristic::Random),
        lazy(ExpansionHeuristic::All),
        CheckConfig {
            randomize: true,
            ..Default::default()
        },
    ] {
        assert_eq!(
            run(rsm, formula, config).0,
            reference,
            "strategies disagree on {formula} under {config:?}"
        );
    }
    reference
}

/// One component, one transition into a `b`-labelled exit.
const SINGLE: &str = r#"{
    "initial_component": "M",
    "initial_node": "n0",
    "components": [
        {
            "name": "M",
            "nodes": [
                {"name": "n0", "labels": [], "is_entry": true, "is_exit": false},
                {"name": "n1", "labels": ["b"], "is_entry": false, "is_exit": true}
            ],
            "boxes": [],
            "transitions": [
                {"source": {"type": "node", "name": "n0"},
                 "targets": [{"type": "node", "name": "n1"}]}
            ]
        }
    ]
}"#;

/// `M` routes through a box calling `P`; `P` has a self-loop on its entry.
/// All nodes are labelled `a` except `m1`, which carries `M1_LABELS`.
fn recursive(m1_labels: &str) -> String {
    format!(
        r#"{{
        "initial_component": "M",
        "initial_node": "m0",
        "components": [
            {{
                "name": "M",
                "nodes": [
                    {{"name": "m0", "labels": ["a"], "is_entry": true, "is_exit": false}},
                    {{"name": "m1", "labels": [{m1_labels}], "is_entry": false, "is_exit": true}}
                ],
                "boxes": [
                    {{"name": "B", "component": "P", "call_nodes": ["p0"], "return_nodes": ["p1"]}}
                ],
                "transitions": [
                    {{"source": {{"type": "node", "name": "m0"}},
                     "targets": [{{"type": "box_node", "box_name": "B", "node_name": "p0"}}]}},
                    {{"source": {{"type": "box_node", "box_name": "B", "node_name": "p1"}},
                     "targets": [{{"type": "node", "name": "m1"}}]}}
                ]
            }},
            {{
                "name": "P",
                "nodes": [
                    {{"name": "p0", "labels": ["a"], "is_entry": true, "is_exit": false}},
                    {{"name": "p1", "labels": ["a"], "is_entry": false, "is_exit": true}}
                ],
                "boxes": [],
                "transitions": [
                    {{"source": {{"type": "node", "name": "p0"}},
                     "targets": [{{"type": "node", "name": "p0"}}, {{"type": "node", "name": "p1"}}]}}
                ]
            }}
        ]
    }}"#
    )
}

/// Two `a`-labelled nodes looping on each other, no exits.
const LOOP: &str = r#"{
    "initial_component": "M",
    "initial_node": "n0",
    "components": [
        {
            "name": "M",
            "nodes": [
                {"name": "n0", "labels": ["a"], "is_entry": true, "is_exit": false},
                {"name": "n1", "labels": ["a"], "is_entry": false, "is_exit": false}
            ],
            "boxes": [],
            "transitions": [
                {"source": {"type": "node", "name": "n0"},
                 "targets": [{"type": "node", "name": "n1"}]},
                {"source": {"type": "node", "name": "n1"},
                 "targets": [{"type": "node", "name": "n0"}]}
            ]
        }
    ]
}"#;

/// A cycle that crosses a box: `m0` enters `B`, and `B`'s return port loops
/// back to `m0`. The enclosing component has no exit, so the cycle is only
/// discoverable through double requests.
const BOX_CYCLE: &str = r#"{
    "initial_component": "M",
    "initial_node": "m0",
    "components": [
        {
            "name": "M",
            "nodes": [
                {"name": "m0", "labels": ["a"], "is_entry": true, "is_exit": false}
            ],
            "boxes": [
                {"name": "B", "component": "P", "call_nodes": ["p0"], "return_nodes": ["p1"]}
            ],
            "transitions": [
                {"source": {"type": "node", "name": "m0"},
                 "targets": [{"type": "box_node", "box_name": "B", "node_name": "p0"}]},
                {"source": {"type": "box_node", "box_name": "B", "node_name": "p1"},
                 "targets": [{"type": "node", "name": "m0"}]}
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
fn single_component_next() {
    assert!(check_all_ways(SINGLE, "E X b"));
    assert!(!check_all_ways(SINGLE, "E X a"));
}

#[test]
fn recursive_globally() {
    assert!(check_all_ways(&recursive(r#""a""#), "E G a"));
    assert!(!check_all_ways(&recursive(r#""a""#), "E G b"));
}

#[test]
fn until_across_a_box() {
    assert!(check_all_ways(&recursive(r#""b""#), "E (a U b)"));
}

#[test]
fn until_across_a_box_unpacks_once() {
    let (result, built, relabeled) =
        run(&recursive(r#""b""#), "E (a U b)", CheckConfig::default());
    assert!(result);
    // the initial context plus exactly one box unpacking
    assert_eq!(built, 2);
    assert_eq!(relabeled, 0);
}

#[test]
fn negated_existential() {
    assert!(check_all_ways(SINGLE, "~E X a"));
    assert!(!check_all_ways(SINGLE, "~E X b"));
}

#[test]
fn cycle_resolves_globally_to_true() {
    assert!(check_all_ways(LOOP, "E G a"));
}

#[test]
fn cycle_resolves_until_to_false() {
    assert!(!check_all_ways(LOOP, "E (a U b)"));
}

#[test]
fn cycle_through_a_box_resolves_globally() {
    assert!(check_all_ways(BOX_CYCLE, "E G a"));
    assert!(!check_all_ways(BOX_CYCLE, "E G b"));
}

#[test]
fn cycle_through_a_box_resolves_until_to_false() {
    assert!(!check_all_ways(BOX_CYCLE, "E (a U b)"));
}

#[test]
fn boolean_and_universal_properties() {
    assert!(check_all_ways(SINGLE, "true"));
    assert!(!check_all_ways(SINGLE, "false"));
    assert!(check_all_ways(SINGLE, "A X b"));
    // the self-loop on p0 admits a path on which `b` never holds
    assert!(!check_all_ways(&recursive(r#""b""#), "A (a U b)"));
    assert!(check_all_ways(LOOP, "A G a"));
    assert!(!check_all_ways(LOOP, "A F b"));
}

#[test]
fn repeated_checks_are_deterministic() {
    let rsm = recursive(r#""b""#);
    let first = run(&rsm, "E (a U b)", CheckConfig::default());
    for _ in 0..3 {
        assert_eq!(run(&rsm, "E (a U b)", CheckConfig::default()), first);
    }
}
