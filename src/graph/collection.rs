//! The node store: owns every node of a funnel keyed by unique name,
//! validates formula definitions, ranks nodes by dependency depth and
//! re-evaluates all calculated values in rank order.

use std::collections::{HashMap, HashSet};

use crate::error::{FunnelError, Result, StuckNode};
use crate::formula;
use crate::graph::node::{Node, NodeKind, NodeRecord};

/// An insertion-ordered collection of funnel nodes.
///
/// Nodes live in a `Vec` whose order doubles as the evaluation order once
/// [`NodesCollection::rank_nodes`] has sorted it by ascending rank (stable,
/// so ties keep insertion order). The name index is rebuilt after every
/// structural mutation.
#[derive(Debug, Clone, Default)]
pub struct NodesCollection {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Adds a batch of node records, then re-validates and re-ranks the
    /// entire store, not just the new nodes.
    ///
    /// Validation runs after all records have been inserted, so a failing
    /// batch leaves the store partially mutated. There is no rollback;
    /// callers must rebuild or replace the store rather than retry.
    pub fn add_nodes(&mut self, records: Vec<NodeRecord>) -> Result<()> {
        for record in records {
            let node = Node::from_record(record)?;
            self.insert(node);
        }
        self.validate_definitions()?;
        self.rank_nodes()
    }

    /// Inserting a name that already exists replaces the stored node.
    fn insert(&mut self, node: Node) {
        match self.index.get(node.name()) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.name().to_string(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name().to_string(), i))
            .collect();
    }

    /// Removes a node by name. Dependents are not re-checked here; a dangling
    /// reference surfaces on the next `add_nodes` or `refresh`.
    pub fn remove_node(&mut self, name: &str) -> Result<()> {
        let Some(idx) = self.index.remove(name) else {
            return Err(FunnelError::NodeNotFound { name: name.into() });
        };
        self.nodes.remove(idx);
        self.rebuild_index();
        Ok(())
    }

    pub fn get_node(&self, name: &str) -> Result<&Node> {
        match self.index.get(name) {
            Some(&i) => Ok(&self.nodes[i]),
            None => Err(FunnelError::NodeNotFound { name: name.into() }),
        }
    }

    pub fn get_node_mut(&mut self, name: &str) -> Result<&mut Node> {
        match self.index.get(name).copied() {
            Some(i) => Ok(&mut self.nodes[i]),
            None => Err(FunnelError::NodeNotFound { name: name.into() }),
        }
    }

    pub fn input_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_input()).collect()
    }

    pub fn calculated_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_calculated()).collect()
    }

    pub fn kpi_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_kpi()).collect()
    }

    /// Name → long name, for relabeling rows in summary output.
    pub fn nodes_mapping(&self) -> HashMap<String, String> {
        self.nodes
            .iter()
            .map(|n| (n.name().to_string(), n.meta.long_name.clone()))
            .collect()
    }

    /// Nodes never referenced inside any calculated definition — terminal
    /// KPIs and genuinely dead inputs.
    pub fn unused_nodes(&self) -> Vec<&Node> {
        let mut used: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if let NodeKind::Calculated { definition, .. } = &node.kind {
                used.extend(formula::identifiers(definition));
            }
        }
        self.nodes
            .iter()
            .filter(|n| !used.contains(n.name()))
            .collect()
    }

    /// Checks every calculated definition: identifiers must resolve to a
    /// store key or a numeric literal, and every character must come from the
    /// allowed arithmetic set.
    pub fn validate_definitions(&self) -> Result<()> {
        for node in &self.nodes {
            let NodeKind::Calculated { definition, .. } = &node.kind else {
                continue;
            };
            for variable in formula::identifiers(definition) {
                if !formula::is_literal(variable) && !self.index.contains_key(variable) {
                    return Err(FunnelError::UnknownVariable {
                        node: node.name().to_string(),
                        variable: variable.to_string(),
                    });
                }
            }
            for character in definition.chars() {
                if !(character.is_alphanumeric()
                    || character.is_whitespace()
                    || character == '_'
                    || "+-*/()".contains(character))
                {
                    return Err(FunnelError::InvalidCharacter {
                        node: node.name().to_string(),
                        character,
                    });
                }
            }
        }
        Ok(())
    }

    /// Assigns every node its topological rank and reorders the store by it.
    ///
    /// Inputs get rank 0. Calculated nodes are ranked in passes: a node takes
    /// rank R in pass R once every identifier in its definition is a literal
    /// or a node already ranked below R. Nodes still unranked when the passes
    /// stop making progress form a cycle or reference something unrankable,
    /// and are reported together with their raw definitions.
    pub fn rank_nodes(&mut self) -> Result<()> {
        let mut ranked: HashMap<String, u32> = HashMap::new();
        for node in &mut self.nodes {
            if node.is_input() {
                node.rank = 0;
                ranked.insert(node.name().to_string(), 0);
            }
        }

        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_calculated())
            .map(|(i, _)| i)
            .collect();
        let max_passes = pending.len() as u32;

        for rank in 1..=max_passes {
            if pending.is_empty() {
                break;
            }
            let mut remaining = Vec::with_capacity(pending.len());
            let mut assigned = Vec::new();
            for &idx in &pending {
                let node = &self.nodes[idx];
                let Some(definition) = node.definition() else {
                    continue;
                };
                let ready = formula::identifiers(definition).all(|ident| {
                    formula::is_literal(ident) || ranked.get(ident).is_some_and(|&r| r < rank)
                });
                if ready {
                    assigned.push(idx);
                } else {
                    remaining.push(idx);
                }
            }
            if assigned.is_empty() {
                // Fixpoint: later passes cannot resolve anything new.
                pending = remaining;
                break;
            }
            for idx in assigned {
                self.nodes[idx].rank = rank;
                ranked.insert(self.nodes[idx].name().to_string(), rank);
            }
            pending = remaining;
        }

        if !pending.is_empty() {
            let stuck = pending
                .iter()
                .map(|&idx| StuckNode {
                    name: self.nodes[idx].name().to_string(),
                    definition: self.nodes[idx].definition().unwrap_or_default().to_string(),
                })
                .collect();
            return Err(FunnelError::UnresolvableDependencies { stuck });
        }

        // Fix the evaluation order: ascending rank, insertion order on ties.
        self.nodes.sort_by_key(|node| node.rank);
        self.rebuild_index();
        Ok(())
    }

    /// Re-ranks the store and re-evaluates every calculated node in rank
    /// order against the current input values.
    pub fn refresh(&mut self) -> Result<()> {
        self.rank_nodes()?;

        if !self.nodes.iter().any(|n| n.is_kpi()) {
            tracing::warn!("no calculated node in the collection is flagged as a KPI");
        }

        for idx in 0..self.nodes.len() {
            let (name, definition) = match &self.nodes[idx].kind {
                NodeKind::Calculated { definition, .. } => (
                    self.nodes[idx].name().to_string(),
                    definition.clone(),
                ),
                NodeKind::Input { .. } => continue,
            };

            // Bind every referenced identifier that currently holds a value;
            // identifiers without one are left out and surface as evaluation
            // errors if the expression actually needs them.
            let mut bindings = HashMap::new();
            for ident in formula::identifiers(&definition) {
                if let Some(&i) = self.index.get(ident) {
                    if let Some(value) = self.nodes[i].value {
                        bindings.insert(ident.to_string(), value);
                    }
                }
            }

            let expr = formula::parse_definition(&definition).map_err(|e| e.for_node(&name))?;
            let value = formula::evaluate(&expr, &bindings).map_err(|e| e.for_node(&name))?;
            tracing::debug!(node = %name, value, "evaluated calculated node");
            self.nodes[idx].set_value(Some(value))?;
        }
        Ok(())
    }

    /// Sets input-node values from a name → value map.
    ///
    /// With `lookup` the value is an ordinal selector {0, 1, 2} picking the
    /// node's low/mid/high range entry; nodes without a range ignore the
    /// selector and keep their current value. Without `lookup` the value is
    /// assigned directly. Calculated nodes cannot be set either way.
    pub fn set_node_values(&mut self, values: &HashMap<String, f64>, lookup: bool) -> Result<()> {
        for (name, &selector) in values {
            let node = self.get_node_mut(name)?;
            match &node.kind {
                NodeKind::Calculated { .. } => {
                    return Err(FunnelError::AssignToCalculated { node: name.clone() });
                }
                NodeKind::Input { range } => {
                    if !lookup {
                        node.value = Some(selector);
                    } else if let Some(range) = range {
                        if selector.fract() != 0.0 || !(0.0..=2.0).contains(&selector) {
                            return Err(FunnelError::InvalidSelector {
                                node: name.clone(),
                                selector,
                            });
                        }
                        node.value = Some(range.select(selector as usize));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resets every input that has an uncertainty range back to its mid
    /// value, then re-evaluates the funnel.
    pub fn reset_input_nodes(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            if let NodeKind::Input { range: Some(range) } = &node.kind {
                node.value = Some(range.mid);
            }
        }
        self.refresh()
    }

    /// Flattens the store into wire records.
    pub fn serialize(&self) -> Vec<NodeRecord> {
        self.nodes.iter().map(Node::to_record).collect()
    }

    /// Replaces the entire store from wire records, re-running the usual
    /// batch validation and ranking.
    pub fn deserialize(&mut self, records: Vec<NodeRecord>) -> Result<()> {
        self.nodes.clear();
        self.index.clear();
        self.add_nodes(records)
    }

    pub fn to_json_str(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.serialize()).map_err(|_| FunnelError::InvalidJson)
    }

    pub fn from_json_str(&mut self, json: &str) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|_| FunnelError::InvalidJson)?;
        if !value.is_array() {
            return Err(FunnelError::JsonNotAList);
        }
        let records: Vec<NodeRecord> =
            serde_json::from_value(value).map_err(|_| FunnelError::InvalidJson)?;
        self.deserialize(records)
    }
}

impl std::fmt::Display for NodesCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NodesCollection with {} nodes: {} input nodes and {} calculated nodes.",
            self.nodes.len(),
            self.input_nodes().len(),
            self.calculated_nodes().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write as _;

    fn funnel_records() -> Vec<NodeRecord> {
        vec![
            NodeRecord::input("total_users", 1_000_000.0),
            NodeRecord::input("subscribe_share", 0.2),
            NodeRecord::input("ctr", 0.01),
            NodeRecord::input("buy_rate", 0.005),
            NodeRecord::calculated("total_subscribers", "total_users * subscribe_share"),
            NodeRecord::calculated("total_clicks", "total_subscribers * ctr"),
            NodeRecord::calculated("total_buys", "total_clicks * buy_rate").kpi(),
        ]
    }

    #[test]
    fn test_add_single_node() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0)])
            .unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get_node("node1").unwrap().value, Some(10.0));
    }

    #[test]
    fn test_get_nonexistent_node() {
        let collection = NodesCollection::new();
        assert_eq!(
            collection.get_node("nonexistent_node"),
            Err(FunnelError::NodeNotFound {
                name: "nonexistent_node".into()
            })
        );
    }

    #[test]
    fn test_remove_node() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0)])
            .unwrap();
        collection.remove_node("node1").unwrap();
        assert!(collection.is_empty());
        assert!(collection.remove_node("node1").is_err());
    }

    #[test]
    fn test_adding_same_name_replaces_node() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0)])
            .unwrap();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 99.0)])
            .unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get_node("node1").unwrap().value, Some(99.0));
    }

    #[test]
    fn test_set_node_values_lookup_and_direct() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0).with_range(5.0, 10.0, 15.0)])
            .unwrap();

        let mid = HashMap::from([("node1".to_string(), 1.0)]);
        collection.set_node_values(&mid, true).unwrap();
        assert_eq!(collection.get_node("node1").unwrap().value, Some(10.0));

        let direct = HashMap::from([("node1".to_string(), 100.0)]);
        collection.set_node_values(&direct, false).unwrap();
        assert_eq!(collection.get_node("node1").unwrap().value, Some(100.0));
    }

    #[test]
    fn test_set_node_values_unknown_node() {
        let mut collection = NodesCollection::new();
        let values = HashMap::from([("nonexistent_node".to_string(), 1.0)]);
        assert_eq!(
            collection.set_node_values(&values, true),
            Err(FunnelError::NodeNotFound {
                name: "nonexistent_node".into()
            })
        );
    }

    #[test]
    fn test_set_node_values_rejects_calculated_target() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::calculated("node1", "1+1")])
            .unwrap();
        let values = HashMap::from([("node1".to_string(), 1.0)]);
        let err = collection.set_node_values(&values, true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set value for calculated node 'node1'."
        );
    }

    #[test]
    fn test_set_node_values_invalid_lookup_selector() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0).with_range(5.0, 10.0, 15.0)])
            .unwrap();
        let values = HashMap::from([("node1".to_string(), 5.0)]);
        let err = collection.set_node_values(&values, true).unwrap_err();
        assert!(err.to_string().ends_with("Got 5"));
    }

    #[test]
    fn test_set_node_values_lookup_without_range_is_a_no_op() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("node1", 10.0)])
            .unwrap();
        let values = HashMap::from([("node1".to_string(), 2.0)]);
        collection.set_node_values(&values, true).unwrap();
        assert_eq!(collection.get_node("node1").unwrap().value, Some(10.0));
    }

    #[rstest]
    #[case("node1 + 2")]
    #[case("node1 * (node1 - 7)")]
    #[case("node1/2 + 10")]
    fn test_validate_definitions_accepts(#[case] definition: &str) {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", definition),
            ])
            .unwrap();
    }

    #[test]
    fn test_validate_definitions_unknown_variable() {
        let mut collection = NodesCollection::new();
        let err = collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", "node1 + nodeX"),
            ])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable 'nodeX' in node 'node2' is not a valid input node."
        );
    }

    #[rstest]
    #[case("node1 @ 2", '@')]
    #[case("node1 + 2$", '$')]
    #[case("node1 = 2", '=')]
    fn test_validate_definitions_invalid_character(
        #[case] definition: &str,
        #[case] character: char,
    ) {
        let mut collection = NodesCollection::new();
        let err = collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", definition),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            FunnelError::InvalidCharacter {
                node: "node2".into(),
                character
            }
        );
    }

    #[test]
    fn test_rank_nodes_chain() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", "node1 * 2"),
                NodeRecord::calculated("node3", "node2 + 5"),
            ])
            .unwrap();
        assert_eq!(collection.get_node("node1").unwrap().rank, 0);
        assert_eq!(collection.get_node("node2").unwrap().rank, 1);
        assert_eq!(collection.get_node("node3").unwrap().rank, 2);
    }

    #[test]
    fn test_rank_nodes_diamond() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("a", 1.0),
                NodeRecord::calculated("b", "a + 1"),
                NodeRecord::calculated("c", "a * 2"),
                NodeRecord::calculated("d", "b + c"),
            ])
            .unwrap();
        assert_eq!(collection.get_node("b").unwrap().rank, 1);
        assert_eq!(collection.get_node("c").unwrap().rank, 1);
        assert_eq!(collection.get_node("d").unwrap().rank, 2);
    }

    #[test]
    fn test_rank_nodes_orders_store_for_evaluation() {
        let mut collection = NodesCollection::new();
        // Deliberately inserted downstream-first.
        collection
            .add_nodes(vec![
                NodeRecord::calculated("late", "early * 2"),
                NodeRecord::input("early", 1.0),
            ])
            .unwrap();
        let order: Vec<&str> = collection.iter().map(Node::name).collect();
        assert_eq!(order, vec!["early", "late"]);
    }

    #[test]
    fn test_rank_nodes_detects_cycle() {
        let mut collection = NodesCollection::new();
        let err = collection
            .add_nodes(vec![
                NodeRecord::calculated("x", "y + 1"),
                NodeRecord::calculated("y", "x * 2"),
            ])
            .unwrap_err();
        match err {
            FunnelError::UnresolvableDependencies { stuck } => {
                assert!(!stuck.is_empty());
                let msg = FunnelError::UnresolvableDependencies { stuck }.to_string();
                assert!(msg.contains("Unresolvable dependencies"));
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn test_refresh_end_to_end_funnel() {
        let mut collection = NodesCollection::new();
        collection.add_nodes(funnel_records()).unwrap();
        collection.refresh().unwrap();
        assert_eq!(
            collection.get_node("total_subscribers").unwrap().value,
            Some(200_000.0)
        );
        assert_eq!(
            collection.get_node("total_clicks").unwrap().value,
            Some(2_000.0)
        );
        assert_eq!(collection.get_node("total_buys").unwrap().value, Some(10.0));
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut collection = NodesCollection::new();
        collection.add_nodes(funnel_records()).unwrap();
        collection.refresh().unwrap();
        let first: Vec<Option<f64>> = collection.iter().map(|n| n.value).collect();
        collection.refresh().unwrap();
        let second: Vec<Option<f64>> = collection.iter().map(|n| n.value).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_refresh_literal_only_definition() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::calculated("node1", "1+1")])
            .unwrap();
        collection.refresh().unwrap();
        assert_eq!(collection.get_node("node1").unwrap().value, Some(2.0));
    }

    #[test]
    fn test_refresh_division_by_zero() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("a", 1.0),
                NodeRecord::input("b", 0.0),
                NodeRecord::calculated("ratio", "a / b"),
            ])
            .unwrap();
        assert_eq!(
            collection.refresh(),
            Err(FunnelError::DivisionByZero {
                node: "ratio".into()
            })
        );
    }

    #[test]
    fn test_refresh_malformed_definition() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("a", 1.0),
                NodeRecord::calculated("bad", "a (2"),
            ])
            .unwrap();
        assert!(matches!(
            collection.refresh(),
            Err(FunnelError::MalformedDefinition { .. })
        ));
    }

    #[test]
    fn test_dangling_reference_caught_on_refresh_after_removal() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("a", 1.0),
                NodeRecord::calculated("b", "a * 2"),
            ])
            .unwrap();
        collection.remove_node("a").unwrap();
        assert!(matches!(
            collection.refresh(),
            Err(FunnelError::UnresolvableDependencies { .. })
        ));
    }

    #[test]
    fn test_reset_input_nodes_restores_mid_values() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("input1", 10.0).with_range(8.0, 10.0, 12.0),
                NodeRecord::input("fixed", 3.0),
                NodeRecord::calculated("output1", "input1 * 2").kpi(),
            ])
            .unwrap();
        let values = HashMap::from([("input1".to_string(), 2.0)]);
        collection.set_node_values(&values, true).unwrap();
        collection.refresh().unwrap();
        assert_eq!(collection.get_node("output1").unwrap().value, Some(24.0));

        collection.reset_input_nodes().unwrap();
        assert_eq!(collection.get_node("input1").unwrap().value, Some(10.0));
        // Inputs without a range are untouched.
        assert_eq!(collection.get_node("fixed").unwrap().value, Some(3.0));
        assert_eq!(collection.get_node("output1").unwrap().value, Some(20.0));
    }

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let mut collection = NodesCollection::new();
        collection.add_nodes(funnel_records()).unwrap();
        collection.refresh().unwrap();

        let records = collection.serialize();
        let mut restored = NodesCollection::new();
        restored.deserialize(records).unwrap();

        assert_eq!(restored.len(), collection.len());
        for node in collection.iter() {
            let twin = restored.get_node(node.name()).unwrap();
            assert_eq!(twin.kind, node.kind);
            assert_eq!(twin.value, node.value);
            assert_eq!(twin.rank, node.rank);
        }
    }

    #[test]
    fn test_to_json_str_contains_nodes() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", "node1 * 2"),
            ])
            .unwrap();
        let json = collection.to_json_str().unwrap();
        assert!(json.contains("node1"));
        assert!(json.contains("node2"));
        assert!(json.contains("definition"));
    }

    #[test]
    fn test_from_json_str_success() {
        let json = r#"
        [
            {
                "name": "nodeA",
                "format_str": "",
                "node_type": "input",
                "value": 5,
                "is_kpi": false,
                "readable_large_number": false
            },
            {
                "name": "nodeB",
                "format_str": "",
                "node_type": "calculation",
                "definition": "nodeA * 10",
                "is_kpi": true,
                "readable_large_number": false
            }
        ]
        "#;
        let mut collection = NodesCollection::new();
        collection.from_json_str(json).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get_node("nodeA").unwrap().value, Some(5.0));
        assert_eq!(
            collection.get_node("nodeB").unwrap().definition(),
            Some("nodeA * 10")
        );
        assert!(collection.get_node("nodeB").unwrap().is_kpi());
    }

    #[test]
    fn test_from_json_str_invalid_json() {
        let mut collection = NodesCollection::new();
        assert_eq!(
            collection.from_json_str("invalid json"),
            Err(FunnelError::InvalidJson)
        );
    }

    #[test]
    fn test_from_json_str_not_a_list() {
        let mut collection = NodesCollection::new();
        assert_eq!(
            collection.from_json_str(r#"{"name": "node1"}"#),
            Err(FunnelError::JsonNotAList)
        );
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let mut collection = NodesCollection::new();
        collection.add_nodes(funnel_records()).unwrap();
        let json = collection.to_json_str().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let read_back = std::fs::read_to_string(file.path()).unwrap();

        let mut restored = NodesCollection::new();
        restored.from_json_str(&read_back).unwrap();
        assert_eq!(restored.len(), collection.len());
    }

    #[test]
    fn test_unused_nodes() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![
                NodeRecord::input("node1", 10.0),
                NodeRecord::calculated("node2", "node1 * 2"),
                NodeRecord::input("node3", 5.0),
            ])
            .unwrap();
        // Rank order puts both inputs ahead of the calculated node.
        let unused: Vec<&str> = collection.unused_nodes().iter().map(|n| n.name()).collect();
        assert_eq!(unused, vec!["node3", "node2"]);
    }

    #[test]
    fn test_nodes_mapping_uses_long_names() {
        let mut collection = NodesCollection::new();
        collection
            .add_nodes(vec![NodeRecord::input("total_users", 10.0)])
            .unwrap();
        let mapping = collection.nodes_mapping();
        assert_eq!(mapping["total_users"], "Total Users");
    }

    #[test]
    fn test_display_summary() {
        let mut collection = NodesCollection::new();
        collection.add_nodes(funnel_records()).unwrap();
        assert_eq!(
            collection.to_string(),
            "NodesCollection with 7 nodes: 4 input nodes and 3 calculated nodes."
        );
    }
}
