//! DAG validation and topological ordering over a [`WorkflowTemplate`].

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::WorkflowError;
use crate::model::{Edge, Node, WorkflowTemplate, MAX_NODES, MAX_NODE_ID_LEN};

/// Validated, analyzable view over a template's graph shape.
///
/// Built once at admission time ([`TemplateGraph::build`]) and retained in
/// a run's `_meta` for fast lookups during scheduling.
#[derive(Debug, Clone)]
pub struct TemplateGraph {
    pub order: Vec<String>,
    pub node_map: HashMap<String, Node>,
    pub incoming_edges: HashMap<String, Vec<Edge>>,
    pub outgoing_edges: HashMap<String, Vec<Edge>>,
}

impl TemplateGraph {
    /// Validate `template` and compute its topological order.
    ///
    /// # Errors
    /// Returns [`WorkflowError`] for duplicate node ids, over-length ids,
    /// too many/zero nodes, edges referencing unknown nodes, self-loops, or
    /// a cyclic graph.
    pub fn build(template: &WorkflowTemplate) -> Result<Self, WorkflowError> {
        if template.nodes.is_empty() {
            return Err(WorkflowError::NoNodes);
        }
        if template.nodes.len() > MAX_NODES {
            return Err(WorkflowError::TooManyNodes(template.nodes.len()));
        }

        let mut node_map: HashMap<String, Node> = HashMap::with_capacity(template.nodes.len());
        for node in &template.nodes {
            if node.id.chars().count() > MAX_NODE_ID_LEN {
                return Err(WorkflowError::NodeIdTooLong(node.id.clone()));
            }
            if node_map.insert(node.id.clone(), node.clone()).is_some() {
                return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut incoming_edges: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut outgoing_edges: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::with_capacity(node_map.len());
        for id in node_map.keys() {
            indices.insert(id.clone(), graph.add_node(()));
        }

        for edge in &template.edges {
            if !node_map.contains_key(&edge.source) {
                return Err(WorkflowError::UnknownSource(edge.source.clone()));
            }
            if !node_map.contains_key(&edge.target) {
                return Err(WorkflowError::UnknownTarget(edge.target.clone()));
            }
            if edge.source == edge.target {
                return Err(WorkflowError::SelfLoop(edge.source.clone()));
            }
            graph.add_edge(indices[&edge.source], indices[&edge.target], ());
            outgoing_edges
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
            incoming_edges
                .entry(edge.target.clone())
                .or_default()
                .push(edge.clone());
        }

        let sorted = toposort(&graph, None).map_err(|_| WorkflowError::Cyclic)?;
        let index_to_id: HashMap<NodeIndex, String> =
            indices.iter().map(|(id, idx)| (*idx, id.clone())).collect();
        let order: Vec<String> = sorted
            .into_iter()
            .map(|idx| index_to_id[&idx].clone())
            .collect();

        Ok(Self {
            order,
            node_map,
            incoming_edges,
            outgoing_edges,
        })
    }

    /// Node ids with no outgoing edges — the run's sink nodes.
    #[must_use]
    pub fn sink_nodes(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| {
                self.outgoing_edges
                    .get(*id)
                    .is_none_or(|edges| edges.is_empty())
            })
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn node_ids(&self) -> HashSet<&str> {
        self.node_map.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_string(),
            role: "worker".to_string(),
            objective: "do work".to_string(),
        }
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            handoff: String::new(),
            contract: None,
        }
    }

    fn template(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowTemplate {
        WorkflowTemplate {
            id: "t1".to_string(),
            name: "Test".to_string(),
            prompt: String::new(),
            summary: String::new(),
            nodes,
            edges,
        }
    }

    #[test]
    fn single_node_no_edges_is_its_own_sink() {
        let t = template(vec![node("a")], vec![]);
        let g = TemplateGraph::build(&t).unwrap();
        assert_eq!(g.order, vec!["a"]);
        assert_eq!(g.sink_nodes(), vec!["a"]);
    }

    #[test]
    fn diamond_topological_order_respects_edges() {
        let t = template(
            vec![node("a"), node("b"), node("c"), node("d")],
            vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
        );
        let g = TemplateGraph::build(&t).unwrap();
        let pos = |id: &str| g.order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
        assert_eq!(g.incoming_edges["d"].len(), 2);
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let t = template(vec![node("a"), node("a")], vec![]);
        assert_eq!(
            TemplateGraph::build(&t),
            Err(WorkflowError::DuplicateNodeId("a".to_string()))
        );
    }

    #[test]
    fn self_loop_rejected() {
        let t = template(vec![node("a")], vec![edge("a", "a")]);
        assert_eq!(
            TemplateGraph::build(&t),
            Err(WorkflowError::SelfLoop("a".to_string()))
        );
    }

    #[test]
    fn unknown_edge_target_rejected() {
        let t = template(vec![node("a")], vec![edge("a", "ghost")]);
        assert_eq!(
            TemplateGraph::build(&t),
            Err(WorkflowError::UnknownTarget("ghost".to_string()))
        );
    }

    #[test]
    fn cycle_rejected() {
        let t = template(
            vec![node("a"), node("b")],
            vec![edge("a", "b"), edge("b", "a")],
        );
        assert_eq!(TemplateGraph::build(&t), Err(WorkflowError::Cyclic));
    }

    #[test]
    fn empty_template_rejected() {
        let t = template(vec![], vec![]);
        assert_eq!(TemplateGraph::build(&t), Err(WorkflowError::NoNodes));
    }
}
