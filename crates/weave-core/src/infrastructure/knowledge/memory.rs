//! In-memory implementation of the GraphStore
//!
//! Nodes live in a map keyed by id. Edges live in an append-only arena and
//! are addressed by index through a `source -> indices` adjacency map, so
//! dangling ids and cycles need no special handling.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::knowledge::{
    EdgeRecord, GraphStats, GraphStore, KnowledgeEdge, KnowledgeNode, NodeType, TraversedEdge,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct GraphData {
    nodes: HashMap<String, KnowledgeNode>,
    edges: Vec<EdgeRecord>,
    outgoing: HashMap<String, Vec<usize>>,
}

/// Graph store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    data: Arc<RwLock<GraphData>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<()> {
        let mut data = self.data.write().await;
        data.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<KnowledgeNode>> {
        let data = self.data.read().await;
        Ok(data.nodes.get(id).cloned())
    }

    async fn get_nodes(&self, ids: &[String]) -> Result<Vec<KnowledgeNode>> {
        let data = self.data.read().await;
        let wanted: BTreeSet<&String> = ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| data.nodes.get(id).cloned())
            .collect())
    }

    async fn list_nodes_by_type(&self, node_type: &NodeType) -> Result<Vec<KnowledgeNode>> {
        let data = self.data.read().await;
        let mut nodes: Vec<KnowledgeNode> = data
            .nodes
            .values()
            .filter(|n| &n.node_type == node_type)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn count_nodes(&self) -> Result<u64> {
        Ok(self.data.read().await.nodes.len() as u64)
    }

    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<EdgeRecord> {
        let mut data = self.data.write().await;
        let index = data.edges.len();
        let record = EdgeRecord {
            id: index as i64 + 1,
            edge: edge.clone(),
        };
        data.edges.push(record.clone());
        data.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(index);
        Ok(record)
    }

    async fn edges_touching(&self, id: &str) -> Result<Vec<EdgeRecord>> {
        let data = self.data.read().await;
        Ok(data
            .edges
            .iter()
            .filter(|r| r.edge.touches(id))
            .cloned()
            .collect())
    }

    async fn forward_edges(&self, from_ids: &[String], max_depth: u32) -> Result<Vec<TraversedEdge>> {
        let data = self.data.read().await;
        let mut found = Vec::new();
        let mut frontier: HashSet<&str> = from_ids.iter().map(String::as_str).collect();

        for depth in 1..=max_depth {
            let mut next = HashSet::new();
            for id in &frontier {
                for &index in data.outgoing.get(*id).into_iter().flatten() {
                    let record = &data.edges[index];
                    next.insert(record.edge.target.as_str());
                    found.push(TraversedEdge {
                        record: record.clone(),
                        depth,
                    });
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        found.sort_by_key(|t| (t.depth, t.record.id));
        Ok(found)
    }

    async fn count_edges(&self) -> Result<u64> {
        Ok(self.data.read().await.edges.len() as u64)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let data = self.data.read().await;

        let mut nodes_by_type: BTreeMap<String, u64> = BTreeMap::new();
        for node in data.nodes.values() {
            *nodes_by_type.entry(node.node_type.to_string()).or_default() += 1;
        }

        let mut edges_by_type: BTreeMap<String, u64> = BTreeMap::new();
        for record in &data.edges {
            *edges_by_type.entry(record.edge.edge_type.to_string()).or_default() += 1;
        }

        let dangling_edges = data
            .edges
            .iter()
            .filter(|r| {
                !data.nodes.contains_key(&r.edge.source) || !data.nodes.contains_key(&r.edge.target)
            })
            .count() as u64;

        Ok(GraphStats {
            total_nodes: data.nodes.len() as u64,
            total_edges: data.edges.len() as u64,
            nodes_by_type: nodes_by_type.into_iter().collect(),
            edges_by_type: edges_by_type.into_iter().collect(),
            dangling_edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::EdgeType;

    #[tokio::test]
    async fn test_upsert_is_last_write_wins() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_node(&KnowledgeNode::new("n1", NodeType::Tech, "first"))
            .await
            .unwrap();
        store
            .upsert_node(&KnowledgeNode::new("n1", NodeType::Tech, "second"))
            .await
            .unwrap();

        assert_eq!(store.count_nodes().await.unwrap(), 1);
        assert_eq!(store.get_node("n1").await.unwrap().unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_edge_ids_are_sequential() {
        let store = InMemoryGraphStore::new();
        let edge = KnowledgeEdge::new("a", "b", EdgeType::RelatesTo);

        assert_eq!(store.insert_edge(&edge).await.unwrap().id, 1);
        assert_eq!(store.insert_edge(&edge).await.unwrap().id, 2);
        assert_eq!(store.edges_touching("b").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forward_edges_matches_depth_order() {
        let store = InMemoryGraphStore::new();
        for (s, t) in [("a", "b"), ("b", "c"), ("c", "d"), ("b", "x")] {
            store
                .insert_edge(&KnowledgeEdge::new(s, t, EdgeType::DependsOn))
                .await
                .unwrap();
        }

        let traversed = store.forward_edges(&["a".to_string()], 2).await.unwrap();
        let hops: Vec<(i64, u32)> = traversed.iter().map(|t| (t.record.id, t.depth)).collect();
        assert_eq!(hops, vec![(1, 1), (2, 2), (4, 2)]);
    }

    #[tokio::test]
    async fn test_forward_edges_terminate_on_cycle() {
        let store = InMemoryGraphStore::new();
        store
            .insert_edge(&KnowledgeEdge::new("a", "b", EdgeType::RelatesTo))
            .await
            .unwrap();
        store
            .insert_edge(&KnowledgeEdge::new("b", "a", EdgeType::RelatesTo))
            .await
            .unwrap();

        let traversed = store.forward_edges(&["a".to_string()], 5).await.unwrap();
        assert_eq!(traversed.len(), 5);
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = InMemoryGraphStore::new();
        let other = store.clone();

        store
            .upsert_node(&KnowledgeNode::new("n1", NodeType::Goal, "goal"))
            .await
            .unwrap();
        assert!(other.get_node("n1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_counts_dangling() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_node(&KnowledgeNode::new("a", NodeType::Bug, "a"))
            .await
            .unwrap();
        store
            .insert_edge(&KnowledgeEdge::new("a", "ghost", EdgeType::BlockedBy))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.edges_by_type, vec![("BLOCKED_BY".to_string(), 1)]);
        assert_eq!(stats.dangling_edges, 1);
    }
}
