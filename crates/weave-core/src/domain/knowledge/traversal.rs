//! Bounded subgraph retrieval
//!
//! Two phases. Seed edges are every edge touching the start node, in either
//! direction. The forward extension then follows `target -> source` chains
//! from each seed's target for up to `forward_depth` further hops. Only the
//! forward direction is chased past the seed hop.
//!
//! A start node with no incident edges yields an empty subgraph, even when
//! the node itself exists.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{MAX_FORWARD_DEPTH, TraversalConfig};
use crate::error::{Error, Result};

use super::edge::EdgeRecord;
use super::repository::GraphStore;
use super::state::{ExtractionState, Intent, Subgraph};

/// Default number of directed hops followed past a seed edge
pub const DEFAULT_FORWARD_DEPTH: u32 = 2;

/// Resolves an intent to a start node and assembles the surrounding subgraph
pub struct TraversalEngine<S: GraphStore + ?Sized> {
    store: Arc<S>,
    forward_depth: u32,
}

impl<S: GraphStore + ?Sized> Clone for TraversalEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            forward_depth: self.forward_depth,
        }
    }
}

impl<S: GraphStore + ?Sized> TraversalEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            forward_depth: DEFAULT_FORWARD_DEPTH,
        }
    }

    /// Build from the traversal section of the application config
    pub fn from_config(store: Arc<S>, config: &TraversalConfig) -> Result<Self> {
        if config.forward_depth > MAX_FORWARD_DEPTH {
            return Err(Error::ConfigError(format!(
                "traversal.forward_depth must be at most {}",
                MAX_FORWARD_DEPTH
            )));
        }
        Self::new(store).with_forward_depth(config.forward_depth)
    }

    pub fn with_forward_depth(mut self, depth: u32) -> Result<Self> {
        if depth > MAX_FORWARD_DEPTH {
            return Err(Error::TraversalFailed(format!(
                "forward depth {} exceeds the maximum of {}",
                depth, MAX_FORWARD_DEPTH
            )));
        }
        self.forward_depth = depth;
        Ok(self)
    }

    pub fn forward_depth(&self) -> u32 {
        self.forward_depth
    }

    /// Pick the start node id for `state`
    ///
    /// `search` resolves to the first freshly extracted node. A concrete id is
    /// used as given. Anything else resolves to nothing.
    pub fn resolve_start(&self, state: &ExtractionState) -> Option<String> {
        match state.intent.as_ref()? {
            Intent::Search => state.knowledge_nodes.first().map(|n| n.id.clone()),
            Intent::Node(id) => {
                let id = id.trim();
                (!id.is_empty()).then(|| id.to_string())
            }
        }
    }

    /// Retrieve the subgraph around the resolved start node
    pub async fn retrieve(&self, state: &ExtractionState) -> Result<Subgraph> {
        let Some(start) = self.resolve_start(state) else {
            info!(intent = ?state.intent, "No start node resolved, returning empty subgraph");
            return Ok(Subgraph::empty());
        };
        self.retrieve_from(&start).await
    }

    /// Retrieve the subgraph around a known start id
    pub async fn retrieve_from(&self, start: &str) -> Result<Subgraph> {
        let seeds = self.store.edges_touching(start).await?;
        if seeds.is_empty() {
            debug!(start = %start, "Start node has no incident edges");
            return Ok(Subgraph::empty());
        }

        let mut frontier: Vec<String> = Vec::new();
        for seed in &seeds {
            if !frontier.contains(&seed.edge.target) {
                frontier.push(seed.edge.target.clone());
            }
        }
        let forward = self
            .store
            .forward_edges(&frontier, self.forward_depth)
            .await?;

        let mut seen: HashSet<i64> = HashSet::new();
        let records: Vec<EdgeRecord> = seeds
            .into_iter()
            .chain(forward.into_iter().map(|t| t.record))
            .filter(|r| seen.insert(r.id))
            .collect();

        let mut node_ids: BTreeSet<String> = BTreeSet::new();
        node_ids.insert(start.to_string());
        for record in &records {
            node_ids.insert(record.edge.source.clone());
            node_ids.insert(record.edge.target.clone());
        }

        let node_ids: Vec<String> = node_ids.into_iter().collect();
        let nodes = self.store.get_nodes(&node_ids).await?;

        info!(
            start = %start,
            node_count = nodes.len(),
            edge_count = records.len(),
            "Subgraph retrieved"
        );

        Ok(Subgraph {
            nodes,
            edges: records.into_iter().map(|r| r.edge).collect(),
        })
    }
}
