//! SQLite implementation of the GraphStore
//!
//! Nodes upsert through `ON CONFLICT(id)`, edges are plain inserts, and the
//! forward chase is a recursive CTE.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use crate::domain::knowledge::{
    EdgeRecord, EdgeType, GraphStats, GraphStore, KnowledgeEdge, KnowledgeNode, NodeType,
    TraversedEdge,
};
use crate::error::{Error, Result};

/// SQLite implementation of the graph store
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Create a new SQLite graph store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn counts_by(&self, sql: &str) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(t, c)| (t, c as u64)).collect())
    }
}

/// Encode an id list for `json_each(?)`
fn id_list(ids: &[String]) -> Result<String> {
    serde_json::to_string(ids)
        .map_err(|e| Error::Other(format!("Failed to serialize id list: {}", e)))
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    // ========== Node Operations ==========

    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<()> {
        let metadata_json = serde_json::to_string(&node.metadata)
            .map_err(|e| Error::Other(format!("Failed to serialize metadata: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO knowledge_nodes (id, node_type, content, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                content = excluded.content,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&node.id)
        .bind(node.node_type.as_str())
        .bind(&node.content)
        .bind(&metadata_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(node_id = %node.id, node_type = %node.node_type, "Node upserted");
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<KnowledgeNode>> {
        let row: Option<NodeRow> = sqlx::query_as(
            "SELECT id, node_type, content, metadata FROM knowledge_nodes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(NodeRow::into_node))
    }

    async fn get_nodes(&self, ids: &[String]) -> Result<Vec<KnowledgeNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT id, node_type, content, metadata FROM knowledge_nodes
            WHERE id IN (SELECT value FROM json_each(?))
            ORDER BY id
            "#,
        )
        .bind(id_list(ids)?)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NodeRow::into_node).collect())
    }

    async fn list_nodes_by_type(&self, node_type: &NodeType) -> Result<Vec<KnowledgeNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            "SELECT id, node_type, content, metadata FROM knowledge_nodes WHERE node_type = ? ORDER BY id",
        )
        .bind(node_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NodeRow::into_node).collect())
    }

    async fn count_nodes(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM knowledge_nodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Edge Operations ==========

    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<EdgeRecord> {
        let result = sqlx::query(
            "INSERT INTO knowledge_edges (source, target, edge_type, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(edge.edge_type.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(EdgeRecord {
            id: result.last_insert_rowid(),
            edge: edge.clone(),
        })
    }

    async fn edges_touching(&self, id: &str) -> Result<Vec<EdgeRecord>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT id, source, target, edge_type FROM knowledge_edges
            WHERE source = ? OR target = ?
            ORDER BY id
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EdgeRow::into_record).collect())
    }

    async fn forward_edges(&self, from_ids: &[String], max_depth: u32) -> Result<Vec<TraversedEdge>> {
        if from_ids.is_empty() || max_depth == 0 {
            return Ok(Vec::new());
        }

        // UNION (not UNION ALL) keeps cycles finite below the depth bound
        let rows: Vec<TraversedRow> = sqlx::query_as(
            r#"
            WITH RECURSIVE chase(edge_id, target, depth) AS (
                SELECT e.id, e.target, 1
                FROM knowledge_edges e
                WHERE e.source IN (SELECT value FROM json_each(?))

                UNION

                SELECT e.id, e.target, c.depth + 1
                FROM chase c
                JOIN knowledge_edges e ON e.source = c.target
                WHERE c.depth < ?
            )
            SELECT DISTINCT e.id, e.source, e.target, e.edge_type, c.depth
            FROM chase c
            JOIN knowledge_edges e ON e.id = c.edge_id
            ORDER BY c.depth, e.id
            "#,
        )
        .bind(id_list(from_ids)?)
        .bind(max_depth as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TraversedRow::into_traversed).collect())
    }

    async fn count_edges(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM knowledge_edges")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Statistics ==========

    async fn stats(&self) -> Result<GraphStats> {
        let total_nodes = self.count_nodes().await?;
        let total_edges = self.count_edges().await?;

        let nodes_by_type = self
            .counts_by(
                "SELECT node_type, COUNT(*) FROM knowledge_nodes GROUP BY node_type ORDER BY node_type",
            )
            .await?;
        let edges_by_type = self
            .counts_by(
                "SELECT edge_type, COUNT(*) FROM knowledge_edges GROUP BY edge_type ORDER BY edge_type",
            )
            .await?;

        let (dangling,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM knowledge_edges e
            WHERE NOT EXISTS (SELECT 1 FROM knowledge_nodes n WHERE n.id = e.source)
               OR NOT EXISTS (SELECT 1 FROM knowledge_nodes n WHERE n.id = e.target)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(GraphStats {
            total_nodes,
            total_edges,
            nodes_by_type,
            edges_by_type,
            dangling_edges: dangling as u64,
        })
    }
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
struct NodeRow {
    id: String,
    node_type: String,
    content: String,
    metadata: String,
}

impl NodeRow {
    fn into_node(self) -> KnowledgeNode {
        let metadata: BTreeMap<String, serde_json::Value> =
            match serde_json::from_str(&self.metadata) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(
                        node_id = %self.id,
                        error = %e,
                        "Stored node metadata is not a JSON object; ignoring it"
                    );
                    BTreeMap::new()
                }
            };

        KnowledgeNode {
            id: self.id,
            node_type: NodeType::parse(&self.node_type),
            content: self.content,
            metadata,
        }
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    id: i64,
    source: String,
    target: String,
    edge_type: String,
}

impl EdgeRow {
    fn into_record(self) -> EdgeRecord {
        EdgeRecord {
            id: self.id,
            edge: KnowledgeEdge::new(self.source, self.target, EdgeType::parse(&self.edge_type)),
        }
    }
}

#[derive(Debug, FromRow)]
struct TraversedRow {
    id: i64,
    source: String,
    target: String,
    edge_type: String,
    depth: i64,
}

impl TraversedRow {
    fn into_traversed(self) -> TraversedEdge {
        TraversedEdge {
            record: EdgeRecord {
                id: self.id,
                edge: KnowledgeEdge::new(self.source, self.target, EdgeType::parse(&self.edge_type)),
            },
            depth: self.depth as u32,
        }
    }
}
