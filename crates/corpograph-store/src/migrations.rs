//! Schema setup for the staging database, run at store construction.

use duckdb::Connection;

pub fn run(conn: &Connection) -> duckdb::Result<()> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS nodes_id_seq;

         CREATE TABLE IF NOT EXISTS nodes (
             id          BIGINT PRIMARY KEY DEFAULT nextval('nodes_id_seq'),
             node_type   TEXT NOT NULL,
             sub_type    TEXT NOT NULL,
             lookup_key  TEXT NOT NULL,
             data        TEXT NOT NULL,
             created_at  TIMESTAMP NOT NULL DEFAULT current_timestamp,
             updated_at  TIMESTAMP NOT NULL DEFAULT current_timestamp,
             UNIQUE (node_type, lookup_key)
         );

         CREATE TABLE IF NOT EXISTS edges (
             from_id     BIGINT NOT NULL,
             to_id       BIGINT NOT NULL,
             edge_type   TEXT NOT NULL,
             created_at  TIMESTAMP NOT NULL DEFAULT current_timestamp,
             UNIQUE (from_id, to_id, edge_type)
         );

         CREATE INDEX IF NOT EXISTS idx_nodes_type_lookup ON nodes(node_type, lookup_key);
         CREATE INDEX IF NOT EXISTS idx_nodes_created_at ON nodes(created_at);
         CREATE INDEX IF NOT EXISTS idx_nodes_updated_at ON nodes(updated_at);
         CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id);
         CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
         CREATE INDEX IF NOT EXISTS idx_edges_created_at ON edges(created_at);",
    )
}
