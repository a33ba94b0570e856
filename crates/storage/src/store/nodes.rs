#![forbid(unsafe_code)]

use super::statistics::statistics_update_ancestors_tx;
use super::{NodeProperties, ROOT_NODE, SqliteStore, StoreError};
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    pub fn node_create(&mut self, parent: i64, path: &str) -> Result<i64, StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidInput("path must not be empty"));
        }

        let tx = self.conn.transaction()?;
        let insert = tx.execute(
            "INSERT INTO nodes(parent, path) VALUES (?1, ?2)",
            params![parent, path],
        );
        if let Err(err) = insert {
            return Err(super::constraint_or_sql(
                err,
                "path already exists or parent is missing",
            ));
        }
        let node = tx.last_insert_rowid();
        tx.commit()?;
        Ok(node)
    }

    pub fn node_lookup(&self, path: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT node FROM nodes WHERE path = ?1",
                params![path],
                |row| row.get::<_, i64>(0),
            )
            .optional()?)
    }

    pub fn node_get_properties(&self, node: i64) -> Result<Option<NodeProperties>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT parent, path FROM nodes WHERE node = ?1",
                params![node],
                |row| {
                    Ok(NodeProperties {
                        parent: row.get(0)?,
                        path: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    // The root sentinel is parented to itself; the self row never counts
    // as a child.
    pub fn node_count_children(&self, node: i64) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            "SELECT count(node) FROM nodes WHERE parent = ?1 AND node != parent",
            params![node],
            |row| row.get::<_, i64>(0),
        )?)
    }

    pub fn node_update_path(&mut self, node: i64, path: &str) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidInput("path must not be empty"));
        }

        let tx = self.conn.transaction()?;
        let update = tx.execute(
            "UPDATE nodes SET path = ?1 WHERE node = ?2",
            params![path, node],
        );
        if let Err(err) = update {
            return Err(super::constraint_or_sql(err, "path already exists"));
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a childless node together with its versions. Statistics at
    /// every ancestor are rolled back per cluster before the delete, so the
    /// cascade cannot leave stale rollups behind.
    pub fn node_remove(&mut self, node: i64) -> Result<bool, StoreError> {
        if node == ROOT_NODE {
            return Ok(false);
        }

        let tx = self.conn.transaction()?;
        let children: i64 = tx.query_row(
            "SELECT count(node) FROM nodes WHERE parent = ?1 AND node != parent",
            params![node],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Ok(false);
        }
        if super::node_properties_tx(&tx, node)?.is_none() {
            return Ok(false);
        }

        let mtime = super::now_secs();
        let clusters = {
            let mut stmt = tx.prepare(
                "SELECT count(serial), coalesce(sum(size), 0), cluster FROM versions \
                 WHERE node = ?1 GROUP BY cluster",
            )?;
            stmt.query_map(params![node], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
        };
        for (population, size, cluster) in clusters {
            statistics_update_ancestors_tx(&tx, node, -population, -size, mtime, cluster)?;
        }

        tx.execute("DELETE FROM nodes WHERE node = ?1", params![node])?;
        tx.commit()?;
        Ok(true)
    }
}
