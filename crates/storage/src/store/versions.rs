#![forbid(unsafe_code)]

use super::statistics::{statistics_update_ancestors_tx, statistics_update_tx};
use super::{ROOT_NODE, SqliteStore, StoreError, VersionRecord};
use log::debug;
use mt_core::cluster::Cluster;
use rusqlite::{OptionalExtension, Transaction, params};

impl SqliteStore {
    /// Append a version to the node's ledger. The write and the statistics
    /// walk (size on the node's own rollup, population and size up the
    /// ancestor chain) commit together.
    pub fn version_create(
        &mut self,
        node: i64,
        hash: &str,
        size: i64,
        source: Option<i64>,
        muser: &str,
        cluster: Cluster,
    ) -> Result<(i64, f64), StoreError> {
        let mtime = super::now_secs();

        let tx = self.conn.transaction()?;
        let insert = tx.execute(
            "INSERT INTO versions(node, hash, size, source, mtime, muser, cluster) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![node, hash, size, source, mtime, muser, cluster],
        );
        if let Err(err) = insert {
            return Err(super::constraint_or_sql(err, "node does not exist"));
        }
        let serial = tx.last_insert_rowid();

        statistics_update_tx(&tx, node, 0, size, mtime, cluster)?;
        statistics_update_ancestors_tx(&tx, node, 1, size, mtime, cluster)?;

        tx.commit()?;
        Ok((serial, mtime))
    }

    /// Current version of the node in `cluster` as of `before`: highest
    /// serial among versions with a strictly earlier mtime.
    pub fn version_lookup(
        &self,
        node: i64,
        before: f64,
        cluster: Cluster,
    ) -> Result<Option<VersionRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT serial, node, hash, size, source, mtime, muser, cluster FROM versions \
                 WHERE node = ?1 AND cluster = ?2 AND mtime < ?3 \
                 ORDER BY serial DESC LIMIT 1",
                params![node, cluster, before],
                version_row,
            )
            .optional()?)
    }

    pub fn version_get_properties(&self, serial: i64) -> Result<Option<VersionRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT serial, node, hash, size, source, mtime, muser, cluster FROM versions \
                 WHERE serial = ?1",
                params![serial],
                version_row,
            )
            .optional()?)
    }

    pub fn node_get_versions(&self, node: i64) -> Result<Vec<VersionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT serial, node, hash, size, source, mtime, muser, cluster FROM versions \
             WHERE node = ?1 ORDER BY serial",
        )?;
        let rows = stmt
            .query_map(params![node], version_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Move a version to another cluster, shifting its contribution out of
    /// the old cluster's rollups and into the new one's. Absent serial or
    /// unchanged cluster is a no-op.
    pub fn version_recluster(&mut self, serial: i64, cluster: Cluster) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let Some(existing) = version_by_serial_tx(&tx, serial)? else {
            return Ok(());
        };
        if existing.cluster == cluster {
            return Ok(());
        }

        let mtime = super::now_secs();
        statistics_update_tx(&tx, existing.node, 0, -existing.size, mtime, existing.cluster)?;
        statistics_update_ancestors_tx(
            &tx,
            existing.node,
            -1,
            -existing.size,
            mtime,
            existing.cluster,
        )?;
        statistics_update_tx(&tx, existing.node, 0, existing.size, mtime, cluster)?;
        statistics_update_ancestors_tx(&tx, existing.node, 1, existing.size, mtime, cluster)?;

        tx.execute(
            "UPDATE versions SET cluster = ?1 WHERE serial = ?2",
            params![cluster, serial],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete one version and roll its statistics back. Returns the hash so
    /// the blob layer can drop a reference.
    pub fn version_remove(&mut self, serial: i64) -> Result<Option<String>, StoreError> {
        let tx = self.conn.transaction()?;
        let Some(existing) = version_by_serial_tx(&tx, serial)? else {
            return Ok(None);
        };

        let mtime = super::now_secs();
        statistics_update_tx(&tx, existing.node, 0, -existing.size, mtime, existing.cluster)?;
        statistics_update_ancestors_tx(
            &tx,
            existing.node,
            -1,
            -existing.size,
            mtime,
            existing.cluster,
        )?;

        tx.execute("DELETE FROM versions WHERE serial = ?1", params![serial])?;
        tx.commit()?;
        Ok(Some(existing.hash))
    }

    /// Bulk-delete the node's versions in `cluster` up to and including
    /// `before`. Returns the deleted hashes; the node itself is pruned when
    /// nothing is left of it.
    pub fn version_purge(
        &mut self,
        node: i64,
        before: f64,
        cluster: Cluster,
    ) -> Result<Vec<String>, StoreError> {
        let tx = self.conn.transaction()?;

        let (count, size) = tx.query_row(
            "SELECT count(serial), coalesce(sum(size), 0) FROM versions \
             WHERE node = ?1 AND cluster = ?2 AND mtime <= ?3",
            params![node, cluster, before],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mtime = super::now_secs();
        statistics_update_tx(&tx, node, 0, -size, mtime, cluster)?;
        statistics_update_ancestors_tx(&tx, node, -count, -size, mtime, cluster)?;

        let hashes = {
            let mut stmt = tx.prepare(
                "SELECT hash FROM versions WHERE node = ?1 AND cluster = ?2 AND mtime <= ?3",
            )?;
            stmt.query_map(params![node, cluster, before], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        tx.execute(
            "DELETE FROM versions WHERE node = ?1 AND cluster = ?2 AND mtime <= ?3",
            params![node, cluster, before],
        )?;
        prune_if_empty_tx(&tx, node)?;

        tx.commit()?;
        debug!("purged {} versions at node {node}", hashes.len());
        Ok(hashes)
    }

    /// Bulk-delete versions in `cluster` up to and including `before` at
    /// every direct child of `parent`. The parent's rollup takes the
    /// population and size hit directly (the versions sit one level below
    /// it); ancestors above lose size only. Children left with neither
    /// versions nor children of their own are pruned.
    pub fn version_purge_children(
        &mut self,
        parent: i64,
        before: f64,
        cluster: Cluster,
    ) -> Result<Vec<String>, StoreError> {
        let tx = self.conn.transaction()?;

        let per_child = {
            let mut stmt = tx.prepare(
                "SELECT node, count(serial), coalesce(sum(size), 0) FROM versions \
                 WHERE node IN (SELECT node FROM nodes WHERE parent = ?1 AND node != parent) \
                   AND cluster = ?2 AND mtime <= ?3 \
                 GROUP BY node",
            )?;
            stmt.query_map(params![parent, cluster, before], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
        };
        if per_child.is_empty() {
            return Ok(Vec::new());
        }

        let mtime = super::now_secs();
        let mut total_count = 0i64;
        let mut total_size = 0i64;
        for (child, count, size) in &per_child {
            statistics_update_tx(&tx, *child, 0, -size, mtime, cluster)?;
            total_count += count;
            total_size += size;
        }
        statistics_update_tx(&tx, parent, -total_count, -total_size, mtime, cluster)?;
        statistics_update_ancestors_tx(&tx, parent, 0, -total_size, mtime, cluster)?;

        let hashes = {
            let mut stmt = tx.prepare(
                "SELECT hash FROM versions \
                 WHERE node IN (SELECT node FROM nodes WHERE parent = ?1 AND node != parent) \
                   AND cluster = ?2 AND mtime <= ?3",
            )?;
            stmt.query_map(params![parent, cluster, before], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        tx.execute(
            "DELETE FROM versions \
             WHERE node IN (SELECT node FROM nodes WHERE parent = ?1 AND node != parent) \
               AND cluster = ?2 AND mtime <= ?3",
            params![parent, cluster, before],
        )?;
        tx.execute(
            "DELETE FROM nodes WHERE parent = ?1 AND node != parent \
               AND NOT EXISTS (SELECT 1 FROM versions WHERE versions.node = nodes.node) \
               AND NOT EXISTS (SELECT 1 FROM nodes grandchildren WHERE grandchildren.parent = nodes.node)",
            params![parent],
        )?;

        tx.commit()?;
        debug!(
            "purged {} versions below node {parent}",
            hashes.len()
        );
        Ok(hashes)
    }
}

fn version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRecord> {
    Ok(VersionRecord {
        serial: row.get(0)?,
        node: row.get(1)?,
        hash: row.get(2)?,
        size: row.get(3)?,
        source: row.get(4)?,
        mtime: row.get(5)?,
        muser: row.get(6)?,
        cluster: row.get(7)?,
    })
}

fn version_by_serial_tx(
    tx: &Transaction<'_>,
    serial: i64,
) -> Result<Option<VersionRecord>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT serial, node, hash, size, source, mtime, muser, cluster FROM versions \
             WHERE serial = ?1",
            params![serial],
            version_row,
        )
        .optional()?)
}

// A node survives a purge while it still has versions in any cluster or
// children of its own. The root sentinel always survives.
fn prune_if_empty_tx(tx: &Transaction<'_>, node: i64) -> Result<(), StoreError> {
    if node == ROOT_NODE {
        return Ok(());
    }
    tx.execute(
        "DELETE FROM nodes WHERE node = ?1 \
           AND NOT EXISTS (SELECT 1 FROM versions WHERE node = ?1) \
           AND NOT EXISTS (SELECT 1 FROM nodes children WHERE children.parent = ?1)",
        params![node],
    )?;
    Ok(())
}
