#![forbid(unsafe_code)]

use super::{LatestSummary, SqliteStore, StatisticsRecord, StoreError};
use mt_core::cluster::Cluster;
use rusqlite::{OptionalExtension, Transaction, params};

impl SqliteStore {
    pub fn statistics_get(
        &self,
        node: i64,
        cluster: Cluster,
    ) -> Result<Option<StatisticsRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT population, size, mtime FROM statistics WHERE node = ?1 AND cluster = ?2",
                params![node, cluster],
                |row| {
                    Ok(StatisticsRecord {
                        population: row.get(0)?,
                        size: row.get(1)?,
                        mtime: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Summary over current versions as of `before`, skipping nodes whose
    /// newest version sits in `except_cluster`: count of direct children,
    /// size of the whole subtree below the node, and the newest mtime seen.
    /// Absent node or no current version at the node itself means no
    /// summary.
    pub fn statistics_latest(
        &self,
        node: i64,
        before: f64,
        except_cluster: Cluster,
    ) -> Result<Option<LatestSummary>, StoreError> {
        let Some(props) = self.node_get_properties(node)? else {
            return Ok(None);
        };

        let own = self
            .conn
            .query_row(
                "SELECT mtime, size FROM versions \
                 WHERE serial = (SELECT max(serial) FROM versions WHERE node = ?1 AND mtime < ?2) \
                   AND node = ?1 AND cluster != ?3",
                params![node, before, except_cluster],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((own_mtime, own_size)) = own else {
            return Ok(None);
        };

        let (count, children_mtime) = self.conn.query_row(
            "SELECT count(v.serial), max(v.mtime) FROM versions v, nodes n \
             WHERE v.serial = (SELECT max(serial) FROM versions WHERE node = v.node AND mtime < ?2) \
               AND v.cluster != ?3 AND v.node = n.node AND n.parent = ?1 AND n.node != n.parent",
            params![node, before, except_cluster],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
        )?;
        let mut mtime = match children_mtime {
            Some(children_mtime) => own_mtime.max(children_mtime),
            None => own_mtime,
        };
        if count == 0 {
            return Ok(Some(LatestSummary {
                count: 0,
                size: 0,
                mtime,
            }));
        }

        let like = format!("{}%", super::escape_like(&props.path));
        let (subtree_size, subtree_mtime) = self.conn.query_row(
            r#"SELECT coalesce(sum(v.size), 0), max(v.mtime) FROM versions v, nodes n
               WHERE v.serial = (SELECT max(serial) FROM versions WHERE node = v.node AND mtime < ?1)
                 AND v.cluster != ?2 AND v.node = n.node AND n.path LIKE ?3 ESCAPE '\'"#,
            params![before, except_cluster, like],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
        )?;
        if let Some(subtree_mtime) = subtree_mtime {
            mtime = mtime.max(subtree_mtime);
        }

        Ok(Some(LatestSummary {
            count,
            size: subtree_size - own_size,
            mtime,
        }))
    }
}

pub(super) fn statistics_update_tx(
    tx: &Transaction<'_>,
    node: i64,
    population: i64,
    size: i64,
    mtime: f64,
    cluster: Cluster,
) -> Result<(), StoreError> {
    let existing = tx
        .query_row(
            "SELECT population, size FROM statistics WHERE node = ?1 AND cluster = ?2",
            params![node, cluster],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    let (current_population, current_size) = existing.unwrap_or((0, 0));
    tx.execute(
        "INSERT OR REPLACE INTO statistics(node, cluster, population, size, mtime) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            node,
            cluster,
            current_population + population,
            current_size + size,
            mtime
        ],
    )?;
    Ok(())
}

/// Climb the parent chain applying the deltas to each ancestor's rollup.
/// Population is one level deep (a version at N counts toward parent(N)
/// only), so the population delta rides the first hop and drops to zero
/// afterwards, while size accumulates all the way up. Stops at the root
/// sentinel or at a node with no properties row, whichever comes first.
pub(super) fn statistics_update_ancestors_tx(
    tx: &Transaction<'_>,
    node: i64,
    population: i64,
    size: i64,
    mtime: f64,
    cluster: Cluster,
) -> Result<(), StoreError> {
    let mut current = node;
    let mut first_hop = true;
    while current != super::ROOT_NODE {
        let Some(props) = super::node_properties_tx(tx, current)? else {
            break;
        };
        let delta_population = if first_hop { population } else { 0 };
        statistics_update_tx(tx, props.parent, delta_population, size, mtime, cluster)?;
        current = props.parent;
        first_hop = false;
    }
    Ok(())
}
