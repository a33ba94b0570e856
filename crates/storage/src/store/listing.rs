#![forbid(unsafe_code)]

use super::{ListEntry, ListVersionsRequest, ListingPage, SqliteStore, StoreError};
use mt_core::bounds;
use mt_core::cluster::Cluster;
use mt_core::filter::AttributeFilter;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

impl SqliteStore {
    /// Page through the current versions of `parent`'s children in path
    /// order. Without a delimiter the page is a flat slice of matches; with
    /// one, paths spanning the delimiter collapse into common prefixes and
    /// the scan re-seeks past each prefix's namespace, so every prefix is
    /// reported once. `limit` caps matches; a common prefix discovered at
    /// the boundary is still recorded, and a directory-marker match lets the
    /// scan run one past the cap on purpose.
    pub fn list_versions(&self, request: &ListVersionsRequest) -> Result<ListingPage, StoreError> {
        let prefix = request.prefix.as_str();
        let start = match request.start.as_deref() {
            Some(start) if !start.is_empty() && start >= prefix => start.to_string(),
            _ => bounds::prev_string(prefix),
        };
        let upper = bounds::next_string(prefix)?;

        let mut sql = String::from(
            "SELECT n.path, v.serial FROM versions v, nodes n \
             WHERE v.serial = (SELECT max(serial) FROM versions WHERE node = v.node AND mtime < ?1) \
               AND v.cluster != ?2 \
               AND v.node IN (SELECT node FROM nodes WHERE parent = ?3 AND node != parent) \
               AND n.node = v.node AND n.path > ?4 AND n.path < ?5",
        );
        let mut args: Vec<Value> = vec![
            Value::Real(request.before),
            Value::Integer(request.except_cluster),
            Value::Integer(request.parent),
            Value::Text(start),
            Value::Text(upper),
        ];

        append_path_predicates(&mut sql, &mut args, &request.path_filters);
        if let Some(expr) = request.attribute_filter.as_deref() {
            append_attribute_predicates(&mut sql, &mut args, &AttributeFilter::parse(expr));
        }
        sql.push_str(" ORDER BY n.path");

        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let Some(delimiter) = delimiter else {
            sql.push_str(&format!(" LIMIT ?{}", args.len() + 1));
            args.push(Value::Integer(super::to_sqlite_i64(request.limit)?));

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(args))?;
            let mut matches = Vec::new();
            while let Some(row) = rows.next()? {
                matches.push(ListEntry {
                    path: row.get(0)?,
                    serial: row.get(1)?,
                });
            }
            return Ok(ListingPage {
                matches,
                common_prefixes: Vec::new(),
            });
        };

        let prefix_len = prefix.len();
        let delimiter_len = delimiter.len();
        let limit = request.limit;
        let mut matches = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut count = 0usize;

        let mut stmt = self.conn.prepare(&sql)?;
        'scan: loop {
            let mut rows = stmt.query(params_from_iter(args.iter().cloned()))?;
            loop {
                let Some(row) = rows.next()? else {
                    break 'scan;
                };
                let path: String = row.get(0)?;
                let serial: i64 = row.get(1)?;

                let found = path
                    .get(prefix_len..)
                    .and_then(|tail| tail.find(delimiter))
                    .map(|index| index + prefix_len);

                let Some(index) = found else {
                    matches.push(ListEntry { path, serial });
                    count += 1;
                    if count >= limit {
                        break 'scan;
                    }
                    continue;
                };

                if index + delimiter_len == path.len() {
                    // Exact directory marker. Keep scanning even at the
                    // limit: the next row may turn the marker into a common
                    // prefix as well.
                    matches.push(ListEntry { path, serial });
                    count += 1;
                    continue;
                }

                let common_prefix = path[..index + delimiter_len].to_string();
                let reseek = bounds::next_string(&common_prefix)?;
                common_prefixes.push(common_prefix);
                if count >= limit {
                    break 'scan;
                }
                // Skip the rest of this namespace and rescan.
                args[3] = Value::Text(reseek);
                continue 'scan;
            }
        }

        Ok(ListingPage {
            matches,
            common_prefixes,
        })
    }

    /// Distinct attribute keys present on the current versions of
    /// `parent`'s children, sorted.
    pub fn latest_attribute_keys(
        &self,
        parent: i64,
        before: f64,
        except_cluster: Cluster,
        path_filters: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut sql = String::from(
            "SELECT DISTINCT a.key FROM attributes a, versions v, nodes n \
             WHERE v.serial = (SELECT max(serial) FROM versions WHERE node = v.node AND mtime < ?1) \
               AND v.cluster != ?2 \
               AND v.node IN (SELECT node FROM nodes WHERE parent = ?3 AND node != parent) \
               AND a.serial = v.serial AND n.node = v.node",
        );
        let mut args: Vec<Value> = vec![
            Value::Real(before),
            Value::Integer(except_cluster),
            Value::Integer(parent),
        ];
        append_path_predicates(&mut sql, &mut args, path_filters);
        sql.push_str(" ORDER BY a.key");

        let mut stmt = self.conn.prepare(&sql)?;
        let keys = stmt
            .query_map(params_from_iter(args), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

fn append_path_predicates(sql: &mut String, args: &mut Vec<Value>, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    let mut clauses = Vec::new();
    for path in paths {
        args.push(Value::Text(format!("{}%", super::escape_like(path))));
        clauses.push(format!("n.path LIKE ?{} ESCAPE '\\'", args.len()));
    }
    sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
}

// Buckets AND together: an included key must exist and an excluded key must
// not. Comparisons OR into a single EXISTS, even across different keys.
fn append_attribute_predicates(sql: &mut String, args: &mut Vec<Value>, filter: &AttributeFilter) {
    if !filter.included.is_empty() {
        let marks = push_text_params(args, &filter.included);
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM attributes a WHERE a.serial = v.serial AND a.key IN ({marks}))"
        ));
    }
    if !filter.excluded.is_empty() {
        let marks = push_text_params(args, &filter.excluded);
        sql.push_str(&format!(
            " AND NOT EXISTS (SELECT 1 FROM attributes a WHERE a.serial = v.serial AND a.key IN ({marks}))"
        ));
    }
    if !filter.comparisons.is_empty() {
        let mut branches = Vec::new();
        for comparison in &filter.comparisons {
            args.push(Value::Text(comparison.key.clone()));
            let key_mark = args.len();
            args.push(Value::Text(comparison.value.clone()));
            let value_mark = args.len();
            branches.push(format!(
                "(a.key = ?{key_mark} AND a.value {} ?{value_mark})",
                comparison.op.as_str()
            ));
        }
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM attributes a WHERE a.serial = v.serial AND ({}))",
            branches.join(" OR ")
        ));
    }
}

fn push_text_params(args: &mut Vec<Value>, values: &[String]) -> String {
    let mut marks = Vec::new();
    for value in values {
        args.push(Value::Text(value.clone()));
        marks.push(format!("?{}", args.len()));
    }
    marks.join(",")
}
