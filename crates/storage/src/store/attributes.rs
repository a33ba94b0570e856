#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

impl SqliteStore {
    /// Key/value pairs of a version, sorted by key. An empty `keys` slice
    /// selects them all.
    pub fn attribute_get(
        &self,
        serial: i64,
        keys: &[&str],
    ) -> Result<Vec<(String, String)>, StoreError> {
        let (sql, args) = if keys.is_empty() {
            (
                "SELECT key, value FROM attributes WHERE serial = ?1 ORDER BY key".to_string(),
                vec![Value::Integer(serial)],
            )
        } else {
            let mut args = vec![Value::Integer(serial)];
            let mut marks = Vec::new();
            for key in keys {
                args.push(Value::Text((*key).to_string()));
                marks.push(format!("?{}", args.len()));
            }
            (
                format!(
                    "SELECT key, value FROM attributes WHERE serial = ?1 AND key IN ({}) ORDER BY key",
                    marks.join(",")
                ),
                args,
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn attribute_set(&mut self, serial: i64, items: &[(&str, &str)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO attributes(serial, key, value) VALUES (?1, ?2, ?3)",
            )?;
            for (key, value) in items {
                if let Err(err) = stmt.execute(params![serial, key, value]) {
                    return Err(super::constraint_or_sql(err, "version does not exist"));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete the named keys, or every attribute of the version when `keys`
    /// is empty.
    pub fn attribute_del(&mut self, serial: i64, keys: &[&str]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        if keys.is_empty() {
            tx.execute("DELETE FROM attributes WHERE serial = ?1", params![serial])?;
        } else {
            let mut stmt = tx.prepare("DELETE FROM attributes WHERE serial = ?1 AND key = ?2")?;
            for key in keys {
                stmt.execute(params![serial, key])?;
            }
            drop(stmt);
        }
        tx.commit()?;
        Ok(())
    }

    /// Copy every attribute from one version to another, overwriting
    /// duplicate keys.
    pub fn attribute_copy(&mut self, source: i64, dest: i64) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let copy = tx.execute(
            "INSERT OR REPLACE INTO attributes(serial, key, value) \
             SELECT ?1, key, value FROM attributes WHERE serial = ?2",
            params![dest, source],
        );
        if let Err(err) = copy {
            return Err(super::constraint_or_sql(err, "version does not exist"));
        }
        tx.commit()?;
        Ok(())
    }
}
