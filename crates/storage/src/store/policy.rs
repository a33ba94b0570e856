#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError};
use rusqlite::params;
use std::collections::BTreeMap;

impl SqliteStore {
    pub fn policy_get(&self, node: i64) -> Result<BTreeMap<String, String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM policy WHERE node = ?1")?;
        let mut rows = stmt.query(params![node])?;
        let mut policy = BTreeMap::new();
        while let Some(row) = rows.next()? {
            policy.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        }
        Ok(policy)
    }

    pub fn policy_set(&mut self, node: i64, items: &[(&str, &str)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO policy(node, key, value) VALUES (?1, ?2, ?3)")?;
            for (key, value) in items {
                if let Err(err) = stmt.execute(params![node, key, value]) {
                    return Err(super::constraint_or_sql(err, "node does not exist"));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
