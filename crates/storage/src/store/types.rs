#![forbid(unsafe_code)]

use mt_core::version::{FieldValue, VersionField};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProperties {
    pub parent: i64,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub serial: i64,
    pub node: i64,
    pub hash: String,
    pub size: i64,
    pub source: Option<i64>,
    pub mtime: f64,
    pub muser: String,
    pub cluster: i64,
}

impl VersionRecord {
    /// Project onto `fields`; an empty list means every field, in
    /// declaration order.
    pub fn project(&self, fields: &[VersionField]) -> Vec<FieldValue> {
        let fields = if fields.is_empty() {
            &VersionField::ALL[..]
        } else {
            fields
        };
        fields.iter().map(|field| self.field(*field)).collect()
    }

    pub fn field(&self, field: VersionField) -> FieldValue {
        match field {
            VersionField::Serial => FieldValue::Int(self.serial),
            VersionField::Node => FieldValue::Int(self.node),
            VersionField::Hash => FieldValue::Text(self.hash.clone()),
            VersionField::Size => FieldValue::Int(self.size),
            VersionField::Source => FieldValue::OptInt(self.source),
            VersionField::Mtime => FieldValue::Real(self.mtime),
            VersionField::Muser => FieldValue::Text(self.muser.clone()),
            VersionField::Cluster => FieldValue::Int(self.cluster),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub population: i64,
    pub size: i64,
    pub mtime: f64,
}

/// Rollup over current versions, as opposed to the stored `statistics`
/// rows: `count` covers direct children, `size` the whole subtree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatestSummary {
    pub count: i64,
    pub size: i64,
    pub mtime: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub path: String,
    pub serial: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub matches: Vec<ListEntry>,
    pub common_prefixes: Vec<String>,
}
