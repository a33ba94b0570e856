#![forbid(unsafe_code)]

use mt_core::cluster::{Cluster, DEFAULT_CLUSTER};

#[derive(Clone, Debug, PartialEq)]
pub struct ListVersionsRequest {
    pub parent: i64,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub start: Option<String>,
    pub limit: usize,
    pub before: f64,
    pub except_cluster: Cluster,
    pub path_filters: Vec<String>,
    pub attribute_filter: Option<String>,
}

impl ListVersionsRequest {
    pub fn for_parent(parent: i64) -> Self {
        Self {
            parent,
            prefix: String::new(),
            delimiter: None,
            start: None,
            limit: 10_000,
            before: f64::INFINITY,
            except_cluster: DEFAULT_CLUSTER,
            path_filters: Vec::new(),
            attribute_filter: None,
        }
    }
}
