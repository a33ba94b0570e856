#![forbid(unsafe_code)]

pub mod bounds;
pub mod filter;

pub mod cluster {
    pub type Cluster = i64;

    /// Cluster new versions land in unless the caller overrides it.
    pub const DEFAULT_CLUSTER: Cluster = 0;
}

pub mod version {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum VersionField {
        Serial,
        Node,
        Hash,
        Size,
        Source,
        Mtime,
        Muser,
        Cluster,
    }

    impl VersionField {
        pub const ALL: [VersionField; 8] = [
            VersionField::Serial,
            VersionField::Node,
            VersionField::Hash,
            VersionField::Size,
            VersionField::Source,
            VersionField::Mtime,
            VersionField::Muser,
            VersionField::Cluster,
        ];
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum FieldValue {
        Int(i64),
        OptInt(Option<i64>),
        Real(f64),
        Text(String),
    }
}
