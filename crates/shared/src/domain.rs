use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_newtype!(Dialect);
name_newtype!(VdbName);

/// Source dialects the translator understands, `(value, label)` pairs.
pub const KNOWN_DIALECTS: &[(&str, &str)] = &[
    ("athena", "Athena"),
    ("bigquery", "BigQuery"),
    ("clickhouse", "ClickHouse"),
    ("databricks", "Databricks"),
    ("doris", "Doris"),
    ("drill", "Drill"),
    ("druid", "Druid"),
    ("duckdb", "DuckDB"),
    ("dune", "Dune"),
    ("hive", "Hive"),
    ("materialize", "Materialize"),
    ("mysql", "MySQL"),
    ("oracle", "Oracle"),
    ("postgres", "PostgreSQL"),
    ("presto", "Presto"),
    ("prql", "PRQL"),
    ("redshift", "Redshift"),
    ("risingwave", "RisingWave"),
    ("snowflake", "Snowflake"),
    ("spark", "Spark SQL"),
    ("spark2", "Spark SQL 2"),
    ("sqlite", "SQLite"),
    ("starrocks", "StarRocks"),
    ("tableau", "Tableau"),
    ("teradata", "Teradata"),
    ("trino", "Trino"),
];

pub fn is_known_dialect(value: &str) -> bool {
    KNOWN_DIALECTS.iter().any(|(v, _)| *v == value)
}
