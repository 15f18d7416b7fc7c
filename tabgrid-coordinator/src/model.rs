use std::collections::BTreeMap;

use crate::error::CoordinatorError;

/// Column layout of a logical table.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: BTreeMap<String, String>,
    pub primary_key: String,
}

impl TableSchema {
    /// Same columns and primary key under another table name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.into(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
        }
    }
}

/// One row. Its identity is the value of the primary-key column.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Line {
    pub table: String,
    pub primary_key: String,
    pub columns: BTreeMap<String, String>,
}

impl Line {
    pub fn primary_key_value(&self) -> Option<&str> {
        self.columns.get(&self.primary_key).map(|v| v.as_str())
    }

    /// Copy of this line addressed to a physical partition.
    pub fn for_partition(&self, partition: &str) -> Self {
        Self {
            table: partition.into(),
            primary_key: self.primary_key.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl From<tabgrid_pb::Table> for TableSchema {
    fn from(value: tabgrid_pb::Table) -> Self {
        Self {
            name: value.name,
            columns: value.columns.into_iter().collect(),
            primary_key: value.primary_key,
        }
    }
}

impl From<&TableSchema> for tabgrid_pb::Table {
    fn from(value: &TableSchema) -> Self {
        Self {
            name: value.name.clone(),
            columns: value
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            primary_key: value.primary_key.clone(),
        }
    }
}

impl From<tabgrid_pb::Line> for Line {
    fn from(value: tabgrid_pb::Line) -> Self {
        Self {
            table: value.table,
            primary_key: value.primary_key,
            columns: value.line.into_iter().collect(),
        }
    }
}

impl From<&Line> for tabgrid_pb::Line {
    fn from(value: &Line) -> Self {
        Self {
            table: value.table.clone(),
            primary_key: value.primary_key.clone(),
            line: value
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl From<Line> for tabgrid_pb::Line {
    fn from(value: Line) -> Self {
        Self {
            table: value.table,
            primary_key: value.primary_key,
            line: value.columns.into_iter().collect(),
        }
    }
}

/// Credentials handed to a storage backend on `Register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatabaseConfig {
    pub db_type: String,
    pub host: String,
    pub port: i32,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl From<&DatabaseConfig> for tabgrid_pb::Database {
    fn from(value: &DatabaseConfig) -> Self {
        Self {
            r#type: value.db_type.clone(),
            host: value.host.clone(),
            port: value.port,
            database: value.database.clone(),
            user: value.user.clone(),
            password: value.password.clone(),
        }
    }
}

pub(crate) fn validate_schema(
    schema: &TableSchema,
    partition_count: u32,
) -> Result<(), CoordinatorError> {
    if schema.name.is_empty() {
        return Err(CoordinatorError::InvalidArgument(
            "table name must not be empty".into(),
        ));
    }
    if partition_count == 0 {
        return Err(CoordinatorError::InvalidArgument(
            "partition count must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn line(table: &str, pk: &str, cols: &[(&str, &str)]) -> Line {
    Line {
        table: table.into(),
        primary_key: pk.into(),
        columns: cols
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[cfg(test)]
pub(crate) fn orders_schema() -> TableSchema {
    TableSchema {
        name: "orders".into(),
        columns: [("id", "int"), ("amount", "varchar(255)")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        primary_key: "id".into(),
    }
}
