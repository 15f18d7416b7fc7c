use std::collections::BTreeMap;

use scc::HashMap;
use tabgrid_pb::{Database, DeleteLineRequest, GetLineRequest, Line, Table};
use tracing::{debug, info};

use crate::error::StorageError;

use super::DbConnector;

#[derive(Debug, Clone)]
struct MemTable {
    primary_key: String,
    rows: BTreeMap<String, std::collections::HashMap<String, String>>,
}

/// Keeps every table in process memory, keyed by primary-key value.
#[derive(Default)]
pub struct MemoryConnector {
    tables: HashMap<String, MemTable>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DbConnector for MemoryConnector {
    async fn connect(&self, db: &Database) -> Result<(), StorageError> {
        info!("attach in-memory database '{}'", db.database);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StorageError> {
        self.tables.clear_async().await;
        Ok(())
    }

    async fn create_table(&self, table: Table) -> Result<(), StorageError> {
        if table.primary_key.is_empty() {
            return Err(StorageError::InvalidArgument(format!(
                "table `{}` has no primary key",
                table.name
            )));
        }
        let mem = MemTable {
            primary_key: table.primary_key,
            rows: BTreeMap::new(),
        };
        self.tables
            .insert_async(table.name, mem)
            .await
            .map_err(|(name, _)| StorageError::TableExists(name))?;
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<(), StorageError> {
        self.tables
            .remove_async(name)
            .await
            .map(|_| ())
            .ok_or_else(|| StorageError::NoTable(name.into()))
    }

    async fn insert_line(&self, line: Line) -> Result<(), StorageError> {
        let table = line.table.clone();
        self.tables
            .update_async(&line.table, |_, mem| {
                let key = mem
                    .primary_key_value(&line)
                    .ok_or_else(|| StorageError::InvalidArgument(format!(
                        "line has no value for `{}`",
                        mem.primary_key
                    )))?
                    .to_string();
                if mem.rows.contains_key(&key) {
                    return Err(StorageError::LineExists {
                        table: table.clone(),
                        key,
                    });
                }
                debug!("insert '{}' into '{}'", key, table);
                mem.rows.insert(key, line.line.clone());
                Ok(())
            })
            .await
            .ok_or_else(|| StorageError::NoTable(line.table.clone()))?
    }

    async fn delete_line(
        &self,
        request: DeleteLineRequest,
    ) -> Result<(), StorageError> {
        self.tables
            .update_async(&request.table, |_, mem| {
                mem.rows.remove(&request.primary_key_value);
            })
            .await
            .ok_or_else(|| StorageError::NoTable(request.table.clone()))
    }

    async fn update_line(&self, line: Line) -> Result<(), StorageError> {
        self.tables
            .update_async(&line.table, |_, mem| {
                let Some(key) = mem.primary_key_value(&line) else {
                    return;
                };
                if let Some(row) = mem.rows.get_mut(key) {
                    row.extend(line.line.clone());
                }
            })
            .await
            .ok_or_else(|| StorageError::NoTable(line.table.clone()))
    }

    async fn get_line(
        &self,
        request: GetLineRequest,
    ) -> Result<Line, StorageError> {
        let table = request.table.ok_or_else(|| {
            StorageError::InvalidArgument("table must not be none".into())
        })?;
        let value = request.primary_key_value;
        let found = self
            .tables
            .read_async(&table.name, |_, mem| mem.find(&table.primary_key, &value))
            .await
            .ok_or_else(|| StorageError::NoTable(table.name.clone()))?;
        found.ok_or_else(|| StorageError::NoLine {
            table: table.name.clone(),
            key: value,
        })
    }
}

impl MemTable {
    fn primary_key_value<'a>(&self, line: &'a Line) -> Option<&'a str> {
        line.line.get(&self.primary_key).map(|v| v.as_str())
    }

    /// Looks a row up by primary key, or scans when another column is named.
    fn find(&self, column: &str, value: &str) -> Option<Line> {
        let to_line = |row: &std::collections::HashMap<String, String>| Line {
            table: String::new(),
            primary_key: self.primary_key.clone(),
            line: row.clone(),
        };
        if column.is_empty() || column == self.primary_key {
            self.rows.get(value).map(to_line)
        } else {
            self.rows
                .values()
                .find(|row| row.get(column).map(|v| v.as_str()) == Some(value))
                .map(to_line)
        }
    }
}
