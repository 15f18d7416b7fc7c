use tracing::{debug, warn};

use crate::{
    cache::CacheKey,
    coordinator::Coordinator,
    error::{BackendError, CoordinatorError},
    model::Line,
    table::{CoordinatorTable, PartitionSet, TablePartition},
};

impl Coordinator {
    /// Writes a line to the least loaded primary and its paired replica.
    pub async fn insert_line(&self, line: Line) -> Result<(), CoordinatorError> {
        let table = self.get_table(&line.table).await?;
        let mut partitions = table.lock().await;
        if partitions.is_empty() {
            return Err(CoordinatorError::TableNotFound(line.table));
        }
        let (line, key) = bind_primary_key(&table, line)?;
        let index = partitions
            .least_loaded()
            .ok_or_else(|| CoordinatorError::TableNotFound(line.table.clone()))?;
        {
            let primary = &partitions.primaries[index];
            let replica = &partitions.replicas[index];
            debug!(
                "insert '{}' into '{}' on '{}'",
                key,
                primary.name,
                primary.backend.addr()
            );
            write_copy(primary, &line).await?;
            if let Err(e) = write_copy(replica, &line).await {
                warn!(
                    "replica '{}' diverged from primary '{}' on key '{}': {e}",
                    replica.name, primary.name, key
                );
                return Err(e);
            }
        }
        partitions.record_insert(index);
        self.cache
            .put(CacheKey::new(table.name(), &key), line)
            .await;
        Ok(())
    }

    /// Reads a line from the cache, falling back to scanning primaries in order.
    pub async fn get_line(
        &self,
        table_name: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<Line, CoordinatorError> {
        let table = self.get_table(table_name).await?;
        let partitions = table.lock().await;
        if partitions.is_empty() {
            return Err(CoordinatorError::TableNotFound(table_name.into()));
        }
        let column = if primary_key.is_empty() {
            table.primary_key()
        } else {
            primary_key
        };
        // the cache is keyed by primary-key value only
        if column == table.primary_key() {
            let cache_key = CacheKey::new(table_name, primary_key_value);
            if let Some(line) = self.cache.get(&cache_key).await {
                debug!("cache hit for '{table_name}' key '{primary_key_value}'");
                return Ok(line);
            }
        }
        for p in partitions.primaries.iter() {
            match p
                .backend
                .backend()
                .get_line(&p.name, column, primary_key_value)
                .await
            {
                Ok(found) => {
                    debug!("found key '{primary_key_value}' in '{}'", p.name);
                    return Ok(Line {
                        table: table_name.into(),
                        primary_key: table.primary_key().into(),
                        columns: found.columns,
                    });
                }
                Err(BackendError::NotFound(_)) => continue,
                Err(e) => {
                    return Err(CoordinatorError::remote(p.backend.addr(), e));
                }
            }
        }
        Err(CoordinatorError::LineNotFound {
            table: table_name.into(),
            key: primary_key_value.into(),
        })
    }

    /// Sends the updated line to every primary and replica partition.
    pub async fn update_line(&self, line: Line) -> Result<(), CoordinatorError> {
        let table = self.get_table(&line.table).await?;
        let partitions = table.lock().await;
        if partitions.is_empty() {
            return Err(CoordinatorError::TableNotFound(line.table));
        }
        let (line, key) = bind_primary_key(&table, line)?;
        broadcast(&partitions, Mutation::Update(&line)).await?;
        self.cache
            .put(CacheKey::new(table.name(), &key), line)
            .await;
        Ok(())
    }

    /// Deletes a key from every primary and replica partition.
    pub async fn delete_line(
        &self,
        table_name: &str,
        primary_key_value: &str,
    ) -> Result<(), CoordinatorError> {
        let table = self.get_table(table_name).await?;
        let partitions = table.lock().await;
        if partitions.is_empty() {
            return Err(CoordinatorError::TableNotFound(table_name.into()));
        }
        broadcast(
            &partitions,
            Mutation::Delete {
                primary_key: table.primary_key(),
                value: primary_key_value,
            },
        )
        .await?;
        self.cache
            .invalidate(&CacheKey::new(table_name, primary_key_value))
            .await;
        Ok(())
    }
}

/// Normalizes the line onto the table's primary key and extracts its value.
fn bind_primary_key(
    table: &CoordinatorTable,
    mut line: Line,
) -> Result<(Line, String), CoordinatorError> {
    if !line.primary_key.is_empty() && line.primary_key != table.primary_key() {
        return Err(CoordinatorError::InvalidArgument(format!(
            "table `{}` is keyed by `{}`, not `{}`",
            table.name(),
            table.primary_key(),
            line.primary_key
        )));
    }
    line.primary_key = table.primary_key().into();
    let key = line
        .primary_key_value()
        .map(|v| v.to_string())
        .ok_or_else(|| {
            CoordinatorError::InvalidArgument(format!(
                "line has no value for primary key `{}`",
                table.primary_key()
            ))
        })?;
    Ok((line, key))
}

async fn write_copy(
    partition: &TablePartition,
    line: &Line,
) -> Result<(), CoordinatorError> {
    partition
        .backend
        .backend()
        .insert_line(&line.for_partition(&partition.name))
        .await
        .map_err(|e| CoordinatorError::remote(partition.backend.addr(), e))
}

enum Mutation<'a> {
    Update(&'a Line),
    Delete {
        primary_key: &'a str,
        value: &'a str,
    },
}

impl Mutation<'_> {
    async fn apply(&self, partition: &TablePartition) -> Result<(), BackendError> {
        let backend = partition.backend.backend();
        match self {
            Mutation::Update(line) => {
                backend
                    .update_line(&line.for_partition(&partition.name))
                    .await
            }
            Mutation::Delete { primary_key, value } => {
                backend.delete_line(&partition.name, primary_key, value).await
            }
        }
    }
}

/// Applies a mutation to primaries then replicas; the first failure aborts.
async fn broadcast(
    partitions: &PartitionSet,
    mutation: Mutation<'_>,
) -> Result<(), CoordinatorError> {
    let mut applied: Vec<&str> = Vec::new();
    for p in partitions.all() {
        if let Err(e) = mutation.apply(p).await {
            if !applied.is_empty() {
                warn!(
                    "partition '{}' failed after {:?} were already changed: {e}",
                    p.name, applied
                );
            }
            return Err(CoordinatorError::remote(p.backend.addr(), e));
        }
        applied.push(&p.name);
    }
    Ok(())
}
