use std::collections::HashMap;

use anyhow::{Context, bail};
use http::Uri;
use tabgrid_pb::{
    CreateTableRequest, DeleteLineRequest, GetLineRequest,
    RegisterStorageRequest, Table, TableRef,
    coordinator_service_client::CoordinatorServiceClient,
};
use tonic::transport::Channel;
use tracing::{debug, info};

#[derive(clap::Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct TabgridCli {
    #[command(subcommand)]
    pub command: TabgridCommands,
    #[clap(flatten)]
    pub conn: ConnectionArgs,
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum TabgridCommands {
    /// Storage server operation
    #[clap(aliases = &["s"])]
    Storage {
        #[command(subcommand)]
        opt: StorageOperation,
    },
    /// Table operation
    #[clap(aliases = &["t"])]
    Table {
        #[command(subcommand)]
        opt: TableOperation,
    },
    /// Line operation
    #[clap(aliases = &["l"])]
    Line {
        #[command(subcommand)]
        opt: LineOperation,
    },
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum StorageOperation {
    /// Register a storage server
    #[clap(aliases = &["r"])]
    Register {
        /// Address of the storage server. Example `127.0.0.1:9001`
        address: String,
    },
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum TableOperation {
    /// Create a partitioned table
    #[clap(aliases = &["c"])]
    Create {
        name: String,
        /// Column definitions. Example `-c id=int -c amount=varchar(255)`
        #[arg(short, long)]
        column: Vec<String>,
        /// Primary key column
        #[arg(short = 'k', long)]
        primary_key: String,
        /// Number of primary partitions
        #[arg(short, long, default_value = "1")]
        partitions: u32,
    },
    /// Delete a table with all of its partitions
    #[clap(aliases = &["d"])]
    Delete { name: String },
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum LineOperation {
    /// Insert a line
    #[clap(aliases = &["i"])]
    Insert {
        table: String,
        /// Column values. Example `-v id=1 -v amount=10`
        #[arg(short, long)]
        value: Vec<String>,
    },
    /// Update a line identified by its primary key value
    #[clap(aliases = &["u"])]
    Update {
        table: String,
        #[arg(short, long)]
        value: Vec<String>,
    },
    /// Get a line
    #[clap(aliases = &["g"])]
    Get {
        table: String,
        primary_key_value: String,
        /// Primary key column, resolved by the coordinator when omitted
        #[arg(short = 'k', long)]
        primary_key: Option<String>,
    },
    /// Delete a line
    #[clap(aliases = &["d"])]
    Delete {
        table: String,
        primary_key_value: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Coordinator URL
    #[arg(
        short,
        long,
        global = true,
        default_value = "http://127.0.0.1:8000"
    )]
    pub grpc_url: Uri,
}

impl ConnectionArgs {
    pub async fn connect(
        &self,
    ) -> anyhow::Result<CoordinatorServiceClient<Channel>> {
        debug!("connect to {}", self.grpc_url);
        CoordinatorServiceClient::connect(self.grpc_url.clone())
            .await
            .with_context(|| format!("cannot connect to {}", self.grpc_url))
    }
}

/// Splits `key=value` pairs.
pub fn parse_pairs(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => bail!("expected `key=value` but got `{pair}`"),
        })
        .collect()
}

pub async fn run(cli: TabgridCli) -> anyhow::Result<()> {
    info!("use option {cli:?}");
    let mut client = cli.conn.connect().await?;
    match cli.command {
        TabgridCommands::Storage {
            opt: StorageOperation::Register { address },
        } => {
            client
                .register_storage_server(RegisterStorageRequest { address })
                .await?;
        }
        TabgridCommands::Table { opt } => match opt {
            TableOperation::Create {
                name,
                column,
                primary_key,
                partitions,
            } => {
                let table = Table {
                    name,
                    columns: parse_pairs(&column)?,
                    primary_key,
                };
                client
                    .create_table(CreateTableRequest {
                        table: Some(table),
                        partition_count: partitions,
                    })
                    .await?;
            }
            TableOperation::Delete { name } => {
                client.delete_table(TableRef { name }).await?;
            }
        },
        TabgridCommands::Line { opt } => match opt {
            LineOperation::Insert { table, value } => {
                client.insert_line(line_of(table, &value)?).await?;
            }
            LineOperation::Update { table, value } => {
                client.update_line(line_of(table, &value)?).await?;
            }
            LineOperation::Get {
                table,
                primary_key_value,
                primary_key,
            } => {
                let line = client
                    .get_line(GetLineRequest {
                        table: Some(Table {
                            name: table,
                            primary_key: primary_key.unwrap_or_default(),
                            ..Default::default()
                        }),
                        primary_key_value,
                    })
                    .await?
                    .into_inner();
                println!("{}", serde_json::to_string_pretty(&line)?);
                return Ok(());
            }
            LineOperation::Delete {
                table,
                primary_key_value,
            } => {
                client
                    .delete_line(DeleteLineRequest {
                        table,
                        primary_key_value,
                        ..Default::default()
                    })
                    .await?;
            }
        },
    }
    println!("{}", serde_json::json!({ "status": "ok" }));
    Ok(())
}

fn line_of(table: String, values: &[String]) -> anyhow::Result<tabgrid_pb::Line> {
    Ok(tabgrid_pb::Line {
        table,
        line: parse_pairs(values)?,
        ..Default::default()
    })
}
