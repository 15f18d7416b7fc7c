use std::collections::HashSet;

use tabgrid_coordinator::Config;
use tabgrid_pb::{
    CreateTableRequest, DeleteLineRequest, GetLineRequest, Line,
    RegisterStorageRequest, Table, TableRef,
    coordinator_service_client::CoordinatorServiceClient,
};
use tokio_util::sync::CancellationToken;
use tonic::{Code, transport::Channel};

async fn start_storage(token: &CancellationToken) -> String {
    let conf = tabgrid_storage::Config {
        port: 0,
        db_type: Some("memory".into()),
        ..Default::default()
    };
    let addr = tabgrid_storage::start_server(&conf, token.clone())
        .await
        .unwrap();
    format!("127.0.0.1:{}", addr.port())
}

fn orders() -> Table {
    Table {
        name: "orders".into(),
        columns: [
            ("id".to_string(), "int".to_string()),
            ("amount".to_string(), "varchar(255)".to_string()),
        ]
        .into(),
        primary_key: "id".into(),
    }
}

fn order(id: u32, amount: u32) -> Line {
    Line {
        table: "orders".into(),
        primary_key: "id".into(),
        line: [
            ("id".to_string(), id.to_string()),
            ("amount".to_string(), amount.to_string()),
        ]
        .into(),
    }
}

fn get_order(id: &str) -> GetLineRequest {
    GetLineRequest {
        table: Some(Table {
            name: "orders".into(),
            primary_key: "id".into(),
            ..Default::default()
        }),
        primary_key_value: id.into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orders_lifecycle_over_grpc() {
    let token = CancellationToken::new();
    let mut storages = Vec::new();
    for _ in 0..3 {
        storages.push(start_storage(&token).await);
    }
    let conf = Config {
        port: 0,
        storage_servers: Some(storages.join(",")),
        seed: Some(7),
        ..Default::default()
    };
    let (coordinator, addr) =
        tabgrid_coordinator::start_server(&conf, token.clone())
            .await
            .unwrap();
    let mut client: CoordinatorServiceClient<Channel> =
        CoordinatorServiceClient::connect(format!(
            "http://127.0.0.1:{}",
            addr.port()
        ))
        .await
        .unwrap();

    // a fourth server joins through the coordinator API
    let late = start_storage(&token).await;
    client
        .register_storage_server(RegisterStorageRequest {
            address: late.clone(),
        })
        .await
        .unwrap();
    assert_eq!(coordinator.registered_servers().await.len(), 4);

    client
        .create_table(CreateTableRequest {
            table: Some(orders()),
            partition_count: 2,
        })
        .await
        .unwrap();
    let layout = coordinator.table_layout("orders").await.unwrap();
    let used: HashSet<_> = layout
        .primaries
        .iter()
        .chain(layout.replicas.iter())
        .map(|p| p.addr.clone())
        .collect();
    assert_eq!(used.len(), 4);

    let too_wide = client
        .create_table(CreateTableRequest {
            table: Some(Table {
                name: "wide".into(),
                ..orders()
            }),
            partition_count: 3,
        })
        .await
        .unwrap_err();
    assert_eq!(too_wide.code(), Code::FailedPrecondition);

    for id in 1..=4 {
        client.insert_line(order(id, id * 10)).await.unwrap();
    }
    let layout = coordinator.table_layout("orders").await.unwrap();
    assert_eq!(layout.primary_row_counts(), vec![2, 2]);
    assert_eq!(layout.replica_row_counts(), vec![2, 2]);

    let got = client.get_line(get_order("3")).await.unwrap().into_inner();
    assert_eq!(got.value_of("amount"), Some("30"));

    client.update_line(order(3, 99)).await.unwrap();
    let got = client.get_line(get_order("3")).await.unwrap().into_inner();
    assert_eq!(got.value_of("amount"), Some("99"));

    client
        .delete_line(DeleteLineRequest {
            table: "orders".into(),
            primary_key: "id".into(),
            primary_key_value: "3".into(),
        })
        .await
        .unwrap();
    let missing = client.get_line(get_order("3")).await.unwrap_err();
    assert_eq!(missing.code(), Code::NotFound);
    let other = client.get_line(get_order("2")).await.unwrap().into_inner();
    assert_eq!(other.value_of("amount"), Some("20"));

    client
        .delete_table(TableRef::from("orders"))
        .await
        .unwrap();
    let gone = client.get_line(get_order("1")).await.unwrap_err();
    assert_eq!(gone.code(), Code::NotFound);
    let gone = client.insert_line(order(5, 50)).await.unwrap_err();
    assert_eq!(gone.code(), Code::NotFound);

    token.cancel();
}
