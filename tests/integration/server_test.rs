//! Tests the listeners end to end over real sockets.

use super::SECRET;
use sql_gateway::config::SharedSecret;
use sql_gateway::db::{ColumnInfo, MockDatabase, MockResponse, QueryResult, Value};
use sql_gateway::gate::AUTH_KEY;
use sql_gateway::grpc::sql_services_client::SqlServicesClient;
use sql_gateway::grpc::Input;
use sql_gateway::materialize::TypeNameClassifier;
use sql_gateway::server;
use sql_gateway::service::{Operation, SqlService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataValue;

const PEOPLE: &str = "SELECT name FROM people";

fn scripted() -> MockDatabase {
    let rows = QueryResult::with_data(
        vec![ColumnInfo::new("name", "VARCHAR")],
        vec![vec![Value::from("Ada")]],
    );
    MockDatabase::new().respond(PEOPLE, MockResponse::Rows(rows))
}

fn service(db: &MockDatabase) -> SqlService {
    SqlService::new(
        Arc::new(db.clone()),
        Arc::new(TypeNameClassifier::default()),
        SharedSecret::new(SECRET),
    )
}

async fn local_listener() -> TcpListener {
    server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
}

fn grpc_request(query: &str, auth: &'static str) -> tonic::Request<Input> {
    let mut request = tonic::Request::new(Input {
        query: query.to_string(),
    });
    request
        .metadata_mut()
        .insert(AUTH_KEY, MetadataValue::from_static(auth));
    request
}

async fn post(addr: SocketAddr, method: &str, auth: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST /sql.SQLServices/{method} HTTP/1.1\r\n\
         host: {addr}\r\n\
         auth: {auth}\r\n\
         content-type: application/json\r\n\
         content-length: {}\r\n\
         connection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_grpc_answers_and_shuts_down() {
    let db = scripted();
    let listener = local_listener().await;
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server::serve(listener, None, service(&db), shutdown.clone()));

    let channel = tonic::transport::Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut client = SqlServicesClient::new(channel);

    let ok = client
        .call(Operation::Select, grpc_request(PEOPLE, SECRET))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(ok.status, "OK");
    assert_eq!(ok.result, r#"[{"name":"Ada"}]"#);
    assert_eq!(ok.error, "NULL");

    let denied = client
        .call(Operation::Delete, grpc_request("DELETE FROM people", "guess"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!((denied.status.as_str(), denied.result.as_str()), ("UNAUTHORIZED", "OK"));

    let written = client
        .call(Operation::Insert, grpc_request("INSERT INTO people VALUES ('Bob')", SECRET))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(written.status, "OK");
    assert_eq!(written.result, "OK");

    drop(client);
    shutdown.cancel();
    serving.await.unwrap().unwrap();
    assert_eq!(db.acquired(), 2);
    assert_eq!(db.closed(), db.acquired());
}

#[tokio::test]
async fn test_http_listener_alongside_grpc() {
    let db = scripted();
    let grpc_listener = local_listener().await;
    let http_listener = local_listener().await;
    let addr = http_listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server::serve(
        grpc_listener,
        Some(http_listener),
        service(&db),
        shutdown.clone(),
    ));

    let body = serde_json::json!({ "query": PEOPLE }).to_string();
    let ok = post(addr, "SelectQuery", SECRET, &body).await;
    assert!(ok.starts_with("HTTP/1.1 200"), "{ok}");
    assert!(ok.contains(r#""status":"OK""#), "{ok}");
    assert!(ok.contains(r#"[{\"name\":\"Ada\"}]"#), "{ok}");

    let denied = post(addr, "SelectQuery", "guess", &body).await;
    assert!(denied.contains(r#""status":"UNAUTHORIZED""#), "{denied}");

    shutdown.cancel();
    serving.await.unwrap().unwrap();
    assert_eq!(db.acquired(), 1);
    assert_eq!(db.closed(), db.acquired());
}

#[tokio::test]
async fn test_bind_conflict_is_server_error() {
    let first = local_listener().await;
    let addr = first.local_addr().unwrap();

    let err = server::bind(addr).await.unwrap_err();
    assert_eq!(err.category(), "Server Error");
}
