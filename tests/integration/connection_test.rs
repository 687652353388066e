//! Connection failure tests.

use super::{authed, gateway_config, get_test_database_url};
use sql_gateway::config::ConnectionConfig;
use sql_gateway::service::{QueryRequest, SqlService};

#[tokio::test]
async fn test_unreachable_database_is_bad_connection() {
    let database = ConnectionConfig {
        host: Some("127.0.0.1".to_string()),
        port: Some(1),
        database: Some("nowhere".to_string()),
        user: Some("nobody".to_string()),
        connect_timeout_secs: 2,
        ..Default::default()
    };
    let svc = SqlService::from_config(&gateway_config(database));

    let env = svc
        .insert_query(Some(&authed()), &QueryRequest::new("INSERT INTO t VALUES (1)"))
        .await;

    assert_eq!(env.status, "ABORTED");
    assert_eq!(env.result, "BAD_DB_CONNECTION");
    assert_ne!(env.error, "NULL");
}

#[tokio::test]
async fn test_wrong_password_is_bad_connection() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };
    let mut database = ConnectionConfig::from_connection_string(&url).unwrap();
    database.password = Some("definitely-not-the-password".to_string());
    let svc = SqlService::from_config(&gateway_config(database));

    let env = svc
        .select_query(Some(&authed()), &QueryRequest::new("SELECT 1"))
        .await;

    assert_eq!(env.status, "ABORTED");
    assert_eq!(env.result, "BAD_DB_CONNECTION");
}
