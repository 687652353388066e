//! End-to-end operation tests against a real database.

use super::{authed, get_test_service, scratch_table};
use pretty_assertions::assert_eq;
use sql_gateway::envelope::Envelope;
use sql_gateway::service::{QueryRequest, SqlService};

async fn run(svc: &SqlService, sql: &str) -> Envelope {
    svc.raw_query(Some(&authed()), &QueryRequest::new(sql)).await
}

#[tokio::test]
async fn test_write_then_select_lifecycle() {
    let Some(svc) = get_test_service() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };
    let table = scratch_table("lifecycle");
    let md = authed();

    run(&svc, &format!("DROP TABLE IF EXISTS {table}")).await;
    let created = run(
        &svc,
        &format!("CREATE TABLE {table} (name VARCHAR(32), age INT)"),
    )
    .await;
    assert_eq!(created, Envelope::ok());

    let inserted = svc
        .insert_query(
            Some(&md),
            &QueryRequest::new(format!(
                "INSERT INTO {table} (name, age) VALUES ('Ada', 36), ('Linus', 21)"
            )),
        )
        .await;
    assert_eq!(inserted, Envelope::ok());

    let select = QueryRequest::new(format!("SELECT name, age FROM {table} ORDER BY age DESC"));
    let selected = svc.select_query(Some(&md), &select).await;
    assert_eq!(selected.status, "OK");
    assert_eq!(selected.error, "NULL");
    assert_eq!(
        selected.result,
        r#"[{"name":"Ada","age":36},{"name":"Linus","age":21}]"#
    );

    let updated = svc
        .update_query(
            Some(&md),
            &QueryRequest::new(format!("UPDATE {table} SET age = 37 WHERE name = 'Ada'")),
        )
        .await;
    assert_eq!(updated, Envelope::ok());

    let deleted = svc
        .delete_query(Some(&md), &QueryRequest::new(format!("DELETE FROM {table}")))
        .await;
    assert_eq!(deleted, Envelope::ok());

    let empty = svc.select_query(Some(&md), &select).await;
    assert_eq!(empty, Envelope::not_found());

    assert_eq!(run(&svc, &format!("DROP TABLE {table}")).await, Envelope::ok());
}

#[tokio::test]
async fn test_textual_values_are_escaped() {
    let Some(svc) = get_test_service() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };
    let table = scratch_table("escaping");

    run(&svc, &format!("DROP TABLE IF EXISTS {table}")).await;
    run(&svc, &format!("CREATE TABLE {table} (note VARCHAR(64))")).await;
    run(
        &svc,
        &format!(r#"INSERT INTO {table} (note) VALUES ('say "hi"')"#),
    )
    .await;

    let env = svc
        .select_query(
            Some(&authed()),
            &QueryRequest::new(format!("SELECT note FROM {table}")),
        )
        .await;
    run(&svc, &format!("DROP TABLE {table}")).await;

    assert_eq!(env.result, r#"[{"note":"say \"hi\""}]"#);
    let parsed: serde_json::Value = serde_json::from_str(&env.result).unwrap();
    assert_eq!(parsed[0]["note"], r#"say "hi""#);
}

#[tokio::test]
async fn test_bad_sql_is_query_error() {
    let Some(svc) = get_test_service() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };

    let env = svc
        .select_query(
            Some(&authed()),
            &QueryRequest::new("SELECT * FROM gateway_it_table_that_does_not_exist"),
        )
        .await;

    assert_eq!(env.status, "ABORTED");
    assert_eq!(env.result, "QUERY_ERROR");
    assert!(!env.error.is_empty());
    assert_ne!(env.error, "NULL");
}

#[tokio::test]
async fn test_write_failure_is_query_error() {
    let Some(svc) = get_test_service() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };

    let env = run(&svc, "INSERT INTO gateway_it_table_that_does_not_exist VALUES (1)").await;

    assert_eq!(env.status, "ABORTED");
    assert_eq!(env.result, "QUERY_ERROR");
}

#[tokio::test]
async fn test_select_with_two_result_sets_is_rejected() {
    let Some(svc) = get_test_service() else {
        eprintln!("Skipping test: GATEWAY_TEST_DATABASE_URL not set");
        return;
    };

    let env = svc
        .select_query(
            Some(&authed()),
            &QueryRequest::new("SELECT 1 AS a; SELECT 'x' AS b"),
        )
        .await;

    assert_eq!(env.status, "ABORTED");
    assert_eq!(env.result, "QUERY_ERROR");
    assert_eq!(env.error, "statement returned more than one result set");
}
