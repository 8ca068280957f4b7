#![cfg(feature = "sqlite")]

mod common;

use std::sync::{Arc, Mutex};

use common::{MockScript, mock_db, sqlite_db};
use sql_ez::prelude::*;

async fn seed(db: &SqlEz) {
    db.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)")
        .await
        .unwrap();
    for (id, name, score) in [(1, "alice", 9.5), (2, "bob", 7.0), (3, "carol", 8.25)] {
        db.exec((
            "INSERT INTO users (id, name, score) VALUES (?1, ?2, ?3)",
            vec![id.into(), name.into(), score.into()],
        ))
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn awaitable_exec_returns_rows_and_names() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir).await;
    seed(&db).await;

    let result = db
        .exec("SELECT id, name, score FROM users ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(
        result.get_column_names().unwrap().as_slice(),
        ["id", "name", "score"]
    );
    let first = &result.rows()[0];
    assert_eq!(first.get("name").and_then(RowValues::as_text), Some("alice"));
    assert_eq!(first.get("score").and_then(RowValues::as_float), Some(9.5));
    assert_eq!(result.to_arrays()[2][1], RowValues::Text("carol".into()));
}

#[tokio::test]
async fn dml_reports_changed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir).await;
    seed(&db).await;

    let result = db
        .exec_params("UPDATE users SET score = score + 1 WHERE score > ?1", vec![8.into()])
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.rows_affected, 2);
}

#[tokio::test]
async fn separate_params_only_fill_bare_requests() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir).await;
    seed(&db).await;

    let result = db
        .exec_params("SELECT name FROM users WHERE id = ?1", vec![2.into()])
        .await
        .unwrap();
    assert_eq!(result.rows()[0].get("name").and_then(RowValues::as_text), Some("bob"));

    // values already on the request win over the separate list
    let request = QueryRequest::new("SELECT name FROM users WHERE id = ?1").with_values(vec![3.into()]);
    let result = db.exec_params(request, vec![1.into()]).await.unwrap();
    assert_eq!(result.rows()[0].get("name").and_then(RowValues::as_text), Some("carol"));
}

#[tokio::test]
async fn deferred_and_callback_styles_agree_with_awaitable() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir).await;
    seed(&db).await;
    let sql = "SELECT COUNT(*) AS n FROM users";

    let awaited = db.exec(sql).await.unwrap();

    let deferred = db.exec_deferred(sql);
    let deferred = deferred.await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    db.exec_detached(sql, move |outcome| {
        let _ = tx.send(outcome);
    });
    let detached = rx.await.unwrap().unwrap();

    let captured = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&captured);
    db.exec_with_callback(sql, move |outcome| {
        *slot.lock().unwrap() = Some(outcome.map(|rs| rs.rows()[0].get("n").cloned()));
    })
    .await;

    assert_eq!(awaited, deferred);
    assert_eq!(awaited, detached);
    let from_callback = captured.lock().unwrap().take().unwrap().unwrap();
    assert_eq!(from_callback, Some(RowValues::Int(3)));
}

#[tokio::test]
async fn failures_reach_every_style_and_release_the_connection() {
    let (db, state) = mock_db(MockScript::failing(&["broken"]));

    let err = db.exec("SELECT broken").await.unwrap_err();
    assert!(matches!(err, SqlEzError::ExecutionError(_)));

    let err = db.exec_deferred("SELECT broken").await.unwrap_err();
    assert!(matches!(err, SqlEzError::ExecutionError(_)));

    let (tx, rx) = tokio::sync::oneshot::channel();
    db.exec_detached("SELECT broken", move |outcome| {
        let _ = tx.send(outcome.is_err());
    });
    assert!(rx.await.unwrap());

    assert_eq!(state.acquired(), 3);
    assert_eq!(state.released(), 3);
}

#[tokio::test]
async fn acquisition_failure_is_a_connection_error() {
    let (db, state) = mock_db(MockScript {
        fail_acquire: true,
        ..MockScript::default()
    });
    let err = db.exec("SELECT 1").await.unwrap_err();
    assert!(matches!(err, SqlEzError::ConnectionError(_)));
    assert_eq!(state.released(), 0);
    assert!(state.log().is_empty());
}

#[tokio::test]
async fn blank_query_is_rejected_before_acquiring() {
    let (db, state) = mock_db(MockScript::default());
    let err = db.exec("   ").await.unwrap_err();
    assert!(matches!(err, SqlEzError::ParameterError(_)));
    assert_eq!(state.acquired(), 0);
}

#[tokio::test]
async fn request_parameters_reach_the_driver() {
    let (db, state) = mock_db(MockScript::default());
    let result = db
        .exec(("SELECT $1, $2", vec![1.into(), "two".into()]))
        .await
        .unwrap();
    assert_eq!(result.rows()[0].get("params"), Some(&RowValues::Int(2)));
    assert_eq!(state.log(), vec!["SELECT $1, $2".to_string()]);
}
