#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use sql_ez::prelude::*;
use sql_ez::results::RowShape;
use sql_ez::source::RowStream;
use tokio::sync::Semaphore;

/// What the scripted connections should do.
#[derive(Clone, Default)]
pub struct MockScript {
    /// Every acquire fails.
    pub fail_acquire: bool,
    /// Statements containing any of these fragments fail (BEGIN, COMMIT and ROLLBACK included).
    pub failing_sql: Vec<&'static str>,
    /// Rows produced by a streamed query: `num` = 0, 1, ...
    pub stream_rows: i64,
    /// The streamed query errors instead of producing this row.
    pub fail_stream_at: Option<i64>,
    /// The streamed query waits for a permit before producing this row.
    pub gate: Option<(i64, Arc<Semaphore>)>,
}

impl MockScript {
    pub fn rows(stream_rows: i64) -> Self {
        Self {
            stream_rows,
            ..Self::default()
        }
    }

    pub fn failing(fragments: &[&'static str]) -> Self {
        Self {
            failing_sql: fragments.to_vec(),
            ..Self::default()
        }
    }
}

/// Shared record of what the mock saw.
#[derive(Default)]
pub struct MockState {
    script: MockScript,
    acquired: AtomicUsize,
    released: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl MockState {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Every statement attempted, in order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) -> Result<(), SqlEzError> {
        self.log.lock().unwrap().push(sql.to_string());
        if self.script.failing_sql.iter().any(|f| sql.contains(f)) {
            return Err(SqlEzError::ExecutionError(format!("scripted failure: {sql}")));
        }
        Ok(())
    }

    /// Wait until every acquired connection has been released, or give up after a second.
    pub async fn settle(&self) {
        for _ in 0..100 {
            if self.released() == self.acquired() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[derive(Clone)]
pub struct MockSource {
    state: Arc<MockState>,
}

impl MockSource {
    pub fn new(script: MockScript) -> Self {
        Self {
            state: Arc::new(MockState {
                script,
                ..MockState::default()
            }),
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

/// Facade over a scripted source, plus the state to inspect afterwards.
pub fn mock_db(script: MockScript) -> (SqlEz, Arc<MockState>) {
    let source = MockSource::new(script);
    let state = source.state();
    (SqlEz::new(source), state)
}

#[async_trait]
impl ConnectionSource for MockSource {
    async fn acquire(&self) -> Result<PooledConn, SqlEzError> {
        if self.state.script.fail_acquire {
            return Err(SqlEzError::ConnectionError("scripted acquire failure".into()));
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConn::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DbConnection for MockConnection {
    async fn query(&mut self, request: &QueryRequest) -> Result<ResultSet, SqlEzError> {
        self.state.record(&request.text)?;
        let mut result = ResultSet::with_capacity(1);
        result.set_shape(RowShape::new(vec!["sql".into(), "params".into()]));
        let params = i64::try_from(request.values.len()).unwrap();
        result.add_row_values(vec![
            RowValues::Text(request.text.clone()),
            RowValues::Int(params),
        ]);
        Ok(result)
    }

    async fn query_stream<'a>(
        &'a mut self,
        request: &'a QueryRequest,
    ) -> Result<RowStream<'a>, SqlEzError> {
        self.state.record(&request.text)?;
        let script = self.state.script.clone();
        let shape = RowShape::new(vec!["num".into()]);
        let rows = stream::unfold(0_i64, move |n| {
            let script = script.clone();
            let shape = shape.clone();
            async move {
                if n >= script.stream_rows {
                    return None;
                }
                if let Some((at, gate)) = &script.gate
                    && *at == n
                {
                    gate.acquire().await.unwrap().forget();
                }
                if script.fail_stream_at == Some(n) {
                    let err = SqlEzError::ExecutionError(format!("scripted stream failure at {n}"));
                    return Some((Err(err), script.stream_rows));
                }
                Some((Ok(shape.row(vec![RowValues::Int(n)])), n + 1))
            }
        });
        Ok(rows.boxed())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), SqlEzError> {
        self.state.record(sql)
    }
}

/// Sum of the first field of every chunk the sink sees, readable after the sink moved.
pub fn summing_sink() -> (impl Stage + 'static, Arc<Mutex<i64>>) {
    let total = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&total);
    let stage = sink(move |chunk: Chunk| {
        *seen.lock().unwrap() += chunk.first_int().unwrap_or_default();
        Ok(())
    });
    (stage, total)
}

/// Path to a fresh SQLite file inside `dir`.
pub fn sqlite_path(dir: &tempfile::TempDir) -> String {
    dir.path().join("test.db").to_string_lossy().into_owned()
}

/// Facade over a fresh on-disk SQLite database.
pub async fn sqlite_db(dir: &tempfile::TempDir) -> SqlEz {
    SqlEz::connect(ConnectionConfig::Sqlite(
        SqliteOptions::new(sqlite_path(dir)).with_pool_size(4),
    ))
    .await
    .unwrap()
}

/// Recursive CTE producing `num` = 0..=10, the stand-in for `generate_series(0, 10)`.
pub const SERIES_0_TO_10: &str = "WITH RECURSIVE series(num) AS (SELECT 0 UNION ALL SELECT num + 1 FROM series WHERE num < 10) SELECT num FROM series";
