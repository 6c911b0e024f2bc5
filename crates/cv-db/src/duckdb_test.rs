use super::*;
use std::time::Duration;

#[tokio::test]
async fn test_in_memory_is_ready() {
    let engine = DuckDbEngine::in_memory().unwrap();
    assert_eq!(engine.engine_type(), "duckdb");
    assert!(engine.is_ready());
    engine.ready().await.unwrap();
}

#[tokio::test]
async fn test_ready_blocks_until_set() {
    let engine = DuckDbEngine::in_memory().unwrap();
    engine.set_ready(false);

    let pending = tokio::time::timeout(Duration::from_millis(20), engine.ready()).await;
    assert!(pending.is_err(), "engine without a leader must not report ready");

    engine.set_ready(true);
    tokio::time::timeout(Duration::from_secs(1), engine.ready())
        .await
        .expect("ready after set_ready(true)")
        .unwrap();
}

#[tokio::test]
async fn test_handles_share_one_database() {
    let engine = DuckDbEngine::in_memory().unwrap();
    let first = engine.open().await.unwrap();
    let second = engine.open().await.unwrap();

    first
        .run(|conn| -> DbResult<()> {
            conn.execute_batch("CREATE TABLE shared (id INTEGER); INSERT INTO shared VALUES (7);")?;
            Ok(())
        })
        .await
        .unwrap();

    let id: i64 = second
        .run(|conn| -> DbResult<i64> {
            Ok(conn.query_row("SELECT id FROM shared", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
    assert_eq!(id, 7);
}

#[tokio::test]
async fn test_new_with_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.duckdb");
    let engine = DuckDbEngine::new(path.to_str().unwrap()).unwrap();
    let db = engine.open().await.unwrap();
    db.run(|conn| -> DbResult<()> {
        conn.execute_batch("CREATE TABLE t (id INTEGER)")?;
        Ok(())
    })
    .await
    .unwrap();
    assert!(path.exists());
}
