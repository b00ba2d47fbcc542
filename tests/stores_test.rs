use judgement_ingest::model::JobRecord;
use judgement_ingest::store::{BlobStore, FsBlobStore, RecordStore, SqliteRecordStore};
use std::sync::Arc;

async fn record_store() -> SqliteRecordStore {
    SqliteRecordStore::connect("sqlite::memory:").await.unwrap()
}

fn job(unique_id: &str, status: &str, job_id: &str) -> JobRecord {
    JobRecord {
        unique_id: unique_id.into(),
        status: status.into(),
        job_id: job_id.into(),
    }
}

#[tokio::test]
async fn upsert_creates_then_merges() {
    let store = record_store().await;
    assert!(store.get("CR100_2023-01-07").await.unwrap().is_none());

    store
        .upsert(&job("CR100_2023-01-07", "pending ocr", "1"))
        .await
        .unwrap();
    let created = store.get("CR100_2023-01-07").await.unwrap().unwrap();
    assert_eq!(created.record.job_id, "1");

    store
        .upsert(&job("CR100_2023-01-07", "pending ocr", "2"))
        .await
        .unwrap();
    let merged = store.get("CR100_2023-01-07").await.unwrap().unwrap();
    assert_eq!(merged.record.job_id, "2");
    assert_eq!(merged.created_at, created.created_at);
}

#[tokio::test]
async fn repeated_upsert_is_idempotent() {
    let store = record_store().await;
    let rec = job("CR100_2023-01-07", "pending ocr", "7");
    store.upsert(&rec).await.unwrap();
    let once = store.get(&rec.unique_id).await.unwrap();
    store.upsert(&rec).await.unwrap();
    let twice = store.get(&rec.unique_id).await.unwrap();
    assert_eq!(once, twice);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_records")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn conditional_status_update() {
    let store = record_store().await;
    store
        .upsert(&job("CR100_2023-01-07", "pending ocr", "7"))
        .await
        .unwrap();

    assert!(!store
        .update_status_if("CR100_2023-01-07", "done", "archived")
        .await
        .unwrap());
    assert!(store
        .update_status_if("CR100_2023-01-07", "pending ocr", "ocr complete")
        .await
        .unwrap());
    assert!(!store
        .update_status_if("missing", "pending ocr", "ocr complete")
        .await
        .unwrap());

    let rec = store.get("CR100_2023-01-07").await.unwrap().unwrap();
    assert_eq!(rec.record.status, "ocr complete");
    assert_eq!(rec.record.job_id, "7");
}

#[tokio::test]
async fn file_backed_store_creates_database() {
    let td = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/nested/records.db", td.path().display());
    let store = SqliteRecordStore::connect(&url).await.unwrap();
    store.upsert(&job("A1_2020-02-02", "pending ocr", "x")).await.unwrap();
    assert!(td.path().join("nested/records.db").exists());
}

#[tokio::test]
async fn concurrent_puts_to_one_key_leave_a_whole_object() {
    let td = tempfile::tempdir().unwrap();
    let store = Arc::new(FsBlobStore::new(td.path()));
    let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 4096]).collect();

    let mut handles = Vec::new();
    for payload in payloads.clone() {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .put("judgement-pdfs", "judgements/a.pdf", &payload, "application/pdf")
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let out = td.path().join("copy.pdf");
    store
        .get("judgement-pdfs", "judgements/a.pdf", &out)
        .await
        .unwrap();
    let stored = std::fs::read(&out).unwrap();
    assert!(payloads.contains(&stored));

    let mut names: Vec<String> = std::fs::read_dir(td.path().join("judgement-pdfs/judgements"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.pdf".to_string(), "a.pdf.meta.json".to_string()]);
}
