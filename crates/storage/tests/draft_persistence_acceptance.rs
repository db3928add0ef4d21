use serde_json::json;
use shared::domain::FormType;
use storage::{DraftStore, Storage};

#[tokio::test]
async fn draft_survives_reopening_the_database() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("merchant_drafts_acceptance_{suffix}"));
    let db_path = temp_root.join("drafts.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let values = json!({ "name": "Early access", "prices": [] });

    {
        let storage = Storage::new(&database_url).await.expect("open");
        storage
            .save_draft(FormType::ProductCreate, &values)
            .await
            .expect("save");
        storage.pool().close().await;
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened
            .read_draft(FormType::ProductCreate)
            .await
            .expect("read"),
        Some(values)
    );

    reopened
        .clear_draft(FormType::ProductCreate)
        .await
        .expect("clear");
    reopened.pool().close().await;

    let reopened_again = Storage::new(&database_url).await.expect("reopen again");
    assert_eq!(
        reopened_again
            .read_draft(FormType::ProductCreate)
            .await
            .expect("read"),
        None
    );
    reopened_again.pool().close().await;

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
