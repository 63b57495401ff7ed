use docdb::collection::{remove_multi, update_multi, UpdateOptions};
use docdb::common::Value;
use docdb::errors::ErrorKind;
use docdb::index::unique_index;
use docdb::{doc, val, Datastore};
use docdb_int_test::test_util::{
    cleanup, create_file_test_context, date, ids, insert_console_documents, run_test,
};
use chrono::Utc;
use std::fs;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_documents_survive_reopen() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;
            db.update(doc! { _id: "id1" }, &doc! { "$set": { price: 39980 } }, UpdateOptions::default())?;
            db.update(doc! { media: "Card" }, &doc! { "$inc": { stock: 5 } }, update_multi())?;
            db.remove(doc! { _id: "id5" }, Default::default())?;

            let reopened = ctx.reopen()?;
            assert_eq!(reopened.all_documents(), db.all_documents());
            assert_eq!(ids(&reopened.all_documents()), vec!["id1", "id2", "id3", "id4"]);
            assert_eq!(reopened.find_by_id("id1").and_then(|d| d.get("price")), Some(val!(39980)));
            assert_eq!(reopened.count(doc! { stock: 5 })?, 3);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_timestamps_survive_reopen() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let reopened = ctx.reopen()?;
            let release = reopened.find_by_id("id4").and_then(|d| d.get("releaseDate"));
            assert_eq!(release, Some(Value::Timestamp(date(2017, 4, 3))));

            let docs = reopened.find(doc! {})?.sort(doc! { releaseDate: 1 }).skip(1).limit(2).exec()?;
            assert_eq!(ids(&docs), vec!["id2", "id5"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_current_time_query_survives_reopen() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            let seen = Utc::now();
            db.insert(doc! { _id: "t", seen: seen })?;
            assert_eq!(db.count(doc! { seen: seen })?, 1);

            let reopened = ctx.reopen()?;
            assert_eq!(reopened.count(doc! { seen: seen })?, 1);
            assert_eq!(reopened.find_by_id("t"), db.find_by_id("t"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_indexes_survive_reopen() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;
            db.ensure_index(unique_index("name"))?;
            db.ensure_index(unique_index("media").sparse(true)).unwrap_err();

            let reopened = ctx.reopen()?;
            assert_eq!(reopened.indexes(), db.indexes());

            let err = reopened.insert(doc! { name: "Xbox One" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

            reopened.remove_index("name")?;
            let reopened = ctx.reopen()?;
            assert_eq!(reopened.indexes().len(), 1);
            reopened.insert(doc! { name: "Xbox One" })?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_reopen_compacts_log() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;
            for price in 0..10 {
                db.update(doc! { _id: "id1" }, &doc! { "$set": { price: price } }, UpdateOptions::default())?;
            }
            db.remove(doc! { "developer.name": "Nintendo" }, remove_multi())?;

            let path = ctx.path().cloned().unwrap_or_default();
            assert_eq!(fs::read_to_string(&path)?.lines().count(), 17);

            let reopened = ctx.reopen()?;
            assert_eq!(fs::read_to_string(&path)?.lines().count(), 3);
            assert_eq!(reopened.find_by_id("id1").and_then(|d| d.get("price")), Some(val!(9)));

            reopened.insert(doc! { _id: "id6", name: "Play Station 3" })?;
            reopened.compact()?;
            assert_eq!(fs::read_to_string(&path)?.lines().count(), 4);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_corrupt_lines_below_threshold() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            for i in 0..19 {
                db.insert(doc! { seq: i })?;
            }
            let path = ctx.path().cloned().unwrap_or_default();
            let mut content = fs::read_to_string(&path)?;
            content.push_str("{\"seq\": 19, \"_id\": \n");
            fs::write(&path, content)?;

            let reopened = ctx.reopen()?;
            assert_eq!(reopened.size(), 19);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_corrupt_lines_above_threshold() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            for i in 0..8 {
                db.insert(doc! { seq: i })?;
            }
            let path = ctx.path().cloned().unwrap_or_default();
            let mut content = fs::read_to_string(&path)?;
            content.push_str("garbage\n[1, 2, 3]\n");
            fs::write(&path, &content)?;

            let err = ctx.reopen().err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::CorruptData);

            // a tolerant threshold loads what it can
            let reopened = Datastore::builder()
                .filename(&path)
                .corrupt_alert_threshold(0.5)
                .open()?;
            assert_eq!(reopened.size(), 8);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_recovers_interrupted_compaction() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;
            db.compact()?;

            let path = ctx.path().cloned().unwrap_or_default();
            let mut temp = path.clone().into_os_string();
            temp.push("~");
            fs::rename(&path, &temp)?;

            let reopened = ctx.reopen()?;
            assert_eq!(reopened.size(), 5);
            assert!(path.exists());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_timestamp_data() {
    run_test(
        || create_file_test_context(),
        |ctx| {
            let path = ctx.path().cloned().unwrap_or_default();
            let db = Datastore::builder().filename(&path).timestamp_data(true).open()?;

            let inserted = db.insert(doc! { _id: "id1", name: "Play Station 4" })?;
            let created = inserted.get("createdAt");
            assert!(matches!(created, Some(Value::Timestamp(_))));
            assert_eq!(created, inserted.get("updatedAt"));

            std::thread::sleep(std::time::Duration::from_millis(5));
            db.update(doc! { _id: "id1" }, &doc! { name: "Play Station 4 Pro" }, UpdateOptions::default())?;

            let reopened = Datastore::builder().filename(&path).timestamp_data(true).open()?;
            let updated = reopened.find_by_id("id1").unwrap();
            assert_eq!(updated.get("createdAt"), created);
            assert!(updated.get("updatedAt") > created);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
