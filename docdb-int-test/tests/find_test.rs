use docdb::common::Value;
use docdb::doc;
use docdb::errors::ErrorKind;
use docdb::filter::{all, field, Filter};
use docdb_int_test::test_util::{cleanup, create_test_context, date, ids, insert_console_documents, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_find_by_value() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db.find(doc! { media: "Blu-ray" })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id5"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_one() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let doc = db.find_one(doc! { media: "Blu-ray" })?;
            let id = doc.as_ref().and_then(|d| d.id()).map(str::to_string);
            assert!(id == Some("id1".to_string()) || id == Some("id5".to_string()));

            assert!(db.find_one(doc! { media: "DVD" })?.is_none());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_nested_field() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db.find(doc! { "developer.name": "Sony" })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id2"]);

            let docs = db.find(doc! { media: "Blu-ray", "developer.name": "Sony" })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_all() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            assert_eq!(db.find(doc! {})?.count()?, 5);
            assert_eq!(db.find(all())?.count()?, 5);
            assert_eq!(db.count(doc! {})?, 5);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_comparison() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db.find(doc! { releaseDate: { "$gte": (date(2014, 2, 1)) } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id4"]);

            let docs = db.find(doc! { releaseDate: { "$lt": (date(2012, 1, 17)) } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id3"]);

            let docs = db.find(doc! { releaseDate: { "$lte": (date(2012, 1, 17)) } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id2", "id3"]);

            // strings and timestamps do not compare
            let docs = db.find(doc! { releaseDate: { "$gt": "2000" } })?.exec()?;
            assert!(docs.is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_membership() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db
                .find(doc! { name: { "$in": ["Play Station 4", "Nintendo 3DS"] } })?
                .exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id3"]);

            let docs = db
                .find(doc! { name: { "$nin": ["Play Station 4", "Nintendo 3DS"] } })?
                .exec()?;
            assert_eq!(ids(&docs), vec!["id2", "id4", "id5"]);

            let docs = db.find(doc! { name: { "$ne": "Xbox One" } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id2", "id3", "id4"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_existence() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db.find(doc! { peripheral: { "$exists": true } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id5"]);

            let docs = db.find(doc! { peripheral: { "$exists": false } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id2", "id3", "id4"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_predicate() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let filter = Filter::where_bool(|doc| {
                doc.get("connectivity")
                    .and_then(|v| v.as_array().map(|a| a.len() >= 4))
                    .unwrap_or(false)
            });
            let docs = db.find(filter)?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id4", "id5"]);

            let filter = Filter::where_fn(|doc| doc.get("name").unwrap_or(Value::Null));
            let err = db.find(filter)?.exec().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidPredicateResult);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_array_operators() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db.find(doc! { connectivity: { "$size": 4 } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id4", "id5"]);

            let docs = db.find(doc! { connectivity: { "$elemMatch": "Ethernet" } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id5"]);

            // a plain value matches any element
            let docs = db.find(doc! { connectivity: "3G" })?.exec()?;
            assert_eq!(ids(&docs), vec!["id2"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_by_logical_operators() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let docs = db
                .find(doc! { "$or": [{ "developer.name": "Sony" }, { portable: true }] })?
                .exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id2", "id3", "id4"]);

            let docs = db
                .find(doc! { "$and": [{ media: "Card" }, { "developer.name": "Nintendo" }] })?
                .exec()?;
            assert_eq!(ids(&docs), vec!["id3", "id4"]);

            let docs = db.find(doc! { "$not": { connectivity: { "$size": 4 } } })?.exec()?;
            assert_eq!(ids(&docs), vec!["id1", "id2", "id3"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_with_fluent_filters() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let filter = field("developer.country").eq("JP").and(field("portable").eq(false));
            assert_eq!(ids(&db.find(filter)?.exec()?), vec!["id1"]);

            let filter = field("name").regex("^Nintendo")?;
            assert_eq!(ids(&db.find(filter)?.exec()?), vec!["id3", "id4"]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_with_unknown_operator() {
    run_test(
        || create_test_context(),
        |ctx| {
            let db = ctx.db();
            insert_console_documents(&db)?;

            let err = db.find(doc! { name: { "$like": "Play%" } }).err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
            assert!(err.kind().is_validation());

            let err = db.count(doc! { "$nor": [] }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
