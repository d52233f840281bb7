use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use springy_orm::{
    Assignment, FakeExecutor, OrmError, QueryArgs, RecordObserver, RecordSet, Row, TableSchema,
    Where,
};
use springy_validation::Rules;

fn users() -> Arc<TableSchema> {
    TableSchema::builder("users")
        .writable(["name", "email", "status"])
        .hook("email", |value| match value {
            Value::String(s) => Value::String(s.trim().to_lowercase()),
            other => other,
        })
        .build()
        .unwrap()
}

fn archived_users() -> Arc<TableSchema> {
    TableSchema::builder("t")
        .writable(["status", "name"])
        .soft_delete("deleted")
        .build()
        .unwrap()
}

async fn loaded_user(conn: &mut FakeExecutor, schema: Arc<TableSchema>) -> RecordSet {
    conn.push_rows(vec![json!({"id": 7, "name": "Ada", "status": "active"})]);
    let mut users = RecordSet::new(schema);
    assert!(users.load(conn, json!({"id": 7})).await.unwrap());
    users
}

#[derive(Default)]
struct Counting {
    created: AtomicUsize,
    updated: AtomicUsize,
    deleted: AtomicUsize,
}

#[async_trait]
impl RecordObserver for Counting {
    async fn created(&self, _row: &Row) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    async fn updating(&self, row: &mut Row) -> bool {
        row.insert("status", json!("touched"));
        row.mark_changed("status");
        true
    }

    async fn updated(&self, _row: &Row) {
        self.updated.fetch_add(1, Ordering::SeqCst);
    }

    async fn deleted(&self, _row: &Row) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

struct Veto;

#[async_trait]
impl RecordObserver for Veto {
    async fn creating(&self, _row: &mut Row) -> bool {
        false
    }

    async fn deleting(&self, _row: &Row) -> bool {
        false
    }
}

#[test]
fn test_rendering_is_repeatable() {
    let filter = Where::try_from(json!({"status": "active", "age": {">=": 18}})).unwrap();

    assert_eq!(filter.render(), " WHERE status = ? AND age >= ?");
    assert_eq!(filter.params(), vec![json!("active"), json!(18)]);
    assert_eq!(filter.render(), filter.render());
    assert_eq!(filter.params(), filter.params());
}

#[test]
fn test_changed_columns_are_not_duplicated() {
    let mut users = RecordSet::new(users());

    assert!(users.set("name", "A"));
    assert!(users.set("name", "A"));
    assert_eq!(users.changed_columns(), vec!["name"]);

    assert!(users.set("name", "B"));
    assert_eq!(users.changed_columns(), vec!["name"]);
    assert!(!users.set("id", 3));
}

#[tokio::test]
async fn test_unchanged_loaded_row_is_not_saved() {
    let mut conn = FakeExecutor::default();
    let mut users = loaded_user(&mut conn, users()).await;
    let before = conn.execute_count();

    assert!(!users.save(&mut conn, true).await.unwrap());
    assert_eq!(conn.execute_count(), before);
}

#[tokio::test]
async fn test_only_real_changes_are_written() {
    let mut conn = FakeExecutor::default();
    let mut users = loaded_user(&mut conn, users()).await;

    users.set("name", "Ada");
    assert!(users.changed_columns().is_empty());

    users.set("email", "  ADA@Example.COM ");
    conn.push_affected(1);
    assert!(users.save(&mut conn, true).await.unwrap());

    let statement = conn.last_statement().unwrap();
    assert_eq!(statement.sql, "UPDATE users SET email = ? WHERE id = ?");
    assert_eq!(statement.params, vec![json!("ada@example.com"), json!(7)]);
    assert!(users.changed_columns().is_empty());
}

#[tokio::test]
async fn test_insert_reloads_generated_key() {
    let mut conn = FakeExecutor::default();
    conn.push_insert(1, 42)
        .push_rows(vec![json!({"id": 42, "name": "X", "status": "new"})]);

    let mut users = RecordSet::new(users());
    users.set("name", "X");
    assert!(users.save(&mut conn, false).await.unwrap());

    assert_eq!(
        conn.sql_log(),
        vec![
            "INSERT INTO users (name) VALUES (?) RETURNING id",
            "SELECT users.* FROM users WHERE id = ?",
        ]
    );
    assert_eq!(conn.statements()[1].params, vec![json!(42)]);
    assert!(users.is_loaded());
    assert_eq!(users.get("id"), Some(&json!(42)));
    assert_eq!(users.get("status"), Some(&json!("new")));
}

#[tokio::test]
async fn test_created_fires_when_reload_finds_nothing() {
    let counting = Arc::new(Counting::default());
    let schema = TableSchema::builder("users")
        .writable(["name"])
        .observer(counting.clone())
        .build()
        .unwrap();

    let mut conn = FakeExecutor::default();
    conn.push_insert(1, 42);

    let mut users = RecordSet::new(schema);
    users.set("name", "X");
    assert!(users.save(&mut conn, false).await.unwrap());

    assert_eq!(conn.execute_count(), 2);
    assert_eq!(users.row_count(), 0);
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_insert_with_known_key_reloads_by_key() {
    let schema = TableSchema::builder("countries")
        .primary_key(["code"])
        .writable(["code", "name"])
        .build()
        .unwrap();

    let mut conn = FakeExecutor::default();
    conn.push_affected(1)
        .push_rows(vec![json!({"code": "se", "name": "Sweden"})]);

    let mut countries = RecordSet::new(schema);
    countries.set("code", "se");
    countries.set("name", "Sweden");
    assert!(countries.save(&mut conn, false).await.unwrap());

    assert_eq!(
        conn.sql_log(),
        vec![
            "INSERT INTO countries (code, name) VALUES (?, ?)",
            "SELECT countries.* FROM countries WHERE code = ?",
        ]
    );
    assert_eq!(conn.statements()[1].params, vec![json!("se")]);
    assert!(countries.is_loaded());
}

#[tokio::test]
async fn test_insert_date_uses_driver_now() {
    let schema = TableSchema::builder("posts")
        .writable(["title"])
        .insert_date_column("created_at")
        .build()
        .unwrap();

    let mut conn = FakeExecutor::new("sqlite");
    conn.push_insert(1, 3).push_rows(vec![json!({"id": 3, "title": "Hello"})]);

    let mut posts = RecordSet::new(schema);
    posts.set("title", "Hello");
    assert!(posts.save(&mut conn, false).await.unwrap());
    assert_eq!(
        conn.statements()[0].sql,
        "INSERT INTO posts (title, created_at) VALUES (?, datetime('now'))"
    );
    assert_eq!(conn.statements()[0].params, vec![json!("Hello")]);
}

#[tokio::test]
async fn test_validation_blocks_save() {
    let schema = TableSchema::builder("users")
        .writable(["name", "email"])
        .validator(Arc::new(Rules::new().required_email("email")))
        .build()
        .unwrap();

    let mut conn = FakeExecutor::default();
    let mut users = RecordSet::new(schema);
    users.set("name", "No Mail");

    assert!(!users.save(&mut conn, true).await.unwrap());
    assert_eq!(conn.execute_count(), 0);
    assert!(users.validation_errors().has_field_errors("email"));

    let err = users.validate().await.unwrap_err();
    assert!(matches!(err, OrmError::ValidationFailed(_)));

    users.set("email", "someone@example.com");
    conn.push_insert(1, 1).push_rows(vec![json!({"id": 1})]);
    assert!(users.save(&mut conn, true).await.unwrap());
    assert!(users.validation_errors().is_empty());
}

#[tokio::test]
async fn test_observers_run_around_writes() {
    let counting = Arc::new(Counting::default());
    let schema = TableSchema::builder("users")
        .writable(["name", "status"])
        .observer(counting.clone())
        .build()
        .unwrap();

    let mut conn = FakeExecutor::default();
    let mut users = loaded_user(&mut conn, schema).await;

    users.set("name", "Grace");
    conn.push_affected(1);
    assert!(users.save(&mut conn, false).await.unwrap());
    let statement = conn.last_statement().unwrap();
    assert_eq!(statement.sql, "UPDATE users SET name = ?, status = ? WHERE id = ?");
    assert_eq!(statement.params, vec![json!("Grace"), json!("touched"), json!(7)]);
    assert_eq!(counting.updated.load(Ordering::SeqCst), 1);

    conn.push_affected(1);
    assert_eq!(users.delete(&mut conn, None).await.unwrap(), Some(1));
    assert_eq!(conn.last_statement().unwrap().sql, "DELETE FROM users WHERE id = ?");
    assert_eq!(counting.deleted.load(Ordering::SeqCst), 1);
    assert_eq!(counting.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_observer_veto_skips_statement() {
    let schema = TableSchema::builder("users")
        .writable(["name"])
        .observer(Arc::new(Veto))
        .build()
        .unwrap();

    let mut conn = FakeExecutor::default();
    let mut users = RecordSet::new(schema.clone());
    users.set("name", "Nobody");
    assert!(!users.save(&mut conn, false).await.unwrap());
    assert_eq!(conn.execute_count(), 0);

    let mut users = loaded_user(&mut conn, schema).await;
    assert_eq!(users.delete(&mut conn, None).await.unwrap(), None);
    assert_eq!(conn.execute_count(), 1);
}

#[tokio::test]
async fn test_soft_delete_flags_the_row() {
    let mut conn = FakeExecutor::default();
    let mut rows = loaded_user(&mut conn, archived_users()).await;
    assert_eq!(
        conn.statements()[0].sql,
        "SELECT t.* FROM t WHERE t.deleted = ? AND id = ?"
    );

    conn.push_affected(1);
    assert_eq!(rows.delete(&mut conn, None).await.unwrap(), Some(1));

    let statement = conn.last_statement().unwrap();
    assert_eq!(statement.sql, "UPDATE t SET deleted = 1 WHERE deleted = ? AND id = ?");
    assert_eq!(statement.params, vec![json!(0), json!(7)]);
    assert!(conn.sql_log().iter().all(|sql| !sql.starts_with("DELETE")));
}

#[tokio::test]
async fn test_bulk_delete_needs_conditions() {
    let mut conn = FakeExecutor::default();
    let mut users = RecordSet::new(users());

    let err = users
        .delete(&mut conn, Some(json!({}).into()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::AbortedEmptyFilter));

    assert_eq!(users.delete(&mut conn, None).await.unwrap(), None);
    assert_eq!(conn.execute_count(), 0);

    users.where_mut().condition("status", "spam").unwrap();
    conn.push_affected(4);
    assert_eq!(users.delete(&mut conn, None).await.unwrap(), Some(4));
    assert_eq!(conn.last_statement().unwrap().sql, "DELETE FROM users WHERE status = ?");
    assert!(users.ambient_filter().is_empty());
}

#[tokio::test]
async fn test_bulk_update_injects_soft_delete_guard() {
    let mut conn = FakeExecutor::default();
    conn.push_affected(3);

    let mut rows = RecordSet::new(archived_users());
    let affected = rows
        .update(
            &mut conn,
            vec![("status", "archived")],
            Some(json!({"id": {"in": [1, 2, 3]}}).into()),
        )
        .await
        .unwrap();

    assert_eq!(affected, 3);
    let statement = conn.last_statement().unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE t SET status = ? WHERE deleted = ? AND id IN (?,?,?)"
    );
    assert_eq!(
        statement.params,
        vec![json!("archived"), json!(0), json!(1), json!(2), json!(3)]
    );
}

#[tokio::test]
async fn test_bulk_update_rules() {
    let mut conn = FakeExecutor::default();
    let mut users = RecordSet::new(users());

    let err = users
        .update(&mut conn, vec![("status", "x")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnsupportedConditionType(_)));

    let err = users
        .update(&mut conn, vec![("status", "x")], Some(Where::new().into()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::AbortedEmptyFilter));

    let skipped = users
        .update(&mut conn, vec![("id", 9)], Some(json!({"id": 1}).into()))
        .await
        .unwrap();
    assert_eq!(skipped, 0);
    assert_eq!(conn.execute_count(), 0);

    conn.push_affected(2);
    let assignments: Vec<(&str, Assignment)> = vec![
        ("email", " MIXED@Case.io ".into()),
        ("name", Assignment::expr(|| "UPPER(name)".to_string())),
        ("id", 5.into()),
    ];
    users
        .update(&mut conn, assignments, Some(json!({"status": "active"}).into()))
        .await
        .unwrap();

    let statement = conn.last_statement().unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE users SET email = ?, name = UPPER(name) WHERE status = ?"
    );
    assert_eq!(statement.params, vec![json!("mixed@case.io"), json!("active")]);
}

#[tokio::test]
async fn test_load_discards_ambiguous_matches() {
    let mut conn = FakeExecutor::default();
    conn.push_rows(vec![json!({"id": 1}), json!({"id": 2})]);

    let mut users = RecordSet::new(users());
    assert!(!users.load(&mut conn, json!({"status": "active"})).await.unwrap());
    assert_eq!(users.row_count(), 0);
    assert!(!users.is_loaded());

    assert!(!users.load(&mut conn, json!({})).await.unwrap());
    assert_eq!(conn.execute_count(), 1);
}

#[tokio::test]
async fn test_refused_load_discards_previous_row() {
    let mut conn = FakeExecutor::default();
    let mut users = loaded_user(&mut conn, users()).await;
    assert_eq!(users.get("id"), Some(&json!(7)));

    assert!(!users.load(&mut conn, json!({})).await.unwrap());
    assert_eq!(conn.execute_count(), 1);
    assert!(!users.is_loaded());
    assert_eq!(users.row_count(), 0);
    assert!(users.get("id").is_none());
}

#[tokio::test]
async fn test_expression_assignment_passes_through_hook() {
    let mut conn = FakeExecutor::default();
    conn.push_affected(1);

    let mut users = RecordSet::new(users());
    let assignments: Vec<(&str, Assignment)> =
        vec![("email", Assignment::expr(|| " LOWER(Backup_Email) ".to_string()))];
    users
        .update(&mut conn, assignments, Some(json!({"id": 1}).into()))
        .await
        .unwrap();

    let statement = conn.last_statement().unwrap();
    assert_eq!(statement.sql, "UPDATE users SET email = lower(backup_email) WHERE id = ?");
    assert_eq!(statement.params, vec![json!(1)]);
}

#[tokio::test]
async fn test_cursor_walks_rows() {
    let mut conn = FakeExecutor::default();
    conn.push_rows(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);

    let mut users = RecordSet::new(users());
    users
        .query(&mut conn, QueryArgs::new().filter(json!({"id": [1, 2, 3]})))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Some(row) = users.next() {
        seen.push(row.get("id").cloned().unwrap_or(Value::Null));
    }
    assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);
    assert!(!users.valid());

    assert_eq!(users.last().and_then(|r| r.get("id")), Some(&json!(3)));
    assert_eq!(users.first().and_then(|r| r.get("id")), Some(&json!(1)));
    assert_eq!(users.all().len(), 3);
}
