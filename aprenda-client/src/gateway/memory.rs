//! In-memory gateway implementation
//!
//! Backs the test suite and offline development. Rows live in per-table
//! `Vec<Value>` maps and queries are evaluated directly. The backend
//! behaviors the client depends on but does not own are emulated here:
//! server-side defaults (id, created_at), the uniqueness constraint on
//! enrollments, the registration trigger that creates a profile row, and
//! the two server procedures the admin console calls.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use aprenda_core::{
    AuthEvent, AuthUser, ChangeEvent, ChangeOp, CourseId, Filter, GatewayError, ModuleId, Query,
    QuestionId, Result, Session, UserId,
};

use super::{AuthApi, Datastore, FileStore};

/// Tables with uniqueness constraints enforced by the backend
fn unique_columns(table: &str) -> &'static [&'static [&'static str]] {
    match table {
        "course_enrollments" => &[&["user_id", "course_id"]],
        "profiles" => &[&["id"]],
        _ => &[],
    }
}

struct MemoryAccount {
    password: String,
    user: AuthUser,
}

struct Watcher {
    table: String,
    filter: Option<Filter>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

/// Process-local gateway holding every capability in one place
pub struct InMemoryGateway {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    watchers: Mutex<Vec<Watcher>>,
    accounts: RwLock<HashMap<String, MemoryAccount>>,
    session: RwLock<Option<Session>>,
    auth_tx: broadcast::Sender<AuthEvent>,
    files: RwLock<HashMap<String, Vec<u8>>>,
    reset_requests: RwLock<Vec<String>>,
    select_calls: AtomicU64,
    insert_failures: Mutex<HashMap<String, usize>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (auth_tx, _) = broadcast::channel(16);
        Self {
            tables: RwLock::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            auth_tx,
            files: RwLock::new(HashMap::new()),
            reset_requests: RwLock::new(Vec::new()),
            select_calls: AtomicU64::new(0),
            insert_failures: Mutex::new(HashMap::new()),
        }
    }

    /// Number of `select` calls served so far (for testing purposes)
    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    /// Allow `allowed` more inserts into `table`, then fail the rest
    /// (for testing purposes)
    pub fn fail_inserts_after(&self, table: &str, allowed: usize) {
        self.insert_failures
            .lock()
            .unwrap()
            .insert(table.to_string(), allowed);
    }

    /// Password reset emails requested so far (for testing purposes)
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.read().unwrap().clone()
    }

    fn notify(&self, table: &str, op: ChangeOp, row: &Value) {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|w| {
            if w.table != table {
                return !w.tx.is_closed();
            }
            if let Some(filter) = &w.filter {
                if !row_matches(row, filter) {
                    return !w.tx.is_closed();
                }
            }
            w.tx
                .send(ChangeEvent {
                    table: table.to_string(),
                    op,
                    row: row.clone(),
                })
                .is_ok()
        });
    }

    fn insert_row(&self, table: &str, mut row: Value) -> Result<Value> {
        {
            let mut failures = self.insert_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(table) {
                if *remaining == 0 {
                    return Err(GatewayError::Network("injected insert failure".into()));
                }
                *remaining -= 1;
            }
        }

        let fields = row
            .as_object_mut()
            .ok_or_else(|| GatewayError::Validation("row must be a JSON object".into()))?;
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        for key in unique_columns(table) {
            if rows.iter().any(|existing| {
                key.iter()
                    .all(|col| existing.get(*col) == row.get(*col))
            }) {
                return Err(GatewayError::conflict(
                    table,
                    format!("duplicate key ({})", key.join(", ")),
                ));
            }
        }
        rows.push(row.clone());
        drop(tables);

        self.notify(table, ChangeOp::Insert, &row);
        Ok(row)
    }

    /// Insert a course row and return its id (for testing purposes)
    pub async fn seed_course(&self, title: &str, category: &str, instructor: &str) -> CourseId {
        let row = self
            .insert_row(
                "courses",
                json!({
                    "title": title,
                    "description": format!("{title} description"),
                    "category": category,
                    "instructor": instructor,
                    "image_url": null,
                }),
            )
            .expect("seed course");
        CourseId(row_id(&row))
    }

    /// Insert a module row and return its id (for testing purposes)
    pub async fn seed_module(&self, course_id: CourseId, title: &str, order: i32) -> ModuleId {
        let row = self
            .insert_row(
                "modules",
                json!({
                    "course_id": course_id.to_string(),
                    "title": title,
                    "description": null,
                    "video_url": null,
                    "pdf_url": null,
                    "module_order": order,
                }),
            )
            .expect("seed module");
        ModuleId(row_id(&row))
    }

    /// Insert a question row and return its id (for testing purposes)
    pub async fn seed_question(
        &self,
        module_id: ModuleId,
        text: &str,
        options: &[&str],
        correct: usize,
    ) -> QuestionId {
        let row = self
            .insert_row(
                "questions",
                json!({
                    "module_id": module_id.to_string(),
                    "question_text": text,
                    "options": options,
                    "correct_option_index": correct,
                }),
            )
            .expect("seed question");
        QuestionId(row_id(&row))
    }

    /// Flip a profile's role to admin (for testing purposes)
    pub async fn promote_to_admin(&self, user_id: UserId) {
        self.update(
            "profiles",
            &[Filter::Eq("id".into(), json!(user_id.to_string()))],
            json!({ "role": "admin" }),
        )
        .await
        .expect("promote to admin");
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn row_id(row: &Value) -> Uuid {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("row id")
}

fn ilike(haystack: &Value, pattern: &str) -> bool {
    let needle = pattern.trim_matches('%').to_lowercase();
    haystack
        .as_str()
        .map(|s| s.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::In(column, values) => row
            .get(column)
            .map(|v| values.contains(v))
            .unwrap_or(false),
        Filter::IlikeAny(patterns) => patterns.iter().any(|(column, pattern)| {
            row.get(column)
                .map(|v| ilike(v, pattern))
                .unwrap_or(false)
        }),
        Filter::NotNull(column) => !matches!(row.get(column), None | Some(Value::Null)),
        Filter::IsNull(column) => matches!(row.get(column), None | Some(Value::Null)),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        // nulls sort last regardless of direction
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn project(row: &Value, columns: &Option<String>) -> Value {
    let Some(columns) = columns else {
        return row.clone();
    };
    if columns.trim() == "*" {
        return row.clone();
    }
    let Some(fields) = row.as_object() else {
        return row.clone();
    };
    let mut projected = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(value) = fields.get(column) {
            projected.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

fn evaluate(rows: &[Value], query: &Query) -> Vec<Value> {
    let mut matched: Vec<&Value> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
        .collect();

    if let Some(order) = &query.order {
        matched.sort_by(|a, b| {
            let null = Value::Null;
            let left = a.get(&order.column).unwrap_or(&null);
            let right = b.get(&order.column).unwrap_or(&null);
            let ordering = compare_values(left, right);
            if order.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    matched
        .into_iter()
        .map(|row| project(row, &query.columns))
        .collect()
}

#[async_trait]
impl Datastore for InMemoryGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read().unwrap();
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(evaluate(rows, query))
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let mut unlimited = query.clone();
        unlimited.limit = None;
        let tables = self.tables.read().unwrap();
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(evaluate(rows, &unlimited).len() as u64)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.insert_row(table, row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64> {
        let patch = patch
            .as_object()
            .ok_or_else(|| GatewayError::Validation("patch must be a JSON object".into()))?
            .clone();

        let mut changed = Vec::new();
        {
            let mut tables = self.tables.write().unwrap();
            let rows = tables.entry(table.to_string()).or_default();
            for row in rows.iter_mut() {
                if filters.iter().all(|f| row_matches(row, f)) {
                    if let Some(fields) = row.as_object_mut() {
                        for (key, value) in &patch {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    changed.push(row.clone());
                }
            }
        }

        for row in &changed {
            self.notify(table, ChangeOp::Update, row);
        }
        Ok(changed.len() as u64)
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &[&str]) -> Result<Value> {
        let incoming = row
            .as_object()
            .ok_or_else(|| GatewayError::Validation("row must be a JSON object".into()))?
            .clone();

        let existing = {
            let mut tables = self.tables.write().unwrap();
            let rows = tables.entry(table.to_string()).or_default();
            let mut found = None;
            for stored in rows.iter_mut() {
                let same_key = on_conflict
                    .iter()
                    .all(|col| stored.get(*col) == incoming.get(*col));
                if same_key {
                    if let Some(fields) = stored.as_object_mut() {
                        for (key, value) in &incoming {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    found = Some(stored.clone());
                    break;
                }
            }
            found
        };

        match existing {
            Some(updated) => {
                self.notify(table, ChangeOp::Update, &updated);
                Ok(updated)
            }
            None => self.insert_row(table, row),
        }
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let removed: Vec<Value> = {
            let mut tables = self.tables.write().unwrap();
            let rows = tables.entry(table.to_string()).or_default();
            let (gone, kept): (Vec<Value>, Vec<Value>) = rows
                .drain(..)
                .partition(|row| filters.iter().all(|f| row_matches(row, f)));
            *rows = kept;
            gone
        };

        for row in &removed {
            self.notify(table, ChangeOp::Delete, row);
        }
        Ok(removed.len() as u64)
    }

    async fn rpc(&self, name: &str, _args: Value) -> Result<Value> {
        match name {
            "get_monthly_signups" => {
                let tables = self.tables.read().unwrap();
                let profiles = tables.get("profiles").map(Vec::as_slice).unwrap_or(&[]);
                let mut by_month: std::collections::BTreeMap<String, u64> = Default::default();
                for profile in profiles {
                    if let Some(created) = profile.get("created_at").and_then(Value::as_str) {
                        let month: String = created.chars().take(7).collect();
                        *by_month.entry(month).or_default() += 1;
                    }
                }
                let series: Vec<Value> = by_month
                    .into_iter()
                    .map(|(month, count)| json!({ "month": month, "count": count }))
                    .collect();
                Ok(Value::Array(series))
            }
            "get_users_with_email" => {
                let accounts = self.accounts.read().unwrap();
                let rows: Vec<Value> = accounts
                    .values()
                    .map(|account| {
                        json!({
                            "id": account.user.id.to_string(),
                            "email": account.user.email,
                        })
                    })
                    .collect();
                Ok(Value::Array(rows))
            }
            other => Err(GatewayError::Rpc {
                name: other.to_string(),
                reason: "unknown procedure".to_string(),
            }),
        }
    }

    async fn changes(
        &self,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<mpsc::UnboundedReceiver<ChangeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().unwrap().push(Watcher {
            table: table.to_string(),
            filter,
            tx,
        });
        Ok(rx)
    }
}

#[async_trait]
impl AuthApi for InMemoryGateway {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()> {
        let normalized = email.to_lowercase();
        {
            let accounts = self.accounts.read().unwrap();
            if accounts.contains_key(&normalized) {
                return Err(GatewayError::conflict("auth.users", "email already exists"));
            }
        }

        let user = AuthUser {
            id: UserId(Uuid::new_v4()),
            email: normalized.clone(),
            metadata: metadata.clone(),
        };

        // Registration trigger: create the matching profile row
        self.insert_row(
            "profiles",
            json!({
                "id": user.id.to_string(),
                "full_name": metadata.get("full_name").cloned().unwrap_or(Value::Null),
                "cpf": metadata.get("cpf").cloned().unwrap_or(Value::Null),
                "avatar_url": null,
                "role": "user",
                "points": 0,
            }),
        )?;

        self.accounts.write().unwrap().insert(
            normalized,
            MemoryAccount {
                password: password.to_string(),
                user,
            },
        );
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let normalized = email.to_lowercase();
        let user = {
            let accounts = self.accounts.read().unwrap();
            let account = accounts
                .get(&normalized)
                .ok_or(GatewayError::InvalidCredentials)?;
            if account.password != password {
                return Err(GatewayError::InvalidCredentials);
            }
            account.user.clone()
        };

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            user,
        };
        *self.session.write().unwrap() = Some(session.clone());
        let _ = self.auth_tx.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.write().unwrap() = None;
        let _ = self.auth_tx.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().unwrap().clone())
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.reset_requests
            .write()
            .unwrap()
            .push(email.to_lowercase());
        Ok(())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }
}

#[async_trait]
impl FileStore for InMemoryGateway {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, upsert: bool) -> Result<()> {
        let key = format!("{bucket}/{path}");
        let mut files = self.files.write().unwrap();
        if files.contains_key(&key) && !upsert {
            return Err(GatewayError::conflict("storage", "object already exists"));
        }
        files.insert(key, bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let gateway = InMemoryGateway::new();
        gateway.seed_course("Pedagogia Infantil", "pedagogia", "Ana").await;
        gateway.seed_course("Matemática Básica", "exatas", "Bruno").await;
        gateway.seed_course("Alfabetização", "pedagogia", "Carla").await;

        let query = Query::table("courses")
            .eq("category", "pedagogia")
            .order("title", true);
        let rows = gateway.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "Alfabetização");

        let limited = gateway
            .select(&Query::table("courses").order("title", true).limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_ilike_matches_case_insensitively() {
        let gateway = InMemoryGateway::new();
        gateway.seed_course("Pedagogia Infantil", "pedagogia", "Ana").await;
        gateway.seed_course("Matemática", "exatas", "Bruno Pedagogo").await;

        let query =
            Query::table("courses").ilike_any(&["title", "instructor"], "%PEDAGOG%");
        let rows = gateway.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_conflicts() {
        let gateway = InMemoryGateway::new();
        let row = json!({ "user_id": "u1", "course_id": "c1" });

        gateway.insert("course_enrollments", row.clone()).await.unwrap();
        let err = gateway.insert("course_enrollments", row).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict_key() {
        let gateway = InMemoryGateway::new();
        let first = json!({ "user_id": "u1", "module_id": "m1", "is_completed": true });
        let second = json!({ "user_id": "u1", "module_id": "m1", "is_completed": false });

        gateway
            .upsert("course_progress", first, &["user_id", "module_id"])
            .await
            .unwrap();
        gateway
            .upsert("course_progress", second, &["user_id", "module_id"])
            .await
            .unwrap();

        let rows = gateway
            .select(&Query::table("course_progress"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_completed"], false);
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_row() {
        let gateway = InMemoryGateway::new();
        gateway
            .sign_up(
                "aluna@example.com",
                "senha123",
                json!({ "full_name": "Aluna Teste", "cpf": "111.222.333-44" }),
            )
            .await
            .unwrap();

        let profiles = gateway.select(&Query::table("profiles")).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["full_name"], "Aluna Teste");
        assert_eq!(profiles[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_changes_feed_scoped_by_filter() {
        let gateway = InMemoryGateway::new();
        let mut rx = gateway
            .changes(
                "notifications",
                Some(Filter::Eq("user_id".into(), json!("u1"))),
            )
            .await
            .unwrap();

        gateway
            .insert("notifications", json!({ "user_id": "u2", "message": "other" }))
            .await
            .unwrap();
        gateway
            .insert("notifications", json!({ "user_id": "u1", "message": "mine" }))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, ChangeOp::Insert);
        assert_eq!(event.row["message"], "mine");
    }
}
