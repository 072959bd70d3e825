//! Hosted gateway implementation
//!
//! Speaks the hosted backend's HTTP conventions: `/rest/v1` for rows and
//! procedures, `/auth/v1` for identity, `/storage/v1` for files. The
//! change feed is an interval poll over the subscribed read, with new row
//! ids becoming insert events; the wire-level push channel belongs to the
//! backend and is not implemented here.

use std::collections::HashSet;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use aprenda_core::{
    AuthEvent, AuthUser, ChangeEvent, ChangeOp, Filter, GatewayError, Query, Result, Session,
    UserId,
};

use crate::config::Config;

use super::{AuthApi, Datastore, FileStore};

pub struct RestGateway {
    http: Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
    session: RwLock<Option<Session>>,
    auth_tx: broadcast::Sender<AuthEvent>,
    poll_interval: Duration,
}

impl RestGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        let (auth_tx, _) = broadcast::channel(16);

        Ok(RestGateway {
            http,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            api_key: config.gateway_key.clone(),
            access_token: RwLock::new(None),
            session: RwLock::new(None),
            auth_tx,
            poll_interval: config.change_poll_interval,
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    async fn rows(&self, table: &str, builder: RequestBuilder) -> Result<Vec<Value>> {
        let response = builder
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        let response = expect_success(table, response).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

/// One PostgREST query-string pair per filter
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", literal(value))),
            Filter::In(column, values) => {
                let list: Vec<String> = values.iter().map(literal).collect();
                (column.clone(), format!("in.({})", list.join(",")))
            }
            Filter::IlikeAny(patterns) => {
                let clauses: Vec<String> = patterns
                    .iter()
                    .map(|(column, pattern)| {
                        format!("{column}.ilike.*{}*", pattern.trim_matches('%'))
                    })
                    .collect();
                ("or".to_string(), format!("({})", clauses.join(",")))
            }
            Filter::NotNull(column) => (column.clone(), "not.is.null".to_string()),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
        })
        .collect()
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(columns) = &query.columns {
        params.push(("select".to_string(), columns.replace(char::is_whitespace, "")));
    }
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

async fn expect_success(table: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
        StatusCode::FORBIDDEN => GatewayError::Forbidden,
        StatusCode::NOT_FOUND => GatewayError::not_found(table),
        StatusCode::CONFLICT => GatewayError::conflict(table, body),
        status if status.is_client_error() => GatewayError::Validation(body),
        status => GatewayError::Network(format!("{status}: {body}")),
    })
}

fn parse_session(body: &Value) -> Result<Session> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Decode("token response without access_token".into()))?;
    let user = body
        .get("user")
        .ok_or_else(|| GatewayError::Decode("token response without user".into()))?;
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| GatewayError::Decode("user without id".into()))?;
    let email = user
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata = user.get("user_metadata").cloned().unwrap_or(Value::Null);

    Ok(Session {
        access_token: access_token.to_string(),
        user: AuthUser {
            id: UserId(id),
            email,
            metadata,
        },
    })
}

#[async_trait]
impl Datastore for RestGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let builder = self
            .request(Method::GET, self.rest_url(&query.table))
            .query(&query_params(query));
        self.rows(&query.table, builder).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let mut params = query_params(query);
        params.retain(|(key, _)| key != "limit");

        let response = self
            .request(Method::GET, self.rest_url(&query.table))
            .query(&params)
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        let response = expect_success(&query.table, response).await?;

        // content-range looks like "0-0/42"
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.parse::<u64>().ok())
            .ok_or_else(|| GatewayError::Decode("missing content-range header".into()))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let builder = self
            .request(Method::POST, self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        self.rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("insert returned no row".into()))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64> {
        let builder = self
            .request(Method::PATCH, self.rest_url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        Ok(self.rows(table, builder).await?.len() as u64)
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &[&str]) -> Result<Value> {
        let builder = self
            .request(Method::POST, self.rest_url(table))
            .query(&[("on_conflict", on_conflict.join(","))])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        self.rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("upsert returned no row".into()))
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let builder = self
            .request(Method::DELETE, self.rest_url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation");
        Ok(self.rows(table, builder).await?.len() as u64)
    }

    async fn rpc(&self, name: &str, args: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        let response = self
            .request(Method::POST, url)
            .json(&args)
            .send()
            .await
            .map_err(|err| GatewayError::Rpc {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        let response = expect_success(name, response).await?;
        response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn changes(
        &self,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<mpsc::UnboundedReceiver<ChangeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let http = self.http.clone();
        let url = self.rest_url(table);
        let api_key = self.api_key.clone();
        let bearer = self.bearer();
        let params = filter_params(filter.as_slice());
        let interval = self.poll_interval;
        let table = table.to_string();

        tokio::spawn(async move {
            let mut seen: Option<HashSet<String>> = None;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let response = http
                    .get(&url)
                    .query(&params)
                    .header("apikey", &api_key)
                    .bearer_auth(&bearer)
                    .send()
                    .await;
                let response = match response {
                    Ok(response) if response.status().is_success() => response,
                    Ok(response) => {
                        tracing::warn!(table = %table, status = %response.status(), "change poll failed");
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(table = %table, error = %err, "change poll failed");
                        continue;
                    }
                };
                let rows: Vec<Value> = match response.json().await {
                    Ok(rows) => rows,
                    Err(err) => {
                        tracing::warn!(table = %table, error = %err, "change poll decode failed");
                        continue;
                    }
                };

                let ids: HashSet<String> = rows
                    .iter()
                    .filter_map(|row| row.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();

                match &mut seen {
                    // first round primes the baseline without emitting
                    None => seen = Some(ids),
                    Some(previous) => {
                        for row in &rows {
                            let Some(id) = row.get("id").and_then(Value::as_str) else {
                                continue;
                            };
                            if !previous.contains(id) {
                                let event = ChangeEvent {
                                    table: table.clone(),
                                    op: ChangeOp::Insert,
                                    row: row.clone(),
                                };
                                if tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                        *previous = ids;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl AuthApi for RestGateway {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .request(Method::POST, url)
            .json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        expect_success("auth.users", response).await?;
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Err(GatewayError::InvalidCredentials);
        }
        let response = expect_success("auth.users", response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        let session = parse_session(&body)?;

        *self.access_token.write().unwrap() = Some(session.access_token.clone());
        *self.session.write().unwrap() = Some(session.clone());
        let _ = self.auth_tx.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .request(Method::POST, url)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        expect_success("auth.sessions", response).await?;

        *self.access_token.write().unwrap() = None;
        *self.session.write().unwrap() = None;
        let _ = self.auth_tx.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().unwrap().clone())
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        let url = format!("{}/auth/v1/recover", self.base_url);
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        expect_success("auth.users", response).await?;
        Ok(())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }
}

#[async_trait]
impl FileStore for RestGateway {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, upsert: bool) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let response = self
            .request(Method::POST, url)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        expect_success("storage.objects", response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_params_follow_rest_conventions() {
        let params = filter_params(&[
            Filter::Eq("category".into(), json!("pedagogia")),
            Filter::In("id".into(), vec![json!("a"), json!("b")]),
            Filter::IlikeAny(vec![
                ("title".into(), "%infantil%".into()),
                ("instructor".into(), "%infantil%".into()),
            ]),
            Filter::NotNull("category".into()),
        ]);

        assert_eq!(params[0], ("category".into(), "eq.pedagogia".into()));
        assert_eq!(params[1], ("id".into(), "in.(a,b)".into()));
        assert_eq!(
            params[2],
            (
                "or".into(),
                "(title.ilike.*infantil*,instructor.ilike.*infantil*)".into()
            )
        );
        assert_eq!(params[3], ("category".into(), "not.is.null".into()));
    }

    #[test]
    fn test_query_params_include_order_and_limit() {
        let query = aprenda_core::Query::table("courses")
            .columns("id, title")
            .order("title", true)
            .limit(3);
        let params = query_params(&query);

        assert!(params.contains(&("select".into(), "id,title".into())));
        assert!(params.contains(&("order".into(), "title.asc".into())));
        assert!(params.contains(&("limit".into(), "3".into())));
    }

    #[test]
    fn test_session_parses_from_token_response() {
        let body = json!({
            "access_token": "jwt",
            "user": {
                "id": "8f9b6bd1-6c45-4b59-8f3e-1c2d3e4f5a6b",
                "email": "aluna@example.com",
                "user_metadata": { "full_name": "Aluna" },
            },
        });

        let session = parse_session(&body).unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.email, "aluna@example.com");
        assert_eq!(session.user.metadata["full_name"], "Aluna");
    }

    #[test]
    fn test_public_url_shape() {
        let gateway = RestGateway::new(&crate::config::Config {
            gateway_url: "https://project.example.co/".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            gateway.public_url("avatars", "user/pic.png"),
            "https://project.example.co/storage/v1/object/public/avatars/user/pic.png"
        );
    }
}
