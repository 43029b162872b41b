use std::sync::RwLock;

use async_trait::async_trait;
use allwork_core::member::{CreateTeamMember, TeamMember};
use allwork_core::profile::{Profile, UpsertProfile};
use allwork_core::session::{AuthUser, Session, SignUp};
use allwork_core::task::{CreateTask, Task, UpdateTask};
use allwork_core::team::{CreateTeam, Team};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::realtime::{self, Subscription};
use crate::rest::{self, Order, Query};
use crate::{BoardService, ServiceError};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const MEMBER_SELECT: &str = "*,profiles:user_id(*)";

/// Async client for the hosted backend: tables over REST, auth over the
/// token endpoints, change feed over the realtime websocket.
pub struct HttpService {
    base_url: String,
    anon_key: String,
    client: Client,
    session: RwLock<Option<Session>>,
}

/// Body returned by the password and refresh-token grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl HttpService {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: Client::new(),
            session: RwLock::new(None),
        }
    }

    fn access_token(&self) -> String {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.access_token.clone()))
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.access_token()))
    }

    fn table_request(&self, method: Method, query: &Query, params: &[(String, String)]) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, query.path()))
            .query(params);
        let builder = if query.is_single() {
            builder.header("Accept", SINGLE_OBJECT)
        } else {
            builder
        };
        self.with_auth(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        builder
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))
    }

    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<T, ServiceError> {
        let resp = Self::send(self.table_request(Method::GET, query, &query.params())).await?;
        handle_response(resp).await
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        query: &Query,
        body: &B,
        prefer: &str,
    ) -> Result<T, ServiceError> {
        let builder = self
            .table_request(Method::POST, query, &query.params())
            .header("Prefer", prefer)
            .json(body);
        handle_response(Self::send(builder).await?).await
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        query: &Query,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self
            .table_request(Method::PATCH, query, &query.params())
            .header("Prefer", "return=representation")
            .json(body);
        handle_response(Self::send(builder).await?).await
    }

    async fn delete_rows(&self, query: &Query) -> Result<(), ServiceError> {
        let resp = Self::send(self.table_request(Method::DELETE, query, &query.filter_params())).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error_with_status(status, resp).await)
        }
    }

    async fn count(&self, query: &Query) -> Result<i64, ServiceError> {
        let builder = self
            .table_request(Method::HEAD, query, &query.params())
            .header("Prefer", "count=exact");
        let resp = Self::send(builder).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error_with_status(status, resp).await);
        }
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(rest::parse_content_range_total)
            .ok_or_else(|| ServiceError::Internal("missing row count in response".into()))
    }

    async fn auth_post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self
            .client
            .post(format!("{}/auth/v1/{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .json(body);
        handle_response(Self::send(builder).await?).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError> {
        if refresh_token.is_empty() {
            return Err(ServiceError::Unauthorized("session expired".into()));
        }
        let token: TokenResponse = self
            .auth_post(
                "token?grant_type=refresh_token",
                &serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        Ok(token.into_session())
    }

    /// Check the stored access token, falling back to the refresh token
    /// once the access token has expired or been rejected.
    async fn try_restore(&self, session: &Session) -> Result<Session, ServiceError> {
        if !session.is_expired(Utc::now()) {
            // `/user` authenticates with the stored token.
            self.set_session(Some(session.clone()));
            let builder = self.with_auth(self.client.get(format!("{}/auth/v1/user", self.base_url)));
            match handle_response::<AuthUser>(Self::send(builder).await?).await {
                Ok(user) => {
                    return Ok(Session {
                        user,
                        ..session.clone()
                    })
                }
                Err(ServiceError::Unauthorized(msg)) => {
                    debug!("stored access token rejected: {msg}");
                    self.set_session(None);
                }
                Err(e) => return Err(e),
            }
        }
        self.refresh(&session.refresh_token).await
    }
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    debug!("backend returned {status}: {body}");
    rest::map_status(status, &body)
}

#[async_trait]
impl BoardService for HttpService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let token: TokenResponse = self
            .auth_post("token?grant_type=password", &Credentials { email, password })
            .await?;
        let session = token.into_session();
        info!("signed in as {}", session.user.email);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, ServiceError> {
        let body: serde_json::Value = self
            .auth_post("signup", &Credentials { email, password })
            .await?;
        // With auto-confirm the signup endpoint answers like a password
        // grant; otherwise it returns the bare user.
        let decode = |e: serde_json::Error| ServiceError::Internal(format!("json decode: {e}"));
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)
                .map_err(decode)?
                .into_session();
            self.set_session(Some(session.clone()));
            Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user = serde_json::from_value::<AuthUser>(body).map_err(decode)?;
            Ok(SignUp { user, session: None })
        }
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let builder = self
            .with_auth(self.client.post(format!("{}/auth/v1/logout", self.base_url)));
        let result = Self::send(builder).await;
        self.set_session(None);
        let resp = result?;
        let status = resp.status();
        // An already-revoked token is as good as a successful logout.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(parse_error_with_status(status, resp).await)
        }
    }

    async fn restore_session(&self, session: &Session) -> Result<Session, ServiceError> {
        let result = self.try_restore(session).await;
        match &result {
            Ok(restored) => {
                info!("restored session for {}", restored.user.email);
                self.set_session(Some(restored.clone()));
            }
            Err(_) => self.set_session(None),
        }
        result
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.user.clone()))
    }

    async fn list_teams(&self) -> Result<Vec<Team>, ServiceError> {
        self.select(&Query::from("teams").order("id", Order::Asc))
            .await
    }

    async fn get_team(&self, id: i64) -> Result<Team, ServiceError> {
        self.select(&Query::from("teams").eq("id", id).single())
            .await
    }

    async fn create_team(&self, input: &CreateTeam) -> Result<Team, ServiceError> {
        self.insert(
            &Query::from("teams").single(),
            input,
            "return=representation",
        )
        .await
    }

    async fn delete_team(&self, id: i64) -> Result<(), ServiceError> {
        self.delete_rows(&Query::from("teams").eq("id", id)).await
    }

    async fn count_team_tasks(&self, team_id: i64) -> Result<i64, ServiceError> {
        self.count(&Query::from("tasks").select("id").eq("team_id", team_id))
            .await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError> {
        self.select(&Query::from("profiles").eq("id", user_id).single())
            .await
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, ServiceError> {
        let rows: Vec<Profile> = self
            .select(&Query::from("profiles").eq("email", email))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, input: &UpsertProfile) -> Result<Profile, ServiceError> {
        self.insert(
            &Query::from("profiles").single(),
            input,
            "return=representation,resolution=merge-duplicates",
        )
        .await
    }

    async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>, ServiceError> {
        self.select(
            &Query::from("team_members")
                .select(MEMBER_SELECT)
                .eq("team_id", team_id),
        )
        .await
    }

    async fn add_member(&self, input: &CreateTeamMember) -> Result<TeamMember, ServiceError> {
        self.insert(
            &Query::from("team_members").select(MEMBER_SELECT).single(),
            input,
            "return=representation",
        )
        .await
    }

    async fn remove_member(&self, team_id: i64, user_id: &str) -> Result<(), ServiceError> {
        self.delete_rows(
            &Query::from("team_members")
                .eq("team_id", team_id)
                .eq("user_id", user_id),
        )
        .await
    }

    async fn list_tasks(&self, team_id: i64) -> Result<Vec<Task>, ServiceError> {
        self.select(
            &Query::from("tasks")
                .eq("team_id", team_id)
                .order("created_at", Order::Desc),
        )
        .await
    }

    async fn create_task(&self, input: &CreateTask) -> Result<Task, ServiceError> {
        self.insert(&Query::from("tasks").single(), input, "return=representation")
            .await
    }

    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, ServiceError> {
        self.patch(&Query::from("tasks").eq("id", id).single(), update)
            .await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ServiceError> {
        self.delete_rows(&Query::from("tasks").eq("id", id)).await
    }

    async fn subscribe_tasks(&self, team_id: i64) -> Result<Subscription, ServiceError> {
        let url = realtime::websocket_url(&self.base_url, &self.anon_key);
        let token = self.access_token();
        let join = realtime::join_message(team_id, Some(&token), "1");
        match realtime::open_channel(&url, join).await {
            Ok(sub) => Ok(sub),
            Err(e) => {
                warn!("realtime unavailable for team {team_id}: {e}");
                Err(e)
            }
        }
    }
}
