use async_trait::async_trait;
use allwork_core::member::{CreateTeamMember, TeamMember};
use allwork_core::profile::{Profile, UpsertProfile};
use allwork_core::session::{AuthUser, Session, SignUp};
use allwork_core::task::{CreateTask, Task, UpdateTask};
use allwork_core::team::{CreateTeam, Team};
use thiserror::Error;

use crate::realtime::Subscription;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The raw backend message, without the variant prefix. This is what
    /// gets appended to user-facing notices.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::NotFound(m)
            | ServiceError::InvalidInput(m)
            | ServiceError::Unauthorized(m)
            | ServiceError::Internal(m) => m,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

/// Abstraction over the hosted table store, its auth endpoints and its
/// change feed.
///
/// The TUI programs against this trait.
/// `HttpService` talks to the hosted backend.
/// `MemoryService` keeps every table in process.
#[async_trait]
pub trait BoardService: Send + Sync {
    // -- Auth --
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, ServiceError>;
    async fn sign_out(&self) -> Result<(), ServiceError>;
    /// Re-activate a persisted session, refreshing it if needed. Returns the
    /// session that is now active.
    async fn restore_session(&self, session: &Session) -> Result<Session, ServiceError>;
    fn current_user(&self) -> Option<AuthUser>;

    // -- Teams --
    async fn list_teams(&self) -> Result<Vec<Team>, ServiceError>;
    async fn get_team(&self, id: i64) -> Result<Team, ServiceError>;
    async fn create_team(&self, input: &CreateTeam) -> Result<Team, ServiceError>;
    async fn delete_team(&self, id: i64) -> Result<(), ServiceError>;
    async fn count_team_tasks(&self, team_id: i64) -> Result<i64, ServiceError>;

    // -- Profiles --
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError>;
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, ServiceError>;
    async fn upsert_profile(&self, input: &UpsertProfile) -> Result<Profile, ServiceError>;

    // -- Members --
    async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>, ServiceError>;
    async fn add_member(&self, input: &CreateTeamMember) -> Result<TeamMember, ServiceError>;
    async fn remove_member(&self, team_id: i64, user_id: &str) -> Result<(), ServiceError>;

    // -- Tasks --
    async fn list_tasks(&self, team_id: i64) -> Result<Vec<Task>, ServiceError>;
    async fn create_task(&self, input: &CreateTask) -> Result<Task, ServiceError>;
    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, ServiceError>;
    async fn delete_task(&self, id: i64) -> Result<(), ServiceError>;

    // -- Realtime --
    /// Notify on any insert/update/delete of `tasks` rows with this `team_id`.
    async fn subscribe_tasks(&self, team_id: i64) -> Result<Subscription, ServiceError>;
}

/// Make sure `user` has a profile row, creating a minimal one if absent.
pub async fn ensure_profile(
    service: &dyn BoardService,
    user: &AuthUser,
) -> Result<Profile, ServiceError> {
    match service.get_profile(&user.id).await {
        Ok(profile) => Ok(profile),
        Err(ServiceError::NotFound(_)) => {
            service
                .upsert_profile(&UpsertProfile::bootstrap(user))
                .await
        }
        Err(e) => Err(e),
    }
}
