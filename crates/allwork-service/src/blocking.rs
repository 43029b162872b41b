use std::future::Future;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use allwork_core::member::{CreateTeamMember, TeamMember};
use allwork_core::profile::{Profile, UpsertProfile};
use allwork_core::session::{AuthUser, Session, SignUp};
use allwork_core::task::{CreateTask, Task, UpdateTask};
use allwork_core::team::{CreateTeam, Team};
use tokio::runtime::{Builder, Runtime};

use crate::realtime::Subscription;
use crate::{BoardService, ServiceError};

/// Blocking wrapper around any `BoardService`.
///
/// Owns a tokio runtime. Reads go through `block_on()`; optimistic writes are
/// handed to [`BlockingService::spawn`] so the UI loop never waits on them.
pub struct BlockingService {
    inner: Arc<dyn BoardService>,
    rt: Runtime,
}

impl BlockingService {
    pub fn new(inner: Arc<dyn BoardService>) -> Result<Self, ServiceError> {
        let rt = Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to create tokio runtime: {e}")))?;
        Ok(Self { inner, rt })
    }

    pub fn inner(&self) -> &Arc<dyn BoardService> {
        &self.inner
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.rt.block_on(fut)
    }

    /// Run `f` on the runtime and deliver its output on `tx`. A closed
    /// receiver is ignored.
    pub fn spawn<T, F, Fut>(&self, tx: Sender<T>, f: F)
    where
        F: FnOnce(Arc<dyn BoardService>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let fut = f(Arc::clone(&self.inner));
        self.rt.spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    // -- Trait method delegates --

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        self.rt.block_on(self.inner.sign_in(email, password))
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, ServiceError> {
        self.rt.block_on(self.inner.sign_up(email, password))
    }

    pub fn sign_out(&self) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.sign_out())
    }

    pub fn restore_session(&self, session: &Session) -> Result<Session, ServiceError> {
        self.rt.block_on(self.inner.restore_session(session))
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.current_user()
    }

    pub fn list_teams(&self) -> Result<Vec<Team>, ServiceError> {
        self.rt.block_on(self.inner.list_teams())
    }

    pub fn get_team(&self, id: i64) -> Result<Team, ServiceError> {
        self.rt.block_on(self.inner.get_team(id))
    }

    pub fn create_team(&self, input: &CreateTeam) -> Result<Team, ServiceError> {
        self.rt.block_on(self.inner.create_team(input))
    }

    pub fn delete_team(&self, id: i64) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.delete_team(id))
    }

    pub fn count_team_tasks(&self, team_id: i64) -> Result<i64, ServiceError> {
        self.rt.block_on(self.inner.count_team_tasks(team_id))
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError> {
        self.rt.block_on(self.inner.get_profile(user_id))
    }

    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, ServiceError> {
        self.rt.block_on(self.inner.find_profile_by_email(email))
    }

    pub fn upsert_profile(&self, input: &UpsertProfile) -> Result<Profile, ServiceError> {
        self.rt.block_on(self.inner.upsert_profile(input))
    }

    pub fn ensure_profile(&self, user: &AuthUser) -> Result<Profile, ServiceError> {
        self.rt
            .block_on(crate::ensure_profile(self.inner.as_ref(), user))
    }

    pub fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>, ServiceError> {
        self.rt.block_on(self.inner.list_members(team_id))
    }

    pub fn add_member(&self, input: &CreateTeamMember) -> Result<TeamMember, ServiceError> {
        self.rt.block_on(self.inner.add_member(input))
    }

    pub fn remove_member(&self, team_id: i64, user_id: &str) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.remove_member(team_id, user_id))
    }

    pub fn list_tasks(&self, team_id: i64) -> Result<Vec<Task>, ServiceError> {
        self.rt.block_on(self.inner.list_tasks(team_id))
    }

    pub fn create_task(&self, input: &CreateTask) -> Result<Task, ServiceError> {
        self.rt.block_on(self.inner.create_task(input))
    }

    pub fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, ServiceError> {
        self.rt.block_on(self.inner.update_task(id, update))
    }

    pub fn delete_task(&self, id: i64) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.delete_task(id))
    }

    pub fn subscribe_tasks(&self, team_id: i64) -> Result<Subscription, ServiceError> {
        self.rt.block_on(self.inner.subscribe_tasks(team_id))
    }
}
