//! In-process backend with the same contract as the hosted one.
//!
//! Every table lives behind one mutex. Task writes are broadcast to
//! subscribers just like the realtime feed would. Calls are recorded so
//! tests can assert on what was (and was not) sent, and any operation can be
//! made to fail once with [`MemoryService::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use allwork_core::change::{ChangeEvent, ChangeKind};
use allwork_core::member::{CreateTeamMember, Role, TeamMember};
use allwork_core::profile::{Profile, UpsertProfile};
use allwork_core::session::{AuthUser, Session, SignUp};
use allwork_core::task::{CreateTask, Priority, Status, Task, UpdateTask};
use allwork_core::team::{CreateTeam, Team};
use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::realtime::Subscription;
use crate::{BoardService, ServiceError};

pub const DEMO_EMAIL: &str = "demo@allwork.local";
pub const DEMO_PASSWORD: &str = "demo";

const MIN_PASSWORD_LEN: usize = 6;

/// Oldest calls are dropped past this, so a long `--demo` run stays bounded.
pub const CALL_LOG_LIMIT: usize = 1024;

/// One entry per `BoardService` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SignIn,
    SignUp,
    SignOut,
    RestoreSession,
    ListTeams,
    GetTeam,
    CreateTeam,
    DeleteTeam,
    CountTeamTasks,
    GetProfile,
    FindProfileByEmail,
    UpsertProfile,
    ListMembers,
    AddMember,
    RemoveMember,
    ListTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    SubscribeTasks,
}

struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, AuthUser>,
    refresh_tokens: HashMap<String, AuthUser>,
    current: Option<AuthUser>,

    teams: Vec<Team>,
    profiles: Vec<Profile>,
    members: Vec<TeamMember>,
    tasks: Vec<Task>,
    next_team_id: i64,
    next_task_id: i64,

    subscribers: Vec<(i64, mpsc::UnboundedSender<ChangeEvent>)>,
    calls: VecDeque<Op>,
    failures: HashMap<Op, String>,
}

impl Tables {
    fn record(&mut self, op: Op) -> Result<(), ServiceError> {
        if self.calls.len() == CALL_LOG_LIMIT {
            self.calls.pop_front();
        }
        self.calls.push_back(op);
        match self.failures.remove(&op) {
            Some(msg) => Err(ServiceError::Internal(msg)),
            None => Ok(()),
        }
    }

    fn require_user(&self) -> Result<AuthUser, ServiceError> {
        self.current
            .clone()
            .ok_or_else(|| ServiceError::Unauthorized("not signed in".into()))
    }

    fn issue_session(&mut self, user: AuthUser) -> Session {
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            user: user.clone(),
        };
        self.access_tokens
            .insert(session.access_token.clone(), user.clone());
        self.refresh_tokens
            .insert(session.refresh_token.clone(), user.clone());
        self.current = Some(user);
        session
    }

    fn add_account(&mut self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        self.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    fn upsert_profile(&mut self, input: &UpsertProfile) -> Profile {
        let profile = Profile::from(input.clone());
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => self.profiles.push(profile.clone()),
        }
        profile
    }

    fn with_profile(&self, member: &TeamMember) -> TeamMember {
        TeamMember {
            profile: self
                .profiles
                .iter()
                .find(|p| p.id == member.user_id)
                .cloned(),
            ..member.clone()
        }
    }

    fn team_exists(&self, id: i64) -> bool {
        self.teams.iter().any(|t| t.id == id)
    }

    fn insert_team(&mut self, name: &str) -> Team {
        self.next_team_id += 1;
        let team = Team {
            id: self.next_team_id,
            name: name.to_string(),
            created_at: Some(Utc::now()),
        };
        self.teams.push(team.clone());
        team
    }

    fn insert_member(&mut self, input: &CreateTeamMember) -> Result<TeamMember, ServiceError> {
        if !self.team_exists(input.team_id) {
            return Err(foreign_key("team_members", "team_id"));
        }
        if self
            .members
            .iter()
            .any(|m| m.team_id == input.team_id && m.user_id == input.user_id)
        {
            return Err(ServiceError::InvalidInput(
                "duplicate key value violates unique constraint \"team_members_pkey\"".into(),
            ));
        }
        let member = TeamMember {
            team_id: input.team_id,
            user_id: input.user_id.clone(),
            role: input.role,
            profile: None,
        };
        self.members.push(member.clone());
        Ok(self.with_profile(&member))
    }

    fn insert_task(&mut self, input: &CreateTask) -> Result<Task, ServiceError> {
        if !self.team_exists(input.team_id) {
            return Err(foreign_key("tasks", "team_id"));
        }
        if let Some(ref assignee) = input.assignee_id {
            if !self.profiles.iter().any(|p| &p.id == assignee) {
                return Err(foreign_key("tasks", "assignee_id"));
            }
        }
        self.next_task_id += 1;
        let task = Task {
            id: self.next_task_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: input.status,
            priority: input.priority,
            due_date: None,
            assignee_id: input.assignee_id.clone(),
            team_id: input.team_id,
            created_at: Utc::now(),
        };
        self.tasks.push(task.clone());
        self.notify(task.team_id, ChangeKind::Insert);
        Ok(task)
    }

    fn notify(&mut self, team_id: i64, kind: ChangeKind) {
        self.subscribers.retain(|(team, tx)| {
            if *team != team_id {
                return !tx.is_closed();
            }
            tx.send(ChangeEvent::tasks(kind)).is_ok()
        });
    }
}

fn foreign_key(table: &str, column: &str) -> ServiceError {
    ServiceError::InvalidInput(format!(
        "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{column}_fkey\""
    ))
}

pub struct MemoryService {
    tables: Mutex<Tables>,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Test and demo helpers. None of these are recorded as calls. --

    /// Register an account and give it a profile with a derived display name.
    pub fn seed_user(&self, email: &str, password: &str) -> AuthUser {
        self.seed_user_named(email, password, "", "")
    }

    pub fn seed_user_named(&self, email: &str, password: &str, first: &str, last: &str) -> AuthUser {
        let mut t = self.lock();
        let user = t.add_account(email, password);
        t.upsert_profile(&UpsertProfile::from_form(&user, first, last, ""));
        user
    }

    /// Register an account with no profile row.
    pub fn seed_account(&self, email: &str, password: &str) -> AuthUser {
        self.lock().add_account(email, password)
    }

    pub fn seed_team(&self, name: &str) -> Team {
        self.lock().insert_team(name)
    }

    pub fn seed_member(&self, team_id: i64, user_id: &str, role: Role) -> Result<TeamMember, ServiceError> {
        self.lock().insert_member(&CreateTeamMember {
            team_id,
            user_id: user_id.to_string(),
            role,
        })
    }

    /// Insert a task as if another client had written it. Subscribers are
    /// notified.
    pub fn seed_task(&self, team_id: i64, title: &str, assignee_id: &str) -> Result<Task, ServiceError> {
        self.lock().insert_task(&CreateTask {
            title: title.to_string(),
            description: String::new(),
            status: Status::Todo,
            priority: Priority::Medium,
            assignee_id: Some(assignee_id.to_string()),
            team_id,
        })
    }

    /// End every live feed for `team_id`, as a dropped websocket would.
    pub fn close_subscriptions(&self, team_id: i64) {
        self.lock().subscribers.retain(|(team, _)| *team != team_id);
    }

    /// Make the next call of `op` fail with `Internal(msg)`.
    pub fn fail_next(&self, op: Op, msg: impl Into<String>) {
        self.lock().failures.insert(op, msg.into());
    }

    pub fn calls(&self) -> Vec<Op> {
        self.lock().calls.iter().copied().collect()
    }

    pub fn count_calls(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Live subscriptions for a team. Dropped subscriptions are pruned.
    pub fn subscriber_count(&self, team_id: i64) -> usize {
        let mut t = self.lock();
        t.subscribers.retain(|(_, tx)| !tx.is_closed());
        t.subscribers
            .iter()
            .filter(|(team, _)| *team == team_id)
            .count()
    }

    pub fn task_rows(&self, team_id: i64) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.team_id == team_id)
            .cloned()
            .collect()
    }

    /// A demo account, two teammates, and one team with a handful of cards.
    pub fn with_demo_data() -> Self {
        let svc = Self::new();
        let demo = svc.seed_user_named(DEMO_EMAIL, DEMO_PASSWORD, "Demo", "User");
        let somchai = svc.seed_user_named("somchai@allwork.local", DEMO_PASSWORD, "Somchai", "Jaidee");
        let malee = svc.seed_user_named("malee@allwork.local", DEMO_PASSWORD, "Malee", "");

        let launch = svc.seed_team("Launch");
        svc.seed_team("Back office");

        let mut t = svc.lock();
        for (user, role) in [(&demo, Role::Owner), (&somchai, Role::Member), (&malee, Role::Member)] {
            let _ = t.insert_member(&CreateTeamMember {
                team_id: launch.id,
                user_id: user.id.clone(),
                role,
            });
        }
        let cards = [
            ("Draft release notes", &demo, Status::Doing, Priority::High),
            ("Review onboarding copy", &demo, Status::Todo, Priority::Medium),
            ("Fix login redirect", &somchai, Status::Done, Priority::High),
            ("Set up staging database", &somchai, Status::Todo, Priority::Low),
            ("Design team avatars", &malee, Status::Doing, Priority::Medium),
        ];
        for (title, user, status, priority) in cards {
            let _ = t.insert_task(&CreateTask {
                title: title.to_string(),
                description: String::new(),
                status,
                priority,
                assignee_id: Some(user.id.clone()),
                team_id: launch.id,
            });
        }
        if let Some(task) = t.tasks.iter_mut().find(|task| task.title == "Draft release notes") {
            task.due_date = NaiveDate::from_ymd_opt(2025, 12, 1);
        }
        drop(t);
        svc
    }
}

#[async_trait]
impl BoardService for MemoryService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let mut t = self.lock();
        t.record(Op::SignIn)?;
        let user = match t.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(ServiceError::InvalidInput("Invalid login credentials".into())),
        };
        debug!("memory sign-in for {email}");
        Ok(t.issue_session(user))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, ServiceError> {
        let mut t = self.lock();
        t.record(Op::SignUp)?;
        if t.accounts.contains_key(email) {
            return Err(ServiceError::InvalidInput("User already registered".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let user = t.add_account(email, password);
        Ok(SignUp {
            user,
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let mut t = self.lock();
        t.record(Op::SignOut)?;
        t.current = None;
        Ok(())
    }

    async fn restore_session(&self, session: &Session) -> Result<Session, ServiceError> {
        let mut t = self.lock();
        t.record(Op::RestoreSession)?;
        if !session.is_expired(Utc::now()) {
            if let Some(user) = t.access_tokens.get(&session.access_token).cloned() {
                t.current = Some(user);
                return Ok(session.clone());
            }
        }
        match t.refresh_tokens.remove(&session.refresh_token) {
            Some(user) => Ok(t.issue_session(user)),
            None => Err(ServiceError::Unauthorized("Invalid Refresh Token".into())),
        }
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.lock().current.clone()
    }

    async fn list_teams(&self) -> Result<Vec<Team>, ServiceError> {
        let mut t = self.lock();
        t.record(Op::ListTeams)?;
        t.require_user()?;
        let mut teams = t.teams.clone();
        teams.sort_by_key(|team| team.id);
        Ok(teams)
    }

    async fn get_team(&self, id: i64) -> Result<Team, ServiceError> {
        let mut t = self.lock();
        t.record(Op::GetTeam)?;
        t.require_user()?;
        t.teams
            .iter()
            .find(|team| team.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("team {id}")))
    }

    async fn create_team(&self, input: &CreateTeam) -> Result<Team, ServiceError> {
        let mut t = self.lock();
        t.record(Op::CreateTeam)?;
        t.require_user()?;
        Ok(t.insert_team(&input.name))
    }

    async fn delete_team(&self, id: i64) -> Result<(), ServiceError> {
        let mut t = self.lock();
        t.record(Op::DeleteTeam)?;
        t.require_user()?;
        if t.tasks.iter().any(|task| task.team_id == id) {
            return Err(ServiceError::InvalidInput(
                "update or delete on table \"teams\" violates foreign key constraint \"tasks_team_id_fkey\" on table \"tasks\"".into(),
            ));
        }
        t.members.retain(|m| m.team_id != id);
        t.teams.retain(|team| team.id != id);
        Ok(())
    }

    async fn count_team_tasks(&self, team_id: i64) -> Result<i64, ServiceError> {
        let mut t = self.lock();
        t.record(Op::CountTeamTasks)?;
        t.require_user()?;
        Ok(t.tasks.iter().filter(|task| task.team_id == team_id).count() as i64)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ServiceError> {
        let mut t = self.lock();
        t.record(Op::GetProfile)?;
        t.require_user()?;
        t.profiles
            .iter()
            .find(|p| p.id == user_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("profile {user_id}")))
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, ServiceError> {
        let mut t = self.lock();
        t.record(Op::FindProfileByEmail)?;
        t.require_user()?;
        Ok(t.profiles.iter().find(|p| p.email == email).cloned())
    }

    async fn upsert_profile(&self, input: &UpsertProfile) -> Result<Profile, ServiceError> {
        let mut t = self.lock();
        t.record(Op::UpsertProfile)?;
        t.require_user()?;
        Ok(t.upsert_profile(input))
    }

    async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>, ServiceError> {
        let mut t = self.lock();
        t.record(Op::ListMembers)?;
        t.require_user()?;
        Ok(t.members
            .iter()
            .filter(|m| m.team_id == team_id)
            .map(|m| t.with_profile(m))
            .collect())
    }

    async fn add_member(&self, input: &CreateTeamMember) -> Result<TeamMember, ServiceError> {
        let mut t = self.lock();
        t.record(Op::AddMember)?;
        t.require_user()?;
        t.insert_member(input)
    }

    async fn remove_member(&self, team_id: i64, user_id: &str) -> Result<(), ServiceError> {
        let mut t = self.lock();
        t.record(Op::RemoveMember)?;
        t.require_user()?;
        t.members
            .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
        Ok(())
    }

    async fn list_tasks(&self, team_id: i64) -> Result<Vec<Task>, ServiceError> {
        let mut t = self.lock();
        t.record(Op::ListTasks)?;
        t.require_user()?;
        let mut tasks: Vec<Task> = t
            .tasks
            .iter()
            .filter(|task| task.team_id == team_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn create_task(&self, input: &CreateTask) -> Result<Task, ServiceError> {
        let mut t = self.lock();
        t.record(Op::CreateTask)?;
        t.require_user()?;
        t.insert_task(input)
    }

    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, ServiceError> {
        let mut t = self.lock();
        t.record(Op::UpdateTask)?;
        t.require_user()?;
        let task = t
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))?;
        update.apply_to(task);
        let task = task.clone();
        t.notify(task.team_id, ChangeKind::Update);
        Ok(task)
    }

    async fn delete_task(&self, id: i64) -> Result<(), ServiceError> {
        let mut t = self.lock();
        t.record(Op::DeleteTask)?;
        t.require_user()?;
        if let Some(idx) = t.tasks.iter().position(|task| task.id == id) {
            let task = t.tasks.remove(idx);
            t.notify(task.team_id, ChangeKind::Delete);
        }
        Ok(())
    }

    async fn subscribe_tasks(&self, team_id: i64) -> Result<Subscription, ServiceError> {
        let mut t = self.lock();
        t.record(Op::SubscribeTasks)?;
        t.require_user()?;
        let (tx, rx) = mpsc::unbounded_channel();
        t.subscribers.push((team_id, tx));
        Ok(Subscription::new(rx))
    }
}
