//! Local mirror of one team's board.
//!
//! `BoardState` never talks to the backend. Callers apply optimistic
//! patches here first, issue the remote write, then either confirm (by
//! replacing everything with a fresh [`BoardSnapshot`]) or roll back.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::PreconditionError;
use crate::member::TeamMember;
use crate::task::{Priority, Status, Task};
use crate::team::Team;

/// How long the "something changed" indicator stays lit after a realtime event.
pub const REALTIME_PULSE: Duration = Duration::from_secs(2);

/// Authoritative rows fetched in one resync.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub team: Team,
    pub members: Vec<TeamMember>,
    pub tasks: Vec<Task>,
}

/// One member's column, with the search filter already applied.
#[derive(Debug)]
pub struct Column<'a> {
    pub member: &'a TeamMember,
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Default)]
pub struct BoardState {
    team: Option<Team>,
    members: Vec<TeamMember>,
    tasks: Vec<Task>,
    query: String,
    pulse_until: Option<Instant>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team(&self) -> Option<&Team> {
        self.team.as_ref()
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team.as_ref().map(|t| t.name.as_str())
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    /// All local tasks, unfiltered, newest first.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Overwrite team, members and tasks. The search query and pulse survive.
    pub fn apply_snapshot(&mut self, snapshot: BoardSnapshot) {
        self.team = Some(snapshot.team);
        self.members = snapshot.members;
        self.tasks = snapshot.tasks;
    }

    /// Splice a placeholder task in front of the list and return its
    /// temporary id.
    pub fn begin_add(
        &mut self,
        title: &str,
        assignee_id: &str,
        team_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, PreconditionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PreconditionError::EmptyTaskTitle);
        }

        let mut temp_id = -now.timestamp_millis().max(1);
        while self.tasks.iter().any(|t| t.id == temp_id) {
            temp_id -= 1;
        }

        self.tasks.insert(
            0,
            Task {
                id: temp_id,
                title: title.to_string(),
                description: String::new(),
                status: Status::Todo,
                priority: Priority::Medium,
                due_date: None,
                assignee_id: Some(assignee_id.to_string()),
                team_id,
                created_at: now,
            },
        );
        Ok(temp_id)
    }

    /// Drop a placeholder. Returns false if a resync already replaced it.
    pub fn discard(&mut self, temp_id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != temp_id);
        self.tasks.len() != before
    }

    /// Returns `Ok(true)` when the local copy changed and a remote write is due.
    pub fn patch_status(&mut self, id: i64, status: Status) -> Result<bool, PreconditionError> {
        let Some(task) = self.task_mut(id)? else {
            return Ok(false);
        };
        if task.status == status {
            return Ok(false);
        }
        task.status = status;
        Ok(true)
    }

    /// Returns `Ok(true)` when the local copy changed and a remote write is due.
    pub fn patch_assignee(&mut self, id: i64, user_id: &str) -> Result<bool, PreconditionError> {
        let Some(task) = self.task_mut(id)? else {
            return Ok(false);
        };
        if task.assignee_id.as_deref() == Some(user_id) {
            return Ok(false);
        }
        task.assignee_id = Some(user_id.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, id: i64) -> Result<Option<Task>, PreconditionError> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        if self.tasks[idx].is_pending() {
            return Err(PreconditionError::TaskPending);
        }
        Ok(Some(self.tasks.remove(idx)))
    }

    fn task_mut(&mut self, id: i64) -> Result<Option<&mut Task>, PreconditionError> {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(t) if t.is_pending() => Err(PreconditionError::TaskPending),
            other => Ok(other),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn visible_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.matches_search(&self.query))
    }

    /// Columns in member order. Tasks assigned to non-members are not shown.
    pub fn columns(&self) -> Vec<Column<'_>> {
        self.members
            .iter()
            .map(|member| Column {
                member,
                tasks: self
                    .visible_tasks()
                    .filter(|t| t.assignee_id.as_deref() == Some(member.user_id.as_str()))
                    .collect(),
            })
            .collect()
    }

    /// The member `offset` columns away from `user_id`, if any.
    pub fn neighbour(&self, user_id: &str, offset: isize) -> Option<&TeamMember> {
        let idx = self.members.iter().position(|m| m.user_id == user_id)?;
        let target = idx.checked_add_signed(offset)?;
        self.members.get(target)
    }

    pub fn mark_changed(&mut self, now: Instant) {
        self.pulse_until = Some(now + REALTIME_PULSE);
    }

    pub fn is_pulsing(&self, now: Instant) -> bool {
        self.pulse_until.is_some_and(|until| now < until)
    }

    /// Clear an expired pulse.
    pub fn tick(&mut self, now: Instant) {
        if !self.is_pulsing(now) {
            self.pulse_until = None;
        }
    }
}
