//! Board controller: a [`BoardState`] plus the remote side of every action.
//!
//! Reads block on the service runtime. Writes are patched into the local
//! state first, then spawned; their results come back as [`Completion`]s
//! that [`Board::poll`] drains on every UI tick together with realtime
//! change events.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use allwork_core::board::{BoardSnapshot, BoardState};
use allwork_core::member::{CreateTeamMember, Role};
use allwork_core::session::AuthUser;
use allwork_core::task::{CreateTask, Priority, Status, Task, UpdateTask};
use allwork_core::PreconditionError;
use allwork_service::{ensure_profile, BlockingService, ServiceError, Subscription};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::notice::Notice;

/// Result of a spawned write, delivered back to the UI thread.
#[derive(Debug)]
pub enum Completion {
    Added {
        temp_id: i64,
        result: Result<Task, ServiceError>,
    },
    Updated {
        task_id: i64,
        result: Result<Task, ServiceError>,
    },
    Deleted {
        task_id: i64,
        result: Result<(), ServiceError>,
    },
}

pub struct Board {
    team_id: i64,
    viewer: AuthUser,
    state: BoardState,
    subscription: Option<Subscription>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    in_flight: usize,
    notices: Vec<Notice>,
}

impl Board {
    /// Load the team, heal an empty membership, and subscribe to changes.
    /// A missing team is reported as `NotFound`.
    pub fn open(svc: &BlockingService, team_id: i64, viewer: &AuthUser) -> Result<Self, ServiceError> {
        let (tx, rx) = mpsc::channel();
        let mut board = Self {
            team_id,
            viewer: viewer.clone(),
            state: BoardState::new(),
            subscription: None,
            tx,
            rx,
            in_flight: 0,
            notices: Vec::new(),
        };

        board.refetch(svc)?;
        if board.state.members().is_empty() {
            board.claim_ownership(svc)?;
        }

        match svc.subscribe_tasks(team_id) {
            Ok(sub) => board.subscription = Some(sub),
            Err(e) => {
                warn!("no live updates for team {team_id}: {e}");
                board
                    .notices
                    .push(Notice::warning(format!("Live updates unavailable: {}", e.message())));
            }
        }
        info!("opened board for team {team_id}");
        Ok(board)
    }

    /// A team with no members gets the viewer as its owner.
    fn claim_ownership(&mut self, svc: &BlockingService) -> Result<(), ServiceError> {
        let result = svc.ensure_profile(&self.viewer).and_then(|_| {
            svc.add_member(&CreateTeamMember {
                team_id: self.team_id,
                user_id: self.viewer.id.clone(),
                role: Role::Owner,
            })
        });
        match result {
            Ok(_) => {
                debug!("claimed ownership of team {}", self.team_id);
                self.refetch(svc)
            }
            Err(e) => {
                self.notices
                    .push(Notice::error(format!("Could not join team: {}", e.message())));
                Ok(())
            }
        }
    }

    /// Replace local team, members and tasks with the backend's rows.
    pub fn refetch(&mut self, svc: &BlockingService) -> Result<(), ServiceError> {
        let team = svc.get_team(self.team_id)?;
        let members = svc.list_members(self.team_id)?;
        let tasks = svc.list_tasks(self.team_id)?;
        self.state.apply_snapshot(BoardSnapshot {
            team,
            members,
            tasks,
        });
        Ok(())
    }

    /// Refetch, keeping every failure but a vanished team on the board.
    fn resync(&mut self, svc: &BlockingService) -> Result<(), ServiceError> {
        match self.refetch(svc) {
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => {
                warn!("board refetch failed: {e}");
                self.notices
                    .push(Notice::error(format!("Could not refresh board: {}", e.message())));
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    pub fn team_id(&self) -> i64 {
        self.team_id
    }

    pub fn viewer(&self) -> &AuthUser {
        &self.viewer
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn set_query(&mut self, query: &str) {
        self.state.set_query(query);
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_pulsing(&self, now: Instant) -> bool {
        self.state.is_pulsing(now)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Optimistically add a task for the viewer. `input` is cleared as soon
    /// as the placeholder is in place.
    pub fn add_task(&mut self, svc: &BlockingService, input: &mut String) {
        let temp_id = match self
            .state
            .begin_add(input, &self.viewer.id, self.team_id, Utc::now())
        {
            Ok(id) => id,
            Err(e) => {
                self.notices.push(Notice::warning(e.to_string()));
                return;
            }
        };
        let create = CreateTask {
            title: input.trim().to_string(),
            description: String::new(),
            status: Status::Todo,
            priority: Priority::Medium,
            assignee_id: Some(self.viewer.id.clone()),
            team_id: self.team_id,
        };
        input.clear();

        let viewer = self.viewer.clone();
        self.in_flight += 1;
        svc.spawn(self.tx.clone(), move |s| async move {
            let result = match ensure_profile(s.as_ref(), &viewer).await {
                Ok(_) => s.create_task(&create).await,
                Err(e) => Err(e),
            };
            Completion::Added { temp_id, result }
        });
    }

    pub fn change_status(&mut self, svc: &BlockingService, task_id: i64, status: Status) {
        match self.state.patch_status(task_id, status) {
            Ok(true) => self.spawn_update(
                svc,
                task_id,
                UpdateTask {
                    status: Some(status),
                    ..Default::default()
                },
            ),
            Ok(false) => {}
            Err(e) => self.notices.push(Notice::info(e.to_string())),
        }
    }

    pub fn cycle_status(&mut self, svc: &BlockingService, task_id: i64) {
        if let Some(task) = self.state.task(task_id) {
            let next = task.status.next();
            self.change_status(svc, task_id, next);
        }
    }

    /// Move a task into `user_id`'s column.
    pub fn reassign(&mut self, svc: &BlockingService, task_id: i64, user_id: &str) {
        match self.state.patch_assignee(task_id, user_id) {
            Ok(true) => {
                let name = self
                    .state
                    .members()
                    .iter()
                    .find(|m| m.user_id == user_id)
                    .map(|m| m.display_name().to_string())
                    .unwrap_or_else(|| "Unknown".into());
                self.notices.push(Notice::info(format!("Assigned to {name}")));
                self.spawn_update(
                    svc,
                    task_id,
                    UpdateTask {
                        assignee_id: Some(Some(user_id.to_string())),
                        ..Default::default()
                    },
                );
            }
            Ok(false) => {}
            Err(e) => self.notices.push(Notice::info(e.to_string())),
        }
    }

    /// Reassign to the column `offset` places away from the current assignee.
    pub fn shift(&mut self, svc: &BlockingService, task_id: i64, offset: isize) {
        let target = self
            .state
            .task(task_id)
            .and_then(|t| t.assignee_id.as_deref())
            .and_then(|uid| self.state.neighbour(uid, offset))
            .map(|m| m.user_id.clone());
        if let Some(user_id) = target {
            self.reassign(svc, task_id, &user_id);
        }
    }

    pub fn delete_task(&mut self, svc: &BlockingService, task_id: i64) {
        match self.state.remove(task_id) {
            Ok(Some(_)) => {
                self.in_flight += 1;
                svc.spawn(self.tx.clone(), move |s| async move {
                    Completion::Deleted {
                        task_id,
                        result: s.delete_task(task_id).await,
                    }
                });
            }
            Ok(None) => {}
            Err(e) => self.notices.push(Notice::info(e.to_string())),
        }
    }

    fn spawn_update(&mut self, svc: &BlockingService, task_id: i64, update: UpdateTask) {
        self.in_flight += 1;
        svc.spawn(self.tx.clone(), move |s| async move {
            Completion::Updated {
                task_id,
                result: s.update_task(task_id, &update).await,
            }
        });
    }

    /// Save the detail modal. Runs inline so the modal can stay open on failure.
    pub fn save_details(
        &mut self,
        svc: &BlockingService,
        task_id: i64,
        update: &UpdateTask,
    ) -> Result<(), ServiceError> {
        if self.state.task(task_id).is_some_and(Task::is_pending) {
            return Err(ServiceError::InvalidInput(PreconditionError::TaskPending.to_string()));
        }
        svc.update_task(task_id, update)?;
        self.notices.push(Notice::success("Task updated"));
        self.resync(svc)
    }

    /// Drain finished writes and realtime events. Returns `NotFound` if the
    /// team disappeared underneath us.
    pub fn poll(&mut self, svc: &BlockingService, now: Instant) -> Result<(), ServiceError> {
        while let Ok(done) = self.rx.try_recv() {
            self.complete(svc, done)?;
        }

        let mut events = Vec::new();
        if let Some(sub) = self.subscription.as_mut() {
            while let Some(event) = sub.try_next() {
                events.push(event);
            }
            if sub.is_closed() {
                warn!("realtime feed for team {} ended", self.team_id);
                self.subscription = None;
                self.notices.push(Notice::warning(
                    "Live updates lost: press r to refresh",
                ));
            }
        }
        for event in events {
            debug!("realtime {} on {}, refetching", event.kind, event.table);
            self.resync(svc)?;
            self.state.mark_changed(now);
        }

        self.state.tick(now);
        Ok(())
    }

    /// Block until every spawned write has reported back or `timeout` passes.
    pub fn settle(&mut self, svc: &BlockingService, timeout: Duration) -> Result<(), ServiceError> {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(done) => self.complete(svc, done)?,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ServiceError::Internal("timed out waiting for writes".into()))
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }

    fn complete(&mut self, svc: &BlockingService, done: Completion) -> Result<(), ServiceError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match done {
            Completion::Added { temp_id, result } => {
                self.state.discard(temp_id);
                match result {
                    Ok(task) => {
                        info!("created task {}", task.id);
                        self.notices.push(Notice::success("Task added"));
                        self.resync(svc)
                    }
                    Err(e) => {
                        warn!("create task failed: {e}");
                        self.notices
                            .push(Notice::error(format!("Could not add task: {}", e.message())));
                        Ok(())
                    }
                }
            }
            Completion::Updated { task_id, result } => match result {
                Ok(_) => self.resync(svc),
                Err(e) => {
                    warn!("update of task {task_id} failed: {e}");
                    self.notices
                        .push(Notice::error(format!("Could not update task: {}", e.message())));
                    Ok(())
                }
            },
            Completion::Deleted { task_id, result } => {
                match result {
                    Ok(()) => self.notices.push(Notice::success("Task deleted")),
                    Err(e) => {
                        warn!("delete of task {task_id} failed: {e}");
                        self.notices
                            .push(Notice::error(format!("Could not delete task: {}", e.message())));
                    }
                }
                self.resync(svc)
            }
        }
    }
}
