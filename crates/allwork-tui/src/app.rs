use std::cell::RefCell;
use std::time::{Duration, Instant};

use allwork_core::member::{CreateTeamMember, Role, TeamMember};
use allwork_core::profile::UpsertProfile;
use allwork_core::session::AuthUser;
use allwork_core::task::{Priority, Task, UpdateTask};
use allwork_core::team::Team;
use allwork_core::PreconditionError;
use allwork_service::{BlockingService, ServiceError};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::components::drag::{DragSource, DragTracker, DropTarget, Gesture, HitMap};
use crate::components::form::{Form, FormAction};
use crate::components::task_board::TaskBoard;
use crate::notice::Notice;
use crate::session::SessionManager;
use crate::teams::TeamList;
use crate::theme::{notice_style, Theme};

/// Which page is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Teams,
    Board(i64),
}

/// Signed-out users only ever see the login page; signed-in users never do.
pub fn guard(route: Route, authenticated: bool) -> Route {
    match (route, authenticated) {
        (_, false) => Route::Login,
        (Route::Login, true) => Route::Teams,
        (route, true) => route,
    }
}

const LOGIN_ACTIONS: &[&str] = &["Sign in", "Sign up"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// What the app is currently doing
#[derive(Debug, Clone)]
pub enum Mode {
    /// Email/password form; the "Action" field picks sign in or sign up
    Login { form: Form },
    /// Team list or board navigation, depending on the route
    Normal,
    /// Typing a new team name
    NewTeam { input: String },
    /// Confirm delete team
    ConfirmDeleteTeam { team: Team },
    /// Typing a new task title
    NewTask { input: String },
    /// Live title filter
    Search { input: String },
    /// Editing a task's details
    TaskDetail { task_id: i64, form: Form },
    /// Member list of the open team
    TeamSettings { list_state: ListState },
    /// Typing an email to add to the team
    Invite { input: String },
    /// Confirm removing a member
    ConfirmRemoveMember { member: TeamMember },
    /// Editing the signed-in user's profile
    Profile { form: Form },
}

pub struct App {
    service: BlockingService,
    sessions: SessionManager,
    route: Route,
    mode: Mode,
    teams: TeamList,
    board: Option<Board>,
    task_board: TaskBoard,
    theme: Theme,
    notice: Option<Notice>,
    drag: DragTracker,
    /// Written by `render`, read by mouse handling.
    hits: RefCell<HitMap>,
}

impl App {
    pub fn new(service: BlockingService, mut sessions: SessionManager) -> Self {
        let restore_failed = sessions.init(&service).err();
        let mut app = Self {
            service,
            sessions,
            route: Route::Login,
            mode: Mode::Normal,
            teams: TeamList::new(),
            board: None,
            task_board: TaskBoard::new(),
            theme: Theme::default(),
            notice: None,
            drag: DragTracker::default(),
            hits: RefCell::new(HitMap::default()),
        };
        app.navigate(Route::Teams);
        if let Some(e) = restore_failed {
            app.set_notice(Notice::warning(format!(
                "Could not restore your session: {}",
                e.message()
            )));
        }
        app
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.sessions.user()
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn teams(&self) -> &TeamList {
        &self.teams
    }

    pub fn task_board(&self) -> &TaskBoard {
        &self.task_board
    }

    /// Screen regions from the last `render`.
    pub fn hit_map(&self) -> HitMap {
        self.hits.borrow().clone()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.active().is_some()
    }

    pub fn is_input_mode(&self) -> bool {
        matches!(
            self.mode,
            Mode::Login { .. }
                | Mode::NewTeam { .. }
                | Mode::NewTask { .. }
                | Mode::Search { .. }
                | Mode::TaskDetail { .. }
                | Mode::Invite { .. }
                | Mode::Profile { .. }
        )
    }

    /// Switch pages. Leaving a board drops its realtime subscription.
    pub fn navigate(&mut self, route: Route) {
        let route = guard(route, self.sessions.is_authenticated());
        self.drag.cancel();
        self.board = None;
        self.mode = Mode::Normal;

        match route {
            Route::Login => {
                self.teams = TeamList::new();
                self.route = Route::Login;
                self.mode = Mode::Login {
                    form: login_form(""),
                };
            }
            Route::Teams => {
                self.route = Route::Teams;
                if let Err(e) = self.teams.load(&self.service) {
                    warn!("team list load failed: {e}");
                    self.set_notice(Notice::error(format!(
                        "Could not load teams: {}",
                        e.message()
                    )));
                }
            }
            Route::Board(team_id) => {
                let Some(viewer) = self.sessions.user().cloned() else {
                    return;
                };
                match Board::open(&self.service, team_id, &viewer) {
                    Ok(board) => {
                        self.task_board = TaskBoard::new();
                        self.board = Some(board);
                        self.route = route;
                        self.sync_board();
                    }
                    Err(e) => {
                        warn!("cannot open team {team_id}: {e}");
                        self.navigate(Route::Teams);
                        self.set_notice(team_error(&e));
                    }
                }
            }
        }
    }

    /// Drive background work: finished writes and realtime events.
    pub fn tick(&mut self, now: Instant) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        match board.poll(&self.service, now) {
            Ok(()) => self.sync_board(),
            Err(e) => self.board_failed(e),
        }
    }

    /// Wait for outstanding writes on the open board.
    pub fn settle(&mut self, timeout: Duration) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        match board.settle(&self.service, timeout) {
            Ok(()) => self.sync_board(),
            Err(e) => self.board_failed(e),
        }
    }

    fn set_notice(&mut self, notice: Notice) {
        debug!("notice: {notice}");
        self.notice = Some(notice);
    }

    /// Show the most relevant of a batch: the last error, else the last one.
    fn absorb(&mut self, notices: Vec<Notice>) {
        let pick = notices
            .iter()
            .rev()
            .find(|n| n.is_error())
            .or(notices.last())
            .cloned();
        if let Some(notice) = pick {
            self.set_notice(notice);
        }
    }

    fn sync_board(&mut self) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let notices = board.take_notices();
        self.task_board.sync(board.state());
        self.absorb(notices);
    }

    fn with_board(&mut self, f: impl FnOnce(&mut Board, &BlockingService)) {
        if let Some(board) = self.board.as_mut() {
            f(board, &self.service);
        }
        self.sync_board();
    }

    fn refresh_board(&mut self) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        match board.refetch(&self.service) {
            Ok(()) => self.sync_board(),
            Err(e) => self.board_failed(e),
        }
    }

    fn board_failed(&mut self, e: ServiceError) {
        if e.is_not_found() {
            self.navigate(Route::Teams);
            self.set_notice(team_error(&e));
        } else {
            warn!("board refresh failed: {e}");
            self.set_notice(Notice::error(format!(
                "Could not refresh board: {}",
                e.message()
            )));
        }
    }

    // -- Keyboard --

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.notice = None;

        match self.mode.clone() {
            Mode::Login { form } => self.handle_login(key, form),
            Mode::Normal => match self.route {
                Route::Board(_) => self.handle_board(key),
                _ => self.handle_teams(key),
            },
            Mode::NewTeam { input } => self.handle_new_team(key, input),
            Mode::ConfirmDeleteTeam { team } => self.handle_confirm_delete_team(key, team),
            Mode::NewTask { input } => self.handle_new_task(key, input),
            Mode::Search { input } => self.handle_search(key, input),
            Mode::TaskDetail { task_id, form } => self.handle_task_detail(key, task_id, form),
            Mode::TeamSettings { list_state } => self.handle_team_settings(key, list_state),
            Mode::Invite { input } => self.handle_invite(key, input),
            Mode::ConfirmRemoveMember { member } => self.handle_confirm_remove_member(key, member),
            Mode::Profile { form } => self.handle_profile(key, form),
        }
    }

    fn handle_login(&mut self, key: KeyEvent, mut form: Form) {
        if form.handle_key(key) != FormAction::Submit {
            self.mode = Mode::Login { form };
            return;
        }

        let email = form.value("Email").trim().to_string();
        let password = form.value("Password").to_string();
        if email.is_empty() {
            self.mode = Mode::Login { form };
            self.set_notice(Notice::warning(PreconditionError::EmptyEmail.to_string()));
            return;
        }

        if form.value("Action") == "Sign up" {
            match self.sessions.sign_up(&self.service, &email, &password) {
                Ok(Some(_)) => {
                    self.navigate(Route::Teams);
                    self.set_notice(Notice::success("Account created. Welcome!"));
                }
                Ok(None) => {
                    form.set_value("Action", "Sign in");
                    form.set_value("Password", "");
                    self.mode = Mode::Login { form };
                    self.set_notice(Notice::success("Account created. Please sign in."));
                }
                Err(e) => {
                    self.mode = Mode::Login { form };
                    self.set_notice(Notice::error(format!("Sign up failed: {}", e.message())));
                }
            }
        } else {
            match self.sessions.sign_in(&self.service, &email, &password) {
                Ok(user) => {
                    info!("signed in as {}", user.email);
                    self.navigate(Route::Teams);
                    self.set_notice(Notice::success("Signed in. Welcome back!"));
                }
                Err(e) => {
                    self.mode = Mode::Login { form };
                    self.set_notice(Notice::error(format!("Sign in failed: {}", e.message())));
                }
            }
        }
    }

    /// Keys shared by the team list and the board.
    fn handle_common(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('T') => {
                self.theme = self.theme.next();
                self.set_notice(Notice::info(format!("Theme: {}", self.theme.name())));
            }
            KeyCode::Char('p') => self.open_profile(),
            KeyCode::Char('o') => {
                let notice = self.sessions.sign_out(&self.service);
                self.navigate(Route::Login);
                self.set_notice(notice);
            }
            _ => {}
        }
    }

    fn handle_teams(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.teams.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.teams.select_prev(),
            KeyCode::Enter => {
                if let Some(id) = self.teams.selected().map(|t| t.id) {
                    self.navigate(Route::Board(id));
                }
            }
            KeyCode::Char('n') => {
                self.mode = Mode::NewTeam {
                    input: String::new(),
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(team) = self.teams.selected().cloned() {
                    self.mode = Mode::ConfirmDeleteTeam { team };
                }
            }
            KeyCode::Char('r') => self.navigate(Route::Teams),
            _ => self.handle_common(key),
        }
    }

    fn handle_new_team(&mut self, key: KeyEvent, mut input: String) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                let notice = self.teams.create(&self.service, &mut input);
                self.mode = if input.is_empty() {
                    Mode::Normal
                } else {
                    Mode::NewTeam { input }
                };
                self.set_notice(notice);
            }
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::NewTeam { input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::NewTeam { input };
            }
            _ => {}
        }
    }

    fn handle_confirm_delete_team(&mut self, key: KeyEvent, team: Team) {
        self.mode = Mode::Normal;
        if key.code == KeyCode::Char('y') {
            let notice = self.teams.delete(&self.service, &team);
            self.set_notice(notice);
        }
    }

    fn handle_board(&mut self, key: KeyEvent) {
        let selected = self.task_board.selected_task().map(|t| t.id);
        match key.code {
            KeyCode::Esc => self.navigate(Route::Teams),
            KeyCode::Char('n') => {
                self.mode = Mode::NewTask {
                    input: String::new(),
                }
            }
            KeyCode::Char('/') => {
                let input = self
                    .board
                    .as_ref()
                    .map(|b| b.state().query().to_string())
                    .unwrap_or_default();
                self.mode = Mode::Search { input };
            }
            KeyCode::Enter => {
                if let Some(id) = selected {
                    self.open_task_detail(id);
                }
            }
            KeyCode::Char('s') => {
                if let Some(id) = selected {
                    self.with_board(|b, svc| b.cycle_status(svc, id));
                }
            }
            KeyCode::Char('<') => {
                if let Some(id) = selected {
                    self.with_board(|b, svc| b.shift(svc, id, -1));
                }
            }
            KeyCode::Char('>') => {
                if let Some(id) = selected {
                    self.with_board(|b, svc| b.shift(svc, id, 1));
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(id) = selected {
                    self.with_board(|b, svc| b.delete_task(svc, id));
                }
            }
            KeyCode::Char('m') => self.mode = settings_mode(),
            KeyCode::Char('r') => self.refresh_board(),
            KeyCode::Char('h' | 'l' | 'j' | 'k' | 'g' | 'G')
            | KeyCode::Left
            | KeyCode::Right
            | KeyCode::Up
            | KeyCode::Down => self.task_board.handle_key(key),
            _ => self.handle_common(key),
        }
    }

    fn handle_new_task(&mut self, key: KeyEvent, mut input: String) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                if let Some(board) = self.board.as_mut() {
                    board.add_task(&self.service, &mut input);
                }
                self.mode = if input.is_empty() {
                    Mode::Normal
                } else {
                    Mode::NewTask { input }
                };
                self.sync_board();
            }
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::NewTask { input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::NewTask { input };
            }
            _ => {}
        }
    }

    fn handle_search(&mut self, key: KeyEvent, mut input: String) {
        match key.code {
            KeyCode::Esc => {
                input.clear();
                self.mode = Mode::Normal;
            }
            KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::Search {
                    input: input.clone(),
                };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::Search {
                    input: input.clone(),
                };
            }
            _ => return,
        }
        if let Some(board) = self.board.as_mut() {
            board.set_query(&input);
        }
        self.sync_board();
    }

    fn open_task_detail(&mut self, task_id: i64) {
        let Some(board) = self.board.as_ref() else {
            return;
        };
        let Some(task) = board.state().task(task_id) else {
            return;
        };
        if task.is_pending() {
            self.set_notice(Notice::info(PreconditionError::TaskPending.to_string()));
            return;
        }
        let assignee = task
            .assignee_id
            .as_deref()
            .and_then(|uid| board.state().members().iter().find(|m| m.user_id == uid))
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| "Unassigned".into());
        let form = task_form(task, &assignee);
        self.mode = Mode::TaskDetail { task_id, form };
    }

    fn handle_task_detail(&mut self, key: KeyEvent, task_id: i64, mut form: Form) {
        match form.handle_key(key) {
            FormAction::Cancel => self.mode = Mode::Normal,
            FormAction::None => self.mode = Mode::TaskDetail { task_id, form },
            FormAction::Submit => self.save_task(task_id, form),
        }
    }

    fn save_task(&mut self, task_id: i64, form: Form) {
        let title = form.value("Title").trim().to_string();
        if title.is_empty() {
            self.mode = Mode::TaskDetail { task_id, form };
            self.set_notice(Notice::warning(PreconditionError::EmptyTaskTitle.to_string()));
            return;
        }
        let due = form.value("Due date").trim().to_string();
        let due_date = if due.is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(&due, DATE_FORMAT) {
                Ok(d) => Some(d),
                Err(_) => {
                    self.mode = Mode::TaskDetail { task_id, form };
                    self.set_notice(Notice::warning(format!(
                        "Invalid due date \"{due}\": use YYYY-MM-DD"
                    )));
                    return;
                }
            }
        };
        let update = UpdateTask {
            title: Some(title),
            description: Some(form.value("Description").to_string()),
            priority: Priority::from_str(form.value("Priority")),
            due_date: Some(due_date),
            ..Default::default()
        };

        let Some(board) = self.board.as_mut() else {
            return;
        };
        match board.save_details(&self.service, task_id, &update) {
            Ok(()) => {
                self.mode = Mode::Normal;
                self.sync_board();
            }
            Err(e) => {
                warn!("saving task {task_id} failed: {e}");
                self.mode = Mode::TaskDetail { task_id, form };
                self.set_notice(Notice::error(format!(
                    "Could not save task: {}",
                    e.message()
                )));
            }
        }
    }

    fn handle_team_settings(&mut self, key: KeyEvent, mut list_state: ListState) {
        let members: Vec<TeamMember> = self
            .board
            .as_ref()
            .map(|b| b.state().members().to_vec())
            .unwrap_or_default();
        match key.code {
            KeyCode::Esc | KeyCode::Char('m') => {
                self.mode = Mode::Normal;
                return;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let i = list_state.selected().unwrap_or(0);
                if i + 1 < members.len() {
                    list_state.select(Some(i + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let i = list_state.selected().unwrap_or(0);
                if i > 0 {
                    list_state.select(Some(i - 1));
                }
            }
            KeyCode::Char('i') => {
                self.mode = Mode::Invite {
                    input: String::new(),
                };
                return;
            }
            KeyCode::Char('x') | KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(member) = list_state.selected().and_then(|i| members.get(i)) {
                    if member.is_owner() {
                        self.set_notice(Notice::warning("Owners cannot be removed"));
                    } else {
                        self.mode = Mode::ConfirmRemoveMember {
                            member: member.clone(),
                        };
                        return;
                    }
                }
            }
            _ => {}
        }
        self.mode = Mode::TeamSettings { list_state };
    }

    fn handle_invite(&mut self, key: KeyEvent, mut input: String) {
        match key.code {
            KeyCode::Esc => self.mode = settings_mode(),
            KeyCode::Enter => self.invite(input),
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::Invite { input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::Invite { input };
            }
            _ => {}
        }
    }

    /// Add an existing user to the open team by exact email.
    fn invite(&mut self, input: String) {
        let email = input.trim().to_string();
        let Some(team_id) = self.board.as_ref().map(Board::team_id) else {
            return;
        };
        if email.is_empty() {
            self.mode = Mode::Invite { input };
            self.set_notice(Notice::warning(PreconditionError::EmptyEmail.to_string()));
            return;
        }

        let profile = match self.service.find_profile_by_email(&email) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                self.mode = Mode::Invite { input };
                self.set_notice(Notice::error(
                    PreconditionError::UserNotFound(email).to_string(),
                ));
                return;
            }
            Err(e) => {
                self.mode = Mode::Invite { input };
                self.set_notice(Notice::error(format!(
                    "Could not look up user: {}",
                    e.message()
                )));
                return;
            }
        };

        let add = CreateTeamMember {
            team_id,
            user_id: profile.id,
            role: Role::Member,
        };
        match self.service.add_member(&add) {
            Ok(_) => {
                info!("added {email} to team {team_id}");
                self.refresh_board();
                if self.board.is_some() {
                    self.mode = settings_mode();
                    self.set_notice(Notice::success(format!("Added {email} to the team")));
                }
            }
            Err(e) => {
                self.mode = Mode::Invite { input };
                self.set_notice(Notice::error(format!(
                    "Could not add member: {}",
                    e.message()
                )));
            }
        }
    }

    fn handle_confirm_remove_member(&mut self, key: KeyEvent, member: TeamMember) {
        self.mode = settings_mode();
        if key.code != KeyCode::Char('y') {
            return;
        }
        match self.service.remove_member(member.team_id, &member.user_id) {
            Ok(()) => {
                info!("removed {} from team {}", member.user_id, member.team_id);
                self.refresh_board();
                if self.board.is_some() {
                    self.set_notice(Notice::success(format!(
                        "Removed {} from the team",
                        member.display_name()
                    )));
                }
            }
            Err(e) => self.set_notice(Notice::error(format!(
                "Could not remove member: {}",
                e.message()
            ))),
        }
    }

    fn open_profile(&mut self) {
        let Some(user) = self.sessions.user().cloned() else {
            return;
        };
        let (first, last, position) = match self.service.get_profile(&user.id) {
            Ok(p) => (p.first_name, p.last_name, p.position),
            Err(e) if e.is_not_found() => Default::default(),
            Err(e) => {
                self.set_notice(Notice::error(format!(
                    "Could not load profile: {}",
                    e.message()
                )));
                return;
            }
        };
        let form = Form::new("Profile")
            .read_only("Email", &user.email)
            .text("First name", &first)
            .text("Last name", &last)
            .text("Position", &position);
        self.mode = Mode::Profile { form };
    }

    fn handle_profile(&mut self, key: KeyEvent, mut form: Form) {
        match form.handle_key(key) {
            FormAction::Cancel => self.mode = Mode::Normal,
            FormAction::None => self.mode = Mode::Profile { form },
            FormAction::Submit => {
                let Some(user) = self.sessions.user().cloned() else {
                    return;
                };
                let profile = UpsertProfile::from_form(
                    &user,
                    form.value("First name").trim(),
                    form.value("Last name").trim(),
                    form.value("Position").trim(),
                );
                match self.service.upsert_profile(&profile) {
                    Ok(saved) => {
                        info!("saved profile for {}", saved.email);
                        self.mode = Mode::Normal;
                        self.refresh_board();
                        self.set_notice(Notice::success("Profile saved"));
                    }
                    Err(e) => {
                        self.mode = Mode::Profile { form };
                        self.set_notice(Notice::error(format!(
                            "Could not save profile: {}",
                            e.message()
                        )));
                    }
                }
            }
        }
    }

    // -- Pointer --

    /// Press on a card (board) or team (list) starts a gesture; release
    /// decides between a click and a drop.
    pub fn handle_mouse(&mut self, event: MouseEvent) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        let (column, row) = (event.column, event.row);
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let source = {
                    let hits = self.hits.borrow();
                    match self.route {
                        Route::Board(_) => hits.card_at(column, row).map(DragSource::Task),
                        Route::Teams => hits.team_at(column, row).map(DragSource::Team),
                        Route::Login => None,
                    }
                };
                match source {
                    Some(source) => self.drag.press(source, column, row),
                    None => self.drag.cancel(),
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.drag.motion(column, row);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let gesture = self.drag.release(column, row);
                self.finish_gesture(gesture);
            }
            _ => {}
        }
    }

    fn finish_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::None => {}
            Gesture::Click(DragSource::Task(id)) => {
                self.task_board.select_task_by_id(id);
                self.open_task_detail(id);
            }
            Gesture::Click(DragSource::Team(id)) => self.navigate(Route::Board(id)),
            Gesture::Drop {
                source,
                column,
                row,
            } => {
                let target = self.hits.borrow().resolve_drop(column, row);
                match (source, target) {
                    (DragSource::Task(id), DropTarget::Trash) => {
                        self.with_board(|b, svc| b.delete_task(svc, id))
                    }
                    (DragSource::Task(id), DropTarget::Column(user_id)) => {
                        self.with_board(|b, svc| b.reassign(svc, id, &user_id))
                    }
                    (DragSource::Team(id), DropTarget::Trash) => {
                        if let Some(team) = self.teams.get(id).cloned() {
                            self.mode = Mode::ConfirmDeleteTeam { team };
                        }
                    }
                    (source, target) => debug!("ignoring drop of {source:?} on {target:?}"),
                }
            }
        }
    }

    // -- Rendering --

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let palette = self.theme.palette();
        let mut hits = self.hits.borrow_mut();
        hits.clear();
        frame.render_widget(Block::default().style(palette.base()), area);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(if self.route == Route::Login { 0 } else { 3 }),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_title_bar(frame, layout[0]);

        let dragging = self.drag.active();
        match self.route {
            Route::Login => {}
            Route::Teams => {
                let team = match dragging {
                    Some((DragSource::Team(id), _)) => Some(id),
                    _ => None,
                };
                self.teams
                    .render(frame, layout[1], self.theme, team, &mut hits);
            }
            Route::Board(_) => {
                let task = match dragging {
                    Some((DragSource::Task(id), _)) => Some(id),
                    _ => None,
                };
                self.task_board
                    .render(frame, layout[1], self.theme, task, &mut hits);
            }
        }
        if self.route != Route::Login {
            self.render_trash(frame, layout[2]);
            hits.set_trash(layout[2]);
        }
        self.render_status_bar(frame, layout[3]);

        if let Some((source, (x, y))) = dragging {
            self.render_drag_ghost(frame, source, x, y, area);
        }

        // Overlays
        match &self.mode {
            Mode::Normal => {}
            Mode::Login { form } => {
                let footer = [Line::from(Span::styled(
                    "Tab next field, Left/Right switch sign in / sign up, Enter submit",
                    palette.muted(),
                ))];
                form.render(frame, centered_rect(50, 40, area), &palette, &footer);
            }
            Mode::NewTeam { input } => self.render_input_bar(frame, " New team ", input, area),
            Mode::ConfirmDeleteTeam { team } => self.render_confirm(
                frame,
                &format!("Delete team \"{}\"?", team.name),
                area,
            ),
            Mode::NewTask { input } => self.render_input_bar(frame, " New task ", input, area),
            Mode::Search { input } => self.render_input_bar(frame, " Search ", input, area),
            Mode::TaskDetail { form, .. } => {
                form.render(frame, centered_rect(60, 50, area), &palette, &[]);
            }
            Mode::TeamSettings { list_state } => {
                self.render_team_settings(frame, list_state, area)
            }
            Mode::Invite { input } => {
                self.render_team_settings(frame, &ListState::default(), area);
                self.render_input_bar(frame, " Invite by email ", input, area);
            }
            Mode::ConfirmRemoveMember { member } => {
                self.render_team_settings(frame, &ListState::default(), area);
                self.render_confirm(
                    frame,
                    &format!("Remove {} from the team?", member.display_name()),
                    area,
                );
            }
            Mode::Profile { form } => {
                form.render(frame, centered_rect(50, 40, area), &palette, &[]);
            }
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let palette = self.theme.palette();
        let mut spans = vec![Span::styled(
            " All Work ",
            Style::default().bold().fg(palette.accent),
        )];
        if let Some(board) = self.board.as_ref() {
            if let Some(name) = board.state().team_name() {
                spans.push(Span::raw("| "));
                spans.push(Span::styled(name.to_string(), Style::default().fg(Color::Yellow)));
            }
            let query = board.state().query();
            if !query.is_empty() {
                spans.push(Span::styled(
                    format!(" [/{query}]"),
                    Style::default().fg(Color::Magenta),
                ));
            }
            if board.is_pulsing(Instant::now()) {
                spans.push(Span::styled(" * updated", Style::default().fg(Color::Green).bold()));
            } else if !board.is_subscribed() {
                spans.push(Span::styled(" offline", palette.muted()));
            }
        }
        if let Some(user) = self.sessions.user() {
            spans.push(Span::styled(format!(" | {}", user.email), palette.muted()));
        }
        spans.push(Span::styled(format!(" | {}", self.theme.name()), palette.muted()));
        frame.render_widget(Line::from(spans), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        if let Some(ref notice) = self.notice {
            let line = Line::from(Span::styled(
                format!(" {}", notice.message),
                notice_style(notice.level),
            ));
            frame.render_widget(line, area);
            return;
        }

        let hints = match &self.mode {
            Mode::Login { .. } => vec![("Enter", "submit"), ("Tab", "field"), ("Ctrl+C", "quit")],
            Mode::Normal => match self.route {
                Route::Board(_) => vec![
                    ("q", "quit"),
                    ("h/l", "cols"),
                    ("j/k", "tasks"),
                    ("n", "new"),
                    ("Enter", "detail"),
                    ("s", "status"),
                    ("</>", "reassign"),
                    ("x", "trash"),
                    ("/", "search"),
                    ("m", "members"),
                    ("p", "profile"),
                    ("T", "theme"),
                    ("Esc", "teams"),
                ],
                _ => vec![
                    ("q", "quit"),
                    ("j/k", "select"),
                    ("Enter", "open"),
                    ("n", "new"),
                    ("d", "delete"),
                    ("p", "profile"),
                    ("o", "sign out"),
                    ("T", "theme"),
                ],
            },
            Mode::NewTeam { .. } | Mode::NewTask { .. } => {
                vec![("Enter", "create"), ("Esc", "cancel")]
            }
            Mode::Search { .. } => vec![("Enter", "keep"), ("Esc", "clear")],
            Mode::TaskDetail { .. } | Mode::Profile { .. } => {
                vec![("Tab", "field"), ("Enter", "save"), ("Esc", "cancel")]
            }
            Mode::TeamSettings { .. } => vec![
                ("j/k", "select"),
                ("i", "invite"),
                ("x", "remove"),
                ("Esc", "back"),
            ],
            Mode::Invite { .. } => vec![("Enter", "add"), ("Esc", "back")],
            Mode::ConfirmDeleteTeam { .. } | Mode::ConfirmRemoveMember { .. } => {
                vec![("y", "confirm"), ("any", "cancel")]
            }
        };

        let spans: Vec<Span> = hints
            .iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(format!(" {key}"), Style::default().fg(Color::Yellow).bold()),
                    Span::raw(format!(" {desc} ")),
                ]
            })
            .collect();

        frame.render_widget(Line::from(spans), area);
    }

    fn render_trash(&self, frame: &mut Frame, area: Rect) {
        let palette = self.theme.palette();
        let style = if self.drag.active().is_some() {
            Style::default().fg(Color::Red).bold()
        } else {
            palette.muted()
        };
        let block = Block::default()
            .title(" Trash ")
            .borders(Borders::ALL)
            .border_style(style);
        let paragraph = Paragraph::new("Drop here to delete")
            .style(style)
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, area);
    }

    fn render_drag_ghost(&self, frame: &mut Frame, source: DragSource, x: u16, y: u16, area: Rect) {
        let label = match source {
            DragSource::Task(id) => self
                .board
                .as_ref()
                .and_then(|b| b.state().task(id))
                .map(|t| t.title.clone()),
            DragSource::Team(id) => self.teams.get(id).map(|t| t.name.clone()),
        };
        let Some(label) = label else {
            return;
        };
        let width = u16::try_from(label.chars().count())
            .unwrap_or(u16::MAX)
            .saturating_add(2)
            .min(area.width.saturating_sub(x));
        if width == 0 || y >= area.y + area.height {
            return;
        }
        let ghost = Rect {
            x,
            y,
            width,
            height: 1,
        };
        frame.render_widget(Clear, ghost);
        frame.render_widget(
            Paragraph::new(format!(" {label} ")).style(self.theme.palette().highlight()),
            ghost,
        );
    }

    fn render_input_bar(&self, frame: &mut Frame, label: &str, input: &str, area: Rect) {
        let palette = self.theme.palette();
        let input_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(3),
            width: area.width,
            height: 3.min(area.height),
        };
        frame.render_widget(Clear, input_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(label);
        let paragraph = Paragraph::new(format!("{input}_"))
            .style(palette.base())
            .block(block);
        frame.render_widget(paragraph, input_area);
    }

    fn render_confirm(&self, frame: &mut Frame, question: &str, area: Rect) {
        let popup = centered_rect(50, 20, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" Confirm ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));

        let text = format!("{question}\n\n(y)es / (any key) cancel");
        let paragraph = Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, popup);
    }

    fn render_team_settings(&self, frame: &mut Frame, list_state: &ListState, area: Rect) {
        let palette = self.theme.palette();
        let popup = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup);

        let title = self
            .board
            .as_ref()
            .and_then(|b| b.state().team_name())
            .map(|name| format!(" {name}: members "))
            .unwrap_or_else(|| " Members ".into());
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .style(palette.base());

        let members = self
            .board
            .as_ref()
            .map(|b| b.state().members())
            .unwrap_or_default();
        let items: Vec<ListItem> = members
            .iter()
            .map(|m| {
                let (position, email) = m
                    .profile
                    .as_ref()
                    .map(|p| (p.position.as_str(), p.email.as_str()))
                    .unwrap_or(("", ""));
                let role_style = if m.is_owner() {
                    Style::default().fg(Color::Yellow)
                } else {
                    palette.muted()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(m.display_name().to_string(), Style::default().bold()),
                    Span::styled(format!("  {}", m.role.as_str()), role_style),
                    Span::raw(if position.is_empty() {
                        String::new()
                    } else {
                        format!("  {position}")
                    }),
                    Span::styled(format!("  {email}"), palette.muted()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = list_state.clone();
        frame.render_stateful_widget(list, popup, &mut state);
    }
}

fn settings_mode() -> Mode {
    Mode::TeamSettings {
        list_state: ListState::default().with_selected(Some(0)),
    }
}

fn login_form(email: &str) -> Form {
    Form::new("All Work")
        .text("Email", email)
        .secret("Password", "")
        .choice("Action", LOGIN_ACTIONS, LOGIN_ACTIONS[0])
}

fn task_form(task: &Task, assignee: &str) -> Form {
    let priorities: Vec<&str> = Priority::ALL.iter().map(|p| p.as_str()).collect();
    let due = task
        .due_date
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default();
    Form::new(format!("Task #{}", task.id))
        .text("Title", &task.title)
        .text("Description", &task.description)
        .choice("Priority", &priorities, task.priority.as_str())
        .text("Due date", &due)
        .read_only("Status", task.status.display_name())
        .read_only("Assignee", assignee)
}

fn team_error(e: &ServiceError) -> Notice {
    if e.is_not_found() {
        Notice::error("Team not found")
    } else {
        Notice::error(format!("Could not open team: {}", e.message()))
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
