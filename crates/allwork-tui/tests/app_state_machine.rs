//! State machine tests for the TUI App.
//!
//! Each test builds an App over an in-memory backend, signs in through the
//! login form, and drives it with key and mouse events. Mouse positions come
//! from the hit map written by rendering into a `TestBackend`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use allwork_core::member::Role;
use allwork_core::session::AuthUser;
use allwork_core::task::{Priority, Task};
use allwork_core::team::Team;
use allwork_service::{BlockingService, MemoryService, Op};
use allwork_tui::app::{App, Mode, Route};
use allwork_tui::components::drag::HitMap;
use allwork_tui::notice::Level;
use allwork_tui::session::SessionManager;
use allwork_tui::theme::Theme;
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;

const WAIT: Duration = Duration::from_secs(5);

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn char_key(c: char) -> KeyEvent {
    key(KeyCode::Char(c))
}

fn type_str(app: &mut App, s: &str) {
    for c in s.chars() {
        app.handle_key(char_key(c));
    }
}

fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
    MouseEvent {
        kind,
        column,
        row,
        modifiers: KeyModifiers::NONE,
    }
}

/// Press at `from`, move to `to`, release there.
fn drag(app: &mut App, from: (u16, u16), to: (u16, u16)) {
    app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), from.0, from.1));
    app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), to.0, to.1));
    app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), to.0, to.1));
}

fn render(app: &App) -> HitMap {
    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|frame| app.render(frame)).unwrap();
    app.hit_map()
}

fn center(r: Rect) -> (u16, u16) {
    (r.x + r.width / 2, r.y + r.height / 2)
}

fn sign_in(app: &mut App, email: &str, password: &str) {
    type_str(app, email);
    app.handle_key(key(KeyCode::Tab));
    type_str(app, password);
    app.handle_key(key(KeyCode::Enter));
}

struct Fixture {
    mem: Arc<MemoryService>,
    app: App,
    ann: AuthUser,
    bob: AuthUser,
    team: Team,
}

/// Ann (owner) and Bob (member) share team "Core". Ann is signed in.
fn fixture() -> Fixture {
    let mem = Arc::new(MemoryService::new());
    let ann = mem.seed_user_named("ann@example.com", "secret1", "Ann", "Lee");
    let bob = mem.seed_user_named("bob@example.com", "secret1", "Bob", "Kim");
    let team = mem.seed_team("Core");
    mem.seed_member(team.id, &ann.id, Role::Owner).unwrap();
    mem.seed_member(team.id, &bob.id, Role::Member).unwrap();

    let svc = BlockingService::new(mem.clone()).unwrap();
    let mut app = App::new(svc, SessionManager::new(None));
    sign_in(&mut app, "ann@example.com", "secret1");
    assert_eq!(app.route(), Route::Teams);
    Fixture {
        mem,
        app,
        ann,
        bob,
        team,
    }
}

fn seed(f: &Fixture, title: &str, assignee: &AuthUser) -> Task {
    f.mem.seed_task(f.team.id, title, &assignee.id).unwrap()
}

fn open_board(f: &mut Fixture) {
    f.app.handle_key(key(KeyCode::Enter));
    assert_eq!(f.app.route(), Route::Board(f.team.id));
}

// -- Login and routing --

#[test]
fn starts_at_login_when_signed_out() {
    let mem = Arc::new(MemoryService::new());
    mem.seed_user("ann@example.com", "secret1");
    let svc = BlockingService::new(mem).unwrap();
    let mut app = App::new(svc, SessionManager::new(None));

    assert_eq!(app.route(), Route::Login);
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(app.is_input_mode());

    app.navigate(Route::Teams);
    assert_eq!(app.route(), Route::Login);
}

#[test]
fn wrong_password_stays_on_login() {
    let mem = Arc::new(MemoryService::new());
    mem.seed_user("ann@example.com", "secret1");
    let svc = BlockingService::new(mem).unwrap();
    let mut app = App::new(svc, SessionManager::new(None));

    sign_in(&mut app, "ann@example.com", "nope");
    assert_eq!(app.route(), Route::Login);
    let notice = app.notice().unwrap();
    assert!(notice.is_error());
    assert!(notice.message.contains("Invalid login credentials"));

    // The typed email survives; only the password needs fixing.
    match app.mode() {
        Mode::Login { form } => assert_eq!(form.value("Email"), "ann@example.com"),
        other => panic!("expected Login, got {other:?}"),
    }
}

#[test]
fn empty_email_is_refused_locally() {
    let mem = Arc::new(MemoryService::new());
    let svc = BlockingService::new(mem.clone()).unwrap();
    let mut app = App::new(svc, SessionManager::new(None));
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.notice().unwrap().level, Level::Warning);
    assert_eq!(mem.count_calls(Op::SignIn), 0);
}

#[test]
fn sign_up_flips_back_to_sign_in() {
    let mem = Arc::new(MemoryService::new());
    let svc = BlockingService::new(mem).unwrap();
    let mut app = App::new(svc, SessionManager::new(None));

    type_str(&mut app, "new@example.com");
    app.handle_key(key(KeyCode::Tab));
    type_str(&mut app, "hunter22");
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Right));
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.route(), Route::Login);
    assert_eq!(app.notice().unwrap().level, Level::Success);
    match app.mode() {
        Mode::Login { form } => {
            assert_eq!(form.value("Action"), "Sign in");
            assert_eq!(form.value("Password"), "");
        }
        other => panic!("expected Login, got {other:?}"),
    }

    app.handle_key(key(KeyCode::BackTab));
    type_str(&mut app, "hunter22");
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.route(), Route::Teams);
}

#[test]
fn missing_team_falls_back_to_team_list() {
    let mut f = fixture();
    f.app.navigate(Route::Board(9_999));
    assert_eq!(f.app.route(), Route::Teams);
    assert!(f.app.board().is_none());
    let notice = f.app.notice().unwrap();
    assert!(notice.is_error());
    assert_eq!(notice.message, "Team not found");
}

#[test]
fn sign_out_and_restore_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("allwork").join("session.json");
    let mem = Arc::new(MemoryService::new());
    mem.seed_user("ann@example.com", "secret1");

    let svc = BlockingService::new(mem.clone()).unwrap();
    let mut app = App::new(svc, SessionManager::new(Some(path.clone())));
    sign_in(&mut app, "ann@example.com", "secret1");
    assert_eq!(app.route(), Route::Teams);
    assert!(path.exists());
    drop(app);

    let svc = BlockingService::new(mem.clone()).unwrap();
    let mut app = App::new(svc, SessionManager::new(Some(path.clone())));
    assert_eq!(app.route(), Route::Teams);
    assert_eq!(app.user().unwrap().email, "ann@example.com");

    app.handle_key(char_key('o'));
    assert_eq!(app.route(), Route::Login);
    assert!(app.user().is_none());
    assert!(!path.exists());
    assert_eq!(mem.count_calls(Op::SignOut), 1);
}

#[test]
fn unreachable_backend_at_startup_keeps_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mem = Arc::new(MemoryService::new());
    mem.seed_user("ann@example.com", "secret1");

    let svc = BlockingService::new(mem.clone()).unwrap();
    let mut app = App::new(svc, SessionManager::new(Some(path.clone())));
    sign_in(&mut app, "ann@example.com", "secret1");
    drop(app);
    BlockingService::new(mem.clone()).unwrap().sign_out().unwrap();

    mem.fail_next(Op::RestoreSession, "connection failed: timed out");
    let svc = BlockingService::new(mem.clone()).unwrap();
    let app = App::new(svc, SessionManager::new(Some(path.clone())));
    assert_eq!(app.route(), Route::Login);
    assert!(app.user().is_none());
    assert!(path.exists());
    let notice = app.notice().unwrap();
    assert_eq!(notice.level, Level::Warning);
    assert!(notice.message.contains("timed out"));
}

// -- Team list --

#[test]
fn create_team_via_keys() {
    let mut f = fixture();
    f.app.handle_key(char_key('n'));
    assert!(matches!(f.app.mode(), Mode::NewTeam { .. }));
    type_str(&mut f.app, "Ops");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::Normal));
    assert_eq!(f.app.notice().unwrap().level, Level::Success);
    let names: Vec<&str> = f.app.teams().teams().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Core", "Ops"]);
    assert_eq!(f.app.teams().selected().unwrap().name, "Ops");
}

#[test]
fn failed_team_create_keeps_input() {
    let mut f = fixture();
    f.mem.fail_next(Op::CreateTeam, "duplicate key value");
    f.app.handle_key(char_key('n'));
    type_str(&mut f.app, "Ops");
    f.app.handle_key(key(KeyCode::Enter));

    match f.app.mode() {
        Mode::NewTeam { input } => assert_eq!(input, "Ops"),
        other => panic!("expected NewTeam, got {other:?}"),
    }
    assert!(f.app.notice().unwrap().message.contains("duplicate key value"));
}

#[test]
fn team_with_tasks_is_not_deleted() {
    let mut f = fixture();
    let ann = f.ann.clone();
    seed(&f, "one", &ann);
    seed(&f, "two", &ann);
    f.app.handle_key(char_key('d'));
    assert!(matches!(f.app.mode(), Mode::ConfirmDeleteTeam { .. }));
    f.app.handle_key(char_key('y'));

    let notice = f.app.notice().unwrap();
    assert!(notice.is_error());
    assert!(notice.message.contains("2 task"));
    assert_eq!(f.mem.count_calls(Op::CountTeamTasks), 1);
    assert_eq!(f.mem.count_calls(Op::DeleteTeam), 0);
    assert_eq!(f.app.teams().teams().len(), 1);
}

#[test]
fn empty_team_is_deleted_after_confirm() {
    let mut f = fixture();
    f.mem.seed_team("Spare");
    f.app.handle_key(char_key('r'));
    f.app.handle_key(char_key('j'));
    assert_eq!(f.app.teams().selected().unwrap().name, "Spare");

    f.app.handle_key(char_key('d'));
    f.app.handle_key(char_key('n'));
    assert_eq!(f.mem.count_calls(Op::DeleteTeam), 0);

    f.app.handle_key(char_key('d'));
    f.app.handle_key(char_key('y'));
    assert_eq!(f.mem.count_calls(Op::DeleteTeam), 1);
    assert_eq!(f.app.teams().teams().len(), 1);
}

#[test]
fn dragging_team_to_trash_asks_first() {
    let mut f = fixture();
    let hits = render(&f.app);
    let team = hits.team_rect(f.team.id).unwrap();
    let trash = hits.trash_rect().unwrap();

    drag(&mut f.app, (team.x + 2, team.y), center(trash));
    match f.app.mode() {
        Mode::ConfirmDeleteTeam { team } => assert_eq!(team.name, "Core"),
        other => panic!("expected ConfirmDeleteTeam, got {other:?}"),
    }
    assert_eq!(f.mem.count_calls(Op::CountTeamTasks), 0);
}

#[test]
fn small_pointer_movement_on_team_opens_it() {
    let mut f = fixture();
    let hits = render(&f.app);
    let team = hits.team_rect(f.team.id).unwrap();

    // 6 cells right, 2 down: well under the threshold.
    drag(&mut f.app, (team.x + 1, team.y), (team.x + 7, team.y + 2));
    assert_eq!(f.app.route(), Route::Board(f.team.id));
}

// -- Board --

#[test]
fn board_shows_one_column_per_member() {
    let mut f = fixture();
    let (ann, bob) = (f.ann.clone(), f.bob.clone());
    seed(&f, "Ann's", &ann);
    seed(&f, "Bob's", &bob);
    open_board(&mut f);

    assert_eq!(f.app.task_board().column_count(), 2);
    assert_eq!(f.app.task_board().active_user(), Some(ann.id.as_str()));
    assert_eq!(f.app.task_board().selected_task().unwrap().title, "Ann's");
    assert!(f.app.board().unwrap().is_subscribed());

    let hits = render(&f.app);
    assert!(hits.column_rect(&ann.id).unwrap().x < hits.column_rect(&bob.id).unwrap().x);
}

#[test]
fn new_task_via_keys() {
    let mut f = fixture();
    open_board(&mut f);
    f.app.handle_key(char_key('n'));
    type_str(&mut f.app, "Ship it");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::Normal));
    let pending = f.app.board().unwrap().state().tasks()[0].clone();
    assert!(pending.is_pending());
    assert_eq!(pending.assignee_id.as_deref(), Some(f.ann.id.as_str()));

    f.app.settle(WAIT);
    let rows = f.mem.task_rows(f.team.id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Ship it");
    assert!(!f.app.board().unwrap().state().tasks()[0].is_pending());
    assert_eq!(f.app.notice().unwrap().message, "Task added");
}

#[test]
fn blank_task_title_stays_in_input() {
    let mut f = fixture();
    open_board(&mut f);
    f.app.handle_key(char_key('n'));
    type_str(&mut f.app, "  ");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::NewTask { .. }));
    assert_eq!(f.app.notice().unwrap().level, Level::Warning);
    assert_eq!(f.mem.count_calls(Op::CreateTask), 0);
}

#[test]
fn click_on_card_opens_detail() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, "Read me", &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();

    drag(&mut f.app, (card.x + 1, card.y), (card.x + 4, card.y + 1));
    match f.app.mode() {
        Mode::TaskDetail { task_id, form } => {
            assert_eq!(*task_id, task.id);
            assert_eq!(form.value("Title"), "Read me");
            assert_eq!(form.value("Assignee"), "Ann Lee");
        }
        other => panic!("expected TaskDetail, got {other:?}"),
    }
    assert_eq!(f.mem.count_calls(Op::UpdateTask), 0);
}

#[test]
fn drag_card_to_other_column_reassigns() {
    let mut f = fixture();
    let (ann, bob) = (f.ann.clone(), f.bob.clone());
    let task = seed(&f, "Hand over", &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();
    let target = hits.column_rect(&bob.id).unwrap();

    drag(&mut f.app, (card.x + 1, card.y), center(target));
    let local = f.app.board().unwrap().state().task(task.id).unwrap().clone();
    assert_eq!(local.assignee_id.as_deref(), Some(bob.id.as_str()));
    assert_eq!(f.app.notice().unwrap().message, "Assigned to Bob Kim");
    // The cursor follows the card into Bob's column.
    assert_eq!(f.app.task_board().active_user(), Some(bob.id.as_str()));

    f.app.settle(WAIT);
    assert_eq!(f.mem.task_rows(f.team.id)[0].assignee_id, Some(bob.id));
}

#[test]
fn drag_card_onto_own_column_is_a_no_op() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, "Stay", &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();
    let own = hits.column_rect(&ann.id).unwrap();

    drag(&mut f.app, (card.x + 1, card.y), (own.x + 2, own.y + own.height - 2));
    assert!(matches!(f.app.mode(), Mode::Normal));
    assert_eq!(f.mem.count_calls(Op::UpdateTask), 0);
}

#[test]
fn drag_card_outside_any_target_is_a_no_op() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, "Nowhere", &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();

    // The title bar is neither a column nor the trash.
    drag(&mut f.app, (card.x + 1, card.y), (card.x + 30, 0));
    assert_eq!(f.mem.count_calls(Op::UpdateTask), 0);
    assert_eq!(f.mem.count_calls(Op::DeleteTask), 0);
    let local = f.app.board().unwrap().state().task(task.id).unwrap();
    assert_eq!(local.assignee_id.as_deref(), Some(ann.id.as_str()));
}

#[test]
fn drag_card_to_trash_deletes_it() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, "Bin me", &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();
    let trash = hits.trash_rect().unwrap();

    drag(&mut f.app, (card.x + 1, card.y), center(trash));
    assert!(f.app.board().unwrap().state().task(task.id).is_none());
    f.app.settle(WAIT);
    assert!(f.mem.task_rows(f.team.id).is_empty());
    assert_eq!(f.app.notice().unwrap().message, "Task deleted");
}

#[test]
fn drag_ghost_clamps_very_long_titles() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, &"x".repeat(usize::from(u16::MAX)), &ann);
    open_board(&mut f);
    let hits = render(&f.app);
    let card = hits.card_rect(task.id).unwrap();

    let to = (card.x + 20, card.y + 10);
    f.app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), card.x + 1, card.y));
    f.app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), to.0, to.1));
    assert!(f.app.is_dragging());

    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|frame| f.app.render(frame)).unwrap();
    let buffer = terminal.backend().buffer();
    assert_eq!(buffer[(to.0 + 1, to.1)].symbol(), "x");
    assert_eq!(buffer[(119, to.1)].symbol(), "x");
}

#[test]
fn keyboard_equivalents_for_pointer_actions() {
    let mut f = fixture();
    let (ann, bob) = (f.ann.clone(), f.bob.clone());
    let task = seed(&f, "Keys", &ann);
    open_board(&mut f);

    f.app.handle_key(char_key('s'));
    f.app.handle_key(char_key('>'));
    f.app.settle(WAIT);
    let row = f.mem.task_rows(f.team.id)[0].clone();
    assert_eq!(row.status, allwork_core::task::Status::Doing);
    assert_eq!(row.assignee_id, Some(bob.id.clone()));

    assert_eq!(f.app.task_board().selected_task().unwrap().id, task.id);
    f.app.handle_key(char_key('x'));
    f.app.settle(WAIT);
    assert!(f.mem.task_rows(f.team.id).is_empty());
}

#[test]
fn search_filters_titles_case_insensitively() {
    let mut f = fixture();
    let (ann, bob) = (f.ann.clone(), f.bob.clone());
    seed(&f, "Write Docs", &ann);
    seed(&f, "Fix login", &ann);
    seed(&f, "docs review", &bob);
    open_board(&mut f);

    f.app.handle_key(char_key('/'));
    type_str(&mut f.app, "DOC");
    let visible: Vec<String> = f
        .app
        .board()
        .unwrap()
        .state()
        .columns()
        .iter()
        .flat_map(|c| c.tasks.iter().map(|t| t.title.clone()))
        .collect();
    assert_eq!(visible, vec!["Write Docs", "docs review"]);

    // Enter keeps the filter, Esc from search clears it.
    f.app.handle_key(key(KeyCode::Enter));
    assert_eq!(f.app.board().unwrap().state().query(), "DOC");
    f.app.handle_key(char_key('/'));
    f.app.handle_key(key(KeyCode::Esc));
    assert_eq!(f.app.board().unwrap().state().query(), "");
    assert_eq!(f.app.board().unwrap().state().columns()[0].tasks.len(), 2);
    assert_eq!(f.mem.task_rows(f.team.id).len(), 3);
}

#[test]
fn task_detail_edit_and_date_validation() {
    let mut f = fixture();
    let ann = f.ann.clone();
    let task = seed(&f, "Write docs", &ann);
    open_board(&mut f);

    f.app.handle_key(key(KeyCode::Enter));
    assert!(matches!(f.app.mode(), Mode::TaskDetail { .. }));
    type_str(&mut f.app, " v2");
    f.app.handle_key(key(KeyCode::Tab));
    type_str(&mut f.app, "outline first");
    f.app.handle_key(key(KeyCode::Tab));
    f.app.handle_key(key(KeyCode::Right));
    f.app.handle_key(key(KeyCode::Tab));
    type_str(&mut f.app, "2026-13-01");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::TaskDetail { .. }));
    assert_eq!(f.app.notice().unwrap().level, Level::Warning);
    assert_eq!(f.mem.count_calls(Op::UpdateTask), 0);

    for _ in 0.."2026-13-01".len() {
        f.app.handle_key(key(KeyCode::Backspace));
    }
    type_str(&mut f.app, "2026-12-01");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::Normal));
    assert_eq!(f.app.notice().unwrap().message, "Task updated");
    let row = f.mem.task_rows(f.team.id)[0].clone();
    assert_eq!(row.id, task.id);
    assert_eq!(row.title, "Write docs v2");
    assert_eq!(row.description, "outline first");
    assert_eq!(row.priority, Priority::High);
    assert_eq!(row.due_date, NaiveDate::from_ymd_opt(2026, 12, 1));
}

#[test]
fn failed_detail_save_keeps_modal_open() {
    let mut f = fixture();
    let ann = f.ann.clone();
    seed(&f, "Sticky", &ann);
    open_board(&mut f);
    f.app.handle_key(key(KeyCode::Enter));
    f.mem.fail_next(Op::UpdateTask, "row level security");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::TaskDetail { .. }));
    assert!(f.app.notice().unwrap().message.contains("row level security"));
}

#[test]
fn realtime_change_refreshes_and_pulses() {
    let mut f = fixture();
    open_board(&mut f);
    let bob = f.bob.clone();
    seed(&f, "From elsewhere", &bob);
    assert!(f.app.board().unwrap().state().tasks().is_empty());

    let now = Instant::now();
    f.app.tick(now);
    let board = f.app.board().unwrap();
    assert_eq!(board.state().tasks().len(), 1);
    assert!(board.is_pulsing(now));
    assert!(!board.is_pulsing(now + Duration::from_secs(2)));
}

#[test]
fn lost_feed_shows_offline() {
    let mut f = fixture();
    open_board(&mut f);
    f.mem.close_subscriptions(f.team.id);
    f.app.tick(Instant::now());

    assert!(!f.app.board().unwrap().is_subscribed());
    let notice = f.app.notice().unwrap();
    assert_eq!(notice.level, Level::Warning);
    assert!(notice.message.contains("Live updates lost"));

    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|frame| f.app.render(frame)).unwrap();
    let buffer = terminal.backend().buffer();
    let title: String = (0..120).map(|x| buffer[(x, 0)].symbol()).collect();
    assert!(title.contains("offline"));
}

#[test]
fn leaving_board_drops_subscription() {
    let mut f = fixture();
    open_board(&mut f);
    assert_eq!(f.mem.subscriber_count(f.team.id), 1);
    f.app.handle_key(key(KeyCode::Esc));
    assert_eq!(f.app.route(), Route::Teams);
    assert_eq!(f.mem.subscriber_count(f.team.id), 0);
}

// -- Team settings and profile --

#[test]
fn invite_unknown_email_makes_no_insert() {
    let mut f = fixture();
    open_board(&mut f);
    f.app.handle_key(char_key('m'));
    f.app.handle_key(char_key('i'));
    type_str(&mut f.app, "ghost@example.com");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::Invite { .. }));
    let notice = f.app.notice().unwrap();
    assert!(notice.is_error());
    assert!(notice.message.contains("not found"));
    assert_eq!(f.mem.count_calls(Op::AddMember), 0);
}

#[test]
fn invite_existing_user_adds_a_column() {
    let mut f = fixture();
    let cat = f.mem.seed_user_named("cat@example.com", "secret1", "Cat", "");
    open_board(&mut f);
    f.app.handle_key(char_key('m'));
    f.app.handle_key(char_key('i'));
    type_str(&mut f.app, "  cat@example.com ");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::TeamSettings { .. }));
    assert_eq!(f.app.notice().unwrap().level, Level::Success);
    assert_eq!(f.app.task_board().column_count(), 3);
    let member = f.app.board().unwrap().state().members()[2].clone();
    assert_eq!(member.user_id, cat.id);
    assert_eq!(member.role, Role::Member);
}

#[test]
fn owners_cannot_be_removed_but_members_can() {
    let mut f = fixture();
    open_board(&mut f);
    f.app.handle_key(char_key('m'));

    f.app.handle_key(char_key('x'));
    assert!(matches!(f.app.mode(), Mode::TeamSettings { .. }));
    assert_eq!(f.app.notice().unwrap().level, Level::Warning);

    f.app.handle_key(char_key('j'));
    f.app.handle_key(char_key('x'));
    assert!(matches!(f.app.mode(), Mode::ConfirmRemoveMember { .. }));
    f.app.handle_key(char_key('y'));

    assert_eq!(f.mem.count_calls(Op::RemoveMember), 1);
    assert_eq!(f.app.task_board().column_count(), 1);
    assert_eq!(f.app.notice().unwrap().message, "Removed Bob Kim from the team");
}

#[test]
fn profile_save_updates_display_name() {
    let mut f = fixture();
    open_board(&mut f);
    f.app.handle_key(char_key('p'));
    match f.app.mode() {
        Mode::Profile { form } => {
            assert_eq!(form.value("Email"), "ann@example.com");
            assert_eq!(form.focused_label(), Some("First name"));
        }
        other => panic!("expected Profile, got {other:?}"),
    }
    type_str(&mut f.app, "e");
    f.app.handle_key(key(KeyCode::Tab));
    f.app.handle_key(key(KeyCode::Tab));
    type_str(&mut f.app, "PM");
    f.app.handle_key(key(KeyCode::Enter));

    assert!(matches!(f.app.mode(), Mode::Normal));
    assert_eq!(f.app.notice().unwrap().message, "Profile saved");
    let me = f.app.board().unwrap().state().members()[0].clone();
    assert_eq!(me.display_name(), "Anne Lee");
    assert_eq!(me.profile.unwrap().position, "PM");
}

#[test]
fn theme_toggle_cycles() {
    let mut f = fixture();
    assert_eq!(f.app.theme(), Theme::System);
    f.app.handle_key(char_key('T'));
    assert_eq!(f.app.theme(), Theme::Light);
    f.app.handle_key(char_key('T'));
    f.app.handle_key(char_key('T'));
    assert_eq!(f.app.theme(), Theme::Pride);
    render(&f.app);
}

#[test]
fn notice_clears_on_next_key() {
    let mut f = fixture();
    f.app.handle_key(char_key('T'));
    assert!(f.app.notice().is_some());
    f.app.handle_key(char_key('j'));
    assert!(f.app.notice().is_none());
}
