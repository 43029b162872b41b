//! Optimistic writes and realtime reconciliation on a single board.
//!
//! These drive `Board` directly against the in-memory backend. One-shot
//! failures are injected with `fail_next`, and refetches are counted through
//! the recorded `ListTasks` calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use allwork_core::member::Role;
use allwork_core::session::AuthUser;
use allwork_core::task::Status;
use allwork_core::team::Team;
use allwork_service::{BlockingService, MemoryService, Op};
use allwork_tui::board::Board;
use allwork_tui::notice::Level;

const WAIT: Duration = Duration::from_secs(5);

struct Setup {
    mem: Arc<MemoryService>,
    svc: BlockingService,
    ann: AuthUser,
    team: Team,
}

fn setup() -> Setup {
    let mem = Arc::new(MemoryService::new());
    let ann = mem.seed_user_named("ann@example.com", "secret1", "Ann", "Lee");
    let team = mem.seed_team("Core");
    mem.seed_member(team.id, &ann.id, Role::Owner).unwrap();
    let svc = BlockingService::new(mem.clone()).unwrap();
    svc.sign_in("ann@example.com", "secret1").unwrap();
    Setup {
        mem,
        svc,
        ann,
        team,
    }
}

fn titles(board: &Board) -> Vec<String> {
    board.state().tasks().iter().map(|t| t.title.clone()).collect()
}

#[test]
fn failed_add_restores_list_and_clears_input() {
    let s = setup();
    s.mem.seed_task(s.team.id, "Existing", &s.ann.id).unwrap();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    let before = titles(&board);

    s.mem.fail_next(Op::CreateTask, "new row violates row-level security policy");
    let mut input = "Doomed".to_string();
    board.add_task(&s.svc, &mut input);
    assert!(input.is_empty());
    assert_eq!(titles(&board), vec!["Doomed", "Existing"]);

    board.settle(&s.svc, WAIT).unwrap();
    assert_eq!(titles(&board), before);
    assert!(input.is_empty());

    let notices = board.take_notices();
    let error = notices.iter().find(|n| n.is_error()).unwrap();
    assert_eq!(
        error.message,
        "Could not add task: new row violates row-level security policy"
    );
    assert_eq!(s.mem.task_rows(s.team.id).len(), 1);
}

#[test]
fn add_creates_missing_profile_first() {
    let s = setup();
    let newbie = s.mem.seed_account("new@example.com", "secret1");
    s.svc.sign_in("new@example.com", "secret1").unwrap();
    let mut board = Board::open(&s.svc, s.team.id, &newbie).unwrap();
    s.mem.clear_calls();

    let mut input = "First task".to_string();
    board.add_task(&s.svc, &mut input);
    board.settle(&s.svc, WAIT).unwrap();

    let calls = s.mem.calls();
    let upsert = calls.iter().position(|op| *op == Op::UpsertProfile).unwrap();
    let create = calls.iter().position(|op| *op == Op::CreateTask).unwrap();
    assert!(upsert < create);
    assert_eq!(s.mem.task_rows(s.team.id)[0].assignee_id, Some(newbie.id));
}

#[test]
fn failed_delete_is_rolled_back_by_refetch() {
    let s = setup();
    let task = s.mem.seed_task(s.team.id, "Keep me", &s.ann.id).unwrap();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();

    s.mem.fail_next(Op::DeleteTask, "permission denied for table tasks");
    board.delete_task(&s.svc, task.id);
    assert!(board.state().task(task.id).is_none());

    s.mem.clear_calls();
    board.settle(&s.svc, WAIT).unwrap();
    assert!(board.state().task(task.id).is_some());
    assert_eq!(s.mem.count_calls(Op::ListTasks), 1);

    let notices = board.take_notices();
    assert!(notices
        .iter()
        .any(|n| n.is_error() && n.message.contains("permission denied")));
}

#[test]
fn pending_placeholder_refuses_actions() {
    let s = setup();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    let mut input = "In flight".to_string();
    board.add_task(&s.svc, &mut input);
    let temp_id = board.state().tasks()[0].id;
    assert!(temp_id < 0);
    board.take_notices();

    board.delete_task(&s.svc, temp_id);
    board.change_status(&s.svc, temp_id, Status::Done);
    let notices = board.take_notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == Level::Info));
    assert!(board.state().task(temp_id).is_some());

    board.settle(&s.svc, WAIT).unwrap();
    assert_eq!(s.mem.count_calls(Op::DeleteTask), 0);
    assert_eq!(s.mem.count_calls(Op::UpdateTask), 0);
}

#[test]
fn one_realtime_event_triggers_one_refetch() {
    let s = setup();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    s.mem.clear_calls();

    s.mem.seed_task(s.team.id, "Remote", &s.ann.id).unwrap();
    let t0 = Instant::now();
    board.poll(&s.svc, t0).unwrap();

    assert_eq!(s.mem.count_calls(Op::ListTasks), 1);
    assert_eq!(s.mem.count_calls(Op::GetTeam), 1);
    assert_eq!(s.mem.count_calls(Op::ListMembers), 1);
    assert_eq!(titles(&board), vec!["Remote"]);
    assert!(board.is_pulsing(t0));

    // Nothing new: no refetch, and the pulse runs out after two seconds.
    let later = t0 + Duration::from_secs(2);
    board.poll(&s.svc, later).unwrap();
    assert_eq!(s.mem.count_calls(Op::ListTasks), 1);
    assert!(!board.is_pulsing(later));
}

#[test]
fn burst_of_events_is_not_deduplicated() {
    let s = setup();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    s.mem.clear_calls();

    s.mem.seed_task(s.team.id, "a", &s.ann.id).unwrap();
    s.mem.seed_task(s.team.id, "b", &s.ann.id).unwrap();
    s.mem.seed_task(s.team.id, "c", &s.ann.id).unwrap();
    board.poll(&s.svc, Instant::now()).unwrap();

    assert_eq!(s.mem.count_calls(Op::ListTasks), 3);
    assert_eq!(titles(&board), vec!["c", "b", "a"]);
}

#[test]
fn events_for_other_teams_are_ignored() {
    let s = setup();
    let other = s.mem.seed_team("Other");
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    s.mem.clear_calls();

    s.mem.seed_task(other.id, "Not ours", &s.ann.id).unwrap();
    let now = Instant::now();
    board.poll(&s.svc, now).unwrap();
    assert_eq!(s.mem.count_calls(Op::ListTasks), 0);
    assert!(!board.is_pulsing(now));
}

#[test]
fn team_deleted_underneath_reports_not_found() {
    let s = setup();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    s.svc.delete_team(s.team.id).unwrap();
    let err = board.refetch(&s.svc).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn empty_team_self_heals_with_one_owner() {
    let s = setup();
    let empty = s.mem.seed_team("Fresh");
    s.mem.clear_calls();

    let board = Board::open(&s.svc, empty.id, &s.ann).unwrap();
    assert_eq!(s.mem.count_calls(Op::AddMember), 1);
    let members = board.state().members();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, s.ann.id);
    assert_eq!(members[0].role, Role::Owner);
    assert_eq!(board.state().columns().len(), 1);
    drop(board);

    // A second open finds the membership and adds nothing.
    Board::open(&s.svc, empty.id, &s.ann).unwrap();
    assert_eq!(s.mem.count_calls(Op::AddMember), 1);
}

#[test]
fn subscription_failure_leaves_board_usable() {
    let s = setup();
    s.mem.fail_next(Op::SubscribeTasks, "websocket refused");
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    assert!(!board.is_subscribed());
    let notices = board.take_notices();
    assert_eq!(notices[0].level, Level::Warning);
    assert!(notices[0].message.contains("websocket refused"));
    board.poll(&s.svc, Instant::now()).unwrap();
}

#[test]
fn dropping_board_ends_subscription() {
    let s = setup();
    let board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    assert_eq!(s.mem.subscriber_count(s.team.id), 1);
    drop(board);
    assert_eq!(s.mem.subscriber_count(s.team.id), 0);
}

#[test]
fn ended_feed_drops_subscription_and_warns() {
    let s = setup();
    let mut board = Board::open(&s.svc, s.team.id, &s.ann).unwrap();
    assert!(board.is_subscribed());
    board.take_notices();

    s.mem.seed_task(s.team.id, "Last one", &s.ann.id).unwrap();
    s.mem.close_subscriptions(s.team.id);
    s.mem.clear_calls();
    board.poll(&s.svc, Instant::now()).unwrap();

    // The queued event still lands before the feed is given up.
    assert_eq!(s.mem.count_calls(Op::ListTasks), 1);
    assert_eq!(titles(&board), vec!["Last one"]);
    assert!(!board.is_subscribed());
    let notices = board.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, Level::Warning);
    assert!(notices[0].message.starts_with("Live updates lost"));

    // Only reported once.
    board.poll(&s.svc, Instant::now()).unwrap();
    assert!(board.take_notices().is_empty());
}
