use allwork_core::team::{ensure_deletable, CreateTeam, Team};
use allwork_service::{BlockingService, ServiceError};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::{info, warn};

use crate::components::drag::HitMap;
use crate::notice::Notice;
use crate::theme::Theme;

/// The signed-in user's teams, ordered by id.
#[derive(Debug, Default)]
pub struct TeamList {
    teams: Vec<Team>,
    list_state: ListState,
}

impl TeamList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, svc: &BlockingService) -> Result<(), ServiceError> {
        let selected_id = self.selected().map(|t| t.id);
        self.teams = svc.list_teams()?;
        let idx = selected_id
            .and_then(|id| self.teams.iter().position(|t| t.id == id))
            .or(if self.teams.is_empty() { None } else { Some(0) });
        self.list_state.select(idx);
        Ok(())
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn get(&self, id: i64) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn selected(&self) -> Option<&Team> {
        self.teams.get(self.list_state.selected()?)
    }

    pub fn select_next(&mut self) {
        let i = self.list_state.selected().unwrap_or(0);
        if i + 1 < self.teams.len() {
            self.list_state.select(Some(i + 1));
        }
    }

    pub fn select_prev(&mut self) {
        let i = self.list_state.selected().unwrap_or(0);
        if i > 0 {
            self.list_state.select(Some(i - 1));
        }
    }

    /// Create a team from `input`. The input is only cleared on success.
    pub fn create(&mut self, svc: &BlockingService, input: &mut String) -> Notice {
        let create = match CreateTeam::from_input(input) {
            Ok(c) => c,
            Err(e) => return Notice::warning(e.to_string()),
        };
        match svc.create_team(&create) {
            Ok(team) => {
                info!("created team {} ({})", team.name, team.id);
                input.clear();
                if let Err(e) = self.load(svc) {
                    warn!("team list reload failed: {e}");
                }
                if let Some(idx) = self.teams.iter().position(|t| t.id == team.id) {
                    self.list_state.select(Some(idx));
                }
                Notice::success(format!("Created team: {}", team.name))
            }
            Err(e) => Notice::error(format!("Could not create team: {}", e.message())),
        }
    }

    /// Delete `team` once it owns no tasks. The count is checked first and
    /// a non-empty team is never sent a delete.
    pub fn delete(&mut self, svc: &BlockingService, team: &Team) -> Notice {
        let count = match svc.count_team_tasks(team.id) {
            Ok(n) => n,
            Err(e) => return Notice::error(format!("Could not delete team: {}", e.message())),
        };
        if let Err(e) = ensure_deletable(team, count) {
            return Notice::error(e.to_string());
        }
        match svc.delete_team(team.id) {
            Ok(()) => {
                info!("deleted team {}", team.id);
                if let Err(e) = self.load(svc) {
                    warn!("team list reload failed: {e}");
                }
                Notice::success(format!("Deleted team: {}", team.name))
            }
            Err(e) => Notice::error(format!("Could not delete team: {}", e.message())),
        }
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        theme: Theme,
        dragging: Option<i64>,
        hits: &mut HitMap,
    ) {
        let palette = theme.palette();
        let block = Block::default()
            .title(" Teams ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .style(palette.base());

        if self.teams.is_empty() {
            let empty = Paragraph::new("No teams yet. Press n to create one.")
                .style(palette.muted())
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let inner = block.inner(area);
        let items: Vec<ListItem> = self
            .teams
            .iter()
            .map(|t| {
                let style = if dragging == Some(t.id) {
                    palette.muted().add_modifier(Modifier::DIM)
                } else {
                    Style::default().bold()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(t.name.clone(), style),
                    Span::styled(format!("  #{}", t.id), palette.muted()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = self.list_state.clone();
        frame.render_stateful_widget(list, area, &mut state);

        let offset = state.offset();
        for (row, team) in self.teams.iter().enumerate().skip(offset) {
            let y = inner.y + (row - offset) as u16;
            if y >= inner.y + inner.height {
                break;
            }
            hits.add_team(
                Rect {
                    x: inner.x,
                    y,
                    width: inner.width,
                    height: 1,
                },
                team.id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use allwork_core::member::Role;
    use allwork_service::{MemoryService, Op};

    fn setup() -> (Arc<MemoryService>, BlockingService) {
        let mem = Arc::new(MemoryService::new());
        mem.seed_user("ann@example.com", "secret1");
        let svc = BlockingService::new(mem.clone()).unwrap();
        svc.sign_in("ann@example.com", "secret1").unwrap();
        (mem, svc)
    }

    #[test]
    fn create_clears_input_only_on_success() {
        let (mem, svc) = setup();
        let mut list = TeamList::new();

        let mut input = "   ".to_string();
        let notice = list.create(&svc, &mut input);
        assert_eq!(notice.level, crate::notice::Level::Warning);
        assert_eq!(input, "   ");
        assert_eq!(mem.count_calls(Op::CreateTeam), 0);

        mem.fail_next(Op::CreateTeam, "permission denied");
        let mut input = "Ops".to_string();
        let notice = list.create(&svc, &mut input);
        assert!(notice.is_error());
        assert!(notice.message.contains("permission denied"));
        assert_eq!(input, "Ops");

        let notice = list.create(&svc, &mut input);
        assert!(!notice.is_error());
        assert!(input.is_empty());
        assert_eq!(list.selected().unwrap().name, "Ops");
    }

    #[test]
    fn delete_refuses_team_with_tasks() {
        let (mem, svc) = setup();
        let user = svc.current_user().unwrap();
        let busy = mem.seed_team("Busy");
        mem.seed_member(busy.id, &user.id, Role::Owner).unwrap();
        mem.seed_task(busy.id, "one", &user.id).unwrap();
        mem.seed_task(busy.id, "two", &user.id).unwrap();
        let mut list = TeamList::new();
        list.load(&svc).unwrap();

        let notice = list.delete(&svc, &busy);
        assert!(notice.is_error());
        assert!(notice.message.contains('2'));
        assert_eq!(mem.count_calls(Op::DeleteTeam), 0);
        assert_eq!(list.teams().len(), 1);
    }

    #[test]
    fn delete_empty_team() {
        let (mem, svc) = setup();
        let empty = mem.seed_team("Empty");
        let mut list = TeamList::new();
        list.load(&svc).unwrap();

        let notice = list.delete(&svc, &empty);
        assert!(!notice.is_error());
        assert_eq!(mem.count_calls(Op::DeleteTeam), 1);
        assert!(list.teams().is_empty());
        assert!(list.selected().is_none());
    }

    #[test]
    fn selection_stays_in_bounds() {
        let (mem, svc) = setup();
        mem.seed_team("A");
        mem.seed_team("B");
        let mut list = TeamList::new();
        list.load(&svc).unwrap();
        list.select_prev();
        assert_eq!(list.selected().unwrap().name, "A");
        list.select_next();
        list.select_next();
        assert_eq!(list.selected().unwrap().name, "B");
    }
}
