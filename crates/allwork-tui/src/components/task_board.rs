use allwork_core::board::BoardState;
use allwork_core::task::Task;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::components::drag::HitMap;
use crate::theme::{priority_style, Theme};

const CARD_HEIGHT: u16 = 2;
const CARD_STRIDE: u16 = CARD_HEIGHT + 1;

/// Per-member columns with a cursor. Rebuilt from a [`BoardState`] after
/// every change; the cursor follows the selected task by id.
#[derive(Debug, Default)]
pub struct TaskBoard {
    columns: Vec<BoardColumn>,
    active_column: usize,
}

#[derive(Debug)]
struct BoardColumn {
    user_id: String,
    name: String,
    position: String,
    tasks: Vec<Task>,
    selected: Option<usize>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, state: &BoardState) {
        let selected_id = self.selected_task().map(|t| t.id);
        let active_user = self.active_user().map(String::from);

        self.columns = state
            .columns()
            .into_iter()
            .map(|col| {
                let tasks: Vec<Task> = col.tasks.into_iter().cloned().collect();
                BoardColumn {
                    user_id: col.member.user_id.clone(),
                    name: col.member.display_name().to_string(),
                    position: col
                        .member
                        .profile
                        .as_ref()
                        .map(|p| p.position.clone())
                        .unwrap_or_default(),
                    selected: if tasks.is_empty() { None } else { Some(0) },
                    tasks,
                }
            })
            .collect();

        self.active_column = active_user
            .and_then(|u| self.columns.iter().position(|c| c.user_id == u))
            .unwrap_or(0)
            .min(self.columns.len().saturating_sub(1));
        if let Some(id) = selected_id {
            self.select_task_by_id(id);
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let col = self.columns.get(self.active_column)?;
        col.tasks.get(col.selected?)
    }

    /// The user whose column has the cursor.
    pub fn active_user(&self) -> Option<&str> {
        self.columns
            .get(self.active_column)
            .map(|c| c.user_id.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Move the cursor to the task with the given id. Returns `false` (and
    /// leaves the cursor alone) if no column shows it.
    pub fn select_task_by_id(&mut self, task_id: i64) -> bool {
        for (col_idx, col) in self.columns.iter_mut().enumerate() {
            if let Some(task_idx) = col.tasks.iter().position(|t| t.id == task_id) {
                self.active_column = col_idx;
                col.selected = Some(task_idx);
                return true;
            }
        }
        false
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('h') | KeyCode::Left => {
                if self.active_column > 0 {
                    self.active_column -= 1;
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if self.active_column + 1 < self.columns.len() {
                    self.active_column += 1;
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(col) = self.columns.get_mut(self.active_column) {
                    let current = col.selected.unwrap_or(0);
                    if current + 1 < col.tasks.len() {
                        col.selected = Some(current + 1);
                    }
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(col) = self.columns.get_mut(self.active_column) {
                    let current = col.selected.unwrap_or(0);
                    if current > 0 {
                        col.selected = Some(current - 1);
                    }
                }
            }
            KeyCode::Char('g') => {
                if let Some(col) = self.columns.get_mut(self.active_column) {
                    if !col.tasks.is_empty() {
                        col.selected = Some(0);
                    }
                }
            }
            KeyCode::Char('G') => {
                if let Some(col) = self.columns.get_mut(self.active_column) {
                    if !col.tasks.is_empty() {
                        col.selected = Some(col.tasks.len() - 1);
                    }
                }
            }
            _ => {}
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
        let col_count = self.columns.len() as u16;
        if col_count == 0 {
            let empty = Paragraph::new("No members yet. Invite someone from team settings (m).")
                .style(palette.muted())
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        }

        let constraints: Vec<Constraint> = (0..col_count)
            .map(|_| Constraint::Ratio(1, col_count as u32))
            .collect();

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, (col, chunk)) in self.columns.iter().zip(chunks.iter()).enumerate() {
            hits.add_column(*chunk, &col.user_id);
            self.render_column(frame, col, *chunk, i, theme, dragging, hits);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_column(
        &self,
        frame: &mut Frame,
        col: &BoardColumn,
        area: Rect,
        index: usize,
        theme: Theme,
        dragging: Option<i64>,
        hits: &mut HitMap,
    ) {
        let palette = theme.palette();
        let is_active = index == self.active_column;
        let title = format!(" {} ({}) ", col.name, col.tasks.len());

        let border_style = if is_active {
            Style::default().fg(theme.column_color(index)).bold()
        } else {
            Style::default().fg(theme.column_color(index))
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(palette.base());
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let header = if col.position.is_empty() {
            "-".to_string()
        } else {
            col.position.clone()
        };
        frame.render_widget(
            Paragraph::new(header).style(palette.muted()),
            Rect { height: 1, ..inner },
        );

        let visible = (inner.height.saturating_sub(1) / CARD_STRIDE).max(1) as usize;
        let offset = match col.selected {
            Some(sel) if is_active && sel >= visible => sel + 1 - visible,
            _ => 0,
        };

        for (slot, (idx, task)) in col
            .tasks
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .enumerate()
        {
            let y = inner.y + 1 + slot as u16 * CARD_STRIDE;
            if y + CARD_HEIGHT > inner.y + inner.height {
                break;
            }
            let card = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: CARD_HEIGHT,
            };
            hits.add_card(card, task.id);

            let selected = is_active && col.selected == Some(idx);
            let style = if dragging == Some(task.id) {
                palette.muted().add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
            } else if selected {
                palette.highlight()
            } else if task.is_pending() {
                palette.muted()
            } else {
                palette.base()
            };

            let mut meta = vec![Span::raw(format!("  {}", task.status.display_name()))];
            if let Some(due) = task.due_date {
                meta.push(Span::raw(format!("  due {}", due.format("%Y-%m-%d"))));
            }
            if task.is_pending() {
                meta.push(Span::raw("  saving..."));
            }

            let lines = vec![
                Line::from(vec![
                    Span::styled(
                        format!("{} ", task.priority.symbol()),
                        priority_style(task.priority),
                    ),
                    Span::raw(task.title.clone()),
                ]),
                Line::from(meta).style(palette.muted()),
            ];
            frame.render_widget(Paragraph::new(lines).style(style), card);
        }
    }
}
