//! Pointer drag and drop.
//!
//! A press only turns into a drag once the pointer has moved more than
//! [`DRAG_THRESHOLD`] cells away from where it went down. Anything less is
//! a click. Where a drag ends is resolved against the [`HitMap`] recorded
//! during the last render.

use ratatui::layout::{Position, Rect};

/// Activation distance in terminal cells (Euclidean, strictly greater).
pub const DRAG_THRESHOLD: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    Task(i64),
    Team(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    Click(DragSource),
    Drop {
        source: DragSource,
        column: u16,
        row: u16,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Trash,
    Column(String),
    Outside,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    source: DragSource,
    origin: (u16, u16),
    at: (u16, u16),
    dragging: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DragTracker {
    press: Option<Press>,
}

pub fn exceeds_threshold(origin: (u16, u16), at: (u16, u16)) -> bool {
    let dx = i32::from(at.0) - i32::from(origin.0);
    let dy = i32::from(at.1) - i32::from(origin.1);
    let limit = i32::from(DRAG_THRESHOLD);
    dx * dx + dy * dy > limit * limit
}

impl DragTracker {
    pub fn press(&mut self, source: DragSource, column: u16, row: u16) {
        self.press = Some(Press {
            source,
            origin: (column, row),
            at: (column, row),
            dragging: false,
        });
    }

    /// Track pointer movement. Returns true while a drag is active.
    pub fn motion(&mut self, column: u16, row: u16) -> bool {
        let Some(press) = self.press.as_mut() else {
            return false;
        };
        press.at = (column, row);
        if !press.dragging && exceeds_threshold(press.origin, press.at) {
            press.dragging = true;
        }
        press.dragging
    }

    pub fn release(&mut self, column: u16, row: u16) -> Gesture {
        let Some(mut press) = self.press.take() else {
            return Gesture::None;
        };
        if !press.dragging && exceeds_threshold(press.origin, (column, row)) {
            press.dragging = true;
        }
        if press.dragging {
            Gesture::Drop {
                source: press.source,
                column,
                row,
            }
        } else {
            Gesture::Click(press.source)
        }
    }

    pub fn cancel(&mut self) {
        self.press = None;
    }

    /// The item being dragged and where the pointer is, once past the threshold.
    pub fn active(&self) -> Option<(DragSource, (u16, u16))> {
        self.press
            .filter(|p| p.dragging)
            .map(|p| (p.source, p.at))
    }
}

/// Screen regions from the last frame.
#[derive(Debug, Clone, Default)]
pub struct HitMap {
    cards: Vec<(Rect, i64)>,
    columns: Vec<(Rect, String)>,
    teams: Vec<(Rect, i64)>,
    trash: Option<Rect>,
}

impl HitMap {
    pub fn clear(&mut self) {
        *self = HitMap::default();
    }

    pub fn add_card(&mut self, area: Rect, task_id: i64) {
        self.cards.push((area, task_id));
    }

    pub fn add_column(&mut self, area: Rect, user_id: &str) {
        self.columns.push((area, user_id.to_string()));
    }

    pub fn add_team(&mut self, area: Rect, team_id: i64) {
        self.teams.push((area, team_id));
    }

    pub fn set_trash(&mut self, area: Rect) {
        self.trash = Some(area);
    }

    pub fn card_at(&self, column: u16, row: u16) -> Option<i64> {
        let pos = Position::new(column, row);
        self.cards
            .iter()
            .find(|(area, _)| area.contains(pos))
            .map(|(_, id)| *id)
    }

    pub fn team_at(&self, column: u16, row: u16) -> Option<i64> {
        let pos = Position::new(column, row);
        self.teams
            .iter()
            .find(|(area, _)| area.contains(pos))
            .map(|(_, id)| *id)
    }

    pub fn card_rect(&self, task_id: i64) -> Option<Rect> {
        self.cards
            .iter()
            .find(|(_, id)| *id == task_id)
            .map(|(area, _)| *area)
    }

    pub fn column_rect(&self, user_id: &str) -> Option<Rect> {
        self.columns
            .iter()
            .find(|(_, id)| id == user_id)
            .map(|(area, _)| *area)
    }

    pub fn team_rect(&self, team_id: i64) -> Option<Rect> {
        self.teams
            .iter()
            .find(|(_, id)| *id == team_id)
            .map(|(area, _)| *area)
    }

    pub fn trash_rect(&self) -> Option<Rect> {
        self.trash
    }

    /// Trash wins over anything it overlaps.
    pub fn resolve_drop(&self, column: u16, row: u16) -> DropTarget {
        let pos = Position::new(column, row);
        if self.trash.is_some_and(|area| area.contains(pos)) {
            return DropTarget::Trash;
        }
        match self.columns.iter().find(|(area, _)| area.contains(pos)) {
            Some((_, user_id)) => DropTarget::Column(user_id.clone()),
            None => DropTarget::Outside,
        }
    }
}
