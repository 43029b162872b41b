use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::theme::Palette;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldKind {
    Text { masked: bool },
    Choice(Vec<String>),
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
    kind: FieldKind,
}

impl Field {
    fn editable(&self) -> bool {
        self.kind != FieldKind::ReadOnly
    }

    fn display_value(&self) -> String {
        match self.kind {
            FieldKind::Text { masked: true } => "*".repeat(self.value.chars().count()),
            FieldKind::Choice(_) => format!("< {} >", self.value),
            _ => self.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

/// A modal of labelled fields. Tab/Down and BackTab/Up move focus, Left and
/// Right cycle choices, Enter submits and Esc cancels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub title: String,
    fields: Vec<Field>,
    focus: usize,
}

impl Form {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            focus: 0,
        }
    }

    pub fn text(mut self, label: &str, value: &str) -> Self {
        self.push(label, value, FieldKind::Text { masked: false });
        self
    }

    pub fn secret(mut self, label: &str, value: &str) -> Self {
        self.push(label, value, FieldKind::Text { masked: true });
        self
    }

    pub fn choice(mut self, label: &str, options: &[&str], value: &str) -> Self {
        let options = options.iter().map(|o| o.to_string()).collect();
        self.push(label, value, FieldKind::Choice(options));
        self
    }

    pub fn read_only(mut self, label: &str, value: &str) -> Self {
        self.push(label, value, FieldKind::ReadOnly);
        self
    }

    fn push(&mut self, label: &str, value: &str, kind: FieldKind) {
        self.fields.push(Field {
            label: label.to_string(),
            value: value.to_string(),
            kind,
        });
        if !self.fields[self.focus].editable() {
            self.focus = self.fields.len() - 1;
        }
    }

    pub fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, label: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.label == label) {
            field.value = value.to_string();
        }
    }

    pub fn focused_label(&self) -> Option<&str> {
        self.fields.get(self.focus).map(|f| f.label.as_str())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit,
            KeyCode::Tab | KeyCode::Down => self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(-1),
            KeyCode::Left => self.cycle_choice(-1),
            KeyCode::Right => self.cycle_choice(1),
            KeyCode::Backspace => {
                if let Some(field) = self.fields.get_mut(self.focus) {
                    if matches!(field.kind, FieldKind::Text { .. }) {
                        field.value.pop();
                    }
                }
            }
            KeyCode::Char(c) => match self.fields.get(self.focus).map(|f| &f.kind) {
                Some(FieldKind::Text { .. }) => self.fields[self.focus].value.push(c),
                Some(FieldKind::Choice(_)) if c == ' ' => self.cycle_choice(1),
                _ => {}
            },
            _ => {}
        }
        FormAction::None
    }

    fn move_focus(&mut self, step: isize) {
        let len = self.fields.len() as isize;
        if len == 0 {
            return;
        }
        let mut idx = self.focus as isize;
        for _ in 0..len {
            idx = (idx + step).rem_euclid(len);
            if self.fields[idx as usize].editable() {
                self.focus = idx as usize;
                return;
            }
        }
    }

    fn cycle_choice(&mut self, step: isize) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        let FieldKind::Choice(ref options) = field.kind else {
            return;
        };
        if options.is_empty() {
            return;
        }
        let current = options.iter().position(|o| *o == field.value).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(options.len() as isize) as usize;
        field.value = options[next].clone();
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette, footer: &[Line]) {
        frame.render_widget(Clear, area);
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .style(palette.base());

        let label_width = self
            .fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0);

        let mut lines: Vec<Line> = Vec::new();
        for (i, field) in self.fields.iter().enumerate() {
            let focused = i == self.focus;
            let marker = if focused { "> " } else { "  " };
            let value_style = if focused {
                palette.highlight()
            } else if field.editable() {
                Style::default().fg(palette.fg)
            } else {
                palette.muted()
            };
            let cursor = if focused && matches!(field.kind, FieldKind::Text { .. }) {
                "_"
            } else {
                ""
            };
            lines.push(Line::from(vec![
                Span::raw(marker),
                Span::styled(
                    format!("{:<width$}  ", field.label, width = label_width),
                    Style::default().fg(palette.accent).bold(),
                ),
                Span::styled(format!("{}{cursor}", field.display_value()), value_style),
            ]));
        }
        if !footer.is_empty() {
            lines.push(Line::from(""));
            lines.extend(footer.iter().cloned());
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }
}
