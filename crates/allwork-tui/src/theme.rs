use allwork_core::task::Priority;
use ratatui::style::{Color, Modifier, Style};

use crate::notice::Level;

/// Cosmetic only. Nothing else reads the theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    Pride,
    #[default]
    System,
}

const RAINBOW: [Color; 6] = [
    Color::Red,
    Color::LightRed,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Magenta,
];

impl Theme {
    pub fn next(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Pride,
            Theme::Pride => Theme::System,
            Theme::System => Theme::Light,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Pride => "pride",
            Theme::System => "system",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
                muted: Color::Gray,
                selection: Color::LightBlue,
            },
            Theme::Dark => Palette {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                selection: Color::Cyan,
            },
            Theme::Pride => Palette {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Magenta,
                muted: Color::DarkGray,
                selection: Color::LightMagenta,
            },
            Theme::System => Palette {
                fg: Color::Reset,
                bg: Color::Reset,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                selection: Color::Cyan,
            },
        }
    }

    /// Border colour for the `index`th column. Pride paints each column a
    /// different colour; every other theme uses the accent.
    pub fn column_color(&self, index: usize) -> Color {
        match self {
            Theme::Pride => RAINBOW[index % RAINBOW.len()],
            _ => self.palette().accent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub fg: Color,
    pub bg: Color,
    pub accent: Color,
    pub muted: Color,
    pub selection: Color,
}

impl Palette {
    pub fn base(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.selection)
            .add_modifier(Modifier::BOLD)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }
}

pub fn priority_style(p: Priority) -> Style {
    match p {
        Priority::High => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

pub fn notice_style(level: Level) -> Style {
    match level {
        Level::Success => Style::default().fg(Color::Green),
        Level::Info => Style::default().fg(Color::Cyan),
        Level::Warning => Style::default().fg(Color::Yellow),
        Level::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}
