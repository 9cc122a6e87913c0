use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};
use std::path::PathBuf;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::components::widgets::centered_rect;

#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    Editing,
    Cancelled,
    Submitted(Vec<PathBuf>),
}

/// Single line input asking for the files to upload
#[derive(Debug, Default, Clone)]
pub struct UploadPrompt {
    input: Input,
}

impl UploadPrompt {
    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> PromptOutcome {
        if key.kind != KeyEventKind::Press {
            return PromptOutcome::Editing;
        }
        match key.code {
            KeyCode::Esc => {
                self.input.reset();
                PromptOutcome::Cancelled
            }
            KeyCode::Enter => {
                let paths = parse_paths(self.input.value());
                self.input.reset();
                if paths.is_empty() {
                    PromptOutcome::Cancelled
                } else {
                    PromptOutcome::Submitted(paths)
                }
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                PromptOutcome::Editing
            }
        }
    }

    pub fn render(&self, frame: &mut Frame, max_file_size: &str) {
        let area = centered_rect(60, 20, frame.area());
        let width = area.width.saturating_sub(3) as usize;
        let scroll = self.input.visual_scroll(width);
        let paragraph = Paragraph::new(self.input.value())
            .scroll((0, scroll as u16))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(" Upload files ")
                    .title_bottom(
                        Line::from(format!(" Enter to upload, Esc to cancel, max {} per file ", max_file_size))
                            .alignment(Alignment::Center),
                    ),
            );
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
        let cursor = self.input.visual_cursor().max(scroll) - scroll;
        frame.set_cursor_position(Position::new(area.x + 1 + cursor as u16, area.y + 1));
    }
}

/// Split the prompt into paths. Whitespace separates paths, `\ ` keeps a space
/// and a leading `~/` expands to the home directory.
pub fn parse_paths(raw: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    paths.push(expand_home(&std::mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(expand_home(&current));
    }
    paths
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
