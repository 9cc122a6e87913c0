use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::components::widgets::centered_rect;

/// Quit dialog, warns when uploads would be cancelled
pub struct QuitConfirmation;

impl QuitConfirmation {
    /// Size of the confirmation dialog (width%, height%)
    const DIALOG_SIZE: (u16, u16) = (40, 20);

    /// `Some(true)` to quit, `Some(false)` to stay, `None` when the key means nothing here
    pub fn handle_key_event(key: KeyEvent) -> Option<bool> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Enter | KeyCode::Char('y') => Some(true),
            KeyCode::Esc | KeyCode::Char('n') => Some(false),
            _ => None,
        }
    }

    pub fn message(active_uploads: usize) -> String {
        match active_uploads {
            0 => "Are you sure you want to quit?".to_string(),
            1 => "1 upload is still running and will be cancelled. Quit anyway?".to_string(),
            n => format!("{} uploads are still running and will be cancelled. Quit anyway?", n),
        }
    }

    pub fn render(frame: &mut Frame, active_uploads: usize) {
        let area = centered_rect(Self::DIALOG_SIZE.0, Self::DIALOG_SIZE.1, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(Self::make_dialog(active_uploads), area);
    }

    fn make_dialog(active_uploads: usize) -> Paragraph<'static> {
        Paragraph::new(Self::message(active_uploads))
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Confirm Quit ")
                    .title_bottom(
                        Line::from(vec![
                            Span::raw(" Press "),
                            Span::styled("Enter/y", Style::default().fg(Color::Green).bold()),
                            Span::raw(" to quit, "),
                            Span::styled("Esc/n", Style::default().fg(Color::Red).bold()),
                            Span::raw(" to cancel "),
                        ])
                        .alignment(Alignment::Center),
                    ),
            )
            .alignment(Alignment::Center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_keys() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(QuitConfirmation::handle_key_event(key(KeyCode::Char('y'))), Some(true));
        assert_eq!(QuitConfirmation::handle_key_event(key(KeyCode::Esc)), Some(false));
        assert_eq!(QuitConfirmation::handle_key_event(key(KeyCode::Char('u'))), None);
    }

    #[test]
    fn test_message_mentions_running_uploads() {
        assert_eq!(QuitConfirmation::message(0), "Are you sure you want to quit?");
        assert!(QuitConfirmation::message(3).starts_with("3 uploads"));
    }
}
