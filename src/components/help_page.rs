use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc::UnboundedSender;
use crate::components::component::{Component, ComponentRender};
use volt_tui::model::action::Action;
use volt_tui::model::state::{ActivePage, State};

const COMMANDS: [(&str, &str); 10] = [
    ("u", "upload files, separate several paths with spaces"),
    ("d", "delete the selected file"),
    ("r", "reload files and storage stats"),
    ("c", "clear upload errors"),
    ("x", "cancel all running uploads"),
    ("↕ / j / k", "move up/down on the lists"),
    ("Esc", "move back to the dashboard"),
    ("?", "this help page"),
    ("q", "quit the application"),
    ("volt-tui --help", "login, logout and headless uploads"),
];

pub struct HelpPage {
    pub action_tx: UnboundedSender<Action>,
    list_state: ListState,
}

impl HelpPage {
    pub fn navigate(&mut self, up: bool) {
        let i = match self.list_state.selected() {
            Some(i) if up => i.saturating_sub(1),
            Some(i) => i.saturating_add(1).min(COMMANDS.len().saturating_sub(1)),
            None => 0,
        };
        self.list_state.select(Some(i));
    }
}

impl Component for HelpPage {
    fn new(_state: &State, action_tx: UnboundedSender<Action>) -> Self
    where
        Self: Sized,
    {
        HelpPage {
            action_tx,
            list_state: ListState::default(),
        }
    }

    fn move_with_state(self, _state: &State) -> Self
    where
        Self: Sized,
    {
        self
    }

    fn name(&self) -> &str {
        "Help Page"
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.navigate(false),
            KeyCode::Char('k') | KeyCode::Up => self.navigate(true),
            KeyCode::Char('q') => {
                let _ = self.action_tx.send(Action::Exit);
            }
            KeyCode::Esc | KeyCode::Char('?') => {
                let _ = self.action_tx.send(Action::Navigate {
                    page: ActivePage::Dashboard,
                });
            }
            _ => {}
        }
    }
}

impl ComponentRender<()> for HelpPage {
    fn render(&self, frame: &mut Frame, _props: ()) {
        let items: Vec<ListItem> = COMMANDS
            .iter()
            .map(|(cmd, desc)| {
                ListItem::new(Line::from(vec![
                    Span::raw(*cmd),
                    Span::raw("  -  "),
                    Span::styled(*desc, Style::new().green().italic()),
                    ".".into(),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Commands"))
            .highlight_style(Style::default().add_modifier(Modifier::BOLD))
            .highlight_symbol(">> ");

        frame.render_stateful_widget(list, frame.area(), &mut self.list_state.clone());
    }
}
