use std::cell::RefCell;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{prelude::*, widgets::*};
use throbber_widgets_tui::{Throbber, ThrobberState};
use tokio::sync::mpsc::UnboundedSender;

use crate::components::component::{Component, ComponentRender};
use crate::components::widgets::quit_confirmation::QuitConfirmation;
use crate::components::widgets::upload_prompt::{PromptOutcome, UploadPrompt};
use volt_tui::model::action::Action;
use volt_tui::model::error::FormErrors;
use volt_tui::model::file_record::{format_size, FileRecord, StorageStats};
use volt_tui::model::state::{ActivePage, State};
use volt_tui::model::upload_progress_item::UploadProgressItem;

const FOCUS_COLOR: Color = Color::Rgb(98, 114, 164);

#[derive(Clone)]
struct Props {
    user_label: String,
    files: Vec<FileRecord>,
    stats: StorageStats,
    loading: bool,
    deleting: Vec<u64>,
    errors: FormErrors,
    uploads: Vec<UploadProgressItem>,
    upload_errors: Vec<(String, String)>,
    upload_general_error: Option<String>,
    active_uploads: usize,
    upload_blocked: Option<String>,
    max_file_size: String,
}

impl From<&State> for Props {
    fn from(state: &State) -> Self {
        let user_label = state
            .user
            .as_ref()
            .map(|u| format!("{} <{}>", u.username, u.email))
            .unwrap_or_else(|| "not logged in".to_string());
        Props {
            user_label,
            files: state.files.clone(),
            stats: state.stats.clone(),
            loading: state.loading,
            deleting: state.deleting.clone(),
            errors: state.dashboard_errors.clone(),
            uploads: state.uploads.clone(),
            upload_errors: state.upload_errors.clone(),
            upload_general_error: state.upload_general_error.clone(),
            active_uploads: state.active_uploads,
            upload_blocked: state.upload_blocked.clone(),
            max_file_size: format_size(state.max_file_size as i64),
        }
    }
}

/// Main page: storage overview, file table, upload progress and errors
pub struct DashboardPage {
    pub action_tx: UnboundedSender<Action>,
    props: Props,
    table_state: TableState,
    prompt: Option<UploadPrompt>,
    show_quit_confirmation: bool,
    throbber_state: RefCell<ThrobberState>,
}

impl DashboardPage {
    fn selected_file(&self) -> Option<&FileRecord> {
        self.table_state
            .selected()
            .and_then(|i| self.props.files.get(i))
    }

    fn navigate(&mut self, up: bool) {
        if self.props.files.is_empty() {
            self.table_state.select(None);
            return;
        }
        let last = self.props.files.len() - 1;
        let i = match self.table_state.selected() {
            Some(i) if up => i.saturating_sub(1),
            Some(i) => (i + 1).min(last),
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    fn send(&self, action: Action) {
        let _ = self.action_tx.send(action);
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match prompt.handle_key_event(key) {
            PromptOutcome::Editing => {}
            PromptOutcome::Cancelled => self.prompt = None,
            PromptOutcome::Submitted(paths) => {
                self.prompt = None;
                self.send(Action::Upload { paths });
            }
        }
    }

    fn stats_paragraph(&self) -> Paragraph<'_> {
        let stats = &self.props.stats;
        let line = Line::from(vec![
            Span::styled("Files ", Style::default().fg(FOCUS_COLOR)),
            Span::raw(stats.total_files.to_string()),
            Span::styled("  Storage used ", Style::default().fg(FOCUS_COLOR)),
            Span::raw(stats.storage_used()),
            Span::styled("  Duplicates ", Style::default().fg(FOCUS_COLOR)),
            Span::raw(stats.duplicates().to_string()),
            Span::styled("  Saved ", Style::default().fg(FOCUS_COLOR)),
            Span::raw(format!(
                "{} ({:.1}%)",
                format_size(stats.saved_bytes),
                stats.savings_percentage
            )),
        ]);
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Volt | {} ", self.props.user_label)),
        )
    }

    fn files_table(&self) -> Table<'_> {
        let header = Row::new(vec!["Name", "Size", "Type", "Uploaded", "Flags"])
            .fg(FOCUS_COLOR)
            .bold()
            .underlined()
            .height(1);
        let rows = self.props.files.iter().map(|file| {
            let mut columns = file.to_columns();
            if self.props.deleting.contains(&file.id) {
                columns[4] = "deleting...".to_string();
                Row::new(columns).style(Style::default().fg(Color::DarkGray))
            } else {
                Row::new(columns)
            }
        });
        let widths = [
            Constraint::Percentage(35),
            Constraint::Percentage(12),
            Constraint::Percentage(18),
            Constraint::Percentage(20),
            Constraint::Percentage(15),
        ];
        Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Your files ({}) ", self.props.files.len())),
            )
            .row_highlight_style(
                Style::default()
                    .fg(FOCUS_COLOR)
                    .bg(Color::White)
                    .add_modifier(Modifier::REVERSED),
            )
    }

    fn error_lines(&self) -> Vec<Line<'_>> {
        let red = Style::default().fg(Color::Red);
        let mut lines = Vec::new();
        if let Some(msg) = self.props.errors.general_message() {
            lines.push(Line::styled(msg.to_string(), red));
        }
        for (field, msg) in self.props.errors.fields() {
            lines.push(Line::styled(format!("{}: {}", field, msg), red));
        }
        if let Some(msg) = &self.props.upload_general_error {
            lines.push(Line::styled(msg.clone(), red));
        }
        if let Some(msg) = &self.props.upload_blocked {
            lines.push(Line::styled(msg.clone(), red));
        }
        for (file, msg) in &self.props.upload_errors {
            lines.push(Line::from(vec![
                Span::styled(file.clone(), red.bold()),
                Span::styled(format!(": {}", msg), red),
            ]));
        }
        lines
    }

    fn render_uploads(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(format!(
            " Upload progress ({} running) ",
            self.props.active_uploads
        ));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let rows = Layout::vertical(
            self.props
                .uploads
                .iter()
                .map(|_| Constraint::Length(1))
                .collect::<Vec<_>>(),
        )
        .split(inner);
        for (item, row) in self.props.uploads.iter().zip(rows.iter()) {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Blue).bg(Color::Black))
                .ratio(item.ratio())
                .label(item.label());
            frame.render_widget(gauge, *row);
        }
    }

    fn render_help_line(&self, frame: &mut Frame, area: Rect) {
        let key = Style::default().fg(Color::Yellow).bold();
        let hints = Line::from(vec![
            Span::styled("u", key),
            Span::raw(" upload  "),
            Span::styled("d", key),
            Span::raw(" delete  "),
            Span::styled("r", key),
            Span::raw(" refresh  "),
            Span::styled("c", key),
            Span::raw(" clear errors  "),
            Span::styled("x", key),
            Span::raw(" cancel uploads  "),
            Span::styled("?", key),
            Span::raw(" help  "),
            Span::styled("q", key),
            Span::raw(" quit"),
        ]);
        frame.render_widget(Paragraph::new(hints), area);
    }
}

impl Component for DashboardPage {
    fn new(state: &State, action_tx: UnboundedSender<Action>) -> Self
    where
        Self: Sized,
    {
        DashboardPage {
            action_tx,
            props: Props::from(state),
            table_state: TableState::default(),
            prompt: None,
            show_quit_confirmation: false,
            throbber_state: RefCell::new(ThrobberState::default()),
        }
        .move_with_state(state)
    }

    fn move_with_state(self, state: &State) -> Self
    where
        Self: Sized,
    {
        let props = Props::from(state);
        let mut table_state = self.table_state;
        // keep the selection inside the (possibly shorter) list
        match table_state.selected() {
            Some(_) if props.files.is_empty() => table_state.select(None),
            Some(i) if i >= props.files.len() => table_state.select(Some(props.files.len() - 1)),
            None if !props.files.is_empty() => table_state.select(Some(0)),
            _ => {}
        }
        DashboardPage {
            props,
            table_state,
            ..self
        }
    }

    fn name(&self) -> &str {
        "Dashboard"
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }
        if self.show_quit_confirmation {
            match QuitConfirmation::handle_key_event(key) {
                Some(true) => self.send(Action::Exit),
                Some(false) => self.show_quit_confirmation = false,
                None => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.navigate(false),
            KeyCode::Char('k') | KeyCode::Up => self.navigate(true),
            KeyCode::Char('u') => {
                if self.props.upload_blocked.is_none() {
                    self.prompt = Some(UploadPrompt::default());
                }
            }
            KeyCode::Char('d') => {
                if let Some(file) = self.selected_file() {
                    if !self.props.deleting.contains(&file.id) {
                        self.send(Action::DeleteFile { id: file.id });
                    }
                }
            }
            KeyCode::Char('r') => self.send(Action::Refresh),
            KeyCode::Char('c') => self.send(Action::ClearUploadErrors),
            KeyCode::Char('x') => self.send(Action::CancelAllUploads),
            KeyCode::Char('?') => self.send(Action::Navigate {
                page: ActivePage::Help,
            }),
            KeyCode::Char('q') => self.show_quit_confirmation = true,
            _ => {}
        }
    }
}

impl ComponentRender<()> for DashboardPage {
    fn render(&self, frame: &mut Frame, _props: ()) {
        let errors = self.error_lines();
        let uploads_height = if self.props.uploads.is_empty() {
            0
        } else {
            self.props.uploads.len().min(8) as u16 + 2
        };
        let errors_height = if errors.is_empty() {
            0
        } else {
            errors.len().min(6) as u16 + 2
        };
        let [stats_area, table_area, uploads_area, errors_area, help_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(uploads_height),
            Constraint::Length(errors_height),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(self.stats_paragraph(), stats_area);

        if self.props.loading && self.props.files.is_empty() {
            let mut throbber_state = self.throbber_state.borrow_mut();
            throbber_state.calc_next();
            let block = Block::default().borders(Borders::ALL).title(" Your files ");
            let inner = block.inner(table_area);
            frame.render_widget(block, table_area);
            let throbber = Throbber::default()
                .label("Loading files...")
                .style(Style::default().fg(FOCUS_COLOR));
            frame.render_stateful_widget(throbber, inner, &mut throbber_state);
        } else if self.props.files.is_empty() {
            let empty = Paragraph::new("No files uploaded yet. Press u to upload.")
                .block(Block::default().borders(Borders::ALL).title(" Your files "));
            frame.render_widget(empty, table_area);
        } else {
            frame.render_stateful_widget(self.files_table(), table_area, &mut self.table_state.clone());
        }

        if uploads_height > 0 {
            self.render_uploads(frame, uploads_area);
        }
        if errors_height > 0 {
            let errors = Paragraph::new(errors)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title(" Errors "));
            frame.render_widget(errors, errors_area);
        }
        self.render_help_line(frame, help_area);

        if let Some(prompt) = &self.prompt {
            prompt.render(frame, &self.props.max_file_size);
        }
        if self.show_quit_confirmation {
            QuitConfirmation::render(frame, self.props.active_uploads);
        }
    }
}
