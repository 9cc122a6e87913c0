use crossterm::event::KeyEvent;
use ratatui::Frame;
use tokio::sync::mpsc::UnboundedSender;
use crate::components::component::{Component, ComponentRender};
use crate::components::dashboard_page::DashboardPage;
use crate::components::help_page::HelpPage;
use volt_tui::model::action::Action;
use volt_tui::model::state::{ActivePage, State};

struct Props {
    active_page: ActivePage,
}

impl From<&State> for Props {
    fn from(state: &State) -> Self {
        Props {
            active_page: state.active_page.clone(),
        }
    }
}

/// Handles transitions between different TUI pages and passes on the state transitions
pub struct AppRouter {
    props: Props,
    dashboard_page: DashboardPage,
    help_page: HelpPage,
}

impl AppRouter {
    fn get_active_page_component(&self) -> &dyn Component {
        match self.props.active_page {
            ActivePage::Dashboard => &self.dashboard_page,
            ActivePage::Help => &self.help_page,
        }
    }

    fn get_active_page_component_mut(&mut self) -> &mut dyn Component {
        match self.props.active_page {
            ActivePage::Dashboard => &mut self.dashboard_page,
            ActivePage::Help => &mut self.help_page,
        }
    }
}

impl Component for AppRouter {
    fn new(state: &State, action_tx: UnboundedSender<Action>) -> Self
    where
        Self: Sized,
    {
        AppRouter {
            props: Props::from(state),
            dashboard_page: DashboardPage::new(state, action_tx.clone()),
            help_page: HelpPage::new(state, action_tx),
        }
        .move_with_state(state)
    }

    fn move_with_state(self, state: &State) -> Self
    where
        Self: Sized,
    {
        AppRouter {
            props: Props::from(state),
            dashboard_page: self.dashboard_page.move_with_state(state),
            help_page: self.help_page.move_with_state(state),
        }
    }

    // route all functions to the active page
    fn name(&self) -> &str {
        self.get_active_page_component().name()
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        self.get_active_page_component_mut().handle_key_event(key)
    }
}

impl ComponentRender<()> for AppRouter {
    fn render(&self, frame: &mut Frame, props: ()) {
        match self.props.active_page {
            ActivePage::Dashboard => self.dashboard_page.render(frame, props),
            ActivePage::Help => self.help_page.render(frame, props),
        }
    }
}
