use chrono::{DateTime, Utc};
use crossterm::event::KeyCode;

use qtimer::types::{
    Project, Ticket, TicketId, TimerEdit, TimerFilter, TimerId, TimerRow, TimerSelector,
    TimerStatus,
};
use qtimer::{Core, Error};

use super::{AppEvent, AppView, TABS};

/// The top-level application state.
pub struct App {
    pub running: bool,
    core: Core,
    pub view: AppView,
    view_history: Vec<AppView>,
    pub timers: Vec<TimerRow>,
    pub projects: Vec<Project>,
    /// Unfiltered, for labelling tickets while a project search is active.
    all_projects: Vec<Project>,
    pub tickets: Vec<Ticket>,
    pub selected_timer_index: usize,
    pub selected_project_index: usize,
    pub status: Option<String>,
    pub search_query: String,
    pub search_active: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub new_timer_popup: Option<NewTimerPopup>,
    pub assign_popup: Option<AssignTicketPopup>,
    pub confirm_popup: Option<ConfirmPopup>,
}

#[derive(Clone, Debug)]
pub struct TicketOption {
    pub id: Option<TicketId>,
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewTimerField {
    Name,
    Ticket,
}

#[derive(Clone, Debug)]
pub struct NewTimerPopup {
    pub name: String,
    pub ticket_index: usize,
    pub tickets: Vec<TicketOption>,
    pub field: NewTimerField,
}

#[derive(Clone, Debug)]
pub struct AssignTicketPopup {
    pub timer_id: TimerId,
    pub timer_name: String,
    pub ticket_index: usize,
    pub tickets: Vec<TicketOption>,
}

#[derive(Clone, Debug)]
pub struct ConfirmPopup {
    pub timer_id: TimerId,
    pub message: String,
}

fn select_prev(index: &mut usize, len: usize) {
    if len == 0 {
        return;
    }
    if *index == 0 {
        *index = len - 1;
    } else {
        *index -= 1;
    }
}

fn select_next(index: &mut usize, len: usize) {
    if len == 0 {
        return;
    }
    *index = (*index + 1) % len;
}

impl App {
    pub fn new(core: Core) -> Self {
        let mut app = Self {
            running: true,
            core,
            view: AppView::Timers,
            view_history: Vec::new(),
            timers: Vec::new(),
            projects: Vec::new(),
            all_projects: Vec::new(),
            tickets: Vec::new(),
            selected_timer_index: 0,
            selected_project_index: 0,
            status: None,
            search_query: String::new(),
            search_active: false,
            last_synced: None,
            new_timer_popup: None,
            assign_popup: None,
            confirm_popup: None,
        };

        app.sync_if_stale();
        app.load_timers();
        app.load_projects();
        app
    }

    /// Hands the core back so the caller can close it.
    pub fn into_core(self) -> Core {
        self.core
    }

    /// Central update function - process an event and mutate state.
    pub fn update(&mut self, event: AppEvent) {
        match event {
            AppEvent::Tick => {
                if self.has_running_timer() {
                    self.load_timers();
                }
            }
            AppEvent::KeyPress(key) => self.handle_key(key),
            AppEvent::Quit => self.running = false,
        }
    }

    pub fn has_running_timer(&self) -> bool {
        self.timers
            .iter()
            .any(|row| row.status == TimerStatus::Active)
    }

    pub fn selected_timer(&self) -> Option<&TimerRow> {
        self.timers.get(self.selected_timer_index)
    }

    pub fn tickets_of(&self, project: &Project) -> impl Iterator<Item = &Ticket> {
        let project_id = project.id;
        self.tickets
            .iter()
            .filter(move |ticket| ticket.project_id == project_id)
    }

    fn handle_key(&mut self, key: KeyCode) {
        if self.confirm_popup.is_some() {
            self.handle_confirm_key(key);
            return;
        }
        if self.new_timer_popup.is_some() {
            self.handle_new_timer_key(key);
            return;
        }
        if self.assign_popup.is_some() {
            self.handle_assign_key(key);
            return;
        }
        if self.search_active {
            self.handle_search_key(key);
            return;
        }

        match key {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('t') => self.navigate_to(AppView::Timers),
            KeyCode::Char('p') => self.navigate_to(AppView::Projects),
            KeyCode::Char('?') => {
                if self.view == AppView::Help {
                    self.go_back();
                } else {
                    self.navigate_to(AppView::Help);
                }
            }
            KeyCode::Tab => {
                let current = TABS
                    .iter()
                    .position(|(_, view)| *view == self.view)
                    .unwrap_or(0);
                let (_, next) = TABS[(current + 1) % TABS.len()];
                self.navigate_to(next);
            }
            KeyCode::Char('/') => {
                if self.view != AppView::Help {
                    self.search_active = true;
                }
            }
            KeyCode::Char('r') => {
                self.load_timers();
                self.load_projects();
            }
            KeyCode::Up => self.move_selection_up(),
            KeyCode::Down => self.move_selection_down(),
            KeyCode::Esc => {
                if self.search_query.is_empty() {
                    self.go_back();
                } else {
                    self.search_query.clear();
                    self.reload_view();
                }
            }
            KeyCode::Char('S') => self.sync_now(),
            _ if self.view == AppView::Timers => self.handle_timer_key(key),
            _ => {}
        }
    }

    fn handle_timer_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(' ') => self.toggle_selected_timer(),
            KeyCode::Char('n') => self.open_new_timer_popup(),
            KeyCode::Char('e') => self.open_assign_popup(),
            KeyCode::Char('d') => self.open_delete_confirm(),
            KeyCode::Char('P') => self.post_selected_timer(),
            _ => {}
        }
    }

    fn navigate_to(&mut self, view: AppView) {
        if self.view != view {
            self.view_history.push(self.view);
            self.view = view;
            self.search_active = false;
            self.search_query.clear();
            self.reload_view();
        }
    }

    fn go_back(&mut self) {
        if let Some(view) = self.view_history.pop() {
            self.view = view;
            self.search_query.clear();
            self.reload_view();
        }
    }

    fn reload_view(&mut self) {
        match self.view {
            AppView::Timers => self.load_timers(),
            AppView::Projects => self.load_projects(),
            AppView::Help => {}
        }
    }

    fn move_selection_up(&mut self) {
        match self.view {
            AppView::Timers => select_prev(&mut self.selected_timer_index, self.timers.len()),
            AppView::Projects => {
                select_prev(&mut self.selected_project_index, self.projects.len())
            }
            AppView::Help => {}
        }
    }

    fn move_selection_down(&mut self) {
        match self.view {
            AppView::Timers => select_next(&mut self.selected_timer_index, self.timers.len()),
            AppView::Projects => {
                select_next(&mut self.selected_project_index, self.projects.len())
            }
            AppView::Help => {}
        }
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn name_filter(&self, view: AppView) -> Option<String> {
        let query = self.search_query.trim();
        (self.view == view && !query.is_empty()).then(|| query.to_string())
    }

    fn load_timers(&mut self) {
        let filter = TimerFilter {
            name: self.name_filter(AppView::Timers),
            ..Default::default()
        };
        let result = self
            .core
            .timers()
            .find(&filter)
            .and_then(|rows| rows.collect::<qtimer::Result<Vec<_>>>());
        match result {
            Ok(rows) => {
                self.timers = rows;
                if self.selected_timer_index >= self.timers.len() {
                    self.selected_timer_index = self.timers.len().saturating_sub(1);
                }
            }
            Err(err) => {
                self.status = Some(format!("Failed to load timers: {err}"));
            }
        }
    }

    fn load_projects(&mut self) {
        let name = self.name_filter(AppView::Projects);
        let timers = self.core.timers();
        let result = timers.find_projects(None).and_then(|all| {
            let projects = match name.as_deref() {
                Some(name) => timers.find_projects(Some(name))?,
                None => all.clone(),
            };
            Ok((projects, all, timers.find_tickets(None, None)?))
        });
        match result {
            Ok((projects, all, tickets)) => {
                self.projects = projects;
                self.all_projects = all;
                self.tickets = tickets;
                if self.selected_project_index >= self.projects.len() {
                    self.selected_project_index = self.projects.len().saturating_sub(1);
                }
            }
            Err(err) => {
                self.status = Some(format!("Failed to load projects: {err}"));
            }
        }
        self.last_synced = self.core.sync_engine().last_synced().ok().flatten();
    }

    fn handle_search_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.search_active = false;
                self.search_query.clear();
                self.reload_view();
            }
            KeyCode::Enter => {
                self.search_active = false;
                self.reload_view();
            }
            KeyCode::Backspace | KeyCode::Delete => {
                self.search_query.pop();
                self.reload_view();
            }
            KeyCode::Char(ch) => {
                if ch.is_control() {
                    return;
                }
                self.search_query.push(ch);
                self.reload_view();
            }
            _ => {}
        }
    }

    fn sync_if_stale(&mut self) {
        match self.core.sync_engine().sync_conditionally() {
            Ok(_) | Err(Error::Configuration(_)) => {}
            Err(err) => {
                self.status = Some(format!("Sync failed, using cached projects: {err}"));
            }
        }
    }

    fn sync_now(&mut self) {
        match self.core.sync_engine().sync() {
            Ok(summary) => {
                let mut message = format!(
                    "Synced {} projects and {} tickets.",
                    summary.projects, summary.tickets
                );
                if summary.detached_timers > 0 {
                    message.push_str(&format!(
                        " {} timers lost their ticket.",
                        summary.detached_timers
                    ));
                }
                self.status = Some(message);
            }
            Err(err) => self.status = Some(err.to_string()),
        }
        self.load_projects();
        self.load_timers();
    }

    fn ticket_options(&self) -> Vec<TicketOption> {
        let mut options = vec![TicketOption {
            id: None,
            label: "none".to_string(),
        }];
        for ticket in &self.tickets {
            let project = self
                .all_projects
                .iter()
                .find(|project| project.id == ticket.project_id)
                .map(|project| project.name.as_str())
                .unwrap_or("?");
            options.push(TicketOption {
                id: Some(ticket.id),
                label: format!("{project} > #{} {}", ticket.ticket_id, ticket.name),
            });
        }
        options
    }

    fn toggle_selected_timer(&mut self) {
        let Some(row) = self.selected_timer() else {
            self.status = Some("No timer selected.".to_string());
            return;
        };
        let (id, status) = (row.id, row.status);
        let timers = self.core.timers();
        let result = match status {
            TimerStatus::Active => timers
                .stop(&TimerSelector::Id(id))
                .map(|_| format!("Stopped timer {id}.")),
            TimerStatus::Idle => timers.restart(id).map(|_| format!("Restarted timer {id}.")),
            TimerStatus::Posted => Err(Error::ImmutableTimer(id)),
        };
        self.status = Some(match result {
            Ok(message) => message,
            Err(err) => err.to_string(),
        });
        self.load_timers();
    }

    fn open_new_timer_popup(&mut self) {
        self.clear_status();
        self.new_timer_popup = Some(NewTimerPopup {
            name: String::new(),
            ticket_index: 0,
            tickets: self.ticket_options(),
            field: NewTimerField::Name,
        });
    }

    fn handle_new_timer_key(&mut self, key: KeyCode) {
        let Some(popup) = self.new_timer_popup.as_mut() else {
            return;
        };
        match key {
            KeyCode::Esc => {
                self.new_timer_popup = None;
                self.clear_status();
            }
            KeyCode::Enter => self.apply_new_timer_popup(),
            KeyCode::Tab => {
                popup.field = match popup.field {
                    NewTimerField::Name => NewTimerField::Ticket,
                    NewTimerField::Ticket => NewTimerField::Name,
                };
            }
            KeyCode::Up => select_prev(&mut popup.ticket_index, popup.tickets.len()),
            KeyCode::Down => select_next(&mut popup.ticket_index, popup.tickets.len()),
            KeyCode::Backspace | KeyCode::Delete => {
                if popup.field == NewTimerField::Name {
                    popup.name.pop();
                }
            }
            KeyCode::Char(ch) => {
                if ch.is_control() {
                    return;
                }
                if popup.field == NewTimerField::Name {
                    popup.name.push(ch);
                }
            }
            _ => {}
        }
    }

    fn apply_new_timer_popup(&mut self) {
        let Some(popup) = self.new_timer_popup.take() else {
            return;
        };
        let name = popup.name.trim().to_string();
        if name.is_empty() {
            self.status = Some("Timer name is required.".to_string());
            self.new_timer_popup = Some(popup);
            return;
        }
        let ticket = popup
            .tickets
            .get(popup.ticket_index)
            .and_then(|option| option.id);

        match self.core.timers().start(&name, ticket) {
            Ok(timer) => {
                self.status = Some(format!("Started timer {} '{}'.", timer.id, timer.name));
                self.load_timers();
                if let Some(index) = self.timers.iter().position(|row| row.id == timer.id) {
                    self.selected_timer_index = index;
                }
            }
            Err(err) => {
                self.status = Some(err.to_string());
                self.new_timer_popup = Some(popup);
            }
        }
    }

    fn open_assign_popup(&mut self) {
        let Some(row) = self.selected_timer() else {
            self.status = Some("No timer selected.".to_string());
            return;
        };
        if row.posted {
            self.status = Some(Error::ImmutableTimer(row.id).to_string());
            return;
        }
        let tickets = self.ticket_options();
        let current = row.ticket.as_ref().map(|ticket| ticket.id);
        let ticket_index = tickets
            .iter()
            .position(|option| option.id == current)
            .unwrap_or(0);
        self.assign_popup = Some(AssignTicketPopup {
            timer_id: row.id,
            timer_name: row.name.clone(),
            ticket_index,
            tickets,
        });
    }

    fn handle_assign_key(&mut self, key: KeyCode) {
        let Some(popup) = self.assign_popup.as_mut() else {
            return;
        };
        match key {
            KeyCode::Esc => {
                self.assign_popup = None;
                self.clear_status();
            }
            KeyCode::Enter => self.apply_assign_popup(),
            KeyCode::Up => select_prev(&mut popup.ticket_index, popup.tickets.len()),
            KeyCode::Down => select_next(&mut popup.ticket_index, popup.tickets.len()),
            _ => {}
        }
    }

    fn apply_assign_popup(&mut self) {
        let Some(popup) = self.assign_popup.take() else {
            return;
        };
        let ticket = popup
            .tickets
            .get(popup.ticket_index)
            .and_then(|option| option.id);
        let edit = TimerEdit {
            ticket: Some(ticket),
            ..Default::default()
        };
        self.status = Some(match self.core.timers().edit(popup.timer_id, &edit) {
            Ok(_) => format!("Updated ticket of '{}'.", popup.timer_name),
            Err(err) => err.to_string(),
        });
        self.load_timers();
    }

    fn open_delete_confirm(&mut self) {
        let Some(row) = self.selected_timer() else {
            self.status = Some("No timer selected.".to_string());
            return;
        };
        if row.posted {
            self.status = Some(Error::ImmutableTimer(row.id).to_string());
            return;
        }
        self.confirm_popup = Some(ConfirmPopup {
            timer_id: row.id,
            message: format!("Delete timer '{}' and all of its sessions?", row.name),
        });
    }

    fn handle_confirm_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let Some(popup) = self.confirm_popup.take() else {
                    return;
                };
                self.status = Some(match self.core.timers().delete(popup.timer_id) {
                    Ok(()) => format!("Deleted timer {}.", popup.timer_id),
                    Err(err) => err.to_string(),
                });
                self.load_timers();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm_popup = None;
                self.clear_status();
            }
            _ => {}
        }
    }

    fn post_selected_timer(&mut self) {
        let Some(row) = self.selected_timer() else {
            self.status = Some("No timer selected.".to_string());
            return;
        };
        let filter = TimerFilter {
            id: Some(row.id),
            ..Default::default()
        };
        let result = self.core.timers().post(&filter, self.core.source_opt());
        self.status = Some(match result {
            Ok(report) => match (report.succeeded.first(), report.failed.first()) {
                (Some(id), _) => format!("Posted timer {id}."),
                (None, Some((id, reason))) => format!("Timer {id} not posted: {reason}"),
                (None, None) => "Nothing to post.".to_string(),
            },
            Err(err) => err.to_string(),
        });
        self.load_timers();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use qtimer::clock::ManualClock;
    use qtimer::config::Config;
    use qtimer::db;

    use super::*;

    fn app() -> App {
        app_with(db::open_in_memory().unwrap())
    }

    fn app_with(conn: rusqlite::Connection) -> App {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap());
        App::new(Core::new(conn, Config::default(), Box::new(clock), None))
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.update(AppEvent::KeyPress(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn missing_source_is_not_reported_on_startup() {
        let app = app();
        assert!(app.status.is_none());
        assert!(app.timers.is_empty());
    }

    #[test]
    fn new_timer_popup_starts_a_timer() {
        let mut app = app();
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        type_text(&mut app, "standup notes");
        app.update(AppEvent::KeyPress(KeyCode::Enter));

        assert!(app.new_timer_popup.is_none());
        assert_eq!(app.timers.len(), 1);
        assert_eq!(app.timers[0].name, "standup notes");
        assert!(app.has_running_timer());
    }

    #[test]
    fn space_stops_then_restarts() {
        let mut app = app();
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        type_text(&mut app, "review");
        app.update(AppEvent::KeyPress(KeyCode::Enter));

        app.update(AppEvent::KeyPress(KeyCode::Char(' ')));
        assert_eq!(app.timers[0].status, TimerStatus::Idle);
        app.update(AppEvent::KeyPress(KeyCode::Char(' ')));
        assert_eq!(app.timers[0].status, TimerStatus::Active);
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut app = app();
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        type_text(&mut app, "scratch");
        app.update(AppEvent::KeyPress(KeyCode::Enter));

        app.update(AppEvent::KeyPress(KeyCode::Char('d')));
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        assert_eq!(app.timers.len(), 1);

        app.update(AppEvent::KeyPress(KeyCode::Char('d')));
        app.update(AppEvent::KeyPress(KeyCode::Char('y')));
        assert!(app.timers.is_empty());
    }

    #[test]
    fn posting_without_source_explains_why() {
        let mut app = app();
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        type_text(&mut app, "report");
        app.update(AppEvent::KeyPress(KeyCode::Enter));
        app.update(AppEvent::KeyPress(KeyCode::Char('P')));

        let status = app.status.clone().unwrap_or_default();
        assert!(status.contains("configuration"), "{status}");
    }

    #[test]
    fn ticket_labels_ignore_the_project_search() {
        let conn = db::open_in_memory().unwrap();
        db::write_transaction(&conn, |tx| {
            db::replace_remote_cache(
                &[Project {
                    id: 1,
                    name: "Website".into(),
                }],
                &[Ticket {
                    id: 10,
                    ticket_id: 4,
                    name: "Footer".into(),
                    project_id: 1,
                }],
                tx,
            )
        })
        .unwrap();
        let mut app = app_with(conn);

        app.update(AppEvent::KeyPress(KeyCode::Char('p')));
        app.update(AppEvent::KeyPress(KeyCode::Char('/')));
        type_text(&mut app, "zzz");
        app.update(AppEvent::KeyPress(KeyCode::Enter));
        assert!(app.projects.is_empty());

        app.update(AppEvent::KeyPress(KeyCode::Char('t')));
        app.update(AppEvent::KeyPress(KeyCode::Char('n')));
        let popup = app.new_timer_popup.as_ref().unwrap();
        assert_eq!(popup.tickets[1].label, "Website > #4 Footer");
    }
}
