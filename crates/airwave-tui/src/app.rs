//! App: component-based event loop.
//!
//! - `App` owns every component and the `AppState` snapshot they read.
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks:
//!   terminal input, store changes and the follow-ups of finished store calls.
//! - The loop draws a frame only when something changed, then awaits the next
//!   message.
//! - Components return `Vec<Action>`; the App applies them, talking to the
//!   player through a `PlayerHandle` and to the stores through `Stores`.

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::io;
use std::time::Duration;

use airwave_proto::backend::OAuthStart;
use airwave_proto::error::BackendError;
use airwave_proto::model::{CommentWithAuthor, RadioStation, User, UserWithRole};
use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::{
        admin_panel::AdminPanel,
        auth_form::AuthForm,
        comments::Comments,
        confirm_dialog::ConfirmDialog,
        header::Header,
        help_overlay::HelpOverlay,
        player_bar::{PlayerBar, VOLUME_STEP},
        profile_form::ProfileForm,
        station_detail::StationDetail,
        station_list::StationList,
    },
    core::{PlayerCommand, PlayerHandle},
    focus::FocusRing,
    notify::Severity,
    route::{Guard, Route},
    session::{SessionManager, SessionState},
    stores::{
        admin::{AdminStore, StationForm},
        catalog::CatalogStore,
        comments::CommentsStore,
        favorites::FavoritesStore,
        identity::IdentityStore,
    },
    theme::{C_BG, C_MUTED, C_PRIMARY},
    widgets::{status_bar, status_bar::InputMode, toast::ToastManager},
    BroadcastMessage,
};

/// Back stack depth.
const HISTORY_LIMIT: usize = 50;
/// Upper bound on actions processed for one input, follow-ups included.
const MAX_CHAIN: usize = 32;

// ── Internal event bus ────────────────────────────────────────────────────────

pub enum AppMessage {
    Event(Event),
    Session(SessionState),
    Catalog(Vec<RadioStation>),
    Favorites(BTreeSet<String>),
    Identity(Option<User>),
    Comments(String, Vec<CommentWithAuthor>),
    Users(Vec<UserWithRole>),
    Notice(Severity, String),
    /// Follow-ups from a finished store call.
    Actions(Vec<Action>),
}

/// Everything the App talks to besides its own components.
#[derive(Clone)]
pub struct Stores {
    pub session: SessionManager,
    pub catalog: CatalogStore,
    pub favorites: FavoritesStore,
    pub identity: IdentityStore,
    pub comments: CommentsStore,
    pub admin: AdminStore,
}

impl Stores {
    /// Turn a store change notice into a message carrying the new data.
    async fn load(&self, msg: BroadcastMessage) -> AppMessage {
        match msg {
            BroadcastMessage::SessionUpdated => AppMessage::Session(self.session.get().await),
            BroadcastMessage::CatalogUpdated => AppMessage::Catalog(self.catalog.all().await),
            BroadcastMessage::FavoritesUpdated => AppMessage::Favorites(self.favorites.ids().await),
            BroadcastMessage::IdentityUpdated => AppMessage::Identity(self.identity.current()),
            BroadcastMessage::CommentsUpdated(station_id) => {
                let comments = self.comments.comments(&station_id).await;
                AppMessage::Comments(station_id, comments)
            }
            BroadcastMessage::UsersUpdated => AppMessage::Users(self.admin.users().await),
            BroadcastMessage::Notice(severity, text) => AppMessage::Notice(severity, text),
        }
    }
}

/// Validation errors come back to the view; the stores report the rest.
fn rejected(e: &BackendError) -> Vec<Action> {
    match e {
        BackendError::Validation(msg) => vec![Action::Toast(Severity::Warning, msg.clone())],
        _ => vec![],
    }
}

fn focus_ring_for(route: &Route) -> Vec<ComponentId> {
    match route {
        Route::Home | Route::Discover | Route::Favorites => {
            vec![ComponentId::StationList, ComponentId::PlayerBar]
        }
        Route::Station(_) => vec![
            ComponentId::StationDetail,
            ComponentId::Comments,
            ComponentId::PlayerBar,
        ],
        Route::Login | Route::Register => vec![ComponentId::AuthForm],
        Route::Profile => vec![ComponentId::ProfileForm, ComponentId::PlayerBar],
        Route::Admin => vec![ComponentId::AdminPanel, ComponentId::PlayerBar],
    }
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.width > 0
        && r.height > 0
        && col >= r.x
        && col < r.x + r.width
        && row >= r.y
        && row < r.y + r.height
}

pub struct App {
    state: AppState,
    stores: Stores,
    player: PlayerHandle,

    // Components
    header: Header,
    station_list: StationList,
    station_detail: StationDetail,
    comments: Comments,
    player_bar: PlayerBar,
    auth_form: AuthForm,
    profile_form: ProfileForm,
    admin_panel: AdminPanel,
    confirm_dialog: ConfirmDialog,
    help_overlay: HelpOverlay,

    toast: ToastManager,
    focus: FocusRing,
    history: Vec<Route>,
    show_keys_bar: bool,
    /// Pane rects from the last draw, front to back.
    pane_areas: Vec<(ComponentId, Rect)>,
    header_area: Rect,
    msg_tx: Option<mpsc::Sender<AppMessage>>,
    should_quit: bool,
}

impl App {
    pub fn new(
        stores: Stores,
        player: PlayerHandle,
        session: SessionState,
        sleep_presets: Vec<u32>,
        backend_label: String,
    ) -> Self {
        let state = AppState::new(session, sleep_presets, backend_label);
        let focus = FocusRing::new(focus_ring_for(&state.route));
        Self {
            state,
            stores,
            player,
            header: Header::new(),
            station_list: StationList::new(),
            station_detail: StationDetail::new(),
            comments: Comments::new(),
            player_bar: PlayerBar::new(),
            auth_form: AuthForm::new(),
            profile_form: ProfileForm::new(),
            admin_panel: AdminPanel::new(),
            confirm_dialog: ConfirmDialog::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            focus,
            history: Vec::new(),
            show_keys_bar: true,
            pane_areas: Vec::new(),
            header_area: Rect::default(),
            msg_tx: None,
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        self.msg_tx = Some(tx.clone());

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (stores → AppMessage) ─────────
        let bc_tx = tx.clone();
        let bc_stores = self.stores.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        let app_msg = bc_stores.load(msg).await;
                        if bc_tx.send(app_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Toast expiry
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Component maintenance tick
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else {
                            break;
                        };
                        drained += 1;
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = ui_tick.tick() => {
                    let tick_actions: Vec<Action> = {
                        let s = &self.state;
                        let mut all = Vec::new();
                        all.extend(self.station_list.tick(s));
                        all.extend(self.comments.tick(s));
                        all.extend(self.player_bar.tick(s));
                        all
                    };
                    if !tick_actions.is_empty() {
                        for action in tick_actions {
                            self.dispatch(action).await;
                        }
                        needs_redraw = true;
                    }
                }

                _ = toast_tick.tick() => {
                    needs_redraw = self.toast.tick();
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        info!("shutting down");
        self.player.shutdown().await;
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    /// Returns true when a redraw is needed.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return false;
                    }
                    let actions = self.handle_key(key);
                    for a in actions {
                        self.dispatch(a).await;
                    }
                }
                Event::Mouse(mouse) => {
                    let actions = self.handle_mouse(mouse);
                    for a in actions {
                        self.dispatch(a).await;
                    }
                }
                Event::Resize(..) => {}
                _ => return false,
            },

            AppMessage::Session(session) => {
                // Out-of-order snapshots from the forwarder are dropped.
                if session.rev < self.state.session.rev {
                    return false;
                }
                self.state.session = session;
            }

            AppMessage::Catalog(stations) => {
                self.state.set_stations(stations);
                self.station_list.sync(&self.state);
                self.admin_panel.sync(&self.state);
                self.enforce_guard().await;
            }

            AppMessage::Favorites(ids) => {
                self.state.favorites = ids;
                self.station_list.sync(&self.state);
            }

            AppMessage::Identity(user) => {
                self.state.set_user(user);
                self.station_list.sync(&self.state);
                self.admin_panel.sync(&self.state);
                self.enforce_guard().await;
            }

            AppMessage::Comments(station_id, comments) => {
                if self.state.open_station().is_some_and(|s| s.id == station_id) {
                    self.state.comments = comments;
                }
            }

            AppMessage::Users(users) => {
                self.state.users = users;
                self.admin_panel.sync(&self.state);
            }

            AppMessage::Notice(severity, text) => self.toast.notify(severity, text),

            AppMessage::Actions(actions) => {
                for a in actions {
                    self.dispatch(a).await;
                }
            }
        }
        true
    }

    /// Redirect away from a route the current user may not see.
    async fn enforce_guard(&mut self) {
        if let Guard::Redirect(route) = self.state.guard() {
            info!("route guard: {:?} -> {:?}", self.state.route, route);
            self.dispatch(Action::Navigate(route)).await;
        }
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Action::Quit];
        }

        // Overlays take every key while open
        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }
        if self.confirm_dialog.is_open() {
            return self.confirm_dialog.handle_key(key, &self.state);
        }
        if self.player_bar.picker_open() {
            return self.player_bar.handle_picker_key(key, &self.state);
        }

        match self.state.input_mode {
            InputMode::Filter => {
                return match key.code {
                    KeyCode::Tab => vec![Action::CloseFilter, Action::FocusNext],
                    KeyCode::BackTab => vec![Action::CloseFilter, Action::FocusPrev],
                    _ => self.focused_key(key),
                };
            }
            InputMode::Insert => return self.focused_key(key),
            InputMode::Normal => {}
        }

        if key.code == KeyCode::Enter && self.state.guard() == Guard::SignInPrompt {
            return vec![Action::Navigate(Route::Login)];
        }

        let volume = self.state.session.volume;
        match key.code {
            KeyCode::Char('q') => vec![Action::Quit],
            KeyCode::Char('?') => vec![Action::ToggleHelp],
            KeyCode::Char('K') => vec![Action::ToggleKeys],
            KeyCode::Tab => vec![Action::FocusNext],
            KeyCode::BackTab => vec![Action::FocusPrev],
            KeyCode::Char(c @ '1'..='5') => Route::from_digit(c, self.state.user.as_ref())
                .map(|r| vec![Action::Navigate(r)])
                .unwrap_or_default(),
            KeyCode::Char(' ') => vec![Action::TogglePlay],
            KeyCode::Left | KeyCode::Char('-') => {
                vec![Action::Volume((volume - VOLUME_STEP).max(0.0))]
            }
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => {
                vec![Action::Volume((volume + VOLUME_STEP).min(1.0))]
            }
            KeyCode::Char('m') => vec![Action::Mute],
            KeyCode::Char('S') => vec![Action::Stop],
            KeyCode::Char('s') => {
                self.player_bar.open_picker(&self.state);
                vec![Action::FocusPane(ComponentId::PlayerBar)]
            }
            KeyCode::Esc => vec![Action::Back],
            _ => self.focused_key(key),
        }
    }

    fn focused_key(&mut self, key: KeyEvent) -> Vec<Action> {
        let Some(id) = self.focus.current() else {
            return vec![];
        };
        self.with_component(id, |c, s| c.handle_key(key, s))
            .unwrap_or_default()
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        let is_click = matches!(
            event.kind,
            MouseEventKind::Down(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
        );
        if !is_click || self.help_overlay.visible || self.confirm_dialog.is_open() {
            return vec![];
        }
        let (col, row) = (event.column, event.row);

        if hit(self.header_area, col, row) {
            return self.header.handle_mouse(event, self.header_area, &self.state);
        }

        let Some((id, area)) = self
            .pane_areas
            .iter()
            .copied()
            .find(|(_, r)| hit(*r, col, row))
        else {
            return vec![];
        };
        let mut actions = self
            .with_component(id, |c, s| c.handle_mouse(event, area, s))
            .unwrap_or_default();
        // Focus follows the click
        if !self.focus.is_focused(id) {
            actions.insert(0, Action::FocusPane(id));
        }
        actions
    }

    /// Run `f` on the component behind `id` with the shared state.
    fn with_component<R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Component, &AppState) -> R,
    ) -> Option<R> {
        let state = &self.state;
        let component: &mut dyn Component = match id {
            ComponentId::Header => &mut self.header,
            ComponentId::StationList => &mut self.station_list,
            ComponentId::StationDetail => &mut self.station_detail,
            ComponentId::Comments => &mut self.comments,
            ComponentId::PlayerBar => &mut self.player_bar,
            ComponentId::AuthForm => &mut self.auth_form,
            ComponentId::ProfileForm => &mut self.profile_form,
            ComponentId::AdminPanel => &mut self.admin_panel,
            ComponentId::ConfirmDialog => &mut self.confirm_dialog,
            ComponentId::HelpOverlay => &mut self.help_overlay,
        };
        Some(f(component, state))
    }

    fn sync_input_mode(&mut self) {
        self.state.input_mode = match self.focus.current() {
            Some(id) => self
                .with_component(id, |c, _| c.input_mode())
                .unwrap_or_default(),
            None => InputMode::Normal,
        };
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);
        let mut processed = 0usize;
        while let Some(action) = queue.pop_front() {
            processed += 1;
            if processed > MAX_CHAIN {
                warn!("dispatch: dropping {} queued actions", queue.len() + 1);
                break;
            }
            // Every component sees the action first
            let secondary: Vec<Action> = {
                let s = &self.state;
                let mut out = Vec::new();
                out.extend(self.header.on_action(&action, s));
                out.extend(self.station_list.on_action(&action, s));
                out.extend(self.station_detail.on_action(&action, s));
                out.extend(self.comments.on_action(&action, s));
                out.extend(self.player_bar.on_action(&action, s));
                out.extend(self.auth_form.on_action(&action, s));
                out.extend(self.profile_form.on_action(&action, s));
                out.extend(self.admin_panel.on_action(&action, s));
                out.extend(self.confirm_dialog.on_action(&action, s));
                out.extend(self.help_overlay.on_action(&action, s));
                out
            };

            queue.extend(self.apply_action(action).await);
            queue.extend(secondary);
        }
        self.sync_input_mode();
    }

    /// Spawn a store call; whatever it returns is dispatched when it lands.
    fn spawn_task<F>(&self, fut: F)
    where
        F: Future<Output = Vec<Action>> + Send + 'static,
    {
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let actions = fut.await;
            if actions.is_empty() {
                return;
            }
            if let Some(tx) = tx {
                let _ = tx.send(AppMessage::Actions(actions)).await;
            }
        });
    }

    /// Apply one action; returns follow-ups to dispatch right away.
    async fn apply_action(&mut self, action: Action) -> Vec<Action> {
        if !matches!(action, Action::Noop) {
            debug!("apply_action: {:?}", action);
        }
        match action {
            // ── Playback ──────────────────────────────────────────────────────
            Action::PlayStation(station) => {
                self.player.send(PlayerCommand::SetStation(station)).await;
            }
            Action::TogglePlay => {
                if self.state.session.station.is_none() {
                    if let Some(last) = self.state.last_station().cloned() {
                        return vec![Action::PlayStation(last)];
                    }
                }
                self.player.send(PlayerCommand::TogglePlay).await;
            }
            Action::Volume(v) => self.player.send(PlayerCommand::SetVolume(v)).await,
            Action::Mute => self.player.send(PlayerCommand::ToggleMute).await,
            Action::Stop => self.player.send(PlayerCommand::Stop).await,
            Action::StartSleep(mins) => {
                self.player.send(PlayerCommand::StartSleepTimer(mins)).await;
            }
            Action::CancelSleep => self.player.send(PlayerCommand::CancelSleepTimer).await,

            // ── Navigation ────────────────────────────────────────────────────
            Action::Navigate(route) => {
                if route != self.state.route {
                    let prev = std::mem::replace(&mut self.state.route, route.clone());
                    self.history.push(prev.clone());
                    if self.history.len() > HISTORY_LIMIT {
                        self.history.remove(0);
                    }
                    return self.entered(prev).await;
                }
            }
            Action::Back => {
                if let Some(route) = self.history.pop() {
                    let prev = std::mem::replace(&mut self.state.route, route.clone());
                    // components still need to see where we went
                    let mut follow = vec![Action::Navigate(route)];
                    follow.extend(self.entered(prev).await);
                    return follow;
                }
            }
            Action::FocusNext => {
                self.focus.next();
            }
            Action::FocusPrev => {
                self.focus.prev();
            }
            Action::FocusPane(id) => self.focus.set(id),
            Action::CloseFilter => {}

            // ── Library ───────────────────────────────────────────────────────
            Action::ToggleFavorite(station_id) => {
                let favorites = self.stores.favorites.clone();
                self.spawn_task(async move {
                    let _ = favorites.toggle(&station_id).await;
                    vec![]
                });
            }
            Action::PostComment {
                station_id,
                content,
            } => {
                let comments = self.stores.comments.clone();
                self.spawn_task(async move {
                    match comments.post(&station_id, &content).await {
                        Ok(()) => vec![Action::CommentPosted],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::DeleteComment {
                station_id,
                comment_id,
            } => {
                let comments = self.stores.comments.clone();
                self.spawn_task(async move {
                    match comments.delete(&station_id, &comment_id).await {
                        Ok(()) => vec![],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::CommentPosted => {}

            // ── Identity ──────────────────────────────────────────────────────
            Action::SignIn { email, password } => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity.sign_in(&email, &password).await {
                        Ok(_) => vec![Action::SignedIn],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::SignUp {
                email,
                password,
                confirm,
                name,
            } => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity
                        .sign_up(&email, &password, &confirm, name.as_deref())
                        .await
                    {
                        Ok(Some(_)) => vec![Action::SignedIn],
                        Ok(None) => vec![Action::ConfirmationSent],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::SignInOAuth(provider) => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity.sign_in_with_oauth(&provider).await {
                        Ok(OAuthStart::Redirect(url)) => {
                            vec![Action::CopyToClipboard(url.clone()), Action::OAuthPending(url)]
                        }
                        Ok(OAuthStart::SignedIn(_)) => vec![Action::SignedIn],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::OAuthPending(_) => {}
            Action::CompleteOAuth(url) => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity.complete_oauth(&url).await {
                        Ok(_) => vec![Action::SignedIn],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::SignedIn | Action::ConfirmationSent => {}
            Action::SignOut => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    identity.sign_out().await;
                    vec![Action::Navigate(Route::Home)]
                });
            }
            Action::SaveProfile(edit) => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity.update_profile(edit).await {
                        Ok(_) => vec![Action::ProfileSaved],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::UploadAvatar(path) => {
                let identity = self.stores.identity.clone();
                self.spawn_task(async move {
                    match identity.upload_avatar(&path).await {
                        Ok(_) => vec![Action::ProfileSaved],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::ProfileSaved => {}

            // ── Admin ─────────────────────────────────────────────────────────
            Action::SaveStation { id, form } => {
                let admin = self.stores.admin.clone();
                self.spawn_task(async move {
                    let result = match id {
                        Some(id) => admin.update_station(&id, &form).await,
                        None => admin.create_station(&form).await,
                    };
                    match result {
                        Ok(_) => vec![Action::StationSaved],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::StationSaved => {}
            Action::DeleteStation(station) => {
                let admin = self.stores.admin.clone();
                self.spawn_task(async move {
                    let _ = admin.delete_station(&station).await;
                    vec![]
                });
            }
            Action::UploadStationImage(path) => {
                let admin = self.stores.admin.clone();
                self.spawn_task(async move {
                    let mut form = StationForm::default();
                    match admin.upload_station_image(&mut form, &path).await {
                        Ok(url) => vec![Action::StationImageUploaded(url)],
                        Err(e) => rejected(&e),
                    }
                });
            }
            Action::StationImageUploaded(_) => {}
            Action::LoadUsers => {
                let admin = self.stores.admin.clone();
                self.spawn_task(async move {
                    let _ = admin.load_users().await;
                    vec![]
                });
            }
            Action::GrantAdmin(user) => {
                let admin = self.stores.admin.clone();
                self.spawn_task(async move {
                    let _ = admin.grant_admin(&user).await;
                    vec![]
                });
            }
            Action::RevokeAdmin(user) => {
                let admin = self.stores.admin.clone();
                let identity = self.stores.identity.clone();
                let yourself = self
                    .state
                    .user
                    .as_ref()
                    .is_some_and(|u| u.id == user.profile.id);
                self.spawn_task(async move {
                    if admin.revoke_admin(&user).await.is_ok() && yourself {
                        // the route guard takes it from here
                        if let Err(e) = identity.reload().await {
                            warn!("identity reload after revoke failed: {}", e);
                        }
                    }
                    vec![]
                });
            }

            // ── UI ────────────────────────────────────────────────────────────
            Action::AskConfirm { .. } | Action::ToggleHelp => {}
            Action::ToggleKeys => self.show_keys_bar = !self.show_keys_bar,
            Action::Toast(severity, text) => self.toast.notify(severity, text),
            Action::Quit => self.should_quit = true,
            Action::Noop => {}
            Action::CopyToClipboard(text) => {
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone())) {
                    Ok(()) => {
                        let display = if text.chars().count() > 40 {
                            format!("{}…", text.chars().take(40).collect::<String>())
                        } else {
                            text.clone()
                        };
                        self.toast.notify(Severity::Success, format!("copied: {}", display));
                    }
                    Err(e) => {
                        warn!("clipboard error: {}", e);
                        self.toast
                            .notify(Severity::Error, format!("clipboard error: {}", e));
                    }
                }
            }
        }
        vec![]
    }

    /// Side effects of having moved from `prev` to the current route.
    async fn entered(&mut self, prev: Route) -> Vec<Action> {
        let route = self.state.route.clone();
        info!("route: {:?} -> {:?}", prev, route);
        self.focus.set_items(focus_ring_for(&route));
        if let Some(&first) = focus_ring_for(&route).first() {
            self.focus.set(first);
        }

        let mut follow = Vec::new();
        if let Route::Station(prev_id) = &prev {
            if route != Route::Station(prev_id.clone()) {
                let comments = self.stores.comments.clone();
                tokio::spawn(async move { comments.close().await });
            }
        }
        match &route {
            Route::Station(id) => {
                self.state.comments = self.stores.comments.comments(id).await;
                let comments = self.stores.comments.clone();
                let id = id.clone();
                self.spawn_task(async move {
                    let _ = comments.open(&id).await;
                    vec![]
                });
            }
            Route::Admin => follow.push(Action::LoadUsers),
            _ => {}
        }
        if let Guard::Redirect(to) = self.state.guard() {
            follow.push(Action::Navigate(to));
        }
        follow
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        use ratatui::widgets::Block;
        let area = frame.area();

        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let status_h = u16::from(self.show_keys_bar);
        let player_h = self.player_bar.min_height();
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(player_h),
                Constraint::Length(status_h),
            ])
            .split(area);
        let (header_area, body_area, player_area, status_area) =
            (outer[0], outer[1], outer[2], outer[3]);

        self.header_area = header_area;
        self.header.draw(frame, header_area, false, &self.state);

        self.pane_areas.clear();
        if self.state.guard() == Guard::SignInPrompt {
            draw_sign_in_prompt(frame, body_area, &self.state.route);
        } else {
            self.draw_body(frame, body_area);
        }

        let player_focused = self.focus.is_focused(ComponentId::PlayerBar);
        self.player_bar
            .draw(frame, player_area, player_focused, &self.state);
        self.pane_areas.push((ComponentId::PlayerBar, player_area));

        if self.show_keys_bar {
            status_bar::draw_keys_bar(frame, status_area, self.state.input_mode, &self.state.route);
        }

        // ── Overlays ──────────────────────────────────────────────────────────
        if self.help_overlay.visible {
            self.help_overlay.draw(frame, area, false, &self.state);
        }
        self.confirm_dialog.draw(frame, area, true, &self.state);
        self.toast.draw(frame, area);
    }

    fn draw_body(&mut self, frame: &mut ratatui::Frame, area: Rect) {
        let s = &self.state;
        match &s.route {
            Route::Home | Route::Discover | Route::Favorites => {
                let focused = self.focus.is_focused(ComponentId::StationList);
                self.station_list.draw(frame, area, focused, s);
                self.pane_areas.push((ComponentId::StationList, area));
            }
            Route::Station(_) => {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .split(area);
                let detail_focused = self.focus.is_focused(ComponentId::StationDetail);
                let comments_focused = self.focus.is_focused(ComponentId::Comments);
                self.station_detail.draw(frame, cols[0], detail_focused, s);
                self.comments.draw(frame, cols[1], comments_focused, s);
                self.pane_areas.push((ComponentId::StationDetail, cols[0]));
                self.pane_areas.push((ComponentId::Comments, cols[1]));
            }
            Route::Login | Route::Register => {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Percentage(20),
                        Constraint::Percentage(60),
                        Constraint::Percentage(20),
                    ])
                    .split(area);
                let focused = self.focus.is_focused(ComponentId::AuthForm);
                self.auth_form.draw(frame, cols[1], focused, s);
                self.pane_areas.push((ComponentId::AuthForm, cols[1]));
            }
            Route::Profile => {
                let focused = self.focus.is_focused(ComponentId::ProfileForm);
                self.profile_form.draw(frame, area, focused, s);
                self.pane_areas.push((ComponentId::ProfileForm, area));
            }
            Route::Admin => {
                let focused = self.focus.is_focused(ComponentId::AdminPanel);
                self.admin_panel.draw(frame, area, focused, s);
                self.pane_areas.push((ComponentId::AdminPanel, area));
            }
        }
    }
}

fn draw_sign_in_prompt(frame: &mut ratatui::Frame, area: Rect, route: &Route) {
    let what = match route {
        Route::Favorites => "to see your favorite stations",
        _ => "to view your profile",
    };
    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            "Sign in required",
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Please sign in {}.", what),
            Style::default().fg(C_MUTED),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "press enter to sign in",
            Style::default().fg(C_MUTED),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_pages_cycle_through_comments() {
        assert_eq!(
            focus_ring_for(&Route::Station("x".into())),
            vec![
                ComponentId::StationDetail,
                ComponentId::Comments,
                ComponentId::PlayerBar
            ]
        );
        assert_eq!(focus_ring_for(&Route::Register), vec![ComponentId::AuthForm]);
    }

    #[test]
    fn only_validation_errors_become_toasts() {
        assert!(matches!(
            rejected(&BackendError::validation("Passwords do not match")).as_slice(),
            [Action::Toast(Severity::Warning, msg)] if msg == "Passwords do not match"
        ));
        assert!(rejected(&BackendError::Unauthenticated).is_empty());
    }

    #[test]
    fn hit_excludes_the_far_edges() {
        let r = Rect::new(2, 3, 4, 2);
        assert!(hit(r, 2, 3));
        assert!(hit(r, 5, 4));
        assert!(!hit(r, 6, 4));
        assert!(!hit(r, 5, 5));
        assert!(!hit(Rect::default(), 0, 0));
    }
}
