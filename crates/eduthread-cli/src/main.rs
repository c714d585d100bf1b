//! Eduthread CLI - terminal client for teacher/guardian conversations.
//!
//! This is the entry point for the `eduthread` binary.

mod app;
mod ui;

use std::fs::File;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use eduthread_client::{ApiClient, ClientConfig, ViewUpdate};
use eduthread_core::ThreadId;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use app::{App, Focus, InputMode, REFRESH_INTERVAL};

/// Rows moved by one mouse wheel notch.
const WHEEL_ROWS: isize = 3;

/// Eduthread CLI - chat between teachers and guardians.
#[derive(Parser, Debug)]
#[command(name = "eduthread")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bearer token for authentication.
    #[arg(long, env = "EDUTHREAD_TOKEN")]
    token: String,

    /// Server origin.
    #[arg(long, env = "EDUTHREAD_SERVER", default_value = "http://localhost:5000")]
    server: String,

    /// Messages per history page.
    #[arg(long, default_value_t = eduthread_core::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Open this conversation on start.
    #[arg(long)]
    thread: Option<ThreadId>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Log file used with --debug.
    #[arg(long, default_value = "eduthread.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The terminal is owned by the UI, so logs go to a file
    if args.debug {
        let file = File::create(&args.log_file)
            .with_context(|| format!("cannot create log file {}", args.log_file))?;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("eduthread=debug,eduthread_client=debug,eduthread_core=debug,warn")
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let mut config = ClientConfig::with_base_url(&args.server);
    config.page_size = args.page_size;
    let client = ApiClient::new(&config, &args.token).context("cannot build HTTP client")?;

    // Fail before touching the terminal if the token is rejected
    let me = client
        .current_user()
        .await
        .with_context(|| format!("cannot sign in to {}", args.server))?;
    tracing::info!(user_id = %me.id, role = me.role.as_str(), "Signed in");

    let (updates_tx, updates_rx) = mpsc::channel::<ViewUpdate>(256);
    let mut app = App::new(client, me, updates_tx);

    if let Err(e) = app.load_companions().await {
        app.report("Loading contacts", &e);
    }
    if let Err(e) = app.refresh_threads().await {
        app.report("Loading conversations", &e);
    }
    if let Some(thread_id) = args.thread {
        match app.ensure_thread(thread_id).await {
            Ok(()) => app.open_thread(thread_id),
            Err(e) => app.report("Opening conversation", &e),
        }
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app, updates_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
///
/// Redraws after every terminal event, view update and animation frame.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut updates: mpsc::Receiver<ViewUpdate>,
) -> anyhow::Result<()> {
    let mut refresh_interval = tokio::time::interval(REFRESH_INTERVAL);
    refresh_interval.tick().await;

    loop {
        app.tick();
        terminal.draw(|f| ui::render(f, app))?;

        let animating = app.view.as_ref().is_some_and(|v| v.is_animating());
        let tick_rate = if animating {
            Duration::from_millis(30)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt).await;
                    }
                }
            }

            Some(update) = updates.recv() => {
                app.handle_view_update(update);
            }

            _ = refresh_interval.tick() => {
                if app.input_mode == InputMode::Normal {
                    if let Err(e) = app.refresh_threads().await {
                        tracing::warn!(error = %e, "Failed to refresh conversations");
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.close_thread();
    Ok(())
}

/// Handle input events.
async fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => {
            if key.kind != KeyEventKind::Press {
                return;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                app.should_quit = true;
                return;
            }
            match app.input_mode.clone() {
                InputMode::Normal => handle_normal_mode(app, key).await,
                InputMode::CreatingThread => handle_create_thread_mode(app, key.code).await,
                InputMode::ConfirmingDeleteThread => {
                    handle_confirm_delete_thread(app, key.code).await;
                }
                InputMode::ConfirmingDeleteMessage(id) => {
                    match key.code {
                        KeyCode::Char('y' | 'Y') => {
                            app.exit_dialog_mode();
                            app.delete_message(id);
                        }
                        KeyCode::Char('n' | 'N') | KeyCode::Esc => app.exit_dialog_mode(),
                        _ => {}
                    }
                }
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat(-WHEEL_ROWS),
            MouseEventKind::ScrollDown => app.scroll_chat(WHEEL_ROWS),
            _ => {}
        },
        _ => {}
    }
}

/// Handle input when no dialog is open.
async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Tab {
        app.focus = app.focus.next();
        return;
    }
    match key.code {
        KeyCode::PageUp => {
            app.scroll_chat(-app.chat_page());
            return;
        }
        KeyCode::PageDown => {
            app.scroll_chat(app.chat_page());
            return;
        }
        _ => {}
    }

    match app.focus {
        Focus::Threads => handle_threads_keys(app, key.code).await,
        Focus::Chat if app.command_mode => handle_command_mode(app, key.code),
        Focus::Chat => handle_typing_mode(app, key),
    }
}

/// Keys of the conversation list.
async fn handle_threads_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_thread(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_thread(),
        KeyCode::Enter => app.open_selected_thread(),
        KeyCode::Char('n') => app.begin_create_thread(),
        KeyCode::Char('d') => {
            if app.selected_thread().is_some() {
                app.enter_dialog_mode(InputMode::ConfirmingDeleteThread);
            }
        }
        KeyCode::Char('r') => match app.refresh_threads().await {
            Ok(()) => app.set_status("Conversations refreshed"),
            Err(e) => app.report("Refreshing conversations", &e),
        },
        KeyCode::Esc => {
            app.clear_error();
            app.status_message = None;
        }
        _ => {}
    }
}

/// Single-key commands in the chat column (after Esc).
fn handle_command_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('i') => {
            app.command_mode = false;
            app.selected_message = None;
        }
        KeyCode::Up => app.select_message(true),
        KeyCode::Down => app.select_message(false),
        KeyCode::Char('d') => app.begin_delete_message(),
        KeyCode::Char('j') => app.scroll_chat(1),
        KeyCode::Char('k') => app.scroll_chat(-1),
        KeyCode::Char('G') => {
            if let Some(view) = app.view.as_mut() {
                view.scroll_to_bottom();
            }
        }
        KeyCode::Char('r') => {
            app.retry_load();
            app.command_mode = false;
        }
        KeyCode::Char('x') => {
            app.close_thread();
            app.command_mode = false;
            app.focus = Focus::Threads;
        }
        _ => {}
    }
}

/// Typing goes to the input line.
fn handle_typing_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            let dismissed = app.view.as_mut().is_some_and(|v| {
                let had = v.send_error().is_some();
                v.dismiss_send_error();
                had
            });
            if dismissed {
                return;
            }
            if app.error_message.is_some() {
                app.clear_error();
            } else {
                app.status_message = None;
                app.command_mode = true;
            }
        }
        KeyCode::Enter => {
            if !app.input.trim().is_empty() {
                app.send_input();
            }
        }
        KeyCode::Up => app.scroll_chat(-1),
        KeyCode::Down => app.scroll_chat(1),
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}

/// Handle input in the create conversation dialog.
async fn handle_create_thread_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.exit_dialog_mode(),
        KeyCode::Up | KeyCode::Char('k') => app.move_create_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_create_selection(true),
        KeyCode::Enter => {
            app.exit_dialog_mode();
            if let Err(e) = app.create_selected_thread().await {
                app.report("Starting conversation", &e);
            }
        }
        _ => {}
    }
}

/// Handle input in the delete conversation dialog.
async fn handle_confirm_delete_thread(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('y' | 'Y') => {
            app.exit_dialog_mode();
            if let Err(e) = app.delete_selected_thread().await {
                app.report("Deleting conversation", &e);
            }
        }
        KeyCode::Char('n' | 'N') | KeyCode::Esc => app.exit_dialog_mode(),
        _ => {}
    }
}
