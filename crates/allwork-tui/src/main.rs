use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use allwork_service::{BlockingService, BoardService, HttpService, MemoryService};
use allwork_tui::app::App;
use allwork_tui::session::SessionManager;
use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(250);

/// Team kanban boards, one column per member.
#[derive(Debug, Parser)]
#[command(name = "allwork", version)]
struct Cli {
    /// Project URL of the hosted backend.
    #[arg(long, env = "ALLWORK_SUPABASE_URL")]
    url: Option<String>,

    /// Public anon key for the hosted backend.
    #[arg(long, env = "ALLWORK_SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    /// Run against an in-memory backend with sample data
    /// (sign in as demo@allwork.local / demo).
    #[arg(long)]
    demo: bool,

    /// Write logs here. Nothing is logged without it.
    #[arg(long, env = "ALLWORK_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Keep the session in memory only.
    #[arg(long)]
    no_persist: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.log_file.as_ref() {
        init_tracing(path)?;
    }

    let backend: Arc<dyn BoardService> = if cli.demo {
        Arc::new(MemoryService::with_demo_data())
    } else {
        let (Some(url), Some(key)) = (cli.url.as_deref(), cli.anon_key.as_deref()) else {
            bail!("set --url and --anon-key (or ALLWORK_SUPABASE_URL / ALLWORK_SUPABASE_ANON_KEY), or pass --demo");
        };
        Arc::new(HttpService::new(url, key))
    };
    let service = BlockingService::new(backend).context("failed to start async runtime")?;

    // The demo backend forgets its tokens on exit, so there is nothing to restore.
    let session_path = if cli.no_persist || cli.demo {
        None
    } else {
        Some(SessionManager::default_path())
    };
    let sessions = SessionManager::new(session_path);

    run_tui(service, sessions)
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_tui(service: BlockingService, sessions: SessionManager) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, service, sessions);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e}");
    }

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    service: BlockingService,
    sessions: SessionManager,
) -> Result<()> {
    let mut app = App::new(service, sessions);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        let timeout = TICK.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    // Ctrl+C always quits
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }
                    // q quits unless we're in an input mode
                    if key.code == KeyCode::Char('q') && !app.is_input_mode() {
                        break;
                    }
                    app.handle_key(key);
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= TICK {
            app.tick(Instant::now());
            last_tick = Instant::now();
        }
    }

    Ok(())
}
