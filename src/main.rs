use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};

use quizr::{
    app::App,
    config::{ConfigStore, FileConfigStore},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    storage::{MemoryStorage, SqliteStorage, StorageBackend},
    ui::screen::current_screen,
    Dataset, DatasetError, SessionStore, StoreConfig, Variant,
};

const TICK_RATE_MS: u64 = 100;

/// terminal quiz with resumable sessions and a scored breakdown of missed questions
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal quiz: single-choice or yes/no questions in random order, progress that survives a restart for five hours, and a results screen listing every missed question."
)]
pub struct Cli {
    /// quiz variant to play (defaults to the last one played)
    #[clap(long, value_enum)]
    variant: Option<Variant>,

    /// question dataset file to use instead of the built-in one
    #[clap(short = 'q', long)]
    questions: Option<PathBuf>,

    /// ask only N yes/no questions; zero or negative means all
    #[clap(long = "debug-questions", visible_alias = "dq", allow_negative_numbers = true)]
    debug_questions: Option<i64>,

    /// path of the progress database
    #[clap(long)]
    db: Option<PathBuf>,

    /// keep progress in memory only
    #[clap(long)]
    no_persist: bool,

    /// clear stored progress for the variant and exit
    #[clap(long)]
    clear: bool,
}

impl Cli {
    fn debug_limit(&self) -> Option<usize> {
        self.debug_questions
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    }

    fn dataset(&self, variant: Variant) -> Result<Dataset, DatasetError> {
        match &self.questions {
            Some(path) => Dataset::from_path(path),
            None => Dataset::builtin(variant),
        }
    }

    fn backend(&self) -> Box<dyn StorageBackend> {
        if self.no_persist {
            return Box::new(MemoryStorage::new());
        }
        let opened = match &self.db {
            Some(path) => SqliteStorage::open(path),
            None => SqliteStorage::open_default(),
        };
        match opened {
            Ok(storage) => Box::new(storage),
            Err(e) => {
                warn!("unable to open progress database: {e}");
                Box::new(MemoryStorage::disabled())
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if !cli.clear && !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();

    let dataset = cli.dataset(cli.variant.unwrap_or(config.variant))?;
    let variant = dataset.variant();
    if config.variant != variant {
        config.variant = variant;
        if let Err(e) = config_store.save(&config) {
            warn!("unable to save preferences: {e}");
        }
    }
    info!("loaded dataset {:?} with {} questions", dataset.name(), dataset.len());

    let mut store = SessionStore::new(
        cli.backend(),
        Arc::new(dataset),
        StoreConfig::for_variant(variant),
    )
    .with_debug_limit(cli.debug_limit());

    if cli.clear {
        store.clear();
        println!("cleared stored {variant} progress");
        return Ok(());
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, Box::new(config_store));
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = runner.run(&mut app, None, |app| {
        terminal
            .draw(|f| current_screen(app.view).render(app, f))
            .map(|_| ())
    });

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let exit = result?;
    info!("event loop ended: {exit:?}");
    Ok(())
}
