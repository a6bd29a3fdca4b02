use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    cursor, execute, queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use pitrain::{
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    constant::Constant,
    digits::{render, DigitBuffer, DigitSource},
    history::HistorySummary,
    learning::LearningStore,
    persistence::{HighestIndexPersistence, HistoryPersistence},
    records::{PersonalBestStore, RecordKind},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    scheduler::{schedule, RecallRating},
    session::SessionMode,
    stats::StatsDb,
    trainer::{Flow, SessionSummary, Trainer},
};
use std::{
    io::{self, stdin, Write},
    path::PathBuf,
    time::Duration,
};

const TICK_RATE_MS: u64 = 100;

/// digit memorization trainer for π and friends
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Memorize the digits of π, e, √2 and φ: sudden-death tests, races against your own personal-best ghost, and spaced-repetition review of digit chunks."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Cmd>,

    /// constant to train
    #[clap(short = 'c', long, value_enum, global = true)]
    constant: Option<Constant>,

    /// session mode
    #[clap(short = 'm', long, value_enum, global = true)]
    mode: Option<SessionMode>,

    /// which personal best the game-mode ghost replays
    #[clap(long, value_enum, global = true)]
    ghost: Option<RecordKind>,

    /// digits per learning chunk
    #[clap(long, global = true)]
    chunk_size: Option<usize>,

    /// new chunks granted per day
    #[clap(long, global = true)]
    daily_new: Option<usize>,

    /// chunks offered for review per day
    #[clap(long, global = true)]
    review_limit: Option<usize>,

    /// first digit of the learn-mode segment (rounded down to a multiple of 10)
    #[clap(long, global = true)]
    segment_start: Option<usize>,

    /// end of the learn-mode segment, exclusive (rounded down to a multiple of 10)
    #[clap(long, global = true)]
    segment_end: Option<usize>,

    /// directory holding longer `<constant>_digits.txt` expansions
    #[clap(long, global = true)]
    digits_dir: Option<PathBuf>,

    /// database file (defaults to ~/.local/state/pitrain/pitrain.db)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// remember the options given on this command line
    #[clap(long, global = true)]
    save: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// type digits against the clock (default)
    Practice,
    /// show personal bests
    Records,
    /// show recent sessions and the daily streak
    History {
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// forget the session history of the constant
        #[clap(long)]
        clear: bool,
        /// forget everything stored for the constant: records, chunks and history
        #[clap(long, conflicts_with = "clear")]
        reset: bool,
    },
    /// list chunks due for review
    Due,
    /// take today's new chunks and print their digits
    Learn {
        #[clap(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// rate how well a chunk was recalled
    Review {
        chunk: usize,
        #[clap(value_enum)]
        rating: RecallRating,
    },
    /// preview the next interval for a rating
    Schedule {
        interval: f64,
        #[clap(value_enum)]
        rating: RecallRating,
    },
    /// print the effective configuration
    Config,
}

impl Cli {
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(constant) = self.constant {
            cfg.constant = constant;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(kind) = self.ghost {
            cfg.ghost_kind = kind;
        }
        if let Some(size) = self.chunk_size {
            cfg.chunk_size = size;
        }
        if let Some(n) = self.daily_new {
            cfg.daily_new_chunks = n;
        }
        if let Some(n) = self.review_limit {
            cfg.daily_review_limit = n;
        }
        if let Some(start) = self.segment_start {
            cfg.segment_start = start;
        }
        if let Some(end) = self.segment_end {
            cfg.segment_end = end;
        }
        if let Some(dir) = &self.digits_dir {
            cfg.digits_dir = Some(dir.clone());
        }
    }

    fn touches_learning(&self) -> bool {
        self.chunk_size.is_some() || self.daily_new.is_some() || self.review_limit.is_some()
    }

    fn open_db(&self) -> Result<StatsDb> {
        match &self.db {
            Some(path) => StatsDb::open(path)
                .with_context(|| format!("opening database {}", path.display())),
            None => StatsDb::new().context("opening stats database"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let store = FileConfigStore::new();
    let mut cfg = store.load();
    cli.apply_to(&mut cfg);
    if cli.save {
        store
            .save(&cfg)
            .with_context(|| format!("saving config to {}", store.path().display()))?;
    }

    match cli.command.clone().unwrap_or(Cmd::Practice) {
        Cmd::Schedule { interval, rating } => {
            let now = Local::now();
            let result = schedule(interval, rating, now);
            println!(
                "{} days (next review {})",
                result.interval,
                result.next_review_date.format("%Y-%m-%d %H:%M")
            );
        }
        Cmd::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Cmd::Practice => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            let db = cli.open_db()?;
            let digits = load_digits(&cfg)?;
            practice(&cfg, digits, &db)?;
        }
        Cmd::Records => {
            let db = cli.open_db()?;
            print_records(cli.constant, &db);
        }
        Cmd::History {
            limit,
            clear,
            reset,
        } => {
            let db = cli.open_db()?;
            if reset {
                db.clear_constant(cfg.constant)?;
                println!("reset all {} progress", cfg.constant.symbol());
            } else if clear {
                db.clear_history(cfg.constant)?;
                println!("cleared {} history", cfg.constant.symbol());
            } else {
                print_history(&cfg, &db, limit)?;
            }
        }
        Cmd::Due => {
            let db = cli.open_db()?;
            let mut learning = learning_store(&cli, &cfg, &db);
            let now = Local::now();
            let due = learning.review_queue(cfg.constant, now);
            if due.is_empty() {
                println!("nothing due for {}", cfg.constant.symbol());
            }
            let digits = load_digits(&cfg)?;
            let size = learning.state(cfg.constant, now).chunk_size;
            for chunk in due {
                let range = chunk.digit_range(size);
                println!(
                    "chunk {:>4}  digits {:>5}-{:<5} {:?}, every {} days  {}",
                    chunk.chunk_index,
                    range.start + 1,
                    range.end,
                    chunk.state,
                    chunk.interval,
                    render(digits.slice(range.start, size))
                );
            }
        }
        Cmd::Learn { count } => {
            let db = cli.open_db()?;
            let digits = load_digits(&cfg)?;
            let mut learning = learning_store(&cli, &cfg, &db);
            let now = Local::now();
            let size = learning.state(cfg.constant, now).chunk_size;
            for chunk in learning.pending_new_chunks(cfg.constant) {
                let range = chunk.digit_range(size);
                println!(
                    "chunk {:>4}  {}  (awaiting first review)",
                    chunk.chunk_index,
                    render(digits.slice(range.start, size))
                );
            }
            let granted = learning.new_chunks_to_learn(cfg.constant, count, now);
            if granted.is_empty() {
                println!("no new chunks left today");
            }
            for chunk in granted {
                let range = chunk.digit_range(size);
                println!(
                    "chunk {:>4}  {}",
                    chunk.chunk_index,
                    render(digits.slice(range.start, size))
                );
            }
        }
        Cmd::Review { chunk, rating } => {
            let db = cli.open_db()?;
            let mut learning = learning_store(&cli, &cfg, &db);
            let progress = learning.save_review(cfg.constant, chunk, rating, Local::now());
            match progress.next_review_date {
                Some(next) => println!(
                    "chunk {chunk}: {:?}, next review {}",
                    progress.state,
                    next.format("%Y-%m-%d %H:%M")
                ),
                None => println!("chunk {chunk}: {:?}", progress.state),
            }
        }
    }

    Ok(())
}

fn load_digits(cfg: &Config) -> Result<DigitBuffer> {
    let digits = match &cfg.digits_dir {
        Some(dir) => DigitBuffer::from_dir(dir, cfg.constant)
            .with_context(|| format!("loading {} digits from {}", cfg.constant, dir.display()))?,
        None => DigitBuffer::bundled(cfg.constant)?,
    };
    if digits.total_digits() == 0 {
        bail!("no digits available for {}", cfg.constant);
    }
    Ok(digits)
}

fn learning_store<'a>(cli: &Cli, cfg: &Config, db: &'a StatsDb) -> LearningStore<&'a StatsDb> {
    let mut learning = LearningStore::with_defaults(db, cfg.learning_config());
    if cli.touches_learning() {
        learning.configure(cfg.constant, cfg.learning_config());
    }
    learning
}

fn practice(cfg: &Config, digits: DigitBuffer, db: &StatsDb) -> Result<()> {
    let mut records = PersonalBestStore::new(db);
    let ghost = if cfg.mode.has_ghost() {
        records.ghost_for(cfg.constant, cfg.ghost_kind).cloned()
    } else {
        None
    };
    if cfg.mode.has_ghost() && ghost.is_none() {
        println!("no personal best to race yet; the game runs without a ghost");
    }

    let mut trainer = Trainer::new(cfg.constant, cfg.mode, digits, db, SystemClock, ghost.as_ref());
    if cfg.mode == SessionMode::Learn {
        trainer = trainer.with_segment(cfg.segment());
    }

    let mut stdout = io::stdout();
    {
        let mut screen = RawScreen::enter(&mut stdout)?;
        run_session(&mut trainer, screen.out())?;
    }

    let summary = trainer.conclude(&mut records, db);
    print_summary(&summary, cfg, db);
    Ok(())
}

/// Raw mode and the alternate screen, both undone when dropped.
struct RawScreen<'a, W: Write> {
    out: &'a mut W,
}

impl<'a, W: Write> RawScreen<'a, W> {
    fn enter(out: &'a mut W) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut screen = RawScreen { out };
        execute!(screen.out, EnterAlternateScreen, cursor::Hide)?;
        Ok(screen)
    }

    fn out(&mut self) -> &mut W {
        self.out
    }
}

impl<W: Write> Drop for RawScreen<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = execute!(self.out, cursor::Show, LeaveAlternateScreen) {
            log::warn!("failed to leave the alternate screen: {e}");
        }
        if let Err(e) = disable_raw_mode() {
            log::warn!("failed to disable raw mode: {e}");
        }
    }
}

fn run_session<S, W>(trainer: &mut Trainer<S, &StatsDb, SystemClock>, out: &mut W) -> Result<()>
where
    S: DigitSource,
    W: Write,
{
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let help = format!(
        "{} {} mode | digits to type, backspace to fix, ? for a hint, esc to stop",
        trainer.engine().constant().symbol(),
        trainer.mode()
    );

    loop {
        queue!(
            out,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::All),
            Print(&help),
            cursor::MoveTo(0, 2),
            Print(trainer.status_line())
        )?;
        out.flush()?;

        if trainer.handle(&runner.step()) == Flow::Done {
            return Ok(());
        }
    }
}

fn print_summary(summary: &SessionSummary, cfg: &Config, db: &StatsDb) {
    let Some(record) = &summary.record else {
        println!("no digits typed");
        return;
    };
    println!(
        "{} {}: {} correct, {} errors, {:.1} dpm, {:.0}% accuracy",
        record.constant.symbol(),
        record.mode,
        record.correct_digits(),
        record.errors,
        record.digits_per_minute,
        record.accuracy()
    );
    if let Some(segment) = record.segment {
        println!(
            "segment {}-{}: {} full loop(s)",
            segment.start, segment.end, record.loops
        );
    }
    match summary.verdict.was_victory {
        Some(true) => println!("you beat the ghost"),
        Some(false) => println!("the ghost won"),
        None => {}
    }
    for kind in &summary.new_records {
        println!("new {kind} record!");
    }
    if let Some(streak) = summary.daily_streak {
        println!("daily streak: {} day(s)", streak.current);
    }
    if record.correct_digits() > 0 {
        if let Ok(highest) = db.read_highest_index(cfg.constant.key()) {
            println!("furthest digit ever reached: {}", highest + 1);
        }
    }
}

fn print_records(only: Option<Constant>, db: &StatsDb) {
    let mut records = PersonalBestStore::new(db);
    let constants: Vec<Constant> = match only {
        Some(c) => vec![c],
        None => Constant::ALL.to_vec(),
    };
    for constant in constants {
        for kind in RecordKind::ALL {
            match records.record(constant, kind) {
                Some(r) => println!(
                    "{:<3} {:<9} {:>5} digits in {:>7.2}s ({:.1} dpm) on {}",
                    constant.symbol(),
                    kind,
                    r.digit_count,
                    r.total_time,
                    r.digits_per_minute(),
                    r.date.format("%Y-%m-%d")
                ),
                None => println!("{:<3} {:<9} -", constant.symbol(), kind),
            }
        }
    }
}

fn print_history(cfg: &Config, db: &StatsDb, limit: usize) -> Result<()> {
    let history = db.load_history(cfg.constant)?;
    let summary = HistorySummary::from_records(&history);
    println!(
        "{}: {} sessions, {} digits, mean {:.1} dpm, best {:.1} dpm, accuracy {:.0}%, best streak {}",
        cfg.constant.symbol(),
        summary.sessions,
        summary.correct_digits,
        summary.mean_dpm,
        summary.best_dpm,
        summary.accuracy,
        db.best_streak(cfg.constant)?
    );

    let mut streak = db.load_daily_streak()?;
    streak.refresh(SystemClock.now());
    println!("daily streak: {} day(s)", streak.current);

    for session in history.iter().take(limit) {
        let segment = session
            .segment
            .map(|s| format!("  segment {}-{} x{}", s.start, s.end, session.loops))
            .unwrap_or_default();
        println!(
            "{}  {:<8} {:>5} digits {:>3} errors {:>6.1} dpm{segment}",
            session.date.format("%Y-%m-%d %H:%M"),
            session.mode,
            session.correct_digits(),
            session.errors,
            session.digits_per_minute
        );
    }
    Ok(())
}
