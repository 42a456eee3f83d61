//! Delivery dispatch sequencing CLI.
//!
//! Stores each assignee's daily delivery order under `.dispatch/` and lets
//! it be inspected, seeded and re-sequenced one adjacent move at a time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use dispatch::core::types::{DispatchItem, SequenceKey};
use dispatch::error::SequenceError;
use dispatch::exit_codes;
use dispatch::io::init::{InitOptions, init_dispatch, open_service};
use dispatch::logging;
use dispatch::notice::Notice;
use dispatch::resequence::{MoveSpec, resequence};
use dispatch::session::CommitOutcome;

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Sequence daily delivery routes with urgent-first ordering"
)]
struct Cli {
    /// Project directory (contains .dispatch/).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct KeyArgs {
    /// Assignee (driver or staff member) id.
    #[arg(long)]
    assignee: String,

    /// Delivery date (YYYY-MM-DD).
    #[arg(long)]
    date: NaiveDate,
}

impl KeyArgs {
    fn key(&self) -> SequenceKey {
        SequenceKey::new(self.assignee.clone(), self.date)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create `.dispatch/` with a default config.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the stored order for an assignee and date.
    Show {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Replace the stored sequence. Suffix an id with `!` to mark it urgent.
    Seed {
        #[command(flatten)]
        key: KeyArgs,

        /// Comma-separated ids in order, e.g. `po-1!,po-2,po-3`.
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<String>,
    },
    /// Apply adjacent moves in order and save the result.
    Reorder {
        #[command(flatten)]
        key: KeyArgs,

        /// Move to apply, `up:<index>` or `down:<index>` (0-based). Repeatable.
        #[arg(long = "move", value_name = "DIR:INDEX", required = true)]
        moves: Vec<MoveSpec>,

        /// Print the resulting order without saving it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Show { key } => cmd_show(&cli.root, &key),
        Command::Seed { key, items } => cmd_seed(&cli.root, &key, &items),
        Command::Reorder {
            key,
            moves,
            dry_run,
        } => cmd_reorder(&cli.root, &key, &moves, dry_run),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_dispatch(root, &InitOptions { force })?;
    println!("initialized {}", paths.dispatch_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_show(root: &Path, key: &KeyArgs) -> Result<i32> {
    let (_, service) = open_service(root)?;
    let items = service.read_sequence(&key.key())?;
    print_sequence(&items);
    Ok(exit_codes::OK)
}

fn cmd_seed(root: &Path, key: &KeyArgs, raw: &[String]) -> Result<i32> {
    let (_, service) = open_service(root)?;
    let items = parse_items(raw)?;
    service
        .write_sequence(&key.key(), &items)
        .with_context(|| format!("seed {}", key.key()))?;
    print_sequence(&items);
    Ok(exit_codes::OK)
}

fn cmd_reorder(root: &Path, key: &KeyArgs, moves: &[MoveSpec], dry_run: bool) -> Result<i32> {
    let (cfg, service) = open_service(root)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("build tokio runtime")?;

    let run = resequence(&service, key.key(), moves, dry_run, cfg.max_sequence_len);
    match runtime.block_on(run) {
        Ok(report) => {
            for (position, id) in report.order.iter().enumerate() {
                println!("{:>3}. {}", position, id);
            }
            match report.commit {
                Some(CommitOutcome::Saved) => println!("{}", cfg.notices.saved),
                Some(CommitOutcome::NothingToSave | CommitOutcome::Stale) => {
                    println!("no changes to save")
                }
                None => println!("dry run: {} swap(s), not saved", report.swaps),
            }
            Ok(exit_codes::OK)
        }
        Err(err) => {
            let notice = Notice::for_error(&err, &cfg.notices);
            eprintln!("{}", notice.message);
            if let Some(detail) = notice.detail {
                eprintln!("{}", detail);
            }
            Ok(match err {
                SequenceError::ConstraintViolation { .. } => exit_codes::REJECTED,
                _ => exit_codes::INVALID,
            })
        }
    }
}

/// Parse `id` / `id!` tokens into items (`!` marks urgent).
fn parse_items(raw: &[String]) -> Result<Vec<DispatchItem>> {
    let mut items = Vec::with_capacity(raw.len());
    for token in raw {
        let token = token.trim();
        let (id, is_urgent) = match token.strip_suffix('!') {
            Some(id) => (id.trim(), true),
            None => (token, false),
        };
        if id.is_empty() {
            bail!("empty item id in '{}'", token);
        }
        items.push(DispatchItem::new(id, is_urgent));
    }
    Ok(items)
}

fn print_sequence(items: &[DispatchItem]) {
    if items.is_empty() {
        println!("(no deliveries)");
        return;
    }
    for (position, item) in items.iter().enumerate() {
        let marker = if item.is_urgent { " [urgent]" } else { "" };
        println!("{:>3}. {}{}", position, item.id, marker);
    }
}
