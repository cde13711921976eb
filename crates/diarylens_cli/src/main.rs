//! Command-line caller for `diarylens_core`.
//!
//! # Responsibility
//! - Open the configured store for one session and run a single read
//!   operation.
//! - Render entries the way the diary browser does (full card or snippets).

use clap::{Parser, Subcommand};
use diarylens_core::{
    bind_session, default_log_level, init_logging, DiaryEntry, EntryId, EntryRepository,
    RepoError, SessionId, SimilarQuery, SqliteEntryRepository, StoreConfig,
};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

const SNIPPET_CHARS: usize = 80;

#[derive(Parser, Debug)]
#[command(name = "diarylens", version, about = "Browse diary entries by embedding similarity")]
struct Args {
    /// Store file or `.zip` archive. Defaults to `DB_LOCATION`.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off without it.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one entry
    Entry {
        id: EntryId,
    },
    /// List every tag in the corpus
    Tags,
    /// Show entries similar to the given one
    Similar {
        id: EntryId,

        /// Number of entries to show
        #[arg(short, long, default_value_t = 5)]
        n: usize,

        /// Required tag; repeat to require several
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Hide entries by the same author
        #[arg(long, default_value = "false")]
        exclude_same_author: bool,
    },
    /// Show the entry this session starts on
    Start,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let session = SessionId::new();
    let _session_binding = bind_session(session);

    let mut config = StoreConfig::from_env();
    if let Some(store) = args.store.clone() {
        config.location = store;
    }

    let mut repo = match SqliteEntryRepository::open_with_session(&config, session) {
        Ok(repo) => repo,
        Err(err) => {
            error!("event=cli_open module=cli status=error error={err}");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&mut repo, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(repo: &mut SqliteEntryRepository, args: &Args) -> Result<(), RepoError> {
    match &args.command {
        Command::Entry { id } => {
            let entry = repo.fetch_by_id(*id)?;
            print_card(&entry, args.json);
        }
        Command::Start => {
            let entry = repo.fetch_by_id(repo.session().starting_entry())?;
            print_card(&entry, args.json);
        }
        Command::Tags => {
            let tags = repo.all_tags()?;
            if args.json {
                println!("{}", serde_json::json!(tags));
            } else {
                tags.iter().for_each(|tag| println!("{tag}"));
            }
        }
        Command::Similar {
            id,
            n,
            tags,
            exclude_same_author,
        } => {
            let target = repo.fetch_by_id(*id)?;
            let query = SimilarQuery::new(*id)
                .limit(*n)
                .with_tags(tags.iter().cloned())
                .allow_same_person(!exclude_same_author);
            match repo.similar(&query) {
                Ok(entries) => print_snippets(&target, &entries, args.json),
                Err(RepoError::NotFound(_)) if !args.json => {
                    println!("no similar entries found");
                }
                Err(RepoError::NotFound(_)) => println!("[]"),
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

fn print_card(entry: &DiaryEntry, json: bool) {
    if json {
        println!("{}", serde_json::json!(entry));
        return;
    }
    println!("# {}  (author {})", entry.id, entry.person_id);
    println!("{}", entry.plain_text());
    println!("{}", entry.corpus_url());
    if !entry.tags.is_empty() {
        println!("tags: {}", entry.tags.join(", "));
    }
}

fn print_snippets(target: &DiaryEntry, entries: &[DiaryEntry], json: bool) {
    if json {
        println!("{}", serde_json::json!(entries));
        return;
    }
    for entry in entries {
        let marker = if entry.is_same_author(target) {
            "  – same author"
        } else {
            ""
        };
        println!("[{}] {}{marker}", entry.id, entry.snippet(SNIPPET_CHARS));
    }
}
