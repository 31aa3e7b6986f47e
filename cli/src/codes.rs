use crate::client::CommandClient;
use autoshift_codes::Collection;
use autoshift_codes::Game;
use autoshift_codes::Platform;
use autoshift_codes::Redeemer;
use autoshift_codes::ShiftCode;
use autoshift_codes::discovery::Discovery;
use autoshift_codes::discovery::ParserRegistry;
use autoshift_codes::discovery::text::TextFeedParser;
use autoshift_codes::factory;
use autoshift_codes::redeem::UnresolvedPolicy;
use autoshift_codes::run::RunOptions;
use autoshift_codes::run::StopReason;
use autoshift_codes::store::CodeStore;
use autoshift_codes::types::CodeKind;
use autoshift_codes::types::Scope;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Collect and redeem SHiFT codes.
#[derive(Debug, Parser)]
#[command(name = "autoshift", version)]
pub struct Cli {
    /// Directory holding the code store (default: $AUTOSHIFT_HOME or the
    /// platform data directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, clap::Args)]
pub struct ScopeArgs {
    /// bl1, bl2, blps, bl3, ttw or bl4
    #[arg(long)]
    pub game: Game,
    /// steam, epic, psn, xboxlive, stadia or nintendo
    #[arg(long)]
    pub platform: Platform,
}

impl ScopeArgs {
    fn scope(&self) -> Scope {
        Scope::new(self.game, self.platform)
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List codes of one game and platform, newest first.
    List {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Only codes that were not redeemed yet
        #[arg(long)]
        unredeemed: bool,
    },
    /// Add a single code by hand.
    Add {
        #[command(flatten)]
        scope: ScopeArgs,
        code: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        expires: String,
    },
    /// Pull new codes out of a text feed.
    Discover {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Text file containing codes, one or more per line
        #[arg(long)]
        feed: PathBuf,
    },
    /// Redeem open codes, newest first.
    Redeem {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Command called as `<redeemer> <code> <platform>`; its first word
        /// of output is the status
        #[arg(long)]
        redeemer: String,
        /// Redeem only this code
        #[arg(long)]
        code: Option<String>,
        /// Stop after this many codes were settled
        #[arg(long)]
        limit: Option<usize>,
        /// all, golden or non-golden
        #[arg(long, default_value = "all")]
        kind: CodeKind,
        /// skip, halt or retry:N
        #[arg(long, default_value = "skip")]
        on_unresolved: UnresolvedPolicy,
        /// When rate limited, wait this many seconds and keep going
        #[arg(long)]
        wait_on_halt: Option<u64>,
    },
    /// Export all codes as JSONL to stdout.
    Export,
    /// Import JSONL codes from stdin.
    Import,
    /// Migrate a JSONL file to a SQLite database.
    Migrate {
        /// Path to the source JSONL file
        #[arg(long)]
        jsonl: PathBuf,
        /// Path to the destination SQLite database file
        #[arg(long)]
        sqlite: PathBuf,
    },
    /// Compact a JSONL file by removing duplicate and malformed entries.
    Compact {
        /// Input JSONL file to compact
        #[arg(long)]
        input: PathBuf,
        /// Output JSONL file to write results
        #[arg(long)]
        output: PathBuf,
    },
    /// Show basic statistics about stored codes.
    Stats,
}

/// Execute one command.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Migrate { jsonl, sqlite } => {
            let n = autoshift_codes::migrate::migrate_jsonl_to_sqlite(&jsonl, &sqlite)?;
            println!("Migrated {n} entries");
        }
        Command::Compact { input, output } => {
            let (read, written) = autoshift_codes::migrate::compact_jsonl(&input, &output)?;
            println!("Read {read} entries, wrote {written} entries");
        }
        cmd => {
            let data_dir = cli.data_dir.unwrap_or_else(factory::default_data_dir);
            let store = factory::open_store(&data_dir, None)?;
            run_with_store(cmd, store)?;
        }
    }
    Ok(())
}

fn open_collection(store: Arc<dyn CodeStore>, scope: &ScopeArgs) -> anyhow::Result<Collection> {
    let mut collection = Collection::new(store);
    collection.query(Some(scope.game), Some(scope.platform), true)?;
    Ok(collection)
}

fn run_with_store(cmd: Command, store: Arc<dyn CodeStore>) -> anyhow::Result<()> {
    match cmd {
        Command::List { scope, unredeemed } => {
            let collection = open_collection(store, &scope)?;
            for code in collection
                .newest_first()
                .filter(|c| !unredeemed || !c.redeemed())
            {
                println!("{}", list_line(code));
            }
        }
        Command::Add {
            scope,
            code,
            description,
            expires,
        } => {
            let mut collection = open_collection(store, &scope)?;
            if collection.merge([ShiftCode::new(code.clone(), description, expires)]) == 0 {
                println!("{code} is already known for {}", scope.scope());
            } else {
                collection.commit()?;
                println!("Added {code} for {}", scope.scope());
            }
        }
        Command::Discover { scope, feed } => {
            let mut registry = ParserRegistry::new();
            registry.register(scope.scope(), Arc::new(TextFeedParser::new(&feed)?));
            let discovery = Discovery::new(registry);
            let mut collection = open_collection(store, &scope)?;
            let Some(report) = discovery.discover_now(&mut collection) else {
                anyhow::bail!("discovery for {} did not run", scope.scope());
            };
            println!("{}: {} new codes", report.message(), report.added);
            if let Some(e) = report.error {
                anyhow::bail!("discovery for {} failed: {e}", report.scope);
            }
        }
        Command::Redeem {
            scope,
            redeemer,
            code,
            limit,
            kind,
            on_unresolved,
            wait_on_halt,
        } => {
            let mut collection = open_collection(store, &scope)?;
            let mut client = CommandClient::new(&redeemer, scope.platform)?;
            let mut redeemer = Redeemer::new(on_unresolved);
            match code {
                Some(code) => {
                    let outcome = redeemer.redeem(&mut collection, &code, &mut client)?;
                    println!("{}", outcome.message);
                }
                None => redeem_all(
                    &mut redeemer,
                    &mut collection,
                    &mut client,
                    RunOptions {
                        limit,
                        kind,
                        stop: None,
                    },
                    wait_on_halt.map(Duration::from_secs),
                )?,
            }
        }
        Command::Export => {
            let mut out = std::io::stdout();
            store.export(&mut out)?;
        }
        Command::Import => {
            let mut input = std::io::stdin();
            let n = store.import(&mut input)?;
            println!("Imported {n} codes");
        }
        Command::Stats => {
            let stats = store.stats()?;
            println!("{stats}");
        }
        Command::Migrate { .. } | Command::Compact { .. } => {
            anyhow::bail!("file commands do not use the code store")
        }
    }
    Ok(())
}

/// Run until exhausted, halted or limited. A rate limit either ends the
/// run or, with `wait`, pauses and resumes where it stopped.
fn redeem_all(
    redeemer: &mut Redeemer,
    collection: &mut Collection,
    client: &mut CommandClient,
    mut options: RunOptions,
    wait: Option<Duration>,
) -> anyhow::Result<()> {
    let mut settled = 0;
    loop {
        let report = autoshift_codes::run::run(redeemer, collection, client, &options, |o| {
            println!("{}", o.message)
        })?;
        settled += report.settled;
        match (report.stop, wait) {
            (StopReason::RateLimited, Some(wait)) => {
                tracing::info!("rate limited, waiting {}s", wait.as_secs());
                std::thread::sleep(wait);
                options.limit = options.limit.map(|l| l.saturating_sub(report.settled));
            }
            (stop, _) => {
                println!("Settled {settled} codes ({stop:?})");
                return Ok(());
            }
        }
    }
}

fn list_line(code: &ShiftCode) -> String {
    let mark = if code.redeemed() { "x" } else { " " };
    let mut line = format!("[{mark}] {}", code.code);
    let description = code.one_line_description();
    if !description.is_empty() {
        line.push_str("  ");
        line.push_str(&description);
    }
    if !code.expires.is_empty() {
        line.push_str(&format!("  (expires {})", code.expires));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_line_flattens_descriptions() {
        let mut code = ShiftCode::new("AAAAA", "3 Golden Keys\nvia twitter", "2024-01-01");
        assert_eq!(
            list_line(&code),
            "[ ] AAAAA  3 Golden Keys / via twitter  (expires 2024-01-01)"
        );
        code.mark_redeemed();
        code.description.clear();
        code.expires.clear();
        assert_eq!(list_line(&code), "[x] AAAAA");
    }

    #[test]
    fn redeem_flags_parse() {
        let cli = Cli::try_parse_from([
            "autoshift",
            "redeem",
            "--game",
            "bl3",
            "--platform",
            "xbox",
            "--redeemer",
            "echo success",
            "--kind",
            "golden",
            "--on-unresolved",
            "retry:2",
        ])
        .unwrap();
        let Command::Redeem {
            scope,
            kind,
            on_unresolved,
            ..
        } = cli.cmd
        else {
            panic!("expected redeem");
        };
        assert_eq!(scope.scope(), Scope::new(Game::Bl3, Platform::Xbox));
        assert_eq!(kind, CodeKind::Golden);
        assert_eq!(on_unresolved, UnresolvedPolicy::Retry { attempts: 2 });
    }
}
