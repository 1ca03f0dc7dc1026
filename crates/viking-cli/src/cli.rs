//! CLI definition and command dispatch for Viking.
//!
//! Every command opens the engine from configuration, runs against the
//! access facade as one identity, then drains the embedding queue and shuts
//! the engine down so local backends are consistent for the next run.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--account`, ...)
//! 2. Environment variables (`VIKING_CONFIG`, `VIKING_ACCOUNT`, ...)
//! 3. Config file (`~/.viking/config.yaml`)
//! 4. Built-in defaults (in-memory backends)
//!
//! Results go to stdout as pretty JSON unless `--table` is given. Errors go
//! to stderr and the process exits non-zero.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};

use viking_core::{
    Identity, ListView, Listing, LsRequest, VikingConfig, VikingEngine, VikingError, VikingResult,
};

use crate::ui::{table, ColorMode, MessageType, Style};

/// How long the engine may spend draining the queue before exit.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

// ============================================================================
// CLI Definition
// ============================================================================

/// Viking - a context filesystem for agents
#[derive(Parser, Debug)]
#[command(name = "viking")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "VIKING_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.viking/config.yaml)
    #[arg(long, global = true, env = "VIKING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto
    #[arg(long, global = true, env = "VIKING_COLOR", default_value = "auto")]
    pub color: ColorMode,

    /// Account to act as
    #[arg(long, global = true, env = "VIKING_ACCOUNT", default_value = "default")]
    pub account: String,

    /// User to act as
    #[arg(long, global = true, env = "VIKING_USER", default_value = "default")]
    pub user: String,

    /// Agent to act as
    #[arg(long, global = true, env = "VIKING_AGENT", default_value = "default")]
    pub agent: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Shared listing flags for `ls` and `tree`.
#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    /// Output shape: original or agent
    #[arg(long, default_value = "original")]
    pub view: String,

    /// Abstract truncation for the agent view
    #[arg(long)]
    pub abs_limit: Option<usize>,

    /// Include dot-files such as the digest companions
    #[arg(short, long)]
    pub all: bool,

    /// Cap on returned nodes
    #[arg(long)]
    pub node_limit: Option<usize>,

    /// Cap on recursion depth
    #[arg(long)]
    pub level_limit: Option<usize>,
}

impl ListArgs {
    fn to_request(&self, recursive: bool, simple: bool) -> VikingResult<LsRequest> {
        Ok(LsRequest {
            recursive,
            simple,
            view: self.view.parse::<ListView>()?,
            abs_limit: self.abs_limit,
            show_hidden: self.all,
            node_limit: self.node_limit,
            level_limit: self.level_limit,
        })
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a directory
    #[command(after_help = r#"EXAMPLES:
    # The five roots
    viking ls

    # Shared resources, recursively, as uris only
    viking ls viking://resources -r --simple

    # Agent view with short abstracts
    viking ls viking://resources --view agent --abs-limit 80

    # Human-readable table
    viking ls viking://resources --table
"#)]
    Ls {
        /// Directory uri
        #[arg(default_value = "viking://")]
        uri: String,

        /// Walk the subtree
        #[arg(short, long)]
        recursive: bool,

        /// Return uris only
        #[arg(long)]
        simple: bool,

        /// Render a table instead of JSON (original view only)
        #[arg(long)]
        table: bool,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Show a subtree as nested nodes
    #[command(after_help = r#"EXAMPLES:
    viking tree viking://resources --level-limit 2
"#)]
    Tree {
        /// Directory uri
        #[arg(default_value = "viking://")]
        uri: String,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Show metadata for one node
    Stat {
        /// Node uri
        uri: String,
    },

    /// Read a file
    #[command(after_help = r#"EXAMPLES:
    # Whole file
    viking read viking://resources/notes.md

    # 200 characters starting at character 100
    viking read viking://resources/notes.md --offset 100 --limit 200
"#)]
    Read {
        /// File uri
        uri: String,

        /// First character to return
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Characters to return; negative means to the end
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },

    /// Read or set a directory's L0 abstract
    #[command(after_help = r#"EXAMPLES:
    viking abstract viking://resources/docs
    viking abstract viking://resources/docs --set "Product documentation"
"#)]
    Abstract {
        /// Directory uri
        uri: String,

        /// Replace the abstract with this text
        #[arg(long, value_name = "TEXT")]
        set: Option<String>,
    },

    /// Read or set a directory's L1 overview
    Overview {
        /// Directory uri
        uri: String,

        /// Replace the overview with this text
        #[arg(long, value_name = "TEXT")]
        set: Option<String>,
    },

    /// Create a directory and its parents
    Mkdir {
        /// Directory uri
        uri: String,
    },

    /// Remove a node and its vectors
    #[command(after_help = r#"EXAMPLES:
    viking rm viking://resources/old.md
    viking rm viking://resources/archive -r
"#)]
    Rm {
        /// Node uri
        uri: String,

        /// Remove a non-empty directory
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move a node or subtree
    Mv {
        /// Source uri
        from: String,

        /// Destination uri (must not exist)
        to: String,
    },

    /// Write a file and queue it for embedding
    #[command(after_help = r#"EXAMPLES:
    viking write viking://resources/notes.md "Meeting notes"
    viking write viking://resources/design.md --file ./design.md
    cat draft.md | viking write viking://user/default/memories/draft.md
"#)]
    Write {
        /// File uri
        uri: String,

        /// Content; read from --file or stdin when omitted
        #[arg(conflicts_with = "file")]
        content: Option<String>,

        /// Read content from a local file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Regex search over file contents
    Grep {
        /// Base uri
        uri: String,

        /// Regular expression
        pattern: String,

        /// Case-insensitive matching
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Cap on visited nodes
        #[arg(long)]
        node_limit: Option<usize>,
    },

    /// Match uris against a glob pattern
    #[command(after_help = r#"EXAMPLES:
    viking glob "**/*.md" --uri viking://resources
"#)]
    Glob {
        /// Glob pattern, relative to the base uri
        pattern: String,

        /// Base uri (default: the namespace root)
        #[arg(long)]
        uri: Option<String>,

        /// Cap on visited nodes
        #[arg(long)]
        node_limit: Option<usize>,
    },

    /// Semantic search across resources, memories, and skills
    #[command(after_help = r#"EXAMPLES:
    viking find "quarterly tax filing"
    viking find "deploy steps" --uri viking://resources/runbooks --limit 5
"#)]
    Find {
        /// Query text
        query: String,

        /// Top-k per partition
        #[arg(long)]
        limit: Option<usize>,

        /// Restrict to a subtree
        #[arg(long)]
        uri: Option<String>,

        /// Render a table instead of JSON
        #[arg(long)]
        table: bool,
    },

    /// Semantic search conditioned on recent session messages
    Search {
        /// Query text
        query: String,

        /// Session whose messages shape the query
        #[arg(long)]
        session: Option<String>,

        /// Top-k per partition
        #[arg(long)]
        limit: Option<usize>,

        /// Render a table instead of JSON
        #[arg(long)]
        table: bool,
    },

    /// Append a message to a session log
    #[command(after_help = r#"EXAMPLES:
    viking session chat-1 user "I need help with my visa"
"#)]
    Session {
        /// Session id ([A-Za-z0-9_-])
        session_id: String,

        /// Speaker role
        role: String,

        /// Message text
        content: String,
    },

    /// Store an image, audio, or video file with a generated summary
    AddMedia {
        /// Local file
        path: PathBuf,

        /// Stored file name (default: the local file name)
        #[arg(long)]
        name: Option<String>,

        /// Format override, e.g. png or mp3
        #[arg(long)]
        format: Option<String>,
    },

    /// Wait for queued embeddings to finish
    Wait {
        /// Seconds to wait
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// Show embedding queue counters
    Status,

    /// Check backend readiness
    Ready {
        /// Render a table instead of JSON
        #[arg(long)]
        table: bool,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parse arguments, run one command, and map the outcome to an exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always; debug with --verbose. Logs go to stderr so stdout
    // stays parseable.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "viking_core={0},viking_db={0},viking_model={0},viking_cli={0}",
        log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let style = Style::new(cli.color);

    let identity = match Identity::new(&cli.account, &cli.user, &cli.agent) {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context(
                    "Invalid identity",
                    Some(&e.to_string()),
                    Some("Use --account/--user/--agent with [A-Za-z0-9_-] only"),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let config = match VikingConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error(&style, "Failed to load configuration", &e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!(
                "{}",
                style.message(MessageType::Err, &format!("Failed to start runtime: {}", e))
            );
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let engine = match VikingEngine::from_config(&config).await {
            Ok(engine) => engine,
            Err(e) => {
                print_error(&style, "Failed to initialize Viking engine", &e);
                return ExitCode::FAILURE;
            }
        };

        let outcome = dispatch(&engine, &identity, cli.command).await;

        if let Err(e) = engine.shutdown(SHUTDOWN_DRAIN).await {
            warn!("shutdown failed: {}", e);
        }

        match outcome {
            Ok(code) => code,
            Err(e) => {
                print_error(&style, &e.to_string(), &e);
                ExitCode::FAILURE
            }
        }
    })
}

fn print_error(style: &Style, msg: &str, err: &VikingError) {
    let line = match err {
        VikingError::Config { message, hint } => {
            style.error_with_context(msg, Some(message), Some(hint))
        }
        VikingError::NotInitialized => style.error_with_context(
            msg,
            None,
            Some("The engine is starting or stopping; retry the command"),
        ),
        _ if msg == err.to_string() => style.message(MessageType::Err, msg),
        _ => style.error_with_context(msg, Some(&err.to_string()), None),
    };
    eprintln!("{}", line);
}

// ============================================================================
// Command handlers
// ============================================================================

async fn dispatch(engine: &VikingEngine, identity: &Identity, command: Command) -> VikingResult<ExitCode> {
    let service = engine.service();
    debug!(account = identity.account_id(), user = identity.user_id(), agent = identity.agent_id(), "dispatching command");

    match command {
        Command::Ls {
            uri,
            recursive,
            simple,
            table: as_table,
            list,
        } => {
            let request = list.to_request(recursive, simple)?;
            let listing = service.ls(&uri, identity, &request).await?;
            match (&listing, as_table) {
                (Listing::Original(entries), true) => println!("{}", table::render_entries_table(entries)),
                _ => print_json(&listing)?,
            }
        }
        Command::Tree { uri, list } => {
            let request = list.to_request(true, false)?;
            print_json(&service.tree(&uri, identity, &request).await?)?;
        }
        Command::Stat { uri } => print_json(&service.stat(&uri, identity).await?)?,
        Command::Read { uri, offset, limit } => {
            print!("{}", service.read(&uri, identity, offset, limit).await?);
        }
        Command::Abstract { uri, set: Some(text) } => {
            print_json(&service.write_abstract(&uri, &text, identity).await?)?;
        }
        Command::Abstract { uri, set: None } => {
            println!("{}", service.read_abstract(&uri, identity).await?);
        }
        Command::Overview { uri, set: Some(text) } => {
            print_json(&service.write_overview(&uri, &text, identity).await?)?;
        }
        Command::Overview { uri, set: None } => {
            println!("{}", service.read_overview(&uri, identity).await?);
        }
        Command::Mkdir { uri } => {
            service.mkdir(&uri, identity).await?;
            print_json(&serde_json::json!({ "uri": uri }))?;
        }
        Command::Rm { uri, recursive } => {
            let removed = service.rm(&uri, recursive, identity).await?;
            print_json(&serde_json::json!({ "uri": uri, "removedVectors": removed }))?;
        }
        Command::Mv { from, to } => {
            service.mv(&from, &to, identity).await?;
            print_json(&serde_json::json!({ "from": from, "to": to }))?;
        }
        Command::Write { uri, content, file } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => read_local_text(&path).await?,
                (None, None) => read_stdin()?,
            };
            print_json(&service.write(&uri, &content, identity).await?)?;
        }
        Command::Grep {
            uri,
            pattern,
            ignore_case,
            node_limit,
        } => {
            print_json(&service.grep(&uri, &pattern, ignore_case, node_limit, identity).await?)?;
        }
        Command::Glob {
            pattern,
            uri,
            node_limit,
        } => {
            print_json(&service.glob(&pattern, uri.as_deref(), node_limit, identity).await?)?;
        }
        Command::Find {
            query,
            limit,
            uri,
            table: as_table,
        } => {
            let result = service.find(&query, identity, limit, uri.as_deref()).await?;
            if as_table {
                println!("{}", table::render_matches_table(&result.merged()));
            } else {
                print_json(&result)?;
            }
        }
        Command::Search {
            query,
            session,
            limit,
            table: as_table,
        } => {
            let result = service.search(&query, identity, session.as_deref(), limit).await?;
            if as_table {
                println!("{}", table::render_matches_table(&result.merged()));
            } else {
                print_json(&result)?;
            }
        }
        Command::Session {
            session_id,
            role,
            content,
        } => {
            print_json(&service.append_session_message(&session_id, &role, &content, identity).await?)?;
        }
        Command::AddMedia { path, name, format } => {
            let name = match name {
                Some(name) => name,
                None => local_file_name(&path)?,
            };
            let data = tokio::fs::read(&path).await?;
            print_json(&service.add_media(&name, &data, format.as_deref(), identity).await?)?;
        }
        Command::Wait { timeout } => {
            let remaining = engine.wait_processed(Duration::from_secs(timeout)).await;
            print_json(&engine.queue_status())?;
            if remaining > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Status => print_json(&engine.queue_status())?,
        Command::Ready { table: as_table } => {
            let report = engine.readiness().await;
            if as_table {
                println!("{}", table::render_readiness_table(&report));
            } else {
                print_json(&report)?;
            }
            if !report.ready {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helpers
// ============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> VikingResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_local_text(path: &Path) -> VikingResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_stdin() -> VikingResult<String> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

fn local_file_name(path: &Path) -> VikingResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            VikingError::validation("path", format!("{} has no file name", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_read_accepts_negative_limit() {
        let cli = Cli::try_parse_from(["viking", "read", "viking://resources/a.md", "--limit", "-1"]).unwrap();
        match cli.command {
            Command::Read { limit, offset, .. } => {
                assert_eq!(limit, -1);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_list_args_build_request() {
        let cli = Cli::try_parse_from([
            "viking", "ls", "viking://resources", "-r", "--view", "agent", "--abs-limit", "40", "-a",
        ])
        .unwrap();
        let Command::Ls { recursive, simple, list, .. } = cli.command else {
            panic!("expected ls");
        };
        let request = list.to_request(recursive, simple).unwrap();
        assert!(request.recursive);
        assert!(request.show_hidden);
        assert_eq!(request.view, ListView::Agent);
        assert_eq!(request.abs_limit, Some(40));
        assert_eq!(request.node_limit, None);
    }

    #[test]
    fn test_unknown_view_is_rejected() {
        let cli = Cli::try_parse_from(["viking", "ls", "--view", "fancy"]).unwrap();
        let Command::Ls { list, .. } = cli.command else {
            panic!("expected ls");
        };
        assert!(list.to_request(false, false).is_err());
    }
}
