//! thread-compose - Compose, save and schedule threads
//!
//! Unix-style front end to the Threadcast compose workflow.

use std::io::{IsTerminal, Read};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use libthreadcast::logging::{LogFormat, LoggingConfig};
use libthreadcast::service::queue::{short_account, QueueEntry};
use libthreadcast::service::{ComposeReport, ComposeRequest, ThreadcastService};
use libthreadcast::{ComposeError, Config, PostStatus, Queue, ThreadComposer, ThreadcastError};
use tracing::debug;

/// Line separating segments when a thread is read from stdin
const SEGMENT_SEPARATOR: &str = "---";

#[derive(Parser, Debug)]
#[command(name = "thread-compose")]
#[command(version)]
#[command(about = "Compose, save and schedule threads")]
#[command(long_about = "\
thread-compose - Compose, save and schedule threads

DESCRIPTION:
    thread-compose turns a list of segments into a thread, saves it as a
    draft or schedules it for publication. Blank segments are dropped and
    every segment is trimmed before submission.

USAGE EXAMPLES:
    # Save a two-segment draft
    thread-compose draft --account npub1alice \"First part\" \"Second part\"

    # Schedule a thread read from stdin, segments separated by ---
    printf 'one\\n---\\ntwo\\n' | thread-compose schedule --account npub1alice

    # Edit an existing draft and schedule it
    thread-compose schedule --edit <POST_ID> \"Final text\"

    # Retry scheduling after a partial failure
    thread-compose retry-schedule <POST_ID>

    # Create a named queue for an account
    thread-compose queue create --account npub1alice \"Weekly tips\"

CONFIGURATION:
    Configuration file: ~/.config/threadcast/config.toml
    Database location: ~/.local/share/threadcast/posts.db

    Override with environment variables:
        THREADCAST_CONFIG      - Path to config file
        THREADCAST_DB_PATH     - Path to database file
        THREADCAST_LOG_FORMAT  - text, json or pretty
        THREADCAST_LOG_LEVEL   - Log filter, e.g. debug

EXIT CODES:
    0 - Success
    1 - Post could not be saved, or configuration/database error
    3 - Invalid input (empty thread, no account, blank queue name,
        unknown post ID)
    4 - Post saved but not scheduled (use retry-schedule)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save a thread as a draft
    Draft(ComposeArgs),

    /// Save a thread and schedule it
    Schedule(ComposeArgs),

    /// Schedule an already saved post again
    RetrySchedule {
        /// Post ID returned by a failed schedule
        post_id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show a post as it would be loaded for editing
    Show {
        post_id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List an account's posts, newest first
    List {
        /// Account to list (defaults to [defaults] account)
        #[arg(short, long)]
        account: Option<String>,

        /// Only show posts with this status: draft, unscheduled or scheduled
        #[arg(short, long)]
        status: Option<PostStatus>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Count an account's posts by status
    Stats {
        #[arg(short, long)]
        account: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Manage an account's named queues
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommands {
    /// Create a named queue
    Create {
        /// Queue name, unique per account
        name: String,

        /// What the queue is for
        #[arg(short, long)]
        description: Option<String>,

        /// Owning account (defaults to [defaults] account)
        #[arg(short, long)]
        account: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List an account's queues, oldest first
    List {
        #[arg(short, long)]
        account: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Thread segments in order (reads stdin if none are given)
    segments: Vec<String>,

    /// Update this post instead of creating a new one
    #[arg(short, long)]
    edit: Option<String>,

    /// Account that owns a new post (defaults to [defaults] account)
    #[arg(short, long)]
    account: Option<String>,

    /// Post to quote; only used when creating
    #[arg(short, long)]
    quote: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy)]
enum ComposeMode {
    Draft,
    Schedule,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env("error");
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Exit code for failures outside the compose workflow
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<ThreadcastError>()
        .map(ThreadcastError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = Config::load().context("Failed to load configuration")?;
    let service = ThreadcastService::from_config(config).await?;

    match cli.command {
        Commands::Draft(args) => cmd_compose(&service, args, ComposeMode::Draft).await,
        Commands::Schedule(args) => cmd_compose(&service, args, ComposeMode::Schedule).await,
        Commands::RetrySchedule { post_id, format } => {
            let result = service.compose().retry_schedule(&post_id).await;
            Ok(report(&result, format))
        }
        Commands::Show { post_id, format } => {
            cmd_show(&service, &post_id, format).await?;
            Ok(0)
        }
        Commands::List {
            account,
            status,
            format,
        } => {
            let account = resolve_account(&service, account)?;
            let entries = service.queue().list(&account, status).await?;
            output_list(&entries, format)?;
            Ok(0)
        }
        Commands::Stats { account, format } => {
            let account = resolve_account(&service, account)?;
            let stats = service.queue().stats(&account).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("Account:     {}", short_account(&account));
                    println!("Total:       {}", stats.total);
                    println!("Drafts:      {}", stats.drafts);
                    println!("Unscheduled: {}", stats.unscheduled);
                    println!("Scheduled:   {}", stats.scheduled);
                }
            }
            Ok(0)
        }
        Commands::Queue { command } => {
            cmd_queue(&service, command).await?;
            Ok(0)
        }
    }
}

async fn cmd_queue(service: &ThreadcastService, command: QueueCommands) -> anyhow::Result<()> {
    match command {
        QueueCommands::Create {
            name,
            description,
            account,
            format,
        } => {
            let account = resolve_account(service, account)?;
            let queue = service
                .queue()
                .create_queue(&account, &name, description.as_deref())
                .await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&queue)?),
                OutputFormat::Text => println!("Queue created: {}", queue.id),
            }
        }
        QueueCommands::List { account, format } => {
            let account = resolve_account(service, account)?;
            let queues = service.queue().list_queues(&account).await?;
            output_queues(&queues, format)?;
        }
    }
    Ok(())
}

async fn cmd_compose(
    service: &ThreadcastService,
    args: ComposeArgs,
    mode: ComposeMode,
) -> anyhow::Result<i32> {
    let parts = if args.segments.is_empty() {
        read_stdin_segments()?
    } else {
        args.segments
    };

    let composer = build_thread(parts)?;
    debug!(
        segments = composer.len(),
        submittable = composer.is_submittable(),
        "Composed thread"
    );

    let request = ComposeRequest {
        edit_ref: args.edit,
        account_ref: args.account,
        quote_ref: args.quote,
        segments: composer.into_segments(),
    };

    let result = match mode {
        ComposeMode::Draft => service.compose().save_draft(&request).await,
        ComposeMode::Schedule => service.compose().schedule_thread(&request).await,
    };
    Ok(report(&result, args.format))
}

/// Print the outcome and return the process exit code
fn report(
    result: &Result<libthreadcast::service::ComposeOutcome, ComposeError>,
    format: OutputFormat,
) -> i32 {
    if format == OutputFormat::Json {
        match serde_json::to_string(&ComposeReport::from_result(result)) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to encode report: {}", e),
        }
    }

    match result {
        Ok(outcome) => {
            if format == OutputFormat::Text {
                println!("{}: {}", outcome.message, outcome.post_id);
            }
            0
        }
        Err(e) => {
            if format == OutputFormat::Text {
                eprintln!("Error: {}", e);
                if let Some(post_id) = e.post_id() {
                    eprintln!("Retry with: thread-compose retry-schedule {}", post_id);
                }
            }
            e.exit_code()
        }
    }
}

async fn cmd_show(
    service: &ThreadcastService,
    post_id: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let session = service.compose().load_for_edit(post_id).await?;
    let post = &session.post;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "id": post.id,
                "account_ref": post.account_ref,
                "status": post.status(),
                "quote_ref": post.quote_ref,
                "scheduled_at": post.scheduled_at,
                "created_at": post.created_at,
                "updated_at": post.updated_at,
                "segments": session.composer.segments(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("ID:       {}", post.id);
            println!("Account:  {}", short_account(&post.account_ref));
            println!("Status:   {}", post.status());
            if let Some(quote) = &post.quote_ref {
                println!("Quoting:  {}", quote);
            }
            println!("Segments: {}", session.composer.len());
            println!();

            let bodies: Vec<&str> = session
                .composer
                .segments()
                .iter()
                .map(|s| s.content())
                .collect();
            println!("{}", bodies.join(&format!("\n{}\n", SEGMENT_SEPARATOR)));
        }
    }

    Ok(())
}

fn output_list(entries: &[QueueEntry], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Text => {
            for entry in entries {
                println!(
                    "{} | {:<11} | {} segment{} | {}",
                    entry.id,
                    entry.status.as_str(),
                    entry.segments,
                    if entry.segments == 1 { "" } else { "s" },
                    entry.preview
                );
            }
        }
    }
    Ok(())
}

fn output_queues(queues: &[Queue], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(queues)?),
        OutputFormat::Text => {
            for queue in queues {
                let description = queue.description.as_deref().unwrap_or_default();
                println!("{} | {} | {}", queue.id, queue.name, description);
            }
        }
    }
    Ok(())
}

fn resolve_account(
    service: &ThreadcastService,
    account: Option<String>,
) -> anyhow::Result<String> {
    let fallback = service.config().defaults.account.as_deref();
    choose_account(account, fallback).ok_or_else(|| {
        ThreadcastError::InvalidInput(
            "No account given. Pass --account or set [defaults] account".to_string(),
        )
        .into()
    })
}

/// The given account if not blank, else the configured default if not blank
fn choose_account(account: Option<String>, fallback: Option<&str>) -> Option<String> {
    account
        .filter(|a| !a.trim().is_empty())
        .or_else(|| fallback.filter(|a| !a.trim().is_empty()).map(str::to_string))
}

/// Build composer state from segment bodies, one segment per body
fn build_thread(parts: Vec<String>) -> anyhow::Result<ThreadComposer> {
    let mut composer = ThreadComposer::new();
    let mut parts = parts.into_iter();

    if let Some(first) = parts.next() {
        let id = composer.segments()[0].id().clone();
        composer.update_segment(&id, first)?;
    }
    for part in parts {
        composer.push_segment(part);
    }

    Ok(composer)
}

fn read_stdin_segments() -> anyhow::Result<Vec<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(ThreadcastError::InvalidInput(
            "No segments given. Pass them as arguments or pipe them on stdin".to_string(),
        )
        .into());
    }

    let mut input = String::new();
    stdin
        .read_to_string(&mut input)
        .context("Failed to read segments from stdin")?;
    Ok(split_segments(&input))
}

/// Split text into segment bodies on lines consisting only of `---`
fn split_segments(input: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in input.lines() {
        if line.trim_end() == SEGMENT_SEPARATOR {
            segments.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    segments.push(current.join("\n"));

    segments
}
