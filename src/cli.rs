//! CLI parsing and orchestration. Parses args, builds a session from flags and config, runs one query, prints JSON. Maps errors to exit codes.

use crate::api::{ApiError, Session, Transport};
use crate::config::{self, Config};
use crate::model::{list_all_categories, Category, Newsletter, Post, PostSorting, User};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Output(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Api(
                ApiError::InvalidUrl { .. }
                | ApiError::MissingArgument(_)
                | ApiError::CategoryNotFound { .. },
            ) => 1,
            CliRunError::Api(_) => 2,
            CliRunError::Output(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "substack")]
#[command(about = "Query Substack posts, newsletters, users, and categories; prints JSON")]
#[command(
    after_help = "Config file keys (cookies_path, user_agent, timeout_secs, request_delay_ms, follow_redirects) are read from ./substack.toml or ~/.config/substack-api/config.toml. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON cookie file exported from a logged-in browser session (enables paywalled content).
    #[arg(long, global = true)]
    pub cookies: Option<PathBuf>,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Delay between requests in milliseconds (overrides config; default 500).
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// More logging (-v debug, -vv trace) and the full error chain on failure.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one post by URL (metadata by default).
    Post {
        /// Post URL, e.g. https://example.substack.com/p/some-slug
        url: String,

        /// Print the HTML body instead of metadata.
        #[arg(long)]
        content: bool,

        /// Print the body converted to Markdown.
        #[arg(long, conflicts_with = "content")]
        markdown: bool,
    },

    /// Query a publication by its base URL.
    Newsletter {
        /// Publication URL, e.g. https://example.substack.com
        url: String,

        #[command(subcommand)]
        action: NewsletterAction,
    },

    /// Fetch a user's public profile by handle.
    User {
        handle: String,

        /// Do not follow renamed handles.
        #[arg(long)]
        no_follow_redirects: bool,

        /// Print subscriptions instead of the profile.
        #[arg(long)]
        subscriptions: bool,
    },

    /// Browse newsletter categories.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum NewsletterAction {
    /// List archive posts.
    Posts {
        /// Ordering: new, top, pinned, or community.
        #[arg(long, default_value = "new", value_parser = parse_sorting)]
        sort: PostSorting,

        /// Maximum number of posts (default: all).
        #[arg(long)]
        limit: Option<usize>,

        /// Full-text search instead of a plain listing.
        #[arg(long, conflicts_with = "podcasts")]
        search: Option<String>,

        /// Podcast episodes only.
        #[arg(long)]
        podcasts: bool,
    },

    /// Publications this newsletter recommends.
    Recommendations,

    /// Ranked public authors.
    Authors,
}

#[derive(Subcommand, Debug)]
pub enum CategoryAction {
    /// Print the id/name table of every category.
    List,

    /// Newsletters in one category, by name or id.
    Newsletters {
        #[arg(long, required_unless_present = "id")]
        name: Option<String>,

        #[arg(long)]
        id: Option<u64>,

        /// Print full newsletter metadata instead of URLs.
        #[arg(long)]
        metadata: bool,
    },
}

fn parse_sorting(s: &str) -> Result<PostSorting, String> {
    s.parse()
}

/// Default tracing filter when RUST_LOG is unset: quiet > verbose > warn.
pub fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn follow_redirects(no_follow_flag: bool, config: Option<&Config>) -> bool {
    !no_follow_flag && config.and_then(|c| c.follow_redirects).unwrap_or(true)
}

fn build_session(args: &Args, config: Option<&Config>) -> Result<Session, CliRunError> {
    let cookies_path = args
        .cookies
        .clone()
        .or_else(|| config.and_then(|c| c.cookies_path.clone()));
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.and_then(|c| c.user_agent.clone()));
    let timeout_secs = args.timeout.or_else(|| config.and_then(|c| c.timeout_secs));
    let delay_ms = args
        .delay_ms
        .or_else(|| config.and_then(|c| c.request_delay_ms));

    let mut builder = Session::builder();
    if let Some(path) = cookies_path {
        builder = builder.cookies_path(path);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(secs) = timeout_secs {
        builder = builder.timeout_secs(secs);
    }
    if let Some(ms) = delay_ms {
        builder = builder.delay_ms(ms);
    }
    builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliRunError> {
    serde_json::to_value(value)
        .map_err(|e| CliRunError::Output(format!("Failed to serialize output: {}", e)))
}

/// Run one command against `transport` and return what should be printed.
fn execute(
    command: &Command,
    transport: Arc<dyn Transport>,
    config: Option<&Config>,
) -> Result<Value, CliRunError> {
    match command {
        Command::Post {
            url,
            content,
            markdown,
        } => {
            let mut post = Post::new(url, transport)?;
            if *markdown {
                let body = post.get_content_markdown(false)?;
                Ok(json!({ "url": post.url(), "markdown": body }))
            } else if *content {
                let body = post.get_content(false)?;
                Ok(json!({ "url": post.url(), "content": body }))
            } else {
                to_json(post.get_metadata(false)?)
            }
        }
        Command::Newsletter { url, action } => {
            let mut newsletter = Newsletter::new(url, transport);
            match action {
                NewsletterAction::Posts {
                    sort,
                    limit,
                    search,
                    podcasts,
                } => {
                    let posts = match search {
                        Some(query) => newsletter.search_posts(query, *limit)?,
                        None if *podcasts => newsletter.get_podcasts(*limit)?,
                        None => newsletter.get_posts(*sort, *limit)?,
                    };
                    let rows: Vec<Value> = posts
                        .iter()
                        .map(|p| json!({ "url": p.url(), "slug": p.slug() }))
                        .collect();
                    Ok(Value::Array(rows))
                }
                NewsletterAction::Recommendations => {
                    let urls: Vec<String> = newsletter
                        .get_recommendations(false)?
                        .iter()
                        .map(|n| n.url().to_string())
                        .collect();
                    to_json(&urls)
                }
                NewsletterAction::Authors => {
                    let handles: Vec<String> = newsletter
                        .get_authors(false)?
                        .iter()
                        .map(|u| u.username().to_string())
                        .collect();
                    to_json(&handles)
                }
            }
        }
        Command::User {
            handle,
            no_follow_redirects,
            subscriptions,
        } => {
            let mut user = User::new(handle, transport)
                .follow_redirects(follow_redirects(*no_follow_redirects, config));
            if *subscriptions {
                return to_json(&user.get_subscriptions()?);
            }
            let profile = to_json(user.get_raw_data(false)?)?;
            if user.was_redirected() {
                warn!(
                    from = user.original_username().unwrap_or_default(),
                    to = user.username(),
                    "handle was renamed"
                );
            }
            Ok(json!({
                "username": user.username(),
                "original_username": user.original_username(),
                "was_redirected": user.was_redirected(),
                "profile": profile,
            }))
        }
        Command::Category { action } => match action {
            CategoryAction::List => to_json(&list_all_categories(transport.as_ref())?),
            CategoryAction::Newsletters { name, id, metadata } => {
                let mut category = Category::new(name.as_deref(), *id, transport)?;
                debug!(category = %category, "resolved category");
                if *metadata {
                    to_json(&category.get_newsletter_metadata(false)?)
                } else {
                    to_json(&category.get_newsletter_urls()?)
                }
            }
        },
    }
}

fn print_json(value: &Value) -> Result<(), CliRunError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| CliRunError::Output(format!("Failed to write JSON: {}", e)))?;
    writeln!(out).map_err(|e| CliRunError::Output(format!("Failed to write JSON: {}", e)))
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let session = build_session(args, config.as_ref())?;
    let auth = session.auth_status();
    if session.cookies_path().is_some() && !auth.authenticated {
        warn!(
            reason = auth.diagnostic.as_deref().unwrap_or("unknown"),
            "running unauthenticated; paywalled content will be missing"
        );
    }
    let transport: Arc<dyn Transport> = Arc::new(session);
    let output = execute(&args.command, transport, config.as_ref())?;
    print_json(&output)
}
