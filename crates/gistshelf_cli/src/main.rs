//! Command-line front end for the GistShelf engine.

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use gistshelf_core::models::gist::{CreateGistRequest, Gist, Visibility};
use gistshelf_core::models::settings::RecentGist;
use gistshelf_core::tags::{parse_description, TagCount};
use gistshelf_core::text::char_prefix;
use gistshelf_core::{AppContext, Config};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gistshelf=info,gistshelf_core=info";
const DEFAULT_FILENAME: &str = "gistfile1.txt";
const TITLE_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "gshelf", about = "GistShelf CLI", version)]
struct Cli {
    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    /// Print timing for remote operations
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Fetch every gist and report how many are cached
    Sync,
    /// List gists, newest first
    List {
        /// Only gists carrying every given tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show every tag with its gist count
    Tags,
    /// Fuzzy search, or a regex scan for `/pattern/flags` queries
    Search {
        query: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print a gist with its file contents
    Show { id: String },
    New {
        /// Read content from this file instead of stdin
        #[arg(short, long)]
        file: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Create a public gist (secret by default)
        #[arg(long)]
        public: bool,
    },
    Delete { id: String },
    Star { id: String },
    Unstar { id: String },
    /// List starred gists
    Starred,
    /// Recently opened gists
    Recent,
    /// Pin a tag to the sidebar
    Pin { tag: String },
    Unpin { tag: String },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn log_timing(timing: bool, label: &str, duration: Duration) {
    if timing {
        eprintln!(
            "[timing] {}: {:.1} ms",
            label,
            duration.as_secs_f64() * 1000.0
        );
    }
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("output encoding error: {}", err))
}

/// Title for list rows: the bracketed title, else the cleaned description.
fn display_title(gist: &Gist) -> String {
    let parsed = parse_description(&gist.description);
    let title = match parsed.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => parsed.description,
    };
    if title.is_empty() {
        return "(no description)".to_string();
    }
    let short = char_prefix(&title, TITLE_WIDTH);
    if short.len() < title.len() {
        format!("{}…", short)
    } else {
        title
    }
}

fn gist_summary(gist: &Gist) -> Value {
    json!({
        "id": gist.id,
        "description": gist.description,
        "public": gist.visibility.is_public(),
        "files": gist.files.keys().collect::<Vec<_>>(),
        "tags": gist.tags.all().collect::<Vec<_>>(),
        "updated_at": gist.updated_at.to_rfc3339(),
    })
}

fn format_gist_rows(gists: &[Gist], json: bool) -> Result<String, String> {
    if json {
        let summaries: Vec<Value> = gists.iter().map(gist_summary).collect();
        return encode_json(&summaries);
    }
    let rows: Vec<String> = gists
        .iter()
        .map(|gist| {
            format!(
                "{:<32} {:<10} {}",
                gist.id,
                gist.updated_at.format("%Y-%m-%d"),
                display_title(gist)
            )
        })
        .collect();
    Ok(rows.join("\n"))
}

fn format_gist_detail(gist: &Gist, json: bool) -> Result<String, String> {
    if json {
        let mut summary = gist_summary(gist);
        let files: BTreeMap<&str, Option<&str>> = gist
            .files
            .values()
            .map(|file| (file.filename.as_str(), file.content.as_loaded()))
            .collect();
        summary["content"] = json!(files);
        return encode_json(&summary);
    }
    let mut out = format!("{}  {}\n", gist.id, display_title(gist));
    let tags: Vec<&str> = gist.tags.all().collect();
    if !tags.is_empty() {
        out.push_str(&format!("tags: {}\n", tags.join(" ")));
    }
    for file in gist.files.values() {
        out.push_str(&format!("\n==> {} <==\n", file.filename));
        match file.content.as_loaded() {
            Some(content) => out.push_str(content),
            None => out.push_str("(content not available)"),
        }
        out.push('\n');
    }
    Ok(out.trim_end().to_string())
}

fn format_tag_counts(counts: &[TagCount], json: bool) -> Result<String, String> {
    if json {
        return encode_json(counts);
    }
    let rows: Vec<String> = counts
        .iter()
        .map(|count| format!("{:>5}  {}", count.count, count.tag))
        .collect();
    Ok(rows.join("\n"))
}

fn format_recent(recent: &[RecentGist], json: bool) -> Result<String, String> {
    if json {
        return encode_json(recent);
    }
    let rows: Vec<String> = recent
        .iter()
        .map(|entry| format!("{:<32} {}", entry.id, entry.description))
        .collect();
    Ok(rows.join("\n"))
}

fn format_status(action: &str, id: &str, json: bool) -> Result<String, String> {
    if json {
        return encode_json(&json!({ "action": action, "id": id }));
    }
    Ok(format!("{}: {}", action, id))
}

/// Filename for a new gist: the source file's name, or the GitHub default.
fn new_gist_filename(path: Option<&str>) -> String {
    path.and_then(|path| Path::new(path).file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn print_output(output: Result<String, String>) -> anyhow::Result<()> {
    let output = output.map_err(|message| anyhow!(message))?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

async fn synced_context(ctx: &AppContext, timing: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    ctx.cache().sync_all().await.context("sync failed")?;
    log_timing(timing, "sync", started.elapsed());
    Ok(())
}

async fn run(ctx: &AppContext, command: Commands, json: bool, timing: bool) -> anyhow::Result<()> {
    match command {
        Commands::Completions { .. } => unreachable!("completions handled before context setup"),
        Commands::Sync => {
            synced_context(ctx, timing).await?;
            let count = ctx.cache().len();
            if json {
                print_output(encode_json(&json!({ "count": count })))?;
            } else {
                println!("Synced {} gists", count);
            }
        }
        Commands::List { tag, limit } => {
            synced_context(ctx, timing).await?;
            let mut gists = ctx.cache().gists_with_tags(&tag);
            gists.truncate(limit);
            print_output(format_gist_rows(&gists, json))?;
        }
        Commands::Tags => {
            synced_context(ctx, timing).await?;
            print_output(format_tag_counts(&ctx.cache().tag_counts(), json))?;
        }
        Commands::Search { query, limit } => {
            synced_context(ctx, timing).await?;
            let started = Instant::now();
            let mut hits = ctx.cache().search(&query);
            log_timing(timing, "search", started.elapsed());
            hits.truncate(limit);
            print_output(format_gist_rows(&hits, json))?;
        }
        Commands::Show { id } => {
            let started = Instant::now();
            let gist = ctx
                .open_gist(&id)
                .await
                .with_context(|| format!("show {} failed", id))?;
            log_timing(timing, "show", started.elapsed());
            print_output(format_gist_detail(&gist, json))?;
        }
        Commands::New {
            file,
            description,
            public,
        } => {
            let content = match file.as_deref() {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path))?,
                None => {
                    let mut buffer = String::new();
                    io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let mut files = BTreeMap::new();
            files.insert(new_gist_filename(file.as_deref()), content);
            let request = CreateGistRequest {
                description: description.unwrap_or_default(),
                files,
                visibility: if public {
                    Visibility::Public
                } else {
                    Visibility::Secret
                },
            };
            let gist = ctx.cache().create(request).await.context("create failed")?;
            print_output(format_status("Created", &gist.id, json))?;
        }
        Commands::Delete { id } => {
            ctx.delete_gist(&id)
                .await
                .with_context(|| format!("delete {} failed", id))?;
            print_output(format_status("Deleted", &id, json))?;
        }
        Commands::Star { id } => {
            ctx.cache()
                .star(&id)
                .await
                .with_context(|| format!("star {} failed", id))?;
            print_output(format_status("Starred", &id, json))?;
        }
        Commands::Unstar { id } => {
            ctx.cache()
                .unstar(&id)
                .await
                .with_context(|| format!("unstar {} failed", id))?;
            print_output(format_status("Unstarred", &id, json))?;
        }
        Commands::Starred => {
            let gists = ctx.cache().list_starred().await.context("starred failed")?;
            print_output(format_gist_rows(&gists, json))?;
        }
        Commands::Recent => {
            print_output(format_recent(&ctx.settings().recent_gists, json))?;
        }
        Commands::Pin { tag } => {
            let changed = ctx.update_settings(|local| local.pin_tag(&tag))?;
            let action = if changed { "Pinned" } else { "Already pinned" };
            print_output(format_status(action, &tag, json))?;
        }
        Commands::Unpin { tag } => {
            let changed = ctx.update_settings(|local| local.unpin_tag(&tag))?;
            let action = if changed { "Unpinned" } else { "Not pinned" };
            print_output(format_status(action, &tag, json))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        token,
        json,
        timing,
        command,
    } = Cli::parse();

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    init_tracing();

    let mut config = Config::from_env();
    if token.is_some() {
        config.token = token;
    }
    let ctx = AppContext::from_config(config).context("failed to start")?;

    if ctx.settings_sync().is_enabled() {
        if let Err(err) = ctx.start_settings_sync().await {
            warn!("settings pull failed, continuing with local settings: {}", err);
        }
    }

    let result = run(&ctx, command, json, timing).await;

    if let Err(err) = ctx.shutdown().await {
        warn!("settings flush failed: {}", err);
    }
    result
}
