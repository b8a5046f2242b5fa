//! devlog - command-line client for a devlog blog/portfolio backend.
//!
//! Restores the saved session on startup, runs one command and exits.
//! Expired access tokens are renewed transparently by the core library.

mod command;
mod format;

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use command::{Command, USAGE};
use devlog_core::api::ApiError;
use devlog_core::auth::SessionState;
use devlog_core::config::Config;
use devlog_core::models::{
    CommentCreate, GeneratePrompt, PostCreate, PostQuery, PostUpdate, ProjectCreate, ProjectQuery,
    ProjectUpdate,
};
use devlog_core::DevlogClient;

// ============================================================================
// Constants
// ============================================================================

/// Directory for daily log files; logs go to stderr when unset
const LOG_DIR_ENV: &str = "DEVLOG_LOG_DIR";

/// Log file name prefix inside `DEVLOG_LOG_DIR`
const LOG_FILE_PREFIX: &str = "devlog.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(LOG_DIR_ENV).ok().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = command::parse(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _guard = init_tracing();
    debug!(?command, "devlog starting");

    if let Err(e) = run(command).await {
        match e.downcast_ref::<ApiError>() {
            Some(api) => eprintln!("Error [{}]: {}", api.code(), api),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let client = DevlogClient::from_config(&config)?;

    let state = client.session.restore().await;
    info!(state = state.label(), "Session restored");

    if command.requires_login() && !state.is_authenticated() {
        bail!("Not signed in. Run `devlog login` first.");
    }

    let signing_out = command == Command::Logout;
    let api = &client.api;
    match command {
        Command::Help => println!("{}", USAGE),

        // ===== Session =====
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt_line("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let user = client.session.login(&email, &password).await?;
            config.last_email = Some(user.email.clone());
            config.save()?;
            println!("Signed in as {}", user.display_label());
        }
        Command::Register {
            display_name,
            email,
        } => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            let user = client.session.register(&display_name, &email, &password).await?;
            config.last_email = Some(user.email.clone());
            config.save()?;
            println!("Welcome, {}", user.display_label());
        }
        Command::Logout => {
            client.session.logout().await;
            println!("Signed out");
        }
        Command::WhoAmI => {
            let user = client.session.me().await?;
            let role = if user.is_admin { " (admin)" } else { "" };
            println!("{} <{}>{}", user.display_label(), user.email, role);
            println!("member since {}", format::format_date(&user.created_at));
        }

        // ===== Posts =====
        Command::Posts {
            query,
            author,
            page,
        } => {
            let query = PostQuery {
                q: query,
                page,
                ..author.map(PostQuery::by_author).unwrap_or_default()
            };
            let page = api.list_posts(&query).await?;
            for post in &page.items {
                println!("{}", format::post_line(post));
            }
            println!("page {} of {} ({} posts)", page.page, page.pages, page.total);
        }
        Command::Post { id } => {
            let post = api.get_post(&id).await?;
            println!("{}", format::post_detail(&post));
        }
        Command::CreatePost { file } => {
            let post: PostCreate = read_json(&file)?;
            let post = api.create_post(&post).await?;
            println!("Created post {}", post.id);
        }
        Command::UpdatePost { id, file } => {
            let update: PostUpdate = read_json(&file)?;
            let post = api.update_post(&id, &update).await?;
            println!("Updated post {}", post.id);
        }
        Command::DeletePost { id } => {
            api.delete_post(&id).await?;
            println!("Deleted post {}", id);
        }
        Command::Like { id } => {
            api.like_post(&id).await?;
            println!("Liked {}", id);
        }
        Command::Unlike { id } => {
            api.unlike_post(&id).await?;
            println!("Unliked {}", id);
        }

        // ===== Comments =====
        Command::Comments { post_id } => {
            let comments = api.list_comments(&post_id).await?;
            if comments.is_empty() {
                println!("No comments yet");
            }
            for comment in &comments {
                println!("{}", format::comment_line(comment));
            }
        }
        Command::Comment {
            post_id,
            body,
            reply_to,
        } => {
            let comment = match reply_to {
                Some(parent) => CommentCreate::reply_to(parent, body),
                None => CommentCreate::new(body),
            };
            let comment = api.create_comment(&post_id, &comment).await?;
            println!("Posted comment {}", comment.id);
        }
        Command::DeleteComment { id } => {
            api.delete_comment(&id).await?;
            println!("Deleted comment {}", id);
        }

        // ===== Tags and projects =====
        Command::Tags => {
            for tag in api.list_tags().await? {
                println!("{}", format::tag_line(&tag));
            }
        }
        Command::Projects { featured, page } => {
            let query = ProjectQuery {
                featured,
                page,
                ..ProjectQuery::default()
            };
            let page = api.list_projects(&query).await?;
            for project in &page.items {
                println!("{}", format::project_line(project));
            }
        }
        Command::Project { slug } => {
            let project = api.get_project(&slug).await?;
            println!("{}", format::project_detail(&project));
        }
        Command::CreateProject { file } => {
            let project: ProjectCreate = read_json(&file)?;
            let project = api.create_project(&project).await?;
            println!("Created project {} ({})", project.slug, project.id);
        }
        Command::UpdateProject { id, file } => {
            let update: ProjectUpdate = read_json(&file)?;
            let project = api.update_project(&id, &update).await?;
            println!("Updated project {}", project.slug);
        }
        Command::DeleteProject { id } => {
            api.delete_project(&id).await?;
            println!("Deleted project {}", id);
        }

        // ===== Image AI =====
        Command::Prompt { post_id } => {
            let post = api.get_post(&post_id).await?;
            let draft = GeneratePrompt {
                title: post.title,
                body: post.body,
                tags: post.tags,
                category: None,
            };
            println!("{}", api.generate_prompt(&draft).await?);
        }
        Command::Image { prompt, out } => {
            let data = api.generate_image(&prompt).await?;
            let bytes = STANDARD
                .decode(data.trim())
                .context("Server returned invalid image data")?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} ({} bytes)", out.display(), bytes.len());
        }
    }

    if !signing_out
        && state.is_authenticated()
        && client.session.state() == SessionState::Anonymous
    {
        eprintln!("Your session has expired. Run `devlog login` to sign in again.");
    }
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}
