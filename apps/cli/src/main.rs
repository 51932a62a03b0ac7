use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, prepare_database_url, Settings},
    ApiClient, ControllerOptions, MemorySessionStore, SessionController, SessionStore,
};
use shared::domain::{CommentId, PostId};
use storage::Storage;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::{format_frame, TerminalView};

#[derive(Parser, Debug)]
#[command(name = "postboard", about = "Command line client for the posts board")]
struct Cli {
    /// Backend API root, e.g. http://127.0.0.1:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Keep the session in memory for this invocation only.
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the stored session and show the first page of posts.
    Status,
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Posts {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Post {
        text: String,
    },
    Comment {
        post_id: i64,
        text: String,
    },
    Like {
        post_id: i64,
    },
    DeletePost {
        post_id: i64,
    },
    DeleteComment {
        comment_id: i64,
    },
    /// Exchange the stored refresh token for a new access token.
    Renew,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = apply_flags(load_settings(), &cli);
    debug!(
        api_base_url = %settings.api_base_url,
        ephemeral = cli.ephemeral,
        "cli: settings loaded"
    );

    let store = open_store(&settings, cli.ephemeral).await?;
    let api = ApiClient::new(&settings.api_base_url, settings.request_timeout())
        .context("invalid api base url")?;
    let view = Arc::new(TerminalView::default());
    let controller = SessionController::new(
        api,
        store,
        view.clone(),
        ControllerOptions {
            auto_login_after_register: settings.auto_login_after_register,
        },
    );

    let succeeded = run(&controller, cli.command).await;
    if let Some(frame) = view.take_frame() {
        print!("{}", format_frame(&frame));
    }
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn apply_flags(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = api_url.clone();
    }
    if let Some(database_url) = &cli.database_url {
        settings.database_url = database_url.clone();
    }
    settings
}

async fn open_store(settings: &Settings, ephemeral: bool) -> Result<Arc<dyn SessionStore>> {
    if ephemeral {
        return Ok(Arc::new(MemorySessionStore::new()));
    }
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open session store at {database_url}"))?;
    storage
        .health_check()
        .await
        .context("session store is not usable")?;
    Ok(Arc::new(storage))
}

/// Failures have already been reported through the view.
async fn run(controller: &SessionController, command: Command) -> bool {
    match command {
        Command::Status => controller.bootstrap().await.is_ok(),
        Command::Login { username, password } => {
            controller.login(&username, &password).await.is_ok()
        }
        Command::Register {
            username,
            email,
            password,
        } => controller
            .register(&username, &email, &password)
            .await
            .is_ok(),
        Command::Logout => {
            controller.logout().await;
            true
        }
        Command::Posts { page } => {
            controller.restore_session().await;
            controller.set_page(page).await.is_ok()
        }
        Command::Post { text } => {
            let _ = controller.bootstrap().await;
            controller.create_post(&text).await.is_ok()
        }
        Command::Comment { post_id, text } => {
            let _ = controller.bootstrap().await;
            controller.comment(PostId(post_id), &text).await.is_ok()
        }
        Command::Like { post_id } => {
            let _ = controller.bootstrap().await;
            match controller.toggle_like(PostId(post_id)).await {
                Ok(status) => {
                    debug!(post_id, ?status, "cli: like toggled");
                    true
                }
                Err(_) => false,
            }
        }
        Command::DeletePost { post_id } => {
            let _ = controller.bootstrap().await;
            controller.delete_post(PostId(post_id)).await.is_ok()
        }
        Command::DeleteComment { comment_id } => {
            let _ = controller.bootstrap().await;
            controller
                .delete_comment(CommentId(comment_id))
                .await
                .is_ok()
        }
        Command::Renew => {
            let _ = controller.bootstrap().await;
            controller.renew_access_token().await.is_ok()
        }
    }
}
