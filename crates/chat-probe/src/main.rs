//! Chat probe binary entry point.
//!
//! Usage: chat-probe <command> against a Supabase-backed chat deployment.
//!
//! The probe signs in with password credentials, drives the same room flow
//! the app uses and prints what a user would see. It exists for poking at
//! staging deployments from a terminal.

use anyhow::Context;
use chat_core::{ChatConfig, ChatServices, SendOutcome, TracingAlerts};
use chat_types::{Message, RoomId, UserId};
use clap::{Parser, Subcommand};
use realtime_bridge::{RealtimeClient, RealtimeConfig};
use session_store::SessionStore;
use std::sync::Arc;
use supabase_backend::{ChatBackend, SupabaseClient};
use tracing::info;

/// Chat probe command-line interface.
#[derive(Parser)]
#[command(name = "chat-probe")]
#[command(about = "Probe for the chat backend: sign in, open rooms, send messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Supabase project URL.
    #[arg(long, env = "SUPABASE_URL", default_value = "http://localhost:54321", global = true)]
    api_url: String,

    /// Supabase anon key.
    #[arg(long, env = "SUPABASE_ANON_KEY", global = true)]
    anon_key: Option<String>,

    /// Realtime websocket URL. Derived from the project URL when not set.
    #[arg(long, env = "CHAT_REALTIME_URL", global = true)]
    realtime_url: Option<String>,

    /// Account email.
    #[arg(long, env = "CHAT_PROBE_EMAIL", global = true)]
    email: Option<String>,

    /// Account password.
    #[arg(long, env = "CHAT_PROBE_PASSWORD", global = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and report the session state
    Status,
    /// Open a room: print the counterpart and the message history
    OpenRoom {
        room_id: String,

        /// Keep the room open and print incoming messages until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Send one message into a room
    Send { room_id: String, text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "chat-probe".into(),
        default_level: cli.log_level.clone(),
        ..Default::default()
    });

    let anon_key = cli
        .anon_key
        .clone()
        .context("no anon key; set SUPABASE_ANON_KEY or pass --anon-key")?;
    let email = cli
        .email
        .clone()
        .context("no email; set CHAT_PROBE_EMAIL or pass --email")?;
    let password = cli
        .password
        .clone()
        .context("no password; set CHAT_PROBE_PASSWORD or pass --password")?;

    let session = Arc::new(SessionStore::new(&cli.api_url, &anon_key));
    let backend =
        Arc::new(SupabaseClient::new(&cli.api_url, &anon_key)) as Arc<dyn ChatBackend>;
    let mut realtime_config = RealtimeConfig::for_project(&cli.api_url);
    if let Some(url) = &cli.realtime_url {
        realtime_config.url = url.clone();
    }
    let realtime = Arc::new(RealtimeClient::new(realtime_config));
    let services = ChatServices::new(
        session.clone(),
        backend,
        realtime,
        Arc::new(TracingAlerts),
        ChatConfig::from_env(),
    );

    let viewer = session
        .sign_in_with_password(&email, &password)
        .await
        .context("sign-in failed")?;
    info!(user_id = %viewer.user_id, "Signed in");
    services.initialize(&anon_key);

    let result = match cli.command {
        Commands::Status => {
            println!("state: {:?}", session.auth_state());
            println!(
                "viewer: {} ({})",
                viewer.email.as_deref().unwrap_or("-"),
                viewer.user_id
            );
            Ok(())
        }
        Commands::OpenRoom { ref room_id, watch } => {
            run_open_room(&services, room_id, watch).await
        }
        Commands::Send { ref room_id, ref text } => run_send(&services, room_id, text).await,
    };

    services.teardown().await;
    session.sign_out();
    result
}

async fn run_open_room(services: &ChatServices, room_id: &str, watch: bool) -> anyhow::Result<()> {
    let room = services
        .open_room(RoomId::from_string(room_id))
        .await
        .context("could not open room")?;

    let counterpart = room
        .counterpart()
        .name()
        .unwrap_or_else(|| "(loading)".to_string());
    println!("room {} with {}", room.room_id(), counterpart);

    let history = room.messages();
    println!("{} message(s)", history.len());
    for message in &history {
        println!("{}", format_message_line(message, room.viewer()));
    }

    if watch {
        let mut changes = room.subscribe_changes();
        let mut printed = history.len();
        println!("watching for new messages, Ctrl-C to stop");
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let messages = room.messages();
                    for message in &messages[printed.min(messages.len())..] {
                        println!("{}", format_message_line(message, room.viewer()));
                    }
                    printed = messages.len();
                }
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }
    }

    room.close().await;
    Ok(())
}

async fn run_send(services: &ChatServices, room_id: &str, text: &str) -> anyhow::Result<()> {
    let room = services
        .open_room(RoomId::from_string(room_id))
        .await
        .context("could not open room")?;

    let outcome = room.send(text).await.context("send failed")?;
    match outcome {
        SendOutcome::Sent(stored) => println!("sent as message {}", stored.id),
        SendOutcome::Skipped => println!("nothing to send"),
    }

    room.close().await;
    Ok(())
}

/// One terminal line per message, marking the viewer's own and unconfirmed
/// entries.
fn format_message_line(message: &Message, viewer: &UserId) -> String {
    let time = message.created_at.format("%H:%M:%S");
    let who = if &message.sender_id == viewer {
        "you"
    } else {
        message.sender_id.as_str()
    };
    let pending = if message.id.is_placeholder() {
        " (sending)"
    } else {
        ""
    };
    format!("[{}] {}: {}{}", time, who, message.content, pending)
}
