use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

mod utils;

use discussion_finder::config::{load_config, load_config_from, save_config, set_config_path_override, FinderConfig};
use discussion_finder::discussion::{DiscussionFinder, FinderOptions};
use discussion_finder::invite::InviteService;
use discussion_finder::models::{DiscussionOutcome, InviteOutcome};
use discussion_finder::session::{is_email_address, InMemorySession, Session, SessionCall};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find the one-to-one discussion with a contact.",
    long_about = "Resolves the canonical direct chat with a contact from a session snapshot.\n\n\
    The snapshot is a JSON file listing the direct rooms, their members and creation times.\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// JSON session snapshot to run against
    #[arg(long, value_name = "PATH")]
    fixture: PathBuf,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the discussion with a Matrix user or an email address
    Find {
        contact: String,
        /// Ignore rooms we have been invited to
        #[arg(long)]
        exclude_invites: bool,
        /// Report a pending invite instead of joining it
        #[arg(long)]
        no_auto_join: bool,
        /// Ignore rooms the contact has left
        #[arg(long)]
        exclude_left: bool,
    },
    /// Invite an email address in a direct chat
    Invite { email: String },
}

fn describe_outcome(outcome: &DiscussionOutcome) -> String {
    match outcome {
        DiscussionOutcome::NoDiscussion => "no discussion".to_string(),
        DiscussionOutcome::JoinedDiscussion(room_id) => format!("discussion {}", room_id),
        DiscussionOutcome::PendingInvite(room_id) => format!("pending invite {}", room_id),
    }
}

fn describe_invite(outcome: &InviteOutcome) -> String {
    match outcome {
        InviteOutcome::InviteHasBeenSent(room_id) => format!("invite sent in {}", room_id),
        InviteOutcome::InviteAlreadySent(room_id) => format!("invite already sent in {}", room_id),
        InviteOutcome::InviteIgnoredForDiscoveredUser(user_id) => {
            format!("no invite needed, the address belongs to {}", user_id)
        }
        InviteOutcome::InviteIgnoredForUnauthorizedEmail => "no invite sent, the address is not authorized".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Installed before the config is read so its loading is logged too
    utils::setup_logging(args.log_file.as_ref().and_then(|p| p.to_str()), LevelFilter::Info)?;

    let loaded = match &args.config {
        Some(path) => {
            set_config_path_override(path.clone());
            load_config_from(path)?
        }
        None => load_config()?,
    };
    let config_missing = loaded.is_none();
    let config: FinderConfig = loaded.unwrap_or_default();
    log::set_max_level(config.level_filter());

    // First run: write the defaults so they can be edited
    if config_missing {
        if let Err(e) = save_config(&config) {
            warn!("Failed to save default config: {}", e);
        }
    }

    let session = Arc::new(InMemorySession::load(&args.fixture)?);
    if let Some(user_id) = &config.user_id {
        if user_id != session.user_id() {
            return Err(anyhow!("Snapshot belongs to another user than {}", user_id));
        }
    }

    match args.command {
        Command::Find {
            contact,
            exclude_invites,
            no_auto_join,
            exclude_left,
        } => {
            let defaults = config.options();
            let options = FinderOptions {
                include_invites: defaults.include_invites && !exclude_invites,
                auto_join: defaults.auto_join && !no_auto_join,
                include_left: defaults.include_left && !exclude_left,
            };
            info!("Looking up discussion with {} ({:?})", contact, options);

            let finder = DiscussionFinder::new(session.clone());
            match finder.resolve_with(&contact, &options).await {
                Ok(outcome) => println!("{}: {}", contact, describe_outcome(&outcome)),
                Err(e) => {
                    error!("Discussion lookup failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Invite { email } => {
            if !is_email_address(&email) {
                return Err(anyhow!("{} is not an email address", email));
            }
            let platforms = session.platform_resolver(&config.identity_servers).await;
            info!("Asking identity servers {:?}", platforms.server_urls());
            let service = InviteService::new(
                session.clone(),
                Arc::new(platforms),
                config.identity_servers.clone(),
                config.external_host_prefixes.clone(),
            );
            match service.send_email_invite(&email).await {
                Ok(outcome) => println!("{}: {}", email, describe_invite(&outcome)),
                Err(e) => {
                    error!("Email invite failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    for call in session.journal().await {
        match call {
            SessionCall::Join(room_id) => println!("  joined {}", room_id),
            SessionCall::Leave(room_id) => println!("  left {}", room_id),
            SessionCall::CreateDiscussion { email, .. } => println!("  created a discussion with {}", email),
            _ => {}
        }
    }

    Ok(())
}
