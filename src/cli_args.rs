use crate::operation::OperationType;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, about, version)]
pub struct CliArgs {
    /// Base url of the game operations backend
    #[clap(long, env = "OPS_BASE_URL", default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Session cookie forwarded verbatim with every request
    #[clap(long, env = "OPS_SESSION_COOKIE")]
    pub session_cookie: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one operation per given type, concurrently, and stream their progress
    Operate {
        /// Operation types: stop, rsync, update, start, reload, initial, battle
        #[clap(required = true)]
        types: Vec<OperationType>,

        /// Backend script alias. Defaults to `<type>_game`
        #[clap(long)]
        script: Option<String>,

        /// Extra request parameter as `key=value`. Empty values are not sent
        #[clap(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Sync mode, required by `rsync`
        #[clap(long, value_enum)]
        rsync_mode: Option<RsyncMode>,
    },
    /// Update the frontend assets of one channel
    UpdateClient {
        #[clap(long)]
        channel: String,
    },
    /// List channels
    Channels,
    /// List server types of the given channels
    ServerTypes {
        #[clap(long = "channel")]
        channels: Vec<String>,

        /// Every server type, whatever the channel
        #[clap(long, conflicts_with = "channels")]
        all: bool,
    },
    /// List server numbers of one channel and server type
    GameNumbers {
        #[clap(long)]
        channel: String,

        #[clap(long)]
        server_type: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RsyncMode {
    Update,
    Reload,
}

impl RsyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsyncMode::Update => "update",
            RsyncMode::Reload => "reload",
        }
    }
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid param `{s}`, expected key=value"))?;

    if key.is_empty() {
        return Err(format!("Invalid param `{s}`, key is empty"));
    }

    Ok((key.to_string(), value.to_string()))
}
