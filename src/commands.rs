use crate::models::StatusSnapshot;
use crate::snapshot::SharedSnapshot;
use crate::utils::unix_now;

pub const FETCHING_PLACEHOLDER: &str = "Bot is currently fetching data..";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Block,
    Hello,
    Api,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "!status" => Some(Command::Status),
            "!block" => Some(Command::Block),
            "!hello" => Some(Command::Hello),
            "!api" => Some(Command::Api),
            _ => None,
        }
    }
}

/// Builds the reply for `command` from `snapshot` as of `now`.
pub fn reply(
    command: Command,
    snapshot: &StatusSnapshot,
    user_name: &str,
    api_host: &str,
    api_port: &str,
    now: i64,
) -> String {
    match command {
        Command::Status | Command::Block if !snapshot.is_populated() => FETCHING_PLACEHOLDER.to_string(),
        Command::Status => format!(
            "Status: {} Last updated: {} second(s) ago.",
            snapshot.status,
            (now - snapshot.last_updated).max(0)
        ),
        Command::Block => {
            let mut block = snapshot.block.clone();
            block.refresh(now);
            format!(
                "Block height: {} Hash: {} Time: {} Status: {} Seconds elapsed since last block: {}",
                block.block_height, block.block_hash, block.block_time, block.status, block.time_elapsed
            )
        }
        Command::Hello => format!("Hello {}!", user_name),
        Command::Api => format!("API URL http://{}:{}", api_host, api_port),
    }
}

/// Answers chat commands from the shared snapshot.
#[derive(Clone)]
pub struct CommandResponder {
    snapshot: SharedSnapshot,
    api_host: String,
    api_port: String,
}

impl CommandResponder {
    pub fn new(snapshot: SharedSnapshot, api_host: String, api_port: String) -> Self {
        Self { snapshot, api_host, api_port }
    }

    /// `None` for text outside the command vocabulary.
    pub async fn respond(&self, text: &str, user_name: &str) -> Option<String> {
        let command = Command::parse(text)?;
        let snapshot = self.snapshot.read().await;
        Some(reply(command, &snapshot, user_name, &self.api_host, &self.api_port, unix_now()))
    }
}
