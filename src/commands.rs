// Prefixed chat commands and their reply texts.

/// Commands understood by the bot. None of them take arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    SetupChannel,
    ForceSpawn,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::SetupChannel, Command::ForceSpawn, Command::Help];

    pub fn name(self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::SetupChannel => "setupchannel",
            Command::ForceSpawn => "forcespawn",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Help => "Shows this help message.",
            Command::SetupChannel => "Sets the current channel for penguin spawns.",
            Command::ForceSpawn => "Forcefully spawns a penguin in the channel (debug).",
        }
    }
}

/// Parse `content` as a command. The prefix must open the message and the
/// command name must follow it directly, matched case-sensitively. Returns
/// `None` for free-form text and for unknown command names. Anything after
/// the command word is ignored.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.strip_prefix(prefix)?;
    let word = rest.split(char::is_whitespace).next()?;
    Command::ALL.into_iter().find(|c| c.name() == word)
}

/// Help listing for all commands.
pub fn help_text(prefix: &str, keyword: &str) -> String {
    let mut text = String::from("🐧 Penguin Bot Help\n");
    for cmd in Command::ALL {
        text.push_str(&format!("{prefix}{} - {}\n", cmd.name(), cmd.description()));
    }
    text.push_str(&format!(
        "Catch penguins by typing '{keyword}' when they appear!"
    ));
    text
}

pub const CHANNEL_SET_REPLY: &str = "✅ This channel has been set for penguin spawns!";
pub const FORCED_SPAWN_NOTICE: &str = "🐧 (Forced Spawn)";

pub fn not_configured_reply(prefix: &str) -> String {
    format!(
        "⚠️ You need to run `{prefix}{}` first.",
        Command::SetupChannel.name()
    )
}

pub fn already_active_reply(creature: &str) -> String {
    format!("⚠️ A {creature} penguin is already out! Catch it first.")
}

pub fn empty_registry_reply() -> String {
    "⚠️ There are no penguins to spawn.".to_string()
}

pub fn unreachable_reply() -> String {
    "⚠️ The spawn channel can't be reached right now. Try again later.".to_string()
}
