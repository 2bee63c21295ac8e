// The bot: wires the registry, spawn slot, score store and scheduler together
// and routes inbound messages to catch resolution and commands.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::catch::{CatchOutcome, CatchResolver};
use crate::chat::{AnnouncementSink, IncomingMessage};
use crate::commands::{self, Command};
use crate::config::Config;
use crate::creature::{Creature, CreatureRegistry};
use crate::error::SpawnError;
use crate::metrics;
use crate::scheduler::SpawnScheduler;
use crate::scores::ScoreStore;
use crate::spawn::SpawnState;

/// What caused a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTrigger {
    Scheduled,
    Forced,
}

impl SpawnTrigger {
    pub fn label(self) -> &'static str {
        match self {
            SpawnTrigger::Scheduled => "scheduled",
            SpawnTrigger::Forced => "forced",
        }
    }
}

/// Chat-facing settings.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub catch_keyword: String,
    pub command_prefix: String,
    pub spawn_timeout: Option<Duration>,
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            catch_keyword: config.catch_keyword.clone(),
            command_prefix: config.command_prefix.clone(),
            spawn_timeout: config.spawn_timeout,
        }
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            catch_keyword: "pen".to_string(),
            command_prefix: "!".to_string(),
            spawn_timeout: None,
        }
    }
}

/// Everything one inbound message caused.
#[derive(Debug, Clone)]
pub struct MessageReport {
    pub catch: CatchOutcome,
    pub command: Option<Command>,
    /// Texts posted in response, in order.
    pub replies: Vec<String>,
}

pub struct Bot {
    registry: Arc<CreatureRegistry>,
    spawn: SpawnState,
    scores: ScoreStore,
    resolver: CatchResolver,
    sink: Arc<dyn AnnouncementSink>,
    scheduler: SpawnScheduler,
    spawn_channel: Mutex<Option<String>>,
    command_prefix: String,
    spawn_timeout: Option<Duration>,
}

impl Bot {
    pub fn new(
        registry: Arc<CreatureRegistry>,
        scores: ScoreStore,
        sink: Arc<dyn AnnouncementSink>,
        scheduler: SpawnScheduler,
        settings: BotSettings,
    ) -> Self {
        Self {
            registry,
            spawn: SpawnState::new(),
            scores,
            resolver: CatchResolver::new(&settings.catch_keyword),
            sink,
            scheduler,
            spawn_channel: Mutex::new(None),
            command_prefix: settings.command_prefix,
            spawn_timeout: settings.spawn_timeout,
        }
    }

    pub fn registry(&self) -> &CreatureRegistry {
        &self.registry
    }

    pub fn scores(&self) -> &ScoreStore {
        &self.scores
    }

    pub fn spawn_state(&self) -> &SpawnState {
        &self.spawn
    }

    pub fn scheduler(&self) -> &SpawnScheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &dyn AnnouncementSink {
        self.sink.as_ref()
    }

    pub fn keyword(&self) -> &str {
        self.resolver.keyword()
    }

    pub fn spawn_timeout(&self) -> Option<Duration> {
        self.spawn_timeout
    }

    pub fn spawn_channel(&self) -> Option<String> {
        self.spawn_channel.lock().unwrap().clone()
    }

    /// Post `text` to `channel_id`. Delivery failures are logged, not raised.
    pub fn say(&self, channel_id: &str, text: &str) -> bool {
        match self.sink.send(channel_id, text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to post to {channel_id}: {e}");
                false
            }
        }
    }

    /// Make `channel_id` the spawn channel and start the scheduler if it is
    /// not running yet. Starting the scheduler runs its first tick at once.
    pub fn configure_spawn_channel(self: &Arc<Self>, channel_id: &str) {
        self.set_spawn_channel(channel_id);
        self.scheduler.start(self.clone());
    }

    fn set_spawn_channel(&self, channel_id: &str) {
        let previous = self
            .spawn_channel
            .lock()
            .unwrap()
            .replace(channel_id.to_string());
        self.sink.pin_channel(channel_id);
        tracing::info!("Spawn channel set to {channel_id} (was {previous:?})");
    }

    /// Pick a random creature, activate it and announce it in `channel_id`.
    pub fn spawn_random(
        &self,
        channel_id: &str,
        trigger: SpawnTrigger,
        now: Instant,
    ) -> Result<Arc<Creature>, SpawnError> {
        let creature = self
            .registry
            .choose(&mut rand::thread_rng())
            .ok_or(SpawnError::EmptyRegistry)?;

        if !self.spawn.try_activate(creature.clone(), now) {
            return Err(self.already_active());
        }
        metrics::SPAWNS_TOTAL
            .with_label_values(&[trigger.label()])
            .inc();
        tracing::info!("{} spawned ({})", creature.name, trigger.label());

        if trigger == SpawnTrigger::Forced {
            self.say(channel_id, commands::FORCED_SPAWN_NOTICE);
        }
        self.say(channel_id, &creature.spawn_message(self.keyword()));
        self.say(channel_id, &creature.display_asset);
        Ok(creature)
    }

    /// Spawn immediately, as one scheduler tick would. Nothing is activated
    /// when the spawn channel cannot be reached.
    pub fn force_spawn(&self, now: Instant) -> Result<Arc<Creature>, SpawnError> {
        let channel = self.spawn_channel().ok_or(SpawnError::NotConfigured)?;
        if self.spawn.peek().is_active() {
            return Err(self.already_active());
        }
        if !self.sink.resolve_channel(&channel) {
            return Err(SpawnError::Unreachable(channel));
        }
        self.spawn_random(&channel, SpawnTrigger::Forced, now)
    }

    fn already_active(&self) -> SpawnError {
        let name = self
            .spawn
            .peek()
            .creature()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        SpawnError::AlreadyActive(name)
    }

    /// Handle one inbound message: settle a catch attempt first, then run any
    /// command it carries.
    pub fn handle_message(self: &Arc<Self>, msg: &IncomingMessage, now: Instant) -> MessageReport {
        let mut replies = Vec::new();
        if msg.from_self {
            return MessageReport {
                catch: CatchOutcome::NotAttempted,
                command: None,
                replies,
            };
        }

        let catch = self.resolver.resolve(&self.spawn, &self.scores, msg, now);
        match &catch {
            CatchOutcome::Caught(c) => {
                let text = c.announcement();
                self.say(&msg.channel_id, &text);
                replies.push(text);
            }
            CatchOutcome::Missed => metrics::MISSED_CATCHES_TOTAL.inc(),
            CatchOutcome::NotAttempted => {}
        }

        let command = commands::parse_command(&self.command_prefix, &msg.content);
        if let Some(cmd) = command {
            self.run_command(cmd, &msg.channel_id, now, &mut replies);
        }

        MessageReport {
            catch,
            command,
            replies,
        }
    }

    /// Execute a command, posting its replies to the invoking channel. Spawn
    /// announcements themselves go to the spawn channel.
    fn run_command(
        self: &Arc<Self>,
        cmd: Command,
        channel_id: &str,
        now: Instant,
        replies: &mut Vec<String>,
    ) {
        let mut reply = |text: String| {
            self.say(channel_id, &text);
            replies.push(text);
        };
        match cmd {
            Command::Help => reply(commands::help_text(&self.command_prefix, self.keyword())),
            Command::SetupChannel => {
                self.set_spawn_channel(channel_id);
                reply(commands::CHANNEL_SET_REPLY.to_string());
                self.scheduler.start(self.clone());
            }
            Command::ForceSpawn => match self.force_spawn(now) {
                Ok(_) => {}
                Err(SpawnError::NotConfigured) => {
                    reply(commands::not_configured_reply(&self.command_prefix))
                }
                Err(SpawnError::AlreadyActive(name)) => reply(commands::already_active_reply(&name)),
                Err(SpawnError::EmptyRegistry) => reply(commands::empty_registry_reply()),
                Err(SpawnError::Unreachable(channel)) => {
                    tracing::warn!("Forced spawn skipped, {channel} unreachable");
                    reply(commands::unreachable_reply());
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::scheduler::{self, TickOutcome};

    /// Sink that records everything; every channel resolves unless `unreachable` is set.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        unreachable: Mutex<bool>,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl AnnouncementSink for RecordingSink {
        fn resolve_channel(&self, _channel_id: &str) -> bool {
            !*self.unreachable.lock().unwrap()
        }

        fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn build(settings: BotSettings) -> (tempfile::TempDir, Arc<RecordingSink>, Arc<Bot>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = CreatureRegistry::from_creatures(vec![
            Creature::new("Emperor", "emperor.png"),
            Creature::new("Rockhopper", "rockhopper.png"),
        ])
        .unwrap();
        let scores = ScoreStore::load(dir.path().join("userdata.json")).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let bot = Arc::new(Bot::new(
            Arc::new(registry),
            scores,
            sink.clone(),
            SpawnScheduler::new(Duration::from_secs(3600)),
            settings,
        ));
        (dir, sink, bot)
    }

    fn msg(author: &str, channel: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            author_id: author.to_string(),
            channel_id: channel.to_string(),
            content: content.to_string(),
            from_self: false,
        }
    }

    #[test]
    fn test_force_spawn_requires_channel() {
        let (_dir, _sink, bot) = build(BotSettings::default());
        assert_eq!(bot.force_spawn(Instant::now()), Err(SpawnError::NotConfigured));
    }

    #[test]
    fn test_forcespawn_command_before_setup_warns() {
        let (_dir, sink, bot) = build(BotSettings::default());
        let report = bot.handle_message(&msg("U1", "C1", "!forcespawn"), Instant::now());
        assert_eq!(report.command, Some(Command::ForceSpawn));
        assert_eq!(report.replies, vec!["⚠️ You need to run `!setupchannel` first."]);
        assert_eq!(sink.texts(), report.replies);
        assert!(!bot.spawn_state().peek().is_active());
    }

    #[tokio::test]
    async fn test_setup_spawns_at_once_then_force_spawn() {
        let (_dir, sink, bot) = build(BotSettings::default());
        let report = bot.handle_message(&msg("U1", "C1", "!setupchannel"), Instant::now());
        assert_eq!(report.replies, vec![commands::CHANNEL_SET_REPLY]);
        assert_eq!(bot.spawn_channel().as_deref(), Some("C1"));
        assert!(bot.scheduler().is_running());

        // The first tick runs right after setup, without waiting an interval.
        let first = bot.spawn_state().peek().creature().cloned().unwrap();
        let texts = sink.texts();
        assert_eq!(texts[0], commands::CHANNEL_SET_REPLY);
        assert_eq!(texts[1], first.spawn_message("pen"));
        assert_eq!(texts[2], first.display_asset);

        assert_eq!(
            bot.force_spawn(Instant::now()),
            Err(SpawnError::AlreadyActive(first.name.clone()))
        );
        let report = bot.handle_message(&msg("U1", "C1", "!forcespawn"), Instant::now());
        assert_eq!(report.replies, vec![commands::already_active_reply(&first.name)]);

        let report = bot.handle_message(&msg("U2", "C1", "pen"), Instant::now());
        assert!(matches!(report.catch, CatchOutcome::Caught(_)));

        let creature = bot.force_spawn(Instant::now()).unwrap();
        let texts = sink.texts();
        let n = texts.len();
        assert_eq!(texts[n - 3], commands::FORCED_SPAWN_NOTICE);
        assert_eq!(texts[n - 2], creature.spawn_message("pen"));
        assert_eq!(texts[n - 1], creature.display_asset);
    }

    #[tokio::test]
    async fn test_force_spawn_into_unreachable_channel() {
        let (_dir, sink, bot) = build(BotSettings::default());
        *sink.unreachable.lock().unwrap() = true;
        bot.handle_message(&msg("ADMIN", "C1", "!setupchannel"), Instant::now());
        assert!(!bot.spawn_state().peek().is_active());

        assert_eq!(
            bot.force_spawn(Instant::now()),
            Err(SpawnError::Unreachable("C1".to_string()))
        );
        let report = bot.handle_message(&msg("ADMIN", "C1", "!forcespawn"), Instant::now());
        assert_eq!(report.replies, vec![commands::unreachable_reply()]);
        assert!(!bot.spawn_state().peek().is_active());

        *sink.unreachable.lock().unwrap() = false;
        assert!(bot.force_spawn(Instant::now()).is_ok());
    }

    #[tokio::test]
    async fn test_catch_through_message_flow() {
        let (_dir, sink, bot) = build(BotSettings::default());

        let t0 = Instant::now();
        let emperor = bot.registry().get("Emperor").unwrap();
        assert!(bot.spawn_state().try_activate(emperor, t0));

        let report = bot.handle_message(&msg("U1", "C1", "PEN"), t0 + Duration::from_secs(5));
        assert!(matches!(report.catch, CatchOutcome::Caught(_)));
        assert_eq!(
            report.replies,
            vec!["<@U1> caught a Emperor penguin in **5.00 seconds**!"]
        );
        assert_eq!(bot.scores().count("U1", "Emperor"), 1);
        assert!(!bot.spawn_state().peek().is_active());

        let report = bot.handle_message(&msg("U2", "C1", "pen"), t0 + Duration::from_secs(6));
        assert!(matches!(report.catch, CatchOutcome::Missed));
        assert!(report.replies.is_empty());
        assert_eq!(sink.texts().last().unwrap(), "<@U1> caught a Emperor penguin in **5.00 seconds**!");
    }

    #[test]
    fn test_own_messages_are_ignored() {
        let (_dir, sink, bot) = build(BotSettings::default());
        let mut own = msg("BOT", "C1", "!help");
        own.from_self = true;
        let report = bot.handle_message(&own, Instant::now());
        assert!(report.command.is_none());
        assert!(sink.texts().is_empty());
    }

    #[test]
    fn test_help_command() {
        let (_dir, _sink, bot) = build(BotSettings::default());
        let report = bot.handle_message(&msg("U1", "C1", "!help"), Instant::now());
        assert_eq!(report.replies.len(), 1);
        assert!(report.replies[0].contains("!setupchannel"));
        assert!(report.replies[0].contains("!forcespawn"));
    }

    #[tokio::test]
    async fn test_tick_outcomes() {
        let (_dir, sink, bot) = build(BotSettings::default());
        let now = Instant::now();
        assert_eq!(scheduler::tick(&bot, now), TickOutcome::Idle);

        *sink.unreachable.lock().unwrap() = true;
        bot.configure_spawn_channel("C1");
        assert_eq!(scheduler::tick(&bot, now), TickOutcome::Unreachable);
        assert!(!bot.spawn_state().peek().is_active());

        *sink.unreachable.lock().unwrap() = false;
        let spawned = match scheduler::tick(&bot, now) {
            TickOutcome::Spawned(c) => c,
            other => panic!("expected a spawn, got {other:?}"),
        };
        assert!(bot.registry().get(&spawned.name).is_some());
        assert_eq!(scheduler::tick(&bot, now), TickOutcome::Occupied);
    }

    #[tokio::test]
    async fn test_tick_expires_stale_spawn() {
        let settings = BotSettings {
            spawn_timeout: Some(Duration::from_secs(120)),
            ..BotSettings::default()
        };
        let (_dir, sink, bot) = build(settings);
        bot.set_spawn_channel("C1");

        let t0 = Instant::now();
        let emperor = bot.registry().get("Emperor").unwrap();
        bot.spawn_state().try_activate(emperor, t0);

        assert_eq!(
            scheduler::tick(&bot, t0 + Duration::from_secs(60)),
            TickOutcome::Occupied
        );
        let outcome = scheduler::tick(&bot, t0 + Duration::from_secs(120));
        assert!(matches!(outcome, TickOutcome::Spawned(_)));
        assert!(sink
            .texts()
            .contains(&"The Emperor penguin wandered off...".to_string()));
    }

    #[test]
    fn test_empty_registry_force_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let scores = ScoreStore::load(dir.path().join("userdata.json")).unwrap();
        let bot = Arc::new(Bot::new(
            Arc::new(CreatureRegistry::default()),
            scores,
            Arc::new(RecordingSink::default()),
            SpawnScheduler::new(Duration::from_secs(3600)),
            BotSettings::default(),
        ));
        bot.set_spawn_channel("C1");
        assert_eq!(bot.force_spawn(Instant::now()), Err(SpawnError::EmptyRegistry));
    }
}
