//! Rule dispatch: turns inbound chat lines and notices into counter bumps,
//! built-in replies, command executions and trigger firings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use streambot_types::config::{BotConfig, GrantConfig};
use streambot_types::events::{BroadcastEvent, ChatLine, InboundEvent, Notice};
use streambot_types::models::User;
use streambot_types::rules::{Command, Params, Restriction, Trigger};
use tracing::{debug, info, warn};

use crate::builtin;
use crate::error::DispatchError;
use crate::modules::reply;
use crate::registry::Registry;
use crate::services::Services;

/// Trigger fired for every plain chat line on the main channel.
pub const CHAT_TRIGGER: &str = "chat::Message";

const COMMAND_PREFIX: char = '!';
const INCREMENT_SUFFIX: &str = "++";

/// How a command token was resolved. Skipped commands are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    CounterIncremented { name: String, value: u64 },
    Builtin,
    Executed { repeats: u64, charged: u64 },
    Disabled,
    Offline,
    NotPermitted,
}

/// Result of a best-effort trigger firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub dispatched: usize,
    pub failed: usize,
}

/// Immutable rule tables plus the services they act on. Built once at
/// startup and shared behind an `Arc`.
pub struct Engine {
    registry: Arc<Registry>,
    services: Services,
    commands: BTreeMap<String, Command>,
    triggers: BTreeMap<String, Trigger>,
    main_channel: String,
    media_path: Option<PathBuf>,
    grants: GrantConfig,
    ignored_users: Vec<String>,
}

impl Engine {
    pub fn new(config: &BotConfig, registry: Arc<Registry>, services: Services) -> Self {
        Self {
            registry,
            services,
            commands: config.commands.clone(),
            triggers: config.triggers.clone(),
            main_channel: config.main_channel.clone(),
            media_path: config.media_path.clone(),
            grants: config.grants.clone(),
            ignored_users: config.ignored_users.clone(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Every configured command, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn media_path(&self) -> Option<&Path> {
        self.media_path.as_deref()
    }

    pub fn handle_event(&self, event: InboundEvent) -> Result<(), DispatchError> {
        match event {
            InboundEvent::ChatLine(line) => self.handle_chat_line(line),
            InboundEvent::Notice(notice) => {
                self.handle_notice(notice);
                Ok(())
            }
        }
    }

    fn handle_chat_line(&self, line: ChatLine) -> Result<(), DispatchError> {
        let ledger = &self.services.ledger;
        let mut user = ledger.get(&line.user_id)?;
        let changed = user.display_name != line.display_name
            || user.color != line.color
            || user.badges != line.badges;
        user.display_name = line.display_name.clone();
        user.color = line.color.clone();
        user.badges = line.badges.clone();

        if user.new {
            user.points = self.grants.starting;
            ledger.save(&user)?;
            info!(user_id = %user.id, name = %user.display_name, "New user seeded");
        } else if changed {
            ledger.save(&user)?;
        }

        if !line.text.starts_with(COMMAND_PREFIX) {
            return self.handle_plain_line(user, line);
        }
        if !self.is_main_channel(&line.channel) {
            return Ok(());
        }
        let mut tokens = line.text[COMMAND_PREFIX.len_utf8()..].split_whitespace();
        let Some(command) = tokens.next() else {
            return Ok(());
        };

        let params = Params {
            channel: line.channel.clone(),
            user_id: line.user_id.clone(),
            user_name: line.display_name.clone(),
            user_badges: line.badges.clone(),
            command: command.to_lowercase(),
            args: tokens.map(str::to_string).collect(),
            payload: BTreeMap::new(),
        };
        let outcome = self.execute_command(&params)?;
        debug!(command = %params.command, user = %params.user_name, ?outcome, "Command handled");
        Ok(())
    }

    /// Non-command lines earn the chat grant. On the main channel they also
    /// fire the chat trigger and reach viewers.
    fn handle_plain_line(&self, mut user: User, line: ChatLine) -> Result<(), DispatchError> {
        if line.text.is_empty() || self.is_ignored(&user.display_name) {
            return Ok(());
        }
        self.services.ledger.give_points(&mut user, self.grants.chat)?;

        if !self.is_main_channel(&line.channel) {
            return Ok(());
        }
        let params = Params {
            channel: line.channel,
            user_id: user.id.clone(),
            user_name: user.display_name.clone(),
            user_badges: user.badges.clone(),
            ..Params::default()
        };
        self.execute_trigger(CHAT_TRIGGER, &params);
        self.services.broadcaster.broadcast(BroadcastEvent::ChatMessage {
            user_id: user.id,
            display_name: user.display_name,
            color: user.color,
            badges: user.badges,
            text: line.text,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn handle_notice(&self, notice: Notice) {
        let trigger = notice.trigger_name();
        let params = Params {
            channel: notice.channel,
            user_id: notice.user_id,
            user_name: notice.display_name,
            payload: notice.payload,
            ..Params::default()
        };
        self.execute_trigger(&trigger, &params);
        self.services.broadcaster.broadcast(BroadcastEvent::Notice {
            source: notice.source,
            kind: notice.kind,
            user_name: params.user_name,
            payload: params.payload,
        });
    }

    /// Resolves `params.command` against the counter shorthand, the
    /// built-ins and the command table, in that order.
    pub fn execute_command(&self, params: &Params) -> Result<Outcome, DispatchError> {
        if let Some(name) = counter_shorthand(&params.command) {
            let value = self.services.counters.increment(name)?;
            self.services.broadcaster.broadcast(BroadcastEvent::CounterUpdated {
                name: name.to_string(),
                value,
            });
            self.say(params, &format!("{name} counter is now: {value}"))?;
            return Ok(Outcome::CounterIncremented {
                name: name.to_string(),
                value,
            });
        }

        if let Some(run) = builtin::lookup(&params.command) {
            run(self, params)?;
            return Ok(Outcome::Builtin);
        }

        let Some(cmd) = self.commands.get(&params.command) else {
            return Err(DispatchError::CommandNotFound(params.command.clone()));
        };
        if !cmd.enabled {
            return Ok(Outcome::Disabled);
        }
        if !cmd.offline && !self.services.status.is_streaming() {
            return Ok(Outcome::Offline);
        }
        if !self.permitted(cmd, params) {
            return Ok(Outcome::NotPermitted);
        }

        info!(command = %cmd.name, user = %params.user_name, "Command executed");
        let repeats = cmd.repeat_count();
        for _ in 0..repeats {
            for declared in &cmd.actions {
                let action = declared.bind(&params.args);
                self.registry
                    .invoke(&self.services, &action, params)
                    .map_err(|source| DispatchError::Action {
                        action: action.name.clone(),
                        source,
                    })?;
            }
        }

        let mut user = self.services.ledger.get(&params.user_id)?;
        let charged = if user.new || cmd.points == 0 {
            0
        } else {
            self.services.ledger.take_points(&mut user, cmd.points)?;
            cmd.points
        };
        Ok(Outcome::Executed { repeats, charged })
    }

    /// Runs every action of trigger `name`. A failing action is logged and
    /// the rest still run. Returns `None` when no such trigger exists.
    pub fn execute_trigger(&self, name: &str, params: &Params) -> Option<TriggerReport> {
        let trigger = self.triggers.get(name)?;
        let mut report = TriggerReport::default();
        for action in &trigger.actions {
            report.dispatched += 1;
            if let Err(e) = self.registry.invoke(&self.services, action, params) {
                report.failed += 1;
                warn!(trigger = name, action = %action.name, "Trigger action failed: {}", e);
            }
        }
        Some(report)
    }

    /// Replies on the invoking channel through `reply::Say`.
    pub fn say(&self, params: &Params, message: &str) -> Result<(), DispatchError> {
        let action = reply::say_action(&params.channel, message);
        self.registry
            .invoke(&self.services, &action, params)
            .map_err(|source| DispatchError::Action {
                action: action.name.clone(),
                source,
            })?;
        Ok(())
    }

    /// A command with restrictions runs if the user satisfies any one of them.
    fn permitted(&self, cmd: &Command, params: &Params) -> bool {
        if cmd.restrictions.is_empty() {
            return true;
        }
        cmd.restrictions.iter().any(|restriction| match restriction {
            Restriction::Badge(badge) => params.user_has_badge(badge),
            Restriction::Follower => self.services.followers.is_follower(&params.user_id),
            Restriction::Unknown(_) => false,
        })
    }

    fn is_main_channel(&self, channel: &str) -> bool {
        self.main_channel.is_empty()
            || self
                .main_channel
                .trim_start_matches('#')
                .eq_ignore_ascii_case(channel.trim_start_matches('#'))
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored_users.iter().any(|u| u.eq_ignore_ascii_case(name))
    }
}

/// `wins++` names counter `wins`. A token of only `+` is not a counter.
fn counter_shorthand(token: &str) -> Option<&str> {
    if !token.ends_with(INCREMENT_SUFFIX) {
        return None;
    }
    let name = token.trim_end_matches('+');
    (!name.is_empty()).then_some(name)
}
