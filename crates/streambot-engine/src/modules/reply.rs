use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::Deserialize;
use streambot_types::rules::{Action, ActionName, Params};

use super::{required, target_channel};
use crate::error::ActionError;
use crate::registry::Module;
use crate::services::Services;
use crate::status::format_elapsed;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyConfig {
    /// Prepended to every message this module sends.
    prefix: String,
}

pub fn module() -> Module {
    let config: Arc<OnceLock<ReplyConfig>> = Arc::default();
    let init = config.clone();
    let uptime_config = config.clone();

    Module::new("reply")
        .action("Say", move |services, action, params| {
            say(services, config.get(), action, params)
        })
        .action("Uptime", move |services, action, params| {
            uptime(services, uptime_config.get(), action, params)
        })
        .on_init(move |raw| {
            let parsed = if raw.is_null() {
                ReplyConfig::default()
            } else {
                serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?
            };
            init.set(parsed)
                .map_err(|_| "reply module initialized twice".to_string())
        })
}

/// `reply::Say` bound to a channel and message.
pub fn say_action(channel: &str, message: &str) -> Action {
    Action::new(ActionName::new("reply", "Say"))
        .with_arg("channel", channel)
        .with_arg("message", message)
}

/// `{user}` in the message is replaced with the invoking user's name.
fn say(
    services: &Services,
    config: Option<&ReplyConfig>,
    action: &Action,
    params: &Params,
) -> Result<(), ActionError> {
    let message = required(action, "message")?.replace("{user}", &params.user_name);
    services
        .chat
        .send(target_channel(action, params), &format!("{}{message}", prefix(config)))?;
    Ok(())
}

fn uptime(
    services: &Services,
    config: Option<&ReplyConfig>,
    action: &Action,
    params: &Params,
) -> Result<(), ActionError> {
    let text = match services.status.live_since() {
        Some(since) => format!("I started streaming {} ago", format_elapsed(Utc::now() - since)),
        None => "The stream is offline right now".to_string(),
    };
    services
        .chat
        .send(target_channel(action, params), &format!("{}{text}", prefix(config)))?;
    Ok(())
}

fn prefix(config: Option<&ReplyConfig>) -> &str {
    config.map(|c| c.prefix.as_str()).unwrap_or_default()
}
