use streambot_types::events::BroadcastEvent;
use streambot_types::rules::{Action, Params};

use super::required;
use crate::error::ActionError;
use crate::registry::Module;
use crate::services::Services;

pub fn module() -> Module {
    Module::new("bot")
        .action("SetStreaming", set_streaming)
        .action("Broadcast", broadcast)
}

fn set_streaming(services: &Services, action: &Action, _: &Params) -> Result<(), ActionError> {
    let raw = required(action, "live")?;
    let live = match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => true,
        "false" | "off" | "no" | "0" => false,
        other => {
            return Err(ActionError::InvalidArgument {
                name: "live",
                reason: format!("expected on/off, got '{other}'"),
            });
        }
    };
    services.status.set_streaming(live);
    Ok(())
}

fn broadcast(services: &Services, action: &Action, params: &Params) -> Result<(), ActionError> {
    let text = required(action, "message")?.replace("{user}", &params.user_name);
    services
        .broadcaster
        .broadcast(BroadcastEvent::Announcement { text });
    Ok(())
}
