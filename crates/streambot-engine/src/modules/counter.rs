use streambot_types::events::BroadcastEvent;
use streambot_types::rules::{Action, Params};

use super::{required, target_channel};
use crate::error::ActionError;
use crate::registry::Module;
use crate::services::Services;

pub fn module() -> Module {
    Module::new("counter").action("Increment", increment)
}

/// Increments `name`. With a `message` argument, replies with `{name}` and
/// `{value}` filled in.
fn increment(services: &Services, action: &Action, params: &Params) -> Result<(), ActionError> {
    let name = required(action, "name")?;
    let value = services.counters.increment(name)?;
    services.broadcaster.broadcast(BroadcastEvent::CounterUpdated {
        name: name.to_string(),
        value,
    });

    if let Some(template) = action.arg("message") {
        let text = template
            .replace("{name}", name)
            .replace("{value}", &value.to_string());
        services.chat.send(target_channel(action, params), &text)?;
    }
    Ok(())
}
