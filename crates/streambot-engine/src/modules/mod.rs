//! Modules bundled with the engine. Configs refer to their actions as
//! `reply::Say`, `points::Give`, `counter::Increment`, `bot::Broadcast`, ...

pub mod bot;
pub mod counter;
pub mod points;
pub mod reply;

use streambot_types::rules::{Action, Params};

use crate::error::ActionError;
use crate::registry::Module;

/// Bundled modules in registration order.
pub fn builtin_modules() -> Vec<Module> {
    vec![
        reply::module(),
        points::module(),
        counter::module(),
        bot::module(),
    ]
}

pub(crate) fn required<'a>(action: &'a Action, name: &'static str) -> Result<&'a str, ActionError> {
    action.arg(name).ok_or(ActionError::MissingArgument(name))
}

/// `channel` argument if given, else the channel the action was invoked from.
pub(crate) fn target_channel<'a>(action: &'a Action, params: &'a Params) -> &'a str {
    action.arg("channel").unwrap_or(&params.channel)
}
