use streambot_types::models::User;
use streambot_types::rules::{Action, Params};

use super::required;
use crate::error::ActionError;
use crate::registry::Module;
use crate::services::Services;

pub fn module() -> Module {
    Module::new("points").action("Give", give).action("Take", take)
}

fn amount(action: &Action) -> Result<u64, ActionError> {
    required(action, "amount")?
        .parse()
        .map_err(|e: std::num::ParseIntError| ActionError::InvalidArgument {
            name: "amount",
            reason: e.to_string(),
        })
}

/// The user named by the `user` argument (leading `@` allowed), else the invoker.
fn target(services: &Services, action: &Action, params: &Params) -> Result<User, ActionError> {
    match action.arg("user") {
        Some(name) => {
            let name = name.trim_start_matches('@');
            services
                .ledger
                .find_by_name(name)?
                .ok_or_else(|| ActionError::UnknownUser(name.to_string()))
        }
        None => Ok(services.ledger.get(&params.user_id)?),
    }
}

fn give(services: &Services, action: &Action, params: &Params) -> Result<(), ActionError> {
    let n = amount(action)?;
    let mut user = target(services, action, params)?;
    services.ledger.give_points(&mut user, n)?;
    Ok(())
}

fn take(services: &Services, action: &Action, params: &Params) -> Result<(), ActionError> {
    let n = amount(action)?;
    let mut user = target(services, action, params)?;
    services.ledger.take_points(&mut user, n)?;
    Ok(())
}
