//! Commands answered by the engine itself. They bypass restrictions, the
//! offline gate and point costs.

use std::path::Path;

use streambot_types::rules::Params;
use tracing::debug;

use crate::dispatch::Engine;
use crate::error::{DispatchError, LedgerError};

pub(crate) type Builtin = fn(&Engine, &Params) -> Result<(), DispatchError>;

pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let builtin: Builtin = match name {
        "help" | "commands" => help,
        "me" => me,
        "props" => props,
        "counters" => counters,
        "so" => shoutout,
        "sounds" => sounds,
        _ => return None,
    };
    Some(builtin)
}

/// `help` lists enabled commands; `help <name>` describes one.
fn help(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    if let Some(name) = params.args.first() {
        let name = name.to_lowercase();
        return match engine.command(&name) {
            Some(cmd) => engine.say(params, &format!("{}: {}", name, cmd.description)),
            None => Ok(()),
        };
    }

    let enabled: Vec<&str> = engine
        .commands()
        .filter(|cmd| cmd.enabled)
        .map(|cmd| cmd.name.as_str())
        .collect();
    engine.say(params, &enabled.join(", "))
}

fn me(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    let user = engine.services().ledger.get(&params.user_id)?;
    engine.say(params, &format!("{}: {} points", user.display_name, user.points))
}

/// `props <@user> <n>`. The channel owner mints points; everyone else
/// transfers from their own balance.
fn props(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    let [recipient, amount] = params.args.as_slice() else {
        return Ok(());
    };
    let amount: u64 = amount
        .parse()
        .map_err(|_| DispatchError::Usage(format!("'{amount}' is not a point amount")))?;

    let ledger = &engine.services().ledger;
    let recipient = recipient.trim_start_matches('@');
    let Some(mut target) = ledger.find_by_name(recipient)? else {
        debug!(recipient, "props recipient unknown, ignoring");
        return Ok(());
    };

    let mut sender = ledger.get(&params.user_id)?;
    let owner = params.channel.trim_start_matches('#');
    if sender.display_name.eq_ignore_ascii_case(owner) {
        ledger.give_points(&mut target, amount)?;
        return Ok(());
    }

    match ledger.transfer_points(&mut sender, amount, &target.id) {
        Ok(()) => Ok(()),
        Err(LedgerError::InsufficientFunds { balance, .. }) => engine.say(
            params,
            &format!("{}: you only have {} points", sender.display_name, balance),
        ),
        Err(e) => Err(e.into()),
    }
}

fn counters(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    let listed: Vec<String> = engine
        .services()
        .counters
        .list()?
        .iter()
        .map(|c| format!("{}: {}", c.name, c.value))
        .collect();
    engine.say(params, &format!("counters: {}", listed.join(", ")))
}

fn shoutout(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    let Some(user) = params.args.first() else {
        return Err(DispatchError::Usage("username is required".into()));
    };
    let user = user.trim_start_matches('@');
    engine.say(
        params,
        &format!(
            "Shoutout {user}! Check out their channel, shower them with follows and subs: https://twitch.tv/{user}"
        ),
    )
}

fn sounds(engine: &Engine, params: &Params) -> Result<(), DispatchError> {
    let Some(dir) = engine.media_path() else {
        debug!("No media path configured");
        return Ok(());
    };
    let names = sound_names(dir)?;
    engine.say(params, &format!("sounds: {}", names.join(", ")))
}

/// File stems of the regular files in `dir`, sorted.
fn sound_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(stem) = Path::new(&entry.file_name()).file_stem() {
            names.push(stem.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
