use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::Badges;

/// Qualified `module::verb` name of an action handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionName {
    pub module: String,
    pub verb: String,
}

impl ActionName {
    pub fn new(module: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            verb: verb.into(),
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.verb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidActionName(pub String);

impl fmt::Display for InvalidActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action name '{}' is not of the form module::verb", self.0)
    }
}

impl std::error::Error for InvalidActionName {}

impl FromStr for ActionName {
    type Err = InvalidActionName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("::") {
            Some((module, verb)) if !module.is_empty() && !verb.is_empty() => {
                Ok(Self::new(module, verb))
            }
            _ => Err(InvalidActionName(s.to_string())),
        }
    }
}

impl TryFrom<String> for ActionName {
    type Error = InvalidActionName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActionName> for String {
    fn from(name: ActionName) -> Self {
        name.to_string()
    }
}

/// One parameterized unit of work inside a command or trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: ActionName,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    /// Slot `i` receives the i-th user-supplied argument, when present.
    #[serde(default)]
    pub user_arg_map: Vec<String>,
}

impl Action {
    pub fn new(name: ActionName) -> Self {
        Self {
            name,
            args: BTreeMap::new(),
            user_arg_map: Vec::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_user_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_arg_map = slots.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of this action with positional user arguments laid over the
    /// declared argument map. The declared action is left untouched.
    pub fn bind(&self, user_args: &[String]) -> Action {
        let mut bound = self.clone();
        for (slot, value) in self.user_arg_map.iter().zip(user_args) {
            bound.args.insert(slot.clone(), value.clone());
        }
        bound
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

/// Badges that may appear as restriction tags.
pub const RESTRICTION_BADGES: &[&str] = &["vip", "subscriber", "broadcaster", "premium", "founder"];

/// Eligibility predicate gating a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Restriction {
    Badge(String),
    Follower,
    /// Tag with no known predicate; never satisfied.
    Unknown(String),
}

impl From<String> for Restriction {
    fn from(tag: String) -> Self {
        let lower = tag.to_ascii_lowercase();
        if lower == "follower" {
            Restriction::Follower
        } else if RESTRICTION_BADGES.contains(&lower.as_str()) {
            Restriction::Badge(lower)
        } else {
            Restriction::Unknown(tag)
        }
    }
}

impl From<Restriction> for String {
    fn from(r: Restriction) -> Self {
        match r {
            Restriction::Badge(badge) => badge,
            Restriction::Follower => "follower".to_string(),
            Restriction::Unknown(tag) => tag,
        }
    }
}

/// User-invocable, permissioned, point-costing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Allowed to run while the stream is offline.
    pub offline: bool,
    pub points: u64,
    pub repeat: u64,
    pub actions: Vec<Action>,
    pub restrictions: Vec<Restriction>,
}

impl Command {
    /// `repeat = 0` runs once.
    pub fn repeat_count(&self) -> u64 {
        self.repeat.max(1)
    }
}

/// Programmatically fired action sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    pub actions: Vec<Action>,
}

/// Context an action runs with: who invoked it, where, and with what.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub channel: String,
    pub user_id: String,
    pub user_name: String,
    pub user_badges: Badges,
    pub command: String,
    pub args: Vec<String>,
    pub payload: BTreeMap<String, String>,
}

impl Params {
    pub fn user_has_badge(&self, badge: &str) -> bool {
        self.user_badges.contains_key(badge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_name_parses_module_and_verb() {
        let name: ActionName = "reply::Say".parse().unwrap();
        assert_eq!(name, ActionName::new("reply", "Say"));
        assert_eq!(name.to_string(), "reply::Say");
    }

    #[test]
    fn action_name_rejects_missing_separator() {
        assert!("replySay".parse::<ActionName>().is_err());
        assert!("::Say".parse::<ActionName>().is_err());
        assert!("reply::".parse::<ActionName>().is_err());
    }

    #[test]
    fn bind_overlays_only_supplied_slots() {
        let action = Action::new(ActionName::new("reply", "Say"))
            .with_arg("message", "default")
            .with_user_slots(["message", "channel"]);

        let bound = action.bind(&["hello".to_string()]);
        assert_eq!(bound.arg("message"), Some("hello"));
        assert_eq!(bound.arg("channel"), None);
        // declared map is not mutated
        assert_eq!(action.arg("message"), Some("default"));
    }

    #[test]
    fn restriction_tags_classify() {
        assert_eq!(Restriction::from("VIP".to_string()), Restriction::Badge("vip".into()));
        assert_eq!(Restriction::from("follower".to_string()), Restriction::Follower);
        assert_eq!(
            Restriction::from("moderator".to_string()),
            Restriction::Unknown("moderator".into())
        );
    }

    #[test]
    fn zero_repeat_runs_once() {
        let cmd = Command::default();
        assert_eq!(cmd.repeat_count(), 1);
        let cmd = Command { repeat: 3, ..Command::default() };
        assert_eq!(cmd.repeat_count(), 3);
    }
}
