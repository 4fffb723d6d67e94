use streambot_db::StoreError;
use streambot_types::rules::ActionName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("action {0} is already registered")]
    DuplicateAction(ActionName),

    #[error("module '{module}' failed to initialize: {reason}")]
    ModuleInit { module: String, reason: String },
}

/// Failure raised by an action handler.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("argument '{0}' is required")]
    MissingArgument(&'static str),

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("action {action} failed: {source}")]
    Action {
        action: ActionName,
        #[source]
        source: ActionError,
    },

    #[error("{0}")]
    Usage(String),

    #[error("reading media directory: {0}")]
    Media(#[from] std::io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
#[error("chat transport unavailable: {0}")]
pub struct SinkError(pub String);

#[derive(Debug, Error)]
#[error("profile lookup failed: {0}")]
pub struct LookupError(pub String);

#[derive(Debug, Error)]
pub enum FollowerError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
