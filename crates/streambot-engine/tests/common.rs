use std::sync::Arc;

use streambot_db::Store;
use streambot_engine::sinks::{ProfileLookup, StaticProfiles};
use streambot_engine::testing::{RecordingBroadcaster, RecordingChat};
use streambot_engine::{Engine, Registry, Services};
use streambot_types::config::BotConfig;
use streambot_types::events::{ChatLine, InboundEvent};
use streambot_types::models::Badges;
use streambot_types::rules::Params;

pub struct Harness {
    pub engine: Engine,
    pub chat: Arc<RecordingChat>,
    pub broadcaster: Arc<RecordingBroadcaster>,
}

impl Harness {
    pub fn new(config_json: &str) -> Self {
        Self::with_profiles(config_json, Arc::new(StaticProfiles::default()))
    }

    pub fn with_profiles(config_json: &str, profiles: Arc<dyn ProfileLookup>) -> Self {
        let config = BotConfig::from_json(config_json).unwrap();
        let mut registry = Registry::with_builtin_modules().unwrap();
        registry.init(&config).unwrap();

        let chat = Arc::new(RecordingChat::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let services = Services::new(
            Arc::new(Store::open_in_memory().unwrap()),
            chat.clone(),
            broadcaster.clone(),
            profiles,
            config.streaming,
        );
        let engine = Engine::new(&config, Arc::new(registry), services);
        Self {
            engine,
            chat,
            broadcaster,
        }
    }

    /// Stores a known (non-new) user with the given balance.
    pub fn user(&self, id: &str, name: &str, points: u64) {
        let ledger = &self.engine.services().ledger;
        let mut user = ledger.get(id).unwrap();
        user.display_name = name.to_string();
        user.points = points;
        ledger.save(&user).unwrap();
    }

    pub fn points(&self, id: &str) -> u64 {
        self.engine.services().ledger.get(id).unwrap().points
    }

    pub fn chat_line(&self, id: &str, name: &str, badges: &[&str], text: &str) {
        self.engine
            .handle_event(InboundEvent::ChatLine(ChatLine {
                user_id: id.to_string(),
                display_name: name.to_string(),
                badges: badges_of(badges),
                channel: "#main".to_string(),
                text: text.to_string(),
                ..ChatLine::default()
            }))
            .unwrap();
    }
}

pub fn badges_of(names: &[&str]) -> Badges {
    names.iter().map(|b| (b.to_string(), 1)).collect()
}

pub fn params(id: &str, name: &str, command: &str, args: &[&str]) -> Params {
    Params {
        channel: "#main".to_string(),
        user_id: id.to_string(),
        user_name: name.to_string(),
        command: command.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        ..Params::default()
    }
}
