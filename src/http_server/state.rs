use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::ports::media_store::MediaStore;
use crate::services::player::PlayerSessions;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub media_store: Arc<dyn MediaStore>,
    pub players: PlayerSessions,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: Config, media_store: Arc<dyn MediaStore>) -> Self {
        Self {
            db,
            config,
            media_store,
            players: PlayerSessions::default(),
        }
    }
}
