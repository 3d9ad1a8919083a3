//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::store::{Database, InventoryStore, LogbookStore, ProfileStore, SupabaseClient};
use crate::validation::Validator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub validator: Validator,
    pub inventory_store: InventoryStore,
    pub profile_store: ProfileStore,
    /// `None` when no Supabase project is configured
    pub logbook_store: Option<LogbookStore>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let config = Arc::new(config);
        let validator = Validator::new(config.item_code_max_len);

        // Both local stores share one connection
        let inventory_store = InventoryStore::new(db.clone(), validator);
        let profile_store = ProfileStore::new(db, validator);

        let logbook_store = config.supabase.as_ref().map(|supabase| {
            let client = SupabaseClient::new(&supabase.url, &supabase.key);
            LogbookStore::new(client, &supabase.logbook_table, validator)
        });

        Self {
            config,
            validator,
            inventory_store,
            profile_store,
            logbook_store,
        }
    }
}
