use crate::config::LedgerConfig;
use crate::store::Store;
use crate::types::{IdentityCreated, IdentityMetadata};

use super::{init_store, print_json};

pub fn run_identity_create(
    config: &LedgerConfig,
    id: String,
    metadata: IdentityMetadata,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let user = store.handle_identity_created(&IdentityCreated { id, metadata })?;
    print_json(&user)
}

pub fn run_identity_delete(config: &LedgerConfig, id: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;

    if !store.handle_identity_deleted(id)? {
        anyhow::bail!("Identity '{}' not found", id);
    }
    print_json(&serde_json::json!({ "deleted": id }))
}

pub fn run_gm(config: &LedgerConfig, user_id: &str, revoke: bool) -> anyhow::Result<()> {
    let store = init_store(config)?;

    store
        .set_user_gm(user_id, !revoke)
        .map_err(|e| anyhow::anyhow!("Failed to update user '{}': {}", user_id, e))?;
    print_json(&serde_json::json!({ "user_id": user_id, "is_gm": !revoke }))
}
