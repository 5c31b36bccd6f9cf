//! Prune command handler

use std::sync::Arc;

use crate::config::Config;
use crate::services::Maintenance;
use crate::state::SharedState;

pub async fn cmd_prune(config: Config, retention_hours: Option<u32>) -> anyhow::Result<()> {
    let mut maintenance_config = config.maintenance.clone();
    if let Some(hours) = retention_hours {
        maintenance_config.reset_token_retention_hours = hours;
    }

    let shared = SharedState::new(config).await?;
    let maintenance = Maintenance::new(Arc::clone(&shared.resets), maintenance_config);

    let removed = maintenance.run_once().await?;
    println!("Removed {removed} expired reset token(s)");
    Ok(())
}
