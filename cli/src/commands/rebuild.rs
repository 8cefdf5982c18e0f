use anyhow::Result;

use paw_core::service::PawService;

use super::helpers::{print_json, resolve_window};
use crate::config::Config;

pub(crate) fn cmd_rebuild(
    svc: &PawService,
    config: &Config,
    user: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let window = resolve_window(from, to)?;
    for user in config.select_users(user)? {
        let counts = svc.rebuild(&user.name, window.from, window.to)?;
        if json {
            print_json(&serde_json::json!({ "user": user.name, "loaded": counts }))?;
        } else {
            println!(
                "Rebuilt {} day(s) for {} ({} to {}): {} meals, {} entries, {} exercises, {} measurements",
                counts.snapshots,
                user.name,
                window.from,
                window.to,
                counts.meals,
                counts.meal_entries,
                counts.cardio + counts.strength,
                counts.measurements
            );
        }
    }
    Ok(())
}
