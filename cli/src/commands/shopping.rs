use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;

use tricook_core::models::User;
use tricook_core::service::TricookService;

pub(crate) fn cmd_shopping_list(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let export = service.shopping_list(instance_id, user, today)?;

    match output {
        Some(path) => {
            // A directory gets the suggested filename; a file path is used as-is
            let path = if path.is_dir() {
                path.join(&export.filename)
            } else {
                path.to_path_buf()
            };
            std::fs::write(&path, &export.text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if json {
                println!("{}", serde_json::json!({ "written": path.display().to_string() }));
            } else {
                println!("Wrote {}", path.display());
            }
        }
        None => {
            if json {
                println!("{}", serde_json::to_string_pretty(&export)?);
            } else {
                println!("{}", export.text);
            }
        }
    }
    Ok(())
}
