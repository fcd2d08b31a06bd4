use anyhow::Result;

use tricook_core::service::TricookService;

pub(crate) fn cmd_seed(service: &TricookService, json: bool) -> Result<()> {
    let count = service.seed_global_catalog()?;
    if json {
        println!("{}", serde_json::json!({ "seeded": count }));
    } else {
        println!("Seeded {count} approved ingredients into the global catalog");
    }
    Ok(())
}
