use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use tricook_core::error::Error;
use tricook_core::models::User;
use tricook_core::service::TricookService;

use super::helpers::{fail_not_found, truncate};

pub(crate) fn cmd_ingredient_add(
    service: &TricookService,
    user: &User,
    meal_id: i64,
    name: &str,
    quantity: f64,
    unit: &str,
    json: bool,
) -> Result<()> {
    match service.add_usage(user, meal_id, name, quantity, unit) {
        Ok(usage) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&usage)?);
            } else {
                let name = usage.ingredient_name.as_deref().unwrap_or(name);
                println!("Added {quantity} {unit} de {name} to meal {meal_id} (usage id {})", usage.id);
            }
            Ok(())
        }
        Err(Error::NotFound(msg)) => fail_not_found(&msg, json),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn cmd_ingredient_list(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    json: bool,
) -> Result<()> {
    let entries = service.list_catalog(instance_id, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("Catalog is empty. Run 'tricook seed' to load the starter ingredients");
        return Ok(());
    }

    #[derive(Tabled)]
    struct CatalogRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Default unit")]
        default_unit: String,
    }

    let rows: Vec<CatalogRow> = entries
        .iter()
        .map(|e| CatalogRow {
            id: e.id,
            name: truncate(&e.name, 35),
            category: e.category.clone().unwrap_or_else(|| "-".to_string()),
            default_unit: e.default_unit.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_ingredient_remove(
    service: &TricookService,
    user: &User,
    usage_id: i64,
    json: bool,
) -> Result<()> {
    match service.remove_usage(user, usage_id) {
        Ok(()) => {
            if json {
                println!("{}", serde_json::json!({ "deleted": usage_id }));
            } else {
                println!("Removed usage {usage_id}");
            }
            Ok(())
        }
        Err(Error::NotFound(msg)) => fail_not_found(&msg, json),
        Err(e) => Err(e.into()),
    }
}
