use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use tricook_core::error::Error;
use tricook_core::models::User;
use tricook_core::service::TricookService;

use super::helpers::{fail_not_found, parse_date, truncate};

pub(crate) fn cmd_meal_create(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    name: &str,
    meal_type: &str,
    date: Option<String>,
    slot_ids: &[i64],
    json: bool,
) -> Result<()> {
    let date = date.map(Some).map(parse_date).transpose()?;
    let meal = service.create_meal(user, instance_id, name, meal_type, date, slot_ids)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        match &meal.date {
            Some(d) => println!("Created {} '{}' on {d} (id {})", meal.meal_type, meal.name, meal.id),
            None => println!("Created {} '{}' (id {})", meal.meal_type, meal.name, meal.id),
        }
    }
    Ok(())
}

pub(crate) fn cmd_meal_list(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    json: bool,
) -> Result<()> {
    let meals = service.list_meals(instance_id, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }
    if meals.is_empty() {
        println!("No meals in this instance yet");
        return Ok(());
    }

    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        meal_type: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.meal.id,
            name: truncate(&m.meal.name, 35),
            meal_type: m.meal.meal_type.clone(),
            date: m.meal.date.clone().unwrap_or_else(|| "-".to_string()),
            ingredients: m.ingredients.len(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));

    for meal in &meals {
        if meal.ingredients.is_empty() {
            continue;
        }
        println!("\n{} (id {}):", meal.meal.name, meal.meal.id);
        for usage in &meal.ingredients {
            let name = usage.ingredient_name.as_deref().unwrap_or("?");
            let quantity = usage.quantity;
            let unit = &usage.unit;
            println!("  [{}] {quantity} {unit} de {name}", usage.id);
        }
    }
    Ok(())
}

pub(crate) fn cmd_meal_delete(
    service: &TricookService,
    user: &User,
    meal_id: i64,
    json: bool,
) -> Result<()> {
    match service.delete_meal(meal_id, user) {
        Ok(()) => {
            if json {
                println!("{}", serde_json::json!({ "deleted": meal_id }));
            } else {
                println!("Deleted meal {meal_id}");
            }
            Ok(())
        }
        Err(Error::NotFound(msg)) => fail_not_found(&msg, json),
        Err(e) => Err(e.into()),
    }
}
