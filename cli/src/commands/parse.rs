use anyhow::{Context, Result};
use std::io::Read;

use tricook_core::models::User;
use tricook_core::service::{IngredientExtractor, TricookService};

/// Run the extraction pipeline against a meal. Without `--commit` the
/// reconciled result is only previewed.
pub(crate) fn cmd_parse(
    service: &TricookService,
    extractor: &dyn IngredientExtractor,
    user: &User,
    meal_id: i64,
    text: Option<String>,
    commit: bool,
    json: bool,
) -> Result<()> {
    let text = match text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            buf
        }
    };

    let outcome = service.parse_free_text(extractor, user, meal_id, &text)?;

    if !commit {
        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            if outcome.existing.is_empty() && outcome.new.is_empty() {
                println!("No ingredients recognized");
                return Ok(());
            }
            if !outcome.existing.is_empty() {
                println!("Matched ingredients:");
                for draft in &outcome.existing {
                    let quantity = draft.quantity;
                    let unit = &draft.unit;
                    let name = &draft.name;
                    println!("  {quantity} {unit} de {name}");
                }
            }
            if !outcome.new.is_empty() {
                println!("New ingredients (will be created as pending):");
                for draft in &outcome.new {
                    let quantity = draft.quantity;
                    let unit = &draft.unit;
                    let name = &draft.name;
                    let category = &draft.category;
                    println!("  {quantity} {unit} de {name} [{category}]");
                }
            }
            println!("\nRe-run with --commit to save");
        }
        return Ok(());
    }

    let summary = service.commit_extraction(user, meal_id, &outcome)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Committed: {} usages, {} new ingredients, {} reused",
            summary.usages_created, summary.ingredients_created, summary.ingredients_reused
        );
        for error in &summary.errors {
            eprintln!("Warning: {error}");
        }
    }
    Ok(())
}
