//! Shopping-list aggregation: fold every ingredient usage of an instance
//! into one deduplicated, unit-normalized, categorized plain-text list.
//!
//! Pure over its input snapshot; given the same usages the rendered text is
//! byte-identical across runs (the generation date is a parameter), which
//! keeps exports snapshot-testable and safe to cache.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{MealWithIngredients, UNCATEGORIZED, normalize_for_aggregation, normalize_name};

struct AggregatedLine {
    name: String,
    quantity: f64,
    unit: String,
    category: String,
}

/// Render the shopping list for an instance.
///
/// Usages are folded over the key `(normalized ingredient name, trimmed
/// converted unit)` after volume units are converted to grams, grouped by
/// category, with categories and ingredient names both sorted
/// lexicographically.
#[must_use]
pub fn build_shopping_list(
    instance_name: &str,
    meals: &[MealWithIngredients],
    generated_on: NaiveDate,
) -> String {
    // Meal names, deduplicated, insertion order.
    let mut meal_names: Vec<&str> = Vec::new();
    for m in meals {
        let name = m.meal.name.as_str();
        if !name.is_empty() && !meal_names.contains(&name) {
            meal_names.push(name);
        }
    }

    // Fold usages. Keys carry insertion order only transiently; output
    // ordering comes from the sorted grouping below.
    let mut aggregated: HashMap<String, AggregatedLine> = HashMap::new();
    for meal in meals {
        for usage in &meal.ingredients {
            // The persistence layer guarantees the ingredient join; a
            // usage without one would be an upstream invariant violation.
            let Some(ingredient_name) = usage.ingredient_name.as_deref() else {
                continue;
            };
            let (quantity, unit) = normalize_for_aggregation(usage.quantity, &usage.unit);
            let name = normalize_name(ingredient_name);
            let unit = unit.trim().to_string();
            let key = format!("{name}_{unit}");

            if let Some(entry) = aggregated.get_mut(&key) {
                entry.quantity += quantity;
            } else {
                aggregated.insert(
                    key,
                    AggregatedLine {
                        name,
                        quantity,
                        unit,
                        category: usage
                            .ingredient_category
                            .clone()
                            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                    },
                );
            }
        }
    }

    let total = aggregated.len();

    // Group by category; BTreeMap gives the lexicographic category order.
    let mut by_category: BTreeMap<String, Vec<AggregatedLine>> = BTreeMap::new();
    for line in aggregated.into_values() {
        by_category.entry(line.category.clone()).or_default().push(line);
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("LISTE DE COURSES - {instance_name}"));
    lines.push(format!("Générée le {}", generated_on.format("%d/%m/%Y")));
    lines.push(String::new());

    if !meal_names.is_empty() {
        lines.push("REPAS INCLUS:".to_string());
        for name in &meal_names {
            lines.push(format!("  - {name}"));
        }
        lines.push(String::new());
    }

    for (category, items) in &mut by_category {
        lines.push(format!("{}:", category.to_uppercase()));
        // Unit breaks ties between lines sharing a name; without it the
        // order would leak the fold map's hasher state.
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.unit.cmp(&b.unit)));
        for item in items {
            let quantity = item.quantity;
            let unit = &item.unit;
            let name = &item.name;
            lines.push(format!("  - {quantity} {unit} de {name}"));
        }
        lines.push(String::new());
    }

    if by_category.is_empty() {
        lines.push("Aucun ingrédient à acheter.".to_string());
    }

    let plural = if total > 1 { "s" } else { "" };
    lines.push(format!("Total : {total} ingrédient{plural}"));

    lines.join("\n")
}

/// Suggested download filename for an exported list.
#[must_use]
pub fn export_filename(instance_name: &str, generated_on: NaiveDate) -> String {
    format!(
        "liste-de-courses-{instance_name}-{}.txt",
        generated_on.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meal, MealIngredient};

    fn meal(id: i64, name: &str, usages: Vec<MealIngredient>) -> MealWithIngredients {
        MealWithIngredients {
            meal: Meal {
                id,
                uuid: format!("meal-{id}"),
                name: name.to_string(),
                meal_type: "dinner".to_string(),
                date: None,
                instance_id: 1,
                created_at: String::new(),
                updated_at: String::new(),
            },
            ingredients: usages,
        }
    }

    fn usage(name: &str, category: Option<&str>, quantity: f64, unit: &str) -> MealIngredient {
        MealIngredient {
            id: 0,
            uuid: String::new(),
            meal_id: 0,
            ingredient_id: 0,
            quantity,
            unit: unit.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            ingredient_name: Some(name.to_string()),
            ingredient_category: category.map(ToString::to_string),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_liter_conversion_merges_with_grams() {
        let meals = vec![
            meal(1, "Repas A", vec![usage("tomate", Some("Fruits et légumes"), 200.0, "g")]),
            meal(2, "Repas B", vec![usage("tomate", Some("Fruits et légumes"), 1.0, "l")]),
        ];
        let text = build_shopping_list("Colocation", &meals, date());
        assert!(text.contains("FRUITS ET LÉGUMES:"));
        assert!(text.contains("  - 1200 g de tomate"));
        assert!(text.contains("Total : 1 ingrédient"));
        assert!(!text.contains("ingrédients"));
    }

    #[test]
    fn test_case_and_whitespace_variants_merge() {
        let meals = vec![meal(
            1,
            "Repas",
            vec![
                usage("tomate", Some("Fruits et légumes"), 200.0, "g"),
                usage("Tomate ", Some("Fruits et légumes"), 300.0, "g "),
            ],
        )];
        let text = build_shopping_list("Colocation", &meals, date());
        assert!(text.contains("  - 500 g de tomate"));
        assert!(text.contains("Total : 1 ingrédient"));
    }

    #[test]
    fn test_same_name_different_unit_stays_split() {
        let meals = vec![meal(
            1,
            "Repas",
            vec![
                usage("farine", Some("Épicerie salée"), 500.0, "g"),
                usage("farine", Some("Épicerie salée"), 1.0, "paquet"),
            ],
        )];
        let text = build_shopping_list("Colocation", &meals, date());
        assert!(text.contains("  - 500 g de farine"));
        assert!(text.contains("  - 1 paquet de farine"));
        assert!(text.contains("Total : 2 ingrédients"));
    }

    #[test]
    fn test_same_name_different_unit_renders_byte_identical() {
        let meals = vec![meal(
            1,
            "Repas",
            vec![
                usage("farine", Some("Épicerie salée"), 500.0, "g"),
                usage("farine", Some("Épicerie salée"), 1.0, "paquet"),
                usage("farine", Some("Épicerie salée"), 2.0, "sachet"),
            ],
        )];
        let first = build_shopping_list("Colocation", &meals, date());
        for _ in 0..100 {
            assert_eq!(build_shopping_list("Colocation", &meals, date()), first);
        }
        // Same-name lines come out unit-sorted, not in fold order
        let g = first.find("  - 500 g de farine").unwrap();
        let paquet = first.find("  - 1 paquet de farine").unwrap();
        let sachet = first.find("  - 2 sachet de farine").unwrap();
        assert!(g < paquet && paquet < sachet);
    }

    #[test]
    fn test_empty_instance_reports_nothing_to_buy() {
        let text = build_shopping_list("Colocation", &[], date());
        assert!(text.contains("Aucun ingrédient à acheter."));
        assert!(text.contains("Total : 0 ingrédient"));
        assert!(!text.contains("REPAS INCLUS"));
    }

    #[test]
    fn test_missing_category_falls_back_to_autre() {
        let meals = vec![meal(1, "Repas", vec![usage("truc", None, 1.0, "unité")])];
        let text = build_shopping_list("Colocation", &meals, date());
        assert!(text.contains("AUTRE:"));
        assert!(text.contains("  - 1 unité de truc"));
    }

    #[test]
    fn test_categories_and_names_sorted() {
        let meals = vec![meal(
            1,
            "Repas",
            vec![
                usage("poulet", Some("Viandes et poissons"), 1.0, "kg"),
                usage("tomate", Some("Fruits et légumes"), 2.0, "pièce"),
                usage("courgette", Some("Fruits et légumes"), 3.0, "pièce"),
            ],
        )];
        let text = build_shopping_list("Colocation", &meals, date());
        let fruits = text.find("FRUITS ET LÉGUMES:").unwrap();
        let viandes = text.find("VIANDES ET POISSONS:").unwrap();
        assert!(fruits < viandes);
        let courgette = text.find("courgette").unwrap();
        let tomate = text.find("tomate").unwrap();
        assert!(courgette < tomate);
    }

    #[test]
    fn test_meal_names_deduplicated_insertion_order() {
        let meals = vec![
            meal(1, "Pâtes", vec![]),
            meal(2, "Salade", vec![]),
            meal(3, "Pâtes", vec![]),
        ];
        let text = build_shopping_list("Colocation", &meals, date());
        assert_eq!(text.matches("  - Pâtes").count(), 1);
        let pates = text.find("  - Pâtes").unwrap();
        let salade = text.find("  - Salade").unwrap();
        assert!(pates < salade);
    }

    #[test]
    fn test_output_is_order_independent() {
        // Unnamed meals are skipped by the REPAS INCLUS block, so the whole
        // rendered text must be identical for any usage order.
        let a = vec![
            meal(1, "", vec![
                usage("tomate", Some("Fruits et légumes"), 200.0, "g"),
                usage("poulet", Some("Viandes et poissons"), 1.0, "kg"),
            ]),
            meal(2, "", vec![usage("tomate", Some("Fruits et légumes"), 1.0, "l")]),
        ];
        let b = vec![
            meal(2, "", vec![usage("tomate", Some("Fruits et légumes"), 1.0, "l")]),
            meal(1, "", vec![
                usage("poulet", Some("Viandes et poissons"), 1.0, "kg"),
                usage("tomate", Some("Fruits et légumes"), 200.0, "g"),
            ]),
        ];
        let text_a = build_shopping_list("Colocation", &a, date());
        let text_b = build_shopping_list("Colocation", &b, date());
        assert_eq!(text_a, text_b);
    }

    #[test]
    fn test_full_render_snapshot() {
        let meals = vec![
            meal(1, "Pâtes bolo", vec![
                usage("tomate", Some("Fruits et légumes"), 200.0, "g"),
                usage("lait", Some("Crèmerie et produits laitiers"), 50.0, "cl"),
            ]),
            meal(2, "Soupe", vec![usage("tomate", Some("Fruits et légumes"), 1.0, "l")]),
        ];
        let text = build_shopping_list("Colocation", &meals, date());
        let expected = "\
LISTE DE COURSES - Colocation
Générée le 15/06/2024

REPAS INCLUS:
  - Pâtes bolo
  - Soupe

CRÈMERIE ET PRODUITS LAITIERS:
  - 500 g de lait

FRUITS ET LÉGUMES:
  - 1200 g de tomate

Total : 2 ingrédients";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_fractional_quantities_render_plainly() {
        let meals = vec![meal(1, "Repas", vec![usage("crème", Some("Crèmerie et produits laitiers"), 0.5, "pot")])];
        let text = build_shopping_list("Colocation", &meals, date());
        assert!(text.contains("  - 0.5 pot de crème"));
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename("Colocation", date()),
            "liste-de-courses-Colocation-2024-06-15.txt"
        );
    }
}
