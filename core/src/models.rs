use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};

/// Units accepted on ingredient usages. Closed list, shared by manual entry
/// validation, extraction reconciliation, and the extraction prompt.
pub const INGREDIENT_UNITS: &[&str] = &[
    // poids
    "g",
    "kg",
    // volume
    "ml",
    "cl",
    "l",
    "c. à café",
    "c. à soupe",
    // quantité
    "unité",
    "pièce",
    "entier",
    "tête",
    "gousse",
    "botte",
    "brin",
    "feuille",
    "tranche",
    "pincée",
    "filet",
    // contenants
    "boîte",
    "paquet",
    "sachet",
    "pot",
];

/// Ingredient categories. Closed list; the spelling (accents included) is
/// part of the vocabulary and changing an entry is a deployment decision.
pub const INGREDIENT_CATEGORIES: &[&str] = &[
    "Fruits et légumes",
    "Crèmerie et produits laitiers",
    "Viandes et poissons",
    "Charcuterie et traiteur",
    "Surgelés",
    "Bébé",
    "Épicerie sucrée",
    "Épicerie salée",
    "Boissons",
    "Pains et pâtisseries",
    "Bio et écologie",
    "Entretien et nettoyage",
    "Hygiène et beauté",
    "Parapharmacie",
    "Prouits du monde",
    "Nutrition et végétal",
    "Épices et condiments",
    "Autre",
];

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner"];

/// Fallback unit when an extracted or manual unit is not in the allowed set.
pub const FALLBACK_UNIT: &str = "unité";

/// Fallback category for new ingredients whose proposed category is unknown.
pub const FALLBACK_CATEGORY: &str = "Autre";

/// Category used by the shopping-list aggregator for ingredients without one.
pub const UNCATEGORIZED: &str = "autre";

/// Name of the special instance holding admin-approved canonical ingredients.
pub const GLOBAL_SCOPE_NAME: &str = "Global Ingredients";

pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub join_token: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub instance_id: i64,
    pub user_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub meal_type: String,
    pub date: Option<String>,
    pub instance_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: i64,
    pub uuid: String,
    /// Stored normalized: lowercase, trimmed. `(name, instance_id)` is unique.
    pub name: String,
    pub category: Option<String>,
    pub default_unit: Option<String>,
    pub status: String,
    pub instance_id: i64,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// One line item tying an ingredient, a quantity, and a unit to a meal.
#[derive(Debug, Clone, Serialize)]
pub struct MealIngredient {
    pub id: i64,
    pub uuid: String,
    pub meal_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
    pub created_at: String,
    pub updated_at: String,
    // Joined fields for display and aggregation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealWithIngredients {
    pub meal: Meal,
    pub ingredients: Vec<MealIngredient>,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub category: Option<String>,
    pub default_unit: Option<String>,
    pub status: String,
    pub instance_id: i64,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub name: String,
    pub meal_type: String,
    pub date: Option<NaiveDate>,
    pub instance_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewMealIngredient {
    pub meal_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMealIngredient {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// Canonicalize an ingredient name for identity comparisons: trim and
/// lowercase. The sole key used by catalog lookup, creation, and
/// reconciliation; idempotent by construction.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Convert volume units to grams for shopping-list aggregation, assuming
/// water density (1 ml = 1 g). Anything outside the volume table passes
/// through unchanged. Never applied to stored usages, only the aggregation
/// view.
#[must_use]
pub fn normalize_for_aggregation(quantity: f64, unit: &str) -> (f64, String) {
    let normalized = unit.trim().to_lowercase();
    match normalized.as_str() {
        "l" | "litre" | "litres" => (quantity * 1000.0, "g".to_string()),
        "ml" | "millilitre" | "millilitres" => (quantity, "g".to_string()),
        "cl" | "centilitre" | "centilitres" => (quantity * 10.0, "g".to_string()),
        _ => (quantity, unit.to_string()),
    }
}

/// Exact membership test against the allowed unit vocabulary.
#[must_use]
pub fn is_allowed_unit(unit: &str) -> bool {
    INGREDIENT_UNITS.contains(&unit)
}

/// Resolve a proposed category against the fixed set: exact match first,
/// then case-insensitive, else the catch-all.
#[must_use]
pub fn resolve_category(raw: &str) -> String {
    let trimmed = raw.trim();
    if INGREDIENT_CATEGORIES.contains(&trimmed) {
        return trimmed.to_string();
    }
    let lower = trimmed.to_lowercase();
    INGREDIENT_CATEGORIES
        .iter()
        .find(|c| c.to_lowercase() == lower)
        .map_or_else(|| FALLBACK_CATEGORY.to_string(), ToString::to_string)
}

pub fn validate_meal_type(meal_type: &str) -> Result<String> {
    let lower = meal_type.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(Error::Validation(format!(
            "Invalid meal type '{meal_type}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )))
    }
}

pub fn validate_ingredient_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(
            "Ingredient name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a usage before any storage mutation: positive quantity, unit
/// from the allowed vocabulary.
pub fn validate_usage(quantity: f64, unit: &str) -> Result<()> {
    if quantity <= 0.0 || !quantity.is_finite() {
        return Err(Error::Validation(format!(
            "Quantity must be a positive number (got {quantity})"
        )));
    }
    if !is_allowed_unit(unit) {
        return Err(Error::Validation(format!(
            "Invalid unit '{unit}'. Must be one of: {}",
            INGREDIENT_UNITS.join(", ")
        )));
    }
    Ok(())
}

pub fn validate_status(status: &str) -> Result<()> {
    if status == STATUS_APPROVED || status == STATUS_PENDING {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid ingredient status '{status}'. Must be '{STATUS_APPROVED}' or '{STATUS_PENDING}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_trims_and_lowercases() {
        assert_eq!(normalize_name("  Tomate "), "tomate");
        assert_eq!(normalize_name("tomate"), "tomate");
        assert_eq!(normalize_name("OIGNON"), "oignon");
    }

    #[test]
    fn test_normalize_name_idempotent() {
        let once = normalize_name("  Crème Fraîche ");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_normalize_for_aggregation_liters() {
        assert_eq!(
            normalize_for_aggregation(1.0, "L"),
            (1000.0, "g".to_string())
        );
        assert_eq!(
            normalize_for_aggregation(2.0, "litres"),
            (2000.0, "g".to_string())
        );
        assert_eq!(
            normalize_for_aggregation(0.5, " Litre "),
            (500.0, "g".to_string())
        );
    }

    #[test]
    fn test_normalize_for_aggregation_milliliters() {
        assert_eq!(
            normalize_for_aggregation(250.0, "ml"),
            (250.0, "g".to_string())
        );
        assert_eq!(
            normalize_for_aggregation(250.0, "Millilitres"),
            (250.0, "g".to_string())
        );
    }

    #[test]
    fn test_normalize_for_aggregation_centiliters() {
        assert_eq!(
            normalize_for_aggregation(3.0, "cl"),
            (30.0, "g".to_string())
        );
    }

    #[test]
    fn test_normalize_for_aggregation_passthrough() {
        assert_eq!(
            normalize_for_aggregation(5.0, "kg"),
            (5.0, "kg".to_string())
        );
        assert_eq!(
            normalize_for_aggregation(2.0, "gousse"),
            (2.0, "gousse".to_string())
        );
        // Unknown units are left alone too, case preserved
        assert_eq!(
            normalize_for_aggregation(1.0, "Cup"),
            (1.0, "Cup".to_string())
        );
    }

    #[test]
    fn test_is_allowed_unit() {
        assert!(is_allowed_unit("g"));
        assert!(is_allowed_unit("c. à soupe"));
        assert!(is_allowed_unit("unité"));
        assert!(!is_allowed_unit("G"));
        assert!(!is_allowed_unit("cup"));
        assert!(!is_allowed_unit(""));
    }

    #[test]
    fn test_resolve_category_exact() {
        assert_eq!(resolve_category("Fruits et légumes"), "Fruits et légumes");
        assert_eq!(resolve_category("Autre"), "Autre");
    }

    #[test]
    fn test_resolve_category_case_insensitive() {
        assert_eq!(resolve_category("fruits et légumes"), "Fruits et légumes");
        assert_eq!(resolve_category("ÉPICERIE SUCRÉE"), "Épicerie sucrée");
    }

    #[test]
    fn test_resolve_category_fallback() {
        assert_eq!(resolve_category("Quincaillerie"), "Autre");
        assert_eq!(resolve_category(""), "Autre");
    }

    #[test]
    fn test_validate_meal_type() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("BREAKFAST").unwrap(), "breakfast");
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("snack").is_err());
    }

    #[test]
    fn test_validate_usage() {
        assert!(validate_usage(200.0, "g").is_ok());
        assert!(validate_usage(0.0, "g").is_err());
        assert!(validate_usage(-3.0, "g").is_err());
        assert!(validate_usage(f64::NAN, "g").is_err());
        assert!(validate_usage(1.0, "cup").is_err());
    }

    #[test]
    fn test_validate_ingredient_name() {
        assert!(validate_ingredient_name("tomate").is_ok());
        assert!(validate_ingredient_name("   ").is_err());
    }

    #[test]
    fn test_validate_status() {
        assert!(validate_status("approved").is_ok());
        assert!(validate_status("pending").is_ok());
        assert!(validate_status("draft").is_err());
    }
}
