use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Ingredient, normalize_name};

/// The slice of an ingredient record the reconciler and manual entry need.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogIngredient {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub default_unit: Option<String>,
}

impl From<&Ingredient> for CatalogIngredient {
    fn from(ing: &Ingredient) -> Self {
        CatalogIngredient {
            id: ing.id,
            name: ing.name.clone(),
            category: ing.category.clone(),
            default_unit: ing.default_unit.clone(),
        }
    }
}

/// Canonical lookup for one instance: normalized name → ingredient record.
pub type Catalog = HashMap<String, CatalogIngredient>;

/// Build the visible catalog for an instance from the two visible sets:
/// approved ingredients of the global scope and the instance's own pending
/// ones. When both sets carry the same normalized name, the global-approved
/// record wins (it is the long-term canonical one). Callers pass an empty
/// `global_approved` when the global scope does not exist yet.
#[must_use]
pub fn build_catalog(global_approved: &[Ingredient], instance_pending: &[Ingredient]) -> Catalog {
    let mut catalog = Catalog::new();
    for ing in instance_pending {
        catalog.insert(normalize_name(&ing.name), CatalogIngredient::from(ing));
    }
    // Inserted last so approved records overwrite same-key pending ones.
    for ing in global_approved {
        catalog.insert(normalize_name(&ing.name), CatalogIngredient::from(ing));
    }
    catalog
}
