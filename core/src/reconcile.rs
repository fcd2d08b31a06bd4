//! Reconciliation of extractor output against the ingredient catalog.
//!
//! The extractor (an external text-understanding service) returns two
//! buckets, "existing" and "new", and its judgment is untrusted: names may
//! be misclassified, units and categories may be outside the allowed
//! vocabularies, and the payload may arrive wrapped in markdown fences.
//! Everything here is pure; only the final buckets ever touch storage, and
//! that is the caller's job.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{Catalog, CatalogIngredient};
use crate::error::{Error, Result};
use crate::models::{
    FALLBACK_CATEGORY, FALLBACK_UNIT, is_allowed_unit, normalize_name, resolve_category,
};

/// One item as proposed by the extractor. All fields untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub unit: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
}

/// The decoded extractor payload, before any validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtraction {
    #[serde(default, alias = "existingIngredients")]
    pub existing: Vec<RawItem>,
    #[serde(default, alias = "newIngredients")]
    pub new: Vec<RawItem>,
}

/// A validated usage of an already-known ingredient.
#[derive(Debug, Clone, Serialize)]
pub struct UsageDraft {
    pub ingredient_id: i64,
    /// The catalog's canonical name, not the extractor's spelling.
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// A validated ingredient the caller should create (pending, instance scope)
/// before creating its usage.
#[derive(Debug, Clone, Serialize)]
pub struct NewIngredientDraft {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    pub existing: Vec<UsageDraft>,
    pub new: Vec<NewIngredientDraft>,
}

/// Decode the raw extractor response into a [`RawExtraction`].
///
/// Strips markdown code fences, then parses as JSON. Accepts the expected
/// object form (with `existingIngredients`/`newIngredients` as key aliases)
/// and the legacy bare-array form, which is treated as all-new. A payload
/// that decodes to neither is a [`Error::Parse`] with no partial recovery.
pub fn parse_extraction_response(raw: &str) -> Result<RawExtraction> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        // Some models pad the JSON with prose; salvage a bracketed array.
        Err(err) => match extract_array(cleaned) {
            Some(v) => v,
            None => return Err(Error::Parse(err.to_string())),
        },
    };

    if value.is_array() {
        let items: Vec<RawItem> =
            serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))?;
        return Ok(RawExtraction {
            existing: Vec::new(),
            new: items,
        });
    }

    serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))
}

fn extract_array(s: &str) -> Option<Value> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&s[start..=end]).ok()
}

/// Split the extractor's proposals into final buckets against `catalog`.
///
/// Items the extractor labeled "existing" that miss the catalog are dropped
/// (the extractor was overconfident; the line is lost rather than guessed
/// at). Items labeled "new" are re-checked against the catalog and
/// reclassified into the existing bucket on a hit, which corrects the
/// opposite mistake. Quantities default to 1 and units fall back to the
/// ingredient's default unit (existing) or "unité" (new) when invalid.
#[must_use]
pub fn reconcile(extraction: &RawExtraction, catalog: &Catalog) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for item in &extraction.existing {
        let Some((name, quantity, unit)) = item_fields(item) else {
            continue;
        };
        let key = normalize_name(&name);
        // Catalog miss: the extractor mislabeled an unknown ingredient as
        // existing. The item is dropped, never guessed at.
        if let Some(known) = catalog.get(&key) {
            outcome
                .existing
                .push(existing_draft(known, quantity, &unit));
        }
    }

    for item in &extraction.new {
        let Some((name, quantity, unit)) = item_fields(item) else {
            continue;
        };
        let key = normalize_name(&name);
        if let Some(known) = catalog.get(&key) {
            // The extractor is told about existing names but may still
            // mislabel one as new. Reclassify.
            outcome
                .existing
                .push(existing_draft(known, quantity, &unit));
            continue;
        }
        let category = item
            .category
            .as_ref()
            .and_then(Value::as_str)
            .map_or_else(|| FALLBACK_CATEGORY.to_string(), resolve_category);
        let unit = if is_allowed_unit(&unit) {
            unit
        } else {
            FALLBACK_UNIT.to_string()
        };
        outcome.new.push(NewIngredientDraft {
            name: key,
            quantity,
            unit,
            category,
        });
    }

    outcome
}

fn existing_draft(known: &CatalogIngredient, quantity: f64, unit: &str) -> UsageDraft {
    let unit = if is_allowed_unit(unit) {
        unit.to_string()
    } else {
        known
            .default_unit
            .clone()
            .unwrap_or_else(|| FALLBACK_UNIT.to_string())
    };
    UsageDraft {
        ingredient_id: known.id,
        name: known.name.clone(),
        quantity,
        unit,
    }
}

/// Extract (name, quantity, unit) from a raw item, or `None` when any of
/// the three is missing or empty; such items are skipped entirely.
fn item_fields(item: &RawItem) -> Option<(String, f64, String)> {
    let name = nonempty_str(item.name.as_ref())?;
    let unit = nonempty_str(item.unit.as_ref())?;
    let quantity_value = item.quantity.as_ref().filter(|v| is_truthy(v))?;
    let quantity = parse_quantity(quantity_value)
        .filter(|q| *q > 0.0 && q.is_finite())
        .unwrap_or(1.0);
    Some((name, quantity, unit))
}

fn nonempty_str(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// Lenient numeric parse: JSON numbers as-is, strings by their leading
/// numeric prefix ("200g" → 200).
fn parse_quantity(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
                .map(|(i, c)| i + c.len_utf8())
                .last()?;
            s[..end].parse().ok()
        }
        _ => None,
    }
}
