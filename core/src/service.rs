use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogIngredient, build_catalog};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    GLOBAL_SCOPE_NAME, Ingredient, Instance, Meal, MealIngredient, MealWithIngredients, NewIngredient,
    NewMeal, NewMealIngredient, STATUS_APPROVED, STATUS_PENDING, Slot, UpdateMealIngredient, User,
    normalize_name, validate_ingredient_name, validate_meal_type, validate_usage,
};
use crate::reconcile::{ReconcileOutcome, parse_extraction_response, reconcile};
use crate::shopping_list::{build_shopping_list, export_filename};

/// Backend that turns free recipe text into structured ingredient JSON.
///
/// Implementations do the network call and return the raw textual response;
/// decoding and reconciliation stay in the core. Failures to reach the
/// backend should surface as [`Error::ExtractionUnavailable`].
pub trait IngredientExtractor {
    fn extract(&self, text: &str, known_ingredients: &[String]) -> Result<String>;
}

/// Outcome of committing a reconciled extraction. Per-item failures are
/// collected instead of aborting the batch.
#[derive(Debug, Default, Serialize)]
pub struct ExtractionSummary {
    pub ingredients_created: usize,
    pub ingredients_reused: usize,
    pub usages_created: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ShoppingListExport {
    pub filename: String,
    pub text: String,
}

/// Starter catalog seeded into the global scope. Categories here predate the
/// fixed category vocabulary and are kept as-is.
const SEED_INGREDIENTS: &[&str] = &[
    "Tomate",
    "Oignon",
    "Ail",
    "Carotte",
    "Pomme de terre",
    "Courgette",
    "Aubergine",
    "Poivron",
    "Champignon",
    "Épinard",
    "Salade",
    "Concombre",
    "Brocoli",
    "Chou-fleur",
    "Céleri",
    "Poireau",
    "Basilic",
    "Persil",
    "Coriandre",
    "Thym",
    "Romarin",
    "Laurier",
    "Huile d'olive",
    "Beurre",
    "Crème fraîche",
    "Lait",
    "Fromage",
    "Œuf",
    "Poulet",
    "Bœuf",
    "Porc",
    "Saumon",
    "Thon",
    "Crevette",
    "Riz",
    "Pâtes",
    "Pain",
    "Farine",
    "Sucre",
    "Sel",
    "Poivre",
    "Vinaigre",
    "Citron",
    "Moutarde",
    "Pâte de curry",
    "Miel",
    "Yaourt",
    "Pomme",
    "Banane",
    "Fraise",
    "Chocolat",
];

const SYSTEM_USER_EMAIL: &str = "system@tricook.local";
const SEED_JOIN_TOKEN: &str = "global-ingredients-seed";

fn seed_category(name: &str) -> &'static str {
    let name = name.to_lowercase();
    let name = name.trim();
    const FRUITS_ET_LEGUMES: &[&str] = &[
        "tomate",
        "oignon",
        "carotte",
        "pomme de terre",
        "courgette",
        "aubergine",
        "poivron",
        "champignon",
        "épinard",
        "salade",
        "concombre",
        "brocoli",
        "chou-fleur",
        "céleri",
        "poireau",
        "pomme",
        "banane",
        "fraise",
        "citron",
    ];
    const HERBES_ET_AROMATES: &[&str] = &[
        "basilic",
        "persil",
        "coriandre",
        "thym",
        "romarin",
        "laurier",
        "ail",
    ];
    const EPICES: &[&str] = &["sel", "poivre", "moutarde", "pâte de curry"];
    const PRODUITS_LAITIERS: &[&str] = &["beurre", "crème fraîche", "lait", "fromage", "yaourt"];
    const VIANDES_ET_POISSONS: &[&str] = &["poulet", "bœuf", "porc", "saumon", "thon", "crevette"];
    const FECULENTS: &[&str] = &["riz", "pâtes", "pain", "farine"];

    if FRUITS_ET_LEGUMES.contains(&name) {
        "fruit et légumes"
    } else if HERBES_ET_AROMATES.contains(&name) {
        "herbes et aromates"
    } else if EPICES.contains(&name) {
        "épice"
    } else if PRODUITS_LAITIERS.contains(&name) {
        "produits laitiers"
    } else if VIANDES_ET_POISSONS.contains(&name) {
        "viande et poisson"
    } else if FECULENTS.contains(&name) {
        "féculent"
    } else {
        "autre"
    }
}

fn generate_join_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct TricookService {
    db: Database,
}

impl TricookService {
    #[must_use]
    pub fn new(db: Database) -> Self {
        TricookService { db }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Identity ---

    /// Resolve the acting user from an email, creating the record on first
    /// use. Authentication proper is out of scope.
    pub fn identify(&self, email: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation(format!("Invalid email '{email}'")));
        }
        self.db.get_or_create_user(&email.to_lowercase())
    }

    // --- Instances ---

    pub fn create_instance(&self, name: &str, owner: &User) -> Result<Instance> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Instance name must not be empty".to_string()));
        }
        let instance = self.db.insert_instance(name, &generate_join_token())?;
        self.db.add_member(instance.id, owner.id)?;
        Ok(instance)
    }

    pub fn join_instance(&self, join_token: &str, user: &User) -> Result<Instance> {
        let instance = self
            .db
            .find_instance_by_token(join_token)?
            .ok_or_else(|| Error::NotFound("No instance with that join token".to_string()))?;
        self.db.add_member(instance.id, user.id)?;
        Ok(instance)
    }

    pub fn list_instances(&self, user: &User) -> Result<Vec<Instance>> {
        self.db.list_instances_for_user(user.id)
    }

    /// Existence first (`NotFound`), then membership (`AccessDenied`).
    /// Membership failures are never reported as `NotFound`.
    fn require_member(&self, instance_id: i64, user: &User) -> Result<Instance> {
        let instance = self.db.get_instance(instance_id)?;
        if !self.db.is_member(instance.id, user.id)? {
            return Err(Error::AccessDenied(format!(
                "You are not a member of instance '{}'",
                instance.name
            )));
        }
        Ok(instance)
    }

    // --- Slots ---

    pub fn create_slot(&self, instance_id: i64, name: &str, user: &User) -> Result<Slot> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Slot name must not be empty".to_string()));
        }
        self.require_member(instance_id, user)?;
        self.db.insert_slot(name, instance_id, None)
    }

    pub fn list_slots(&self, instance_id: i64, user: &User) -> Result<Vec<Slot>> {
        self.require_member(instance_id, user)?;
        self.db.list_slots(instance_id)
    }

    /// Assign a slot to a user by email, or unassign with `None`. The
    /// assignee is added to the instance when not yet a member.
    pub fn assign_slot(&self, slot_id: i64, assignee: Option<&str>, user: &User) -> Result<Slot> {
        let slot = self.db.get_slot(slot_id)?;
        self.require_member(slot.instance_id, user)?;
        let user_id = match assignee {
            Some(email) => {
                let assignee = self.identify(email)?;
                self.db.add_member(slot.instance_id, assignee.id)?;
                Some(assignee.id)
            }
            None => None,
        };
        self.db.assign_slot(slot.id, user_id)
    }

    /// The acting user's slot in an instance, created on demand. The slot is
    /// named after the local part of the email.
    fn ensure_slot_for(&self, instance_id: i64, user: &User) -> Result<Slot> {
        if let Some(slot) = self.db.find_slot_for_user(instance_id, user.id)? {
            return Ok(slot);
        }
        let name = user.email.split('@').next().unwrap_or(&user.email);
        self.db.insert_slot(name, instance_id, Some(user.id))
    }

    // --- Meals ---

    /// Create a meal. Validation happens before any write; the acting
    /// user's slot is created when missing and attached alongside any
    /// explicitly listed slots.
    pub fn create_meal(
        &self,
        user: &User,
        instance_id: i64,
        name: &str,
        meal_type: &str,
        date: Option<NaiveDate>,
        slot_ids: &[i64],
    ) -> Result<Meal> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Meal name must not be empty".to_string()));
        }
        let meal_type = validate_meal_type(meal_type)?;
        self.require_member(instance_id, user)?;
        for &slot_id in slot_ids {
            let slot = self.db.get_slot(slot_id)?;
            if slot.instance_id != instance_id {
                return Err(Error::Validation(format!(
                    "Slot {slot_id} belongs to another instance"
                )));
            }
        }

        let meal = self.db.insert_meal(&NewMeal {
            name: name.to_string(),
            meal_type,
            date,
            instance_id,
        })?;
        let own_slot = self.ensure_slot_for(instance_id, user)?;
        self.db.attach_slot_to_meal(meal.id, own_slot.id)?;
        for &slot_id in slot_ids {
            self.db.attach_slot_to_meal(meal.id, slot_id)?;
        }
        Ok(meal)
    }

    pub fn list_meals(&self, instance_id: i64, user: &User) -> Result<Vec<MealWithIngredients>> {
        self.require_member(instance_id, user)?;
        self.db.meals_with_ingredients(instance_id)
    }

    pub fn delete_meal(&self, meal_id: i64, user: &User) -> Result<()> {
        let meal = self.db.get_meal(meal_id)?;
        self.require_member(meal.instance_id, user)?;
        self.db.delete_meal(meal.id)?;
        Ok(())
    }

    // --- Manual usage entry ---

    /// Add an ingredient usage to a meal by name. The ingredient is looked
    /// up in the catalog (global approved, then scope pending) and created
    /// as a pending scope ingredient when unknown.
    pub fn add_usage(
        &self,
        user: &User,
        meal_id: i64,
        ingredient_name: &str,
        quantity: f64,
        unit: &str,
    ) -> Result<MealIngredient> {
        validate_ingredient_name(ingredient_name)?;
        validate_usage(quantity, unit)?;
        let meal = self.db.get_meal(meal_id)?;
        self.require_member(meal.instance_id, user)?;
        self.require_slot(meal.instance_id, user)?;

        let normalized = normalize_name(ingredient_name);
        let catalog = self.catalog_for_instance(meal.instance_id)?;
        let ingredient_id = match catalog.get(&normalized) {
            Some(entry) => entry.id,
            None => {
                let (ingredient, _) = self.find_or_create_pending(
                    meal.instance_id,
                    &normalized,
                    None,
                    Some(unit),
                    Some(user.id),
                )?;
                ingredient.id
            }
        };

        self.db.insert_meal_ingredient(&NewMealIngredient {
            meal_id: meal.id,
            ingredient_id,
            quantity,
            unit: unit.to_string(),
        })
    }

    pub fn update_usage(
        &self,
        user: &User,
        usage_id: i64,
        update: &UpdateMealIngredient,
    ) -> Result<MealIngredient> {
        if let Some(quantity) = update.quantity {
            let unit = update.unit.as_deref().unwrap_or("g");
            validate_usage(quantity, unit)?;
        } else if let Some(unit) = update.unit.as_deref() {
            validate_usage(1.0, unit)?;
        }
        let usage = self.db.get_meal_ingredient(usage_id)?;
        let meal = self.db.get_meal(usage.meal_id)?;
        self.require_member(meal.instance_id, user)?;
        self.db.update_meal_ingredient(usage.id, update)
    }

    pub fn remove_usage(&self, user: &User, usage_id: i64) -> Result<()> {
        let usage = self.db.get_meal_ingredient(usage_id)?;
        let meal = self.db.get_meal(usage.meal_id)?;
        self.require_member(meal.instance_id, user)?;
        self.db.delete_meal_ingredient(usage.id)?;
        Ok(())
    }

    fn require_slot(&self, instance_id: i64, user: &User) -> Result<Slot> {
        self.db
            .find_slot_for_user(instance_id, user.id)?
            .ok_or_else(|| {
                Error::AccessDenied("You need a slot in this instance to edit meals".to_string())
            })
    }

    // --- Catalog ---

    /// Union of global-approved ingredients and this scope's pending ones,
    /// keyed by normalized name. A missing global scope yields a catalog of
    /// pending ingredients only.
    pub fn catalog_for_instance(&self, instance_id: i64) -> Result<Catalog> {
        let global_approved = match self.db.find_instance_by_name(GLOBAL_SCOPE_NAME)? {
            Some(global) => self.db.list_approved(global.id)?,
            None => Vec::new(),
        };
        let pending = self.db.list_pending(instance_id)?;
        Ok(build_catalog(&global_approved, &pending))
    }

    pub fn list_catalog(&self, instance_id: i64, user: &User) -> Result<Vec<CatalogIngredient>> {
        self.require_member(instance_id, user)?;
        let catalog = self.catalog_for_instance(instance_id)?;
        let mut entries: Vec<CatalogIngredient> = catalog.into_values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create a pending scope ingredient, tolerating a creation race: on a
    /// unique-constraint violation the winning row is re-read, so `Conflict`
    /// only escapes if the winner vanished again. Returns the ingredient and
    /// whether this call created it.
    fn find_or_create_pending(
        &self,
        instance_id: i64,
        name: &str,
        category: Option<&str>,
        default_unit: Option<&str>,
        created_by: Option<i64>,
    ) -> Result<(Ingredient, bool)> {
        let normalized = normalize_name(name);
        if let Some(existing) = self.db.get_ingredient_by_name(instance_id, &normalized)? {
            return Ok((existing, false));
        }
        let new = NewIngredient {
            name: normalized.clone(),
            category: category.map(ToString::to_string),
            default_unit: default_unit.map(ToString::to_string),
            status: STATUS_PENDING.to_string(),
            instance_id,
            created_by,
        };
        match self.db.insert_ingredient(&new) {
            Ok(ingredient) => Ok((ingredient, true)),
            Err(err) if err.is_unique_violation() => self
                .db
                .get_ingredient_by_name(instance_id, &normalized)?
                .map(|i| (i, false))
                .ok_or_else(|| {
                    Error::Conflict(format!(
                        "Ingredient '{normalized}' was created concurrently but cannot be read back"
                    ))
                }),
            Err(err) => Err(err),
        }
    }

    // --- Extraction flow ---

    /// Run the extraction pipeline without writing anything: access check,
    /// catalog resolution, backend call, decode, reconcile.
    pub fn parse_free_text(
        &self,
        extractor: &dyn IngredientExtractor,
        user: &User,
        meal_id: i64,
        text: &str,
    ) -> Result<ReconcileOutcome> {
        if text.trim().is_empty() {
            return Err(Error::Validation("Text to parse must not be empty".to_string()));
        }
        let meal = self.db.get_meal(meal_id)?;
        self.require_member(meal.instance_id, user)?;

        let catalog = self.catalog_for_instance(meal.instance_id)?;
        let mut known: Vec<String> = catalog.values().map(|c| c.name.clone()).collect();
        known.sort();

        let raw = extractor.extract(text, &known)?;
        let extraction = parse_extraction_response(&raw)?;
        Ok(reconcile(&extraction, &catalog))
    }

    /// Persist a reconciled extraction against a meal. New-bucket
    /// ingredients are created (pending) before any of their usages;
    /// per-item failures land in the summary instead of aborting.
    pub fn commit_extraction(
        &self,
        user: &User,
        meal_id: i64,
        outcome: &ReconcileOutcome,
    ) -> Result<ExtractionSummary> {
        let meal = self.db.get_meal(meal_id)?;
        self.require_member(meal.instance_id, user)?;
        self.require_slot(meal.instance_id, user)?;

        let mut summary = ExtractionSummary::default();

        for draft in &outcome.existing {
            match self.db.insert_meal_ingredient(&NewMealIngredient {
                meal_id: meal.id,
                ingredient_id: draft.ingredient_id,
                quantity: draft.quantity,
                unit: draft.unit.clone(),
            }) {
                Ok(_) => summary.usages_created += 1,
                Err(err) => summary.errors.push(format!("{}: {err}", draft.name)),
            }
        }

        for draft in &outcome.new {
            let created = self.find_or_create_pending(
                meal.instance_id,
                &draft.name,
                Some(&draft.category),
                Some(&draft.unit),
                Some(user.id),
            );
            let ingredient = match created {
                Ok((ingredient, true)) => {
                    summary.ingredients_created += 1;
                    ingredient
                }
                Ok((ingredient, false)) => {
                    summary.ingredients_reused += 1;
                    ingredient
                }
                Err(err) => {
                    summary.errors.push(format!("{}: {err}", draft.name));
                    continue;
                }
            };
            match self.db.insert_meal_ingredient(&NewMealIngredient {
                meal_id: meal.id,
                ingredient_id: ingredient.id,
                quantity: draft.quantity,
                unit: draft.unit.clone(),
            }) {
                Ok(_) => summary.usages_created += 1,
                Err(err) => summary.errors.push(format!("{}: {err}", draft.name)),
            }
        }

        Ok(summary)
    }

    // --- Shopping list ---

    pub fn shopping_list(
        &self,
        instance_id: i64,
        user: &User,
        generated_on: NaiveDate,
    ) -> Result<ShoppingListExport> {
        let instance = self.require_member(instance_id, user)?;
        let meals = self.db.meals_with_ingredients(instance.id)?;
        Ok(ShoppingListExport {
            filename: export_filename(&instance.name, generated_on),
            text: build_shopping_list(&instance.name, &meals, generated_on),
        })
    }

    // --- Seeding ---

    /// Create the global scope (with its system user) when absent and
    /// upsert the approved starter catalog. Re-runnable.
    pub fn seed_global_catalog(&self) -> Result<usize> {
        let system = self.db.get_or_create_user(SYSTEM_USER_EMAIL)?;
        let global = match self.db.find_instance_by_name(GLOBAL_SCOPE_NAME)? {
            Some(instance) => instance,
            None => {
                let instance = self.db.insert_instance(GLOBAL_SCOPE_NAME, SEED_JOIN_TOKEN)?;
                self.db.add_member(instance.id, system.id)?;
                instance
            }
        };

        for name in SEED_INGREDIENTS {
            self.db.upsert_approved_ingredient(&NewIngredient {
                name: normalize_name(name),
                category: Some(seed_category(name).to_string()),
                default_unit: None,
                status: STATUS_APPROVED.to_string(),
                instance_id: global.id,
                created_by: Some(system.id),
            })?;
        }
        Ok(SEED_INGREDIENTS.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockExtractor {
        response: String,
    }

    impl IngredientExtractor for MockExtractor {
        fn extract(&self, _text: &str, _known_ingredients: &[String]) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    struct FailingExtractor;

    impl IngredientExtractor for FailingExtractor {
        fn extract(&self, _text: &str, _known_ingredients: &[String]) -> Result<String> {
            Err(Error::ExtractionUnavailable("connection refused".to_string()))
        }
    }

    fn service() -> TricookService {
        TricookService::new(Database::open_in_memory().unwrap())
    }

    fn setup_meal(service: &TricookService) -> (User, Instance, Meal) {
        let user = service.identify("alice@example.com").unwrap();
        let instance = service.create_instance("Colocation", &user).unwrap();
        let meal = service
            .create_meal(&user, instance.id, "Ratatouille", "dinner", None, &[])
            .unwrap();
        (user, instance, meal)
    }

    #[test]
    fn test_identify_rejects_bad_email() {
        let service = service();
        assert!(matches!(
            service.identify("not-an-email"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(service.identify("  "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_join_instance_by_token() {
        let service = service();
        let alice = service.identify("alice@example.com").unwrap();
        let bob = service.identify("bob@example.com").unwrap();
        let instance = service.create_instance("Colocation", &alice).unwrap();

        assert!(matches!(
            service.join_instance("wrong-token", &bob),
            Err(Error::NotFound(_))
        ));
        let joined = service.join_instance(&instance.join_token, &bob).unwrap();
        assert_eq!(joined.id, instance.id);
        assert_eq!(service.list_instances(&bob).unwrap().len(), 1);
    }

    #[test]
    fn test_non_member_gets_access_denied_not_not_found() {
        let service = service();
        let (_, instance, meal) = setup_meal(&service);
        let outsider = service.identify("mallory@example.com").unwrap();

        assert!(matches!(
            service.list_meals(instance.id, &outsider),
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            service.delete_meal(meal.id, &outsider),
            Err(Error::AccessDenied(_))
        ));
        // A missing instance is still NotFound
        assert!(matches!(
            service.list_meals(9999, &outsider),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_create_meal_validates_before_write() {
        let service = service();
        let user = service.identify("alice@example.com").unwrap();
        let instance = service.create_instance("Colocation", &user).unwrap();

        assert!(matches!(
            service.create_meal(&user, instance.id, "  ", "dinner", None, &[]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.create_meal(&user, instance.id, "Soupe", "brunch", None, &[]),
            Err(Error::Validation(_))
        ));
        assert!(service.list_meals(instance.id, &user).unwrap().is_empty());
    }

    #[test]
    fn test_create_meal_auto_creates_slot() {
        let service = service();
        let (user, instance, meal) = setup_meal(&service);
        let slots = service.list_slots(instance.id, &user).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].name, "alice");
        assert_eq!(slots[0].user_id, Some(user.id));

        let attached = service.db().list_meal_slots(meal.id).unwrap();
        assert_eq!(attached.len(), 1);
    }

    #[test]
    fn test_add_usage_creates_pending_ingredient() {
        let service = service();
        let (user, instance, meal) = setup_meal(&service);

        let usage = service.add_usage(&user, meal.id, "  Tomate ", 200.0, "g").unwrap();
        assert_eq!(usage.ingredient_name.as_deref(), Some("tomate"));

        let pending = service.db().list_pending(instance.id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "tomate");
    }

    #[test]
    fn test_add_usage_reuses_global_ingredient() {
        let service = service();
        service.seed_global_catalog().unwrap();
        let (user, instance, meal) = setup_meal(&service);

        service.add_usage(&user, meal.id, "Tomate", 200.0, "g").unwrap();
        // Matched the approved global entry, no pending row created
        assert!(service.db().list_pending(instance.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_usage_validation() {
        let service = service();
        let (user, _, meal) = setup_meal(&service);
        assert!(matches!(
            service.add_usage(&user, meal.id, "tomate", 0.0, "g"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.add_usage(&user, meal.id, "tomate", 1.0, "cup"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.add_usage(&user, 9999, "tomate", 1.0, "g"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_and_remove_usage() {
        let service = service();
        let (user, _, meal) = setup_meal(&service);
        let usage = service.add_usage(&user, meal.id, "sel", 1.0, "pincée").unwrap();

        let updated = service
            .update_usage(
                &user,
                usage.id,
                &UpdateMealIngredient {
                    quantity: Some(2.0),
                    unit: Some("pincée".to_string()),
                },
            )
            .unwrap();
        assert!((updated.quantity - 2.0).abs() < f64::EPSILON);

        service.remove_usage(&user, usage.id).unwrap();
        assert!(matches!(
            service.remove_usage(&user, usage.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_find_or_create_pending_is_race_tolerant() {
        let service = service();
        let (user, instance, _) = setup_meal(&service);
        let (first, created) = service
            .find_or_create_pending(instance.id, "Tomate", None, None, Some(user.id))
            .unwrap();
        assert!(created);
        let (second, created) = service
            .find_or_create_pending(instance.id, " TOMATE ", None, None, Some(user.id))
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_seed_is_rerunnable() {
        let service = service();
        let count = service.seed_global_catalog().unwrap();
        assert_eq!(count, 51);
        let count = service.seed_global_catalog().unwrap();
        assert_eq!(count, 51);

        let global = service
            .db()
            .find_instance_by_name(GLOBAL_SCOPE_NAME)
            .unwrap()
            .unwrap();
        let approved = service.db().list_approved(global.id).unwrap();
        assert_eq!(approved.len(), 51);
        let tomate = approved.iter().find(|i| i.name == "tomate").unwrap();
        assert_eq!(tomate.category.as_deref(), Some("fruit et légumes"));
    }

    #[test]
    fn test_extractor_failure_propagates() {
        let service = service();
        let (user, _, meal) = setup_meal(&service);
        assert!(matches!(
            service.parse_free_text(&FailingExtractor, &user, meal.id, "200g de tomates"),
            Err(Error::ExtractionUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_free_text_rejects_empty_text() {
        let service = service();
        let (user, _, meal) = setup_meal(&service);
        assert!(matches!(
            service.parse_free_text(&FailingExtractor, &user, meal.id, "   "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_parse_garbage_response_is_parse_error() {
        let service = service();
        let (user, _, meal) = setup_meal(&service);
        let extractor = MockExtractor {
            response: "désolé, je ne peux pas".to_string(),
        };
        assert!(matches!(
            service.parse_free_text(&extractor, &user, meal.id, "200g de tomates"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_end_to_end_parse_commit_export() {
        let service = service();
        service.seed_global_catalog().unwrap();
        let (user, instance, meal) = setup_meal(&service);

        let extractor = MockExtractor {
            response: r#"```json
{
  "existing": [
    {"name": "Tomate", "quantity": 200, "unit": "g"},
    {"name": "huile d'olive", "quantity": 2, "unit": "c. à soupe"}
  ],
  "new": [
    {"name": "Feta", "quantity": 150, "unit": "g", "category": "Crèmerie et produits laitiers"}
  ]
}
```"#
                .to_string(),
        };

        let outcome = service
            .parse_free_text(&extractor, &user, meal.id, "tomates, huile d'olive, feta")
            .unwrap();
        assert_eq!(outcome.existing.len(), 2);
        assert_eq!(outcome.new.len(), 1);

        let summary = service.commit_extraction(&user, meal.id, &outcome).unwrap();
        assert_eq!(summary.ingredients_created, 1);
        assert_eq!(summary.ingredients_reused, 0);
        assert_eq!(summary.usages_created, 3);
        assert!(summary.errors.is_empty());

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let export = service.shopping_list(instance.id, &user, date).unwrap();
        assert_eq!(export.filename, "liste-de-courses-Colocation-2025-03-01.txt");
        assert!(export.text.starts_with("LISTE DE COURSES - Colocation"));
        assert!(export.text.contains("Générée le 01/03/2025"));
        assert!(export.text.contains("- Ratatouille"));
        assert!(export.text.contains("  - 200 g de tomate"));
        assert!(export.text.contains("  - 150 g de feta"));
        assert!(export.text.contains("Total : 3 ingrédients"));
    }

    #[test]
    fn test_commit_is_rerunnable_and_reuses_pending() {
        let service = service();
        let (user, instance, meal) = setup_meal(&service);

        let extractor = MockExtractor {
            response: r#"{"existing": [], "new": [{"name": "feta", "quantity": 150, "unit": "g", "category": "Autre"}]}"#
                .to_string(),
        };
        let outcome = service
            .parse_free_text(&extractor, &user, meal.id, "feta")
            .unwrap();

        let first = service.commit_extraction(&user, meal.id, &outcome).unwrap();
        assert_eq!(first.ingredients_created, 1);
        let second = service.commit_extraction(&user, meal.id, &outcome).unwrap();
        assert_eq!(second.ingredients_created, 0);
        assert_eq!(second.ingredients_reused, 1);
        assert_eq!(second.usages_created, 1);

        assert_eq!(service.db().list_pending(instance.id).unwrap().len(), 1);
    }
}
