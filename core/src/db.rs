use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Ingredient, Instance, Meal, MealIngredient, MealWithIngredients, NewIngredient, NewMeal,
    NewMealIngredient, STATUS_APPROVED, STATUS_PENDING, Slot, UpdateMealIngredient, User,
};

pub struct Database {
    conn: Connection,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", true)?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS instances (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    join_token TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS instance_members (
                    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    UNIQUE(instance_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS slots (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
                    user_id INTEGER REFERENCES users(id),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    date TEXT,
                    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_slots (
                    meal_id INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
                    slot_id INTEGER NOT NULL REFERENCES slots(id) ON DELETE CASCADE,
                    UNIQUE(meal_id, slot_id)
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    category TEXT,
                    default_unit TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
                    created_by INTEGER REFERENCES users(id),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(name, instance_id)
                );

                CREATE TABLE IF NOT EXISTS meal_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    meal_id INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meals_instance ON meals(instance_id);
                CREATE INDEX IF NOT EXISTS idx_slots_instance ON slots(instance_id);
                CREATE INDEX IF NOT EXISTS idx_ingredients_instance ON ingredients(instance_id);
                CREATE INDEX IF NOT EXISTS idx_meal_ingredients_meal ON meal_ingredients(meal_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn instance_from_row(row: &rusqlite::Row) -> rusqlite::Result<Instance> {
        Ok(Instance {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            join_token: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            uuid: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn slot_from_row(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
        Ok(Slot {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            instance_id: row.get(3)?,
            user_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        Ok(Meal {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            meal_type: row.get(3)?,
            date: row.get(4)?,
            instance_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            default_unit: row.get(4)?,
            status: row.get(5)?,
            instance_id: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn meal_ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealIngredient> {
        Ok(MealIngredient {
            id: row.get(0)?,
            uuid: row.get(1)?,
            meal_id: row.get(2)?,
            ingredient_id: row.get(3)?,
            quantity: row.get(4)?,
            unit: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            ingredient_name: row.get(8)?,
            ingredient_category: row.get(9)?,
        })
    }

    // --- Users ---

    pub fn get_or_create_user(&self, email: &str) -> Result<User> {
        if let Some(user) = self
            .conn
            .query_row(
                "SELECT id, uuid, email, created_at FROM users WHERE email = ?1",
                params![email],
                Self::user_from_row,
            )
            .optional()?
        {
            return Ok(user);
        }
        self.conn.execute(
            "INSERT INTO users (uuid, email, created_at) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), email, now()],
        )?;
        self.get_user(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, uuid, email, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("User {id} not found")))
    }

    // --- Instances ---

    pub fn insert_instance(&self, name: &str, join_token: &str) -> Result<Instance> {
        let ts = now();
        self.conn.execute(
            "INSERT INTO instances (uuid, name, join_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![Uuid::new_v4().to_string(), name, join_token, ts, ts],
        )?;
        self.get_instance(self.conn.last_insert_rowid())
    }

    pub fn get_instance(&self, id: i64) -> Result<Instance> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, join_token, created_at, updated_at
                 FROM instances WHERE id = ?1",
                params![id],
                Self::instance_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Instance {id} not found")))
    }

    pub fn find_instance_by_name(&self, name: &str) -> Result<Option<Instance>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, uuid, name, join_token, created_at, updated_at
                 FROM instances WHERE name = ?1",
                params![name],
                Self::instance_from_row,
            )
            .optional()?)
    }

    pub fn find_instance_by_token(&self, join_token: &str) -> Result<Option<Instance>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, uuid, name, join_token, created_at, updated_at
                 FROM instances WHERE join_token = ?1",
                params![join_token],
                Self::instance_from_row,
            )
            .optional()?)
    }

    pub fn list_instances_for_user(&self, user_id: i64) -> Result<Vec<Instance>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.uuid, i.name, i.join_token, i.created_at, i.updated_at
             FROM instances i
             JOIN instance_members m ON m.instance_id = i.id
             WHERE m.user_id = ?1
             ORDER BY i.name",
        )?;
        let rows = stmt.query_map(params![user_id], Self::instance_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn add_member(&self, instance_id: i64, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO instance_members (instance_id, user_id) VALUES (?1, ?2)",
            params![instance_id, user_id],
        )?;
        Ok(())
    }

    pub fn is_member(&self, instance_id: i64, user_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM instance_members WHERE instance_id = ?1 AND user_id = ?2",
            params![instance_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // --- Slots ---

    pub fn insert_slot(&self, name: &str, instance_id: i64, user_id: Option<i64>) -> Result<Slot> {
        let ts = now();
        self.conn.execute(
            "INSERT INTO slots (uuid, name, instance_id, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![Uuid::new_v4().to_string(), name, instance_id, user_id, ts, ts],
        )?;
        self.get_slot(self.conn.last_insert_rowid())
    }

    pub fn get_slot(&self, id: i64) -> Result<Slot> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, instance_id, user_id, created_at, updated_at
                 FROM slots WHERE id = ?1",
                params![id],
                Self::slot_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Slot {id} not found")))
    }

    pub fn list_slots(&self, instance_id: i64) -> Result<Vec<Slot>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, instance_id, user_id, created_at, updated_at
             FROM slots WHERE instance_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![instance_id], Self::slot_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn find_slot_for_user(&self, instance_id: i64, user_id: i64) -> Result<Option<Slot>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, uuid, name, instance_id, user_id, created_at, updated_at
                 FROM slots WHERE instance_id = ?1 AND user_id = ?2",
                params![instance_id, user_id],
                Self::slot_from_row,
            )
            .optional()?)
    }

    pub fn assign_slot(&self, slot_id: i64, user_id: Option<i64>) -> Result<Slot> {
        let changed = self.conn.execute(
            "UPDATE slots SET user_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![user_id, now(), slot_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Slot {slot_id} not found")));
        }
        self.get_slot(slot_id)
    }

    // --- Meals ---

    pub fn insert_meal(&self, meal: &NewMeal) -> Result<Meal> {
        let ts = now();
        let date = meal.date.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn.execute(
            "INSERT INTO meals (uuid, name, meal_type, date, instance_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                meal.name,
                meal.meal_type,
                date,
                meal.instance_id,
                ts,
                ts
            ],
        )?;
        self.get_meal(self.conn.last_insert_rowid())
    }

    pub fn get_meal(&self, id: i64) -> Result<Meal> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, meal_type, date, instance_id, created_at, updated_at
                 FROM meals WHERE id = ?1",
                params![id],
                Self::meal_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Meal {id} not found")))
    }

    pub fn list_meals(&self, instance_id: i64) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, meal_type, date, instance_id, created_at, updated_at
             FROM meals WHERE instance_id = ?1 ORDER BY date IS NULL, date, id",
        )?;
        let rows = stmt.query_map(params![instance_id], Self::meal_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        // Usages go with the meal via ON DELETE CASCADE.
        let changed = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn attach_slot_to_meal(&self, meal_id: i64, slot_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO meal_slots (meal_id, slot_id) VALUES (?1, ?2)",
            params![meal_id, slot_id],
        )?;
        Ok(())
    }

    pub fn list_meal_slots(&self, meal_id: i64) -> Result<Vec<Slot>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.uuid, s.name, s.instance_id, s.user_id, s.created_at, s.updated_at
             FROM slots s
             JOIN meal_slots ms ON ms.slot_id = s.id
             WHERE ms.meal_id = ?1 ORDER BY s.name",
        )?;
        let rows = stmt.query_map(params![meal_id], Self::slot_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Every meal of an instance with its usages and the joined ingredient
    /// name/category, as the aggregator's input snapshot.
    pub fn meals_with_ingredients(&self, instance_id: i64) -> Result<Vec<MealWithIngredients>> {
        let meals = self.list_meals(instance_id)?;
        let mut out = Vec::with_capacity(meals.len());
        for meal in meals {
            let ingredients = self.list_meal_ingredients(meal.id)?;
            out.push(MealWithIngredients { meal, ingredients });
        }
        Ok(out)
    }

    // --- Ingredients ---

    /// Insert a new ingredient row. A `(name, instance_id)` collision
    /// surfaces as `Error::Db` with a unique-violation code; callers racing
    /// on creation should check [`Error::is_unique_violation`] and re-read.
    pub fn insert_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        let ts = now();
        self.conn.execute(
            "INSERT INTO ingredients
                 (uuid, name, category, default_unit, status, instance_id, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                Uuid::new_v4().to_string(),
                ingredient.name,
                ingredient.category,
                ingredient.default_unit,
                ingredient.status,
                ingredient.instance_id,
                ingredient.created_by,
                ts,
                ts
            ],
        )?;
        self.get_ingredient(self.conn.last_insert_rowid())
    }

    /// Insert-or-update an approved ingredient in a scope. Used by catalog
    /// seeding, which must be re-runnable.
    pub fn upsert_approved_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        let ts = now();
        self.conn.execute(
            "INSERT INTO ingredients
                 (uuid, name, category, default_unit, status, instance_id, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(name, instance_id) DO UPDATE SET
                 category = excluded.category,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                ingredient.name,
                ingredient.category,
                ingredient.default_unit,
                STATUS_APPROVED,
                ingredient.instance_id,
                ingredient.created_by,
                ts,
                ts
            ],
        )?;
        self.get_ingredient_by_name(ingredient.instance_id, &ingredient.name)?
            .ok_or_else(|| Error::NotFound(format!("Ingredient '{}' not found", ingredient.name)))
    }

    pub fn get_ingredient(&self, id: i64) -> Result<Ingredient> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, category, default_unit, status, instance_id, created_by, created_at, updated_at
                 FROM ingredients WHERE id = ?1",
                params![id],
                Self::ingredient_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Ingredient {id} not found")))
    }

    /// Lookup by exact stored name within one scope (names are stored
    /// normalized, so pass a normalized name).
    pub fn get_ingredient_by_name(
        &self,
        instance_id: i64,
        name: &str,
    ) -> Result<Option<Ingredient>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, uuid, name, category, default_unit, status, instance_id, created_by, created_at, updated_at
                 FROM ingredients WHERE instance_id = ?1 AND name = ?2",
                params![instance_id, name],
                Self::ingredient_from_row,
            )
            .optional()?)
    }

    pub fn list_ingredients(&self, instance_id: i64, status: &str) -> Result<Vec<Ingredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, category, default_unit, status, instance_id, created_by, created_at, updated_at
             FROM ingredients WHERE instance_id = ?1 AND status = ?2 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![instance_id, status], Self::ingredient_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn list_approved(&self, instance_id: i64) -> Result<Vec<Ingredient>> {
        self.list_ingredients(instance_id, STATUS_APPROVED)
    }

    pub fn list_pending(&self, instance_id: i64) -> Result<Vec<Ingredient>> {
        self.list_ingredients(instance_id, STATUS_PENDING)
    }

    // --- Meal ingredients (usages) ---

    pub fn insert_meal_ingredient(&self, usage: &NewMealIngredient) -> Result<MealIngredient> {
        let ts = now();
        self.conn.execute(
            "INSERT INTO meal_ingredients (uuid, meal_id, ingredient_id, quantity, unit, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                usage.meal_id,
                usage.ingredient_id,
                usage.quantity,
                usage.unit,
                ts,
                ts
            ],
        )?;
        self.get_meal_ingredient(self.conn.last_insert_rowid())
    }

    pub fn get_meal_ingredient(&self, id: i64) -> Result<MealIngredient> {
        self.conn
            .query_row(
                "SELECT mi.id, mi.uuid, mi.meal_id, mi.ingredient_id, mi.quantity, mi.unit,
                        mi.created_at, mi.updated_at, i.name, i.category
                 FROM meal_ingredients mi
                 JOIN ingredients i ON i.id = mi.ingredient_id
                 WHERE mi.id = ?1",
                params![id],
                Self::meal_ingredient_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Meal ingredient {id} not found")))
    }

    pub fn list_meal_ingredients(&self, meal_id: i64) -> Result<Vec<MealIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT mi.id, mi.uuid, mi.meal_id, mi.ingredient_id, mi.quantity, mi.unit,
                    mi.created_at, mi.updated_at, i.name, i.category
             FROM meal_ingredients mi
             JOIN ingredients i ON i.id = mi.ingredient_id
             WHERE mi.meal_id = ?1 ORDER BY mi.id",
        )?;
        let rows = stmt.query_map(params![meal_id], Self::meal_ingredient_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn update_meal_ingredient(
        &self,
        id: i64,
        update: &UpdateMealIngredient,
    ) -> Result<MealIngredient> {
        let current = self.get_meal_ingredient(id)?;
        let quantity = update.quantity.unwrap_or(current.quantity);
        let unit = update.unit.clone().unwrap_or(current.unit);
        self.conn.execute(
            "UPDATE meal_ingredients SET quantity = ?1, unit = ?2, updated_at = ?3 WHERE id = ?4",
            params![quantity, unit, now(), id],
        )?;
        self.get_meal_ingredient(id)
    }

    pub fn delete_meal_ingredient(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM meal_ingredients WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
