mod commands;
mod config;
mod openai;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_ingredient_add, cmd_ingredient_list, cmd_ingredient_remove, cmd_instance_create,
    cmd_instance_join, cmd_instance_list, cmd_meal_create, cmd_meal_delete, cmd_meal_list,
    cmd_parse, cmd_seed, cmd_shopping_list, cmd_slot_add, cmd_slot_assign, cmd_slot_list,
};
use crate::config::Config;
use crate::openai::OpenAiExtractor;
use tricook_core::db::Database;
use tricook_core::error::Error as CoreError;
use tricook_core::service::TricookService;

#[derive(Parser)]
#[command(
    name = "tricook",
    version,
    about = "Shared meal planning with aggregated shopping lists"
)]
struct Cli {
    /// Act as this user (email). Falls back to $TRICOOK_USER.
    #[arg(long = "as", global = true, value_name = "EMAIL")]
    identity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage shared planning instances
    Instance {
        #[command(subcommand)]
        command: InstanceCommands,
    },
    /// Manage slots (member places within an instance)
    Slot {
        #[command(subcommand)]
        command: SlotCommands,
    },
    /// Manage meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Manage meal ingredients and the catalog
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Extract ingredients from free text and attach them to a meal
    Parse {
        /// Meal ID to attach the ingredients to
        meal_id: i64,
        /// Text to analyse (reads stdin when omitted)
        text: Option<String>,
        /// Save the result instead of previewing it
        #[arg(long)]
        commit: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate the aggregated shopping list for an instance
    ShoppingList {
        /// Instance ID
        instance_id: i64,
        /// Write to this file (or directory, using the suggested filename)
        #[arg(short, long, value_name = "PATH")]
        output: Option<std::path::PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Seed the approved global ingredient catalog
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum InstanceCommands {
    /// Create an instance and become its first member
    Create {
        /// Instance name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List instances you are a member of
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Join an instance by its join token
    Join {
        /// Join token
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SlotCommands {
    /// Add an unassigned slot to an instance
    Add {
        /// Instance ID
        instance_id: i64,
        /// Slot name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assign a slot to a user, or unassign it
    Assign {
        /// Slot ID
        slot_id: i64,
        /// Email of the user to assign (omit with --clear to unassign)
        #[arg(long)]
        user: Option<String>,
        /// Unassign the slot
        #[arg(long, conflicts_with = "user")]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the slots of an instance
    List {
        /// Instance ID
        instance_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Create a meal (your slot is created and attached automatically)
    Create {
        /// Instance ID
        instance_id: i64,
        /// Meal name
        name: String,
        /// Meal type: breakfast, lunch, dinner
        #[arg(short = 't', long, default_value = "dinner")]
        meal_type: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Additional slot IDs to attach
        #[arg(long = "slot")]
        slots: Vec<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List meals with their ingredients
    List {
        /// Instance ID
        instance_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal (its ingredient usages go with it)
    Delete {
        /// Meal ID
        meal_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient usage to a meal (creates a pending ingredient if unknown)
    Add {
        /// Meal ID
        meal_id: i64,
        /// Ingredient name
        name: String,
        /// Quantity
        quantity: f64,
        /// Unit (g, kg, ml, cl, l, c. à café, c. à soupe, unité, ...)
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the ingredient catalog visible to an instance
    List {
        /// Instance ID
        instance_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient usage by its ID
    Remove {
        /// Usage ID
        usage_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        let code = match e.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(_)) => 2,
            _ => 1,
        };
        process::exit(code);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let service = TricookService::new(db);

    let email = cli
        .identity
        .or_else(|| std::env::var("TRICOOK_USER").ok())
        .unwrap_or_else(|| "me@tricook.local".to_string());
    let user = service.identify(&email)?;

    match cli.command {
        Commands::Instance { command } => match command {
            InstanceCommands::Create { name, json } => {
                cmd_instance_create(&service, &user, &name, json)
            }
            InstanceCommands::List { json } => cmd_instance_list(&service, &user, json),
            InstanceCommands::Join { token, json } => {
                cmd_instance_join(&service, &user, &token, json)
            }
        },
        Commands::Slot { command } => match command {
            SlotCommands::Add {
                instance_id,
                name,
                json,
            } => cmd_slot_add(&service, &user, instance_id, &name, json),
            SlotCommands::Assign {
                slot_id,
                user: assignee,
                clear,
                json,
            } => {
                if assignee.is_none() && !clear {
                    anyhow::bail!("Provide --user <email> to assign or --clear to unassign");
                }
                cmd_slot_assign(&service, &user, slot_id, assignee.as_deref(), json)
            }
            SlotCommands::List { instance_id, json } => {
                cmd_slot_list(&service, &user, instance_id, json)
            }
        },
        Commands::Meal { command } => match command {
            MealCommands::Create {
                instance_id,
                name,
                meal_type,
                date,
                slots,
                json,
            } => cmd_meal_create(
                &service, &user, instance_id, &name, &meal_type, date, &slots, json,
            ),
            MealCommands::List { instance_id, json } => {
                cmd_meal_list(&service, &user, instance_id, json)
            }
            MealCommands::Delete { meal_id, json } => {
                cmd_meal_delete(&service, &user, meal_id, json)
            }
        },
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                meal_id,
                name,
                quantity,
                unit,
                json,
            } => cmd_ingredient_add(&service, &user, meal_id, &name, quantity, &unit, json),
            IngredientCommands::List { instance_id, json } => {
                cmd_ingredient_list(&service, &user, instance_id, json)
            }
            IngredientCommands::Remove { usage_id, json } => {
                cmd_ingredient_remove(&service, &user, usage_id, json)
            }
        },
        Commands::Parse {
            meal_id,
            text,
            commit,
            json,
        } => {
            let extractor = OpenAiExtractor::new(config.openai_api_key()?)?;
            cmd_parse(&service, &extractor, &user, meal_id, text, commit, json)
        }
        Commands::ShoppingList {
            instance_id,
            output,
            json,
        } => cmd_shopping_list(&service, &user, instance_id, output.as_deref(), json),
        Commands::Seed { json } => cmd_seed(&service, json),
    }
}
