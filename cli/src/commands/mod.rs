mod helpers;
mod ingredient;
mod instance;
mod meal;
mod parse;
mod seed;
mod shopping;
mod slot;

pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_list, cmd_ingredient_remove};
pub(crate) use instance::{cmd_instance_create, cmd_instance_join, cmd_instance_list};
pub(crate) use meal::{cmd_meal_create, cmd_meal_delete, cmd_meal_list};
pub(crate) use parse::cmd_parse;
pub(crate) use seed::cmd_seed;
pub(crate) use shopping::cmd_shopping_list;
pub(crate) use slot::{cmd_slot_add, cmd_slot_assign, cmd_slot_list};
