use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use tricook_core::error::Error;
use tricook_core::models::User;
use tricook_core::service::TricookService;

use super::helpers::fail_not_found;

pub(crate) fn cmd_slot_add(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let slot = service.create_slot(instance_id, name, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&slot)?);
    } else {
        println!("Created slot '{}' (id {})", slot.name, slot.id);
    }
    Ok(())
}

pub(crate) fn cmd_slot_assign(
    service: &TricookService,
    user: &User,
    slot_id: i64,
    assignee: Option<&str>,
    json: bool,
) -> Result<()> {
    match service.assign_slot(slot_id, assignee, user) {
        Ok(slot) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&slot)?);
            } else if let Some(email) = assignee {
                println!("Assigned slot '{}' to {email}", slot.name);
            } else {
                println!("Unassigned slot '{}'", slot.name);
            }
            Ok(())
        }
        Err(Error::NotFound(msg)) => fail_not_found(&msg, json),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn cmd_slot_list(
    service: &TricookService,
    user: &User,
    instance_id: i64,
    json: bool,
) -> Result<()> {
    let slots = service.list_slots(instance_id, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&slots)?);
        return Ok(());
    }
    if slots.is_empty() {
        println!("No slots in this instance yet");
        return Ok(());
    }

    #[derive(Tabled)]
    struct SlotRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Assigned user")]
        user: String,
    }

    let rows: Vec<SlotRow> = slots
        .iter()
        .map(|s| SlotRow {
            id: s.id,
            name: s.name.clone(),
            user: match s.user_id {
                Some(id) => service
                    .db()
                    .get_user(id)
                    .map(|u| u.email)
                    .unwrap_or_else(|_| format!("user {id}")),
                None => "-".to_string(),
            },
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}
