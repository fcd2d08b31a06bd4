use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use tricook_core::error::Error;
use tricook_core::models::User;
use tricook_core::service::TricookService;

use super::helpers::{fail_not_found, truncate};

pub(crate) fn cmd_instance_create(
    service: &TricookService,
    user: &User,
    name: &str,
    json: bool,
) -> Result<()> {
    let instance = service.create_instance(name, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&instance)?);
    } else {
        println!("Created instance '{}' (id {})", instance.name, instance.id);
        println!("Join token: {}", instance.join_token);
    }
    Ok(())
}

pub(crate) fn cmd_instance_list(service: &TricookService, user: &User, json: bool) -> Result<()> {
    let instances = service.list_instances(user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }
    if instances.is_empty() {
        println!("No instances yet. Create one with 'tricook instance create <name>'");
        return Ok(());
    }

    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Join token")]
        join_token: String,
    }

    let rows: Vec<InstanceRow> = instances
        .iter()
        .map(|i| InstanceRow {
            id: i.id,
            name: truncate(&i.name, 35),
            join_token: i.join_token.clone(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_instance_join(
    service: &TricookService,
    user: &User,
    token: &str,
    json: bool,
) -> Result<()> {
    match service.join_instance(token, user) {
        Ok(instance) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&instance)?);
            } else {
                println!("Joined instance '{}' (id {})", instance.name, instance.id);
            }
            Ok(())
        }
        Err(Error::NotFound(msg)) => fail_not_found(&msg, json),
        Err(e) => Err(e.into()),
    }
}
