use std::collections::BTreeMap;
use std::fmt::Debug;

use glint_rs_input::ConnectedGamepad;
use glint_rs_model::{AppModel, ComputerModel, ModelEvent};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_hosts(model: &ComputerModel, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&model.items().collect::<Vec<_>>());
    }

    let mut section = None;
    for (index, item) in model.items().enumerate() {
        if model.show_sections() && section != Some(item.section) {
            section = Some(item.section);
            println!("[{}]", item.section);
        }
        let mut flags = Vec::new();
        if item.busy {
            flags.push("busy");
        }
        if item.wakeable {
            flags.push("wakeable");
        }
        if !item.server_supported {
            flags.push("unsupported");
        }
        println!("{:>3}  {:<24} {}  {}", index, item.name, item.uuid, flags.join(","));
    }
    Ok(())
}

pub fn print_apps(model: &AppModel, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&model.items().collect::<Vec<_>>());
    }

    if let Some(folder) = model.current_folder() {
        println!("[{}]", folder);
    }
    for (index, item) in model.items().enumerate() {
        let mut flags = Vec::new();
        if item.running {
            flags.push("running".to_string());
        }
        if item.hidden {
            flags.push("hidden".to_string());
        }
        if item.direct_launch {
            flags.push("direct".to_string());
        }
        if !item.folder.is_empty() {
            flags.push(format!("folder={}", item.folder));
        }
        println!("{:>3}  {:>6}  {:<32} {}", index, item.id, item.name, flags.join(","));
    }
    Ok(())
}

pub fn print_list(items: &[String], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(items);
    }
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

pub fn print_gamepads(pads: &[(ConnectedGamepad, String)], json: bool) -> anyhow::Result<()> {
    if json {
        let rows: Vec<_> = pads
            .iter()
            .map(|(pad, slot)| serde_json::json!({ "gamepad": pad, "slot": slot }))
            .collect();
        return print_json(&rows);
    }
    if pads.is_empty() {
        println!("No game controllers connected");
    }
    for (pad, slot) in pads {
        println!("{:>3}  {:<32} {}  slot={}", pad.index, pad.name, pad.guid, slot);
    }
    Ok(())
}

pub fn print_mappings(mappings: &BTreeMap<String, u8>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(mappings);
    }
    for (guid, slot) in mappings {
        println!("{}  {}", guid, slot);
    }
    Ok(())
}

pub fn print_event<R: Serialize + Debug>(
    label: &str,
    event: &ModelEvent<R>,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::json!({ "model": label, "event": event }));
    } else {
        println!("{}: {:?}", label, event);
    }
    Ok(())
}
