mod context;
mod hosts_file;
mod output;
mod watch;

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use glint_rs_config::SortMode;
use glint_rs_input::{connected_gamepads, Slot, SysfsInput};
use glint_rs_model::{AppModel, ComputerModel};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::context::Context;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Browse streaming hosts, their apps and gamepad mappings",
    long_about = None
)]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hosts file feeding the host store
    #[arg(long, global = true)]
    hosts: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List hosts
    Hosts,
    /// List the apps of a host
    Apps {
        /// Host uuid or name
        host: String,
        /// Include hidden apps
        #[arg(long)]
        show_hidden: bool,
        /// Only list the members of this folder
        #[arg(long)]
        folder: Option<String>,
    },
    /// Drag a host to a new position (switches to custom order)
    MoveHost { from: usize, to: usize },
    /// Drag an app to a new position (switches to custom order)
    MoveApp { host: String, from: usize, to: usize },
    /// Set the sort mode of a list
    Sort { list: ListKind, mode: SortMode },
    /// Group hosts into Online / Not Paired / Offline sections
    Sections {
        #[arg(action = clap::ArgAction::Set)]
        show: bool,
    },
    /// Manage app folders of a host
    Folder {
        host: String,
        #[command(subcommand)]
        action: FolderAction,
    },
    /// Hide or unhide an app
    Hide {
        host: String,
        app_id: u32,
        #[arg(long)]
        unhide: bool,
    },
    /// Mark an app for direct launch
    DirectLaunch {
        host: String,
        app_id: u32,
        #[arg(long)]
        off: bool,
    },
    /// List connected game controllers
    Gamepads {
        /// Show the slot each controller resolves to for this client
        #[arg(long)]
        client: Option<String>,
    },
    /// Manage gamepad slot mappings
    Map {
        #[command(subcommand)]
        action: MapAction,
    },
    /// Follow the hosts file and print projection updates
    Watch {
        /// Also follow the apps of this host
        host: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ListKind {
    Hosts,
    Apps,
}

#[derive(Subcommand, Debug)]
enum FolderAction {
    List,
    Create { name: String },
    Delete { name: String },
    Rename { from: String, to: String },
    Add { name: String, app_id: u32 },
    Remove { name: String, app_id: u32 },
}

#[derive(Subcommand, Debug)]
enum MapAction {
    /// Pin a controller to a slot everywhere ("auto" clears)
    Global { guid: String, slot: Slot },
    /// Pin a controller to a slot for one client ("auto" clears)
    Client { client: String, guid: String, slot: Slot },
    Enable { client: String },
    Disable { client: String },
    /// Forget a client's mappings
    Reset { client: String },
    /// Show the effective slot
    Resolve { client: String, guid: String },
    /// List global mappings, or a client's
    List { client: Option<String> },
}

fn host_model(ctx: &Context) -> anyhow::Result<ComputerModel> {
    let mut model = ComputerModel::new(ctx.preferences.clone());
    model.initialize(ctx.store())?;
    Ok(model)
}

fn app_model(ctx: &Context, host: &str, show_hidden: bool) -> anyhow::Result<AppModel> {
    let uuid = ctx.resolve_host(host)?;
    let mut model = AppModel::new(ctx.preferences.clone());
    model.initialize_for_host(ctx.store(), &uuid, show_hidden)?;
    Ok(model)
}

fn app_index(model: &AppModel, app_id: u32) -> anyhow::Result<usize> {
    model
        .items()
        .position(|item| item.id == app_id)
        .with_context(|| format!("Host {} has no app {}", model.host_uuid(), app_id))
}

fn run_folder(ctx: &Context, host: &str, action: FolderAction, json: bool) -> anyhow::Result<()> {
    let uuid = ctx.resolve_host(host)?;
    let prefs = &ctx.preferences;
    match action {
        FolderAction::List => {
            let folders: Vec<String> = prefs
                .app_folders(&uuid)
                .into_iter()
                .map(|folder| {
                    let members = prefs.apps_in_folder(&uuid, &folder);
                    format!("{} ({})", folder, members.join(", "))
                })
                .collect();
            output::print_list(&folders, json)?;
        }
        FolderAction::Create { name } => prefs.create_app_folder(&uuid, &name),
        FolderAction::Delete { name } => prefs.delete_app_folder(&uuid, &name),
        FolderAction::Rename { from, to } => prefs.rename_app_folder(&uuid, &from, &to),
        FolderAction::Add { name, app_id } => {
            prefs.add_app_to_folder(&uuid, &name, &app_id.to_string())
        }
        FolderAction::Remove { name, app_id } => {
            prefs.remove_app_from_folder(&uuid, &name, &app_id.to_string())
        }
    }
    Ok(())
}

fn run_map(ctx: &Context, action: MapAction, json: bool) -> anyhow::Result<()> {
    let gamepads = &ctx.gamepads;
    match action {
        MapAction::Global { guid, slot } => gamepads.set_global_mapping(&guid, slot),
        MapAction::Client { client, guid, slot } => {
            gamepads.set_client_mapping(&client, &guid, slot)
        }
        MapAction::Enable { client } => gamepads.set_client_mapping_enabled(&client, true),
        MapAction::Disable { client } => gamepads.set_client_mapping_enabled(&client, false),
        MapAction::Reset { client } => gamepads.reset_client_mappings(&client),
        MapAction::Resolve { client, guid } => {
            output::print_list(&[gamepads.resolve(&client, &guid).to_string()], json)?;
        }
        MapAction::List { client: None } => {
            output::print_mappings(&gamepads.all_global_mappings(), json)?
        }
        MapAction::List { client: Some(client) } => {
            if !gamepads.is_client_mapping_enabled(&client) && !json {
                println!("(client mappings disabled for {})", client);
            }
            output::print_mappings(&gamepads.all_client_mappings(&client), json)?;
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let ctx = Context::load(args.config, args.hosts)?;
    let json = args.json;

    match args.command {
        Command::Hosts => output::print_hosts(&host_model(&ctx)?, json)?,
        Command::Apps { host, show_hidden, folder } => {
            let mut model = app_model(&ctx, &host, show_hidden)?;
            model.set_current_folder(folder.as_deref());
            output::print_apps(&model, json)?;
        }
        Command::MoveHost { from, to } => {
            let mut model = host_model(&ctx)?;
            if from >= model.count() || to >= model.count() {
                bail!("Positions must be below {}", model.count());
            }
            model.move_computer(from, to);
            output::print_hosts(&model, json)?;
        }
        Command::MoveApp { host, from, to } => {
            let mut model = app_model(&ctx, &host, false)?;
            if from >= model.count() || to >= model.count() {
                bail!("Positions must be below {}", model.count());
            }
            model.move_app(from, to);
            output::print_apps(&model, json)?;
        }
        Command::Sort { list: ListKind::Hosts, mode } => {
            let mut model = host_model(&ctx)?;
            model.set_sort_mode(mode);
            output::print_hosts(&model, json)?;
        }
        Command::Sort { list: ListKind::Apps, mode } => {
            ctx.preferences.set_app_sort_mode(mode);
            info!("App lists now sort by {}", mode);
        }
        Command::Sections { show } => {
            let mut model = host_model(&ctx)?;
            model.set_show_sections(show);
            output::print_hosts(&model, json)?;
        }
        Command::Folder { host, action } => run_folder(&ctx, &host, action, json)?,
        Command::Hide { host, app_id, unhide } => {
            let mut model = app_model(&ctx, &host, true)?;
            let index = app_index(&model, app_id)?;
            model.set_app_hidden(index, !unhide)?;
            ctx.save_hosts()?;
        }
        Command::DirectLaunch { host, app_id, off } => {
            let mut model = app_model(&ctx, &host, true)?;
            let index = app_index(&model, app_id)?;
            model.set_app_direct_launch(index, !off)?;
            ctx.save_hosts()?;
        }
        Command::Gamepads { client } => {
            let client = client.unwrap_or_default();
            let pads: Vec<_> = connected_gamepads(&mut SysfsInput::default())
                .into_iter()
                .map(|pad| {
                    let slot = ctx.gamepads.resolve(&client, &pad.guid).to_string();
                    (pad, slot)
                })
                .collect();
            output::print_gamepads(&pads, json)?;
        }
        Command::Map { action } => run_map(&ctx, action, json)?,
        Command::Watch { host } => watch::run(&ctx, host.as_deref(), json).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    run(Args::parse()).await
}
