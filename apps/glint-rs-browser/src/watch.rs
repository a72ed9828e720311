//! Follow the hosts file and print every notification the projections emit.

use std::sync::mpsc::Receiver;

use anyhow::Context as _;
use glint_rs_model::{channel_listener, AppModel, AppRole, ComputerModel, ComputerRole, ModelEvent};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::output;

struct Projections {
    hosts: ComputerModel,
    host_events: Receiver<ModelEvent<ComputerRole>>,
    apps: Option<(AppModel, Receiver<ModelEvent<AppRole>>)>,
}

impl Projections {
    fn new(ctx: &Context, host: Option<&str>) -> anyhow::Result<Self> {
        let mut hosts = ComputerModel::new(ctx.preferences.clone());
        hosts.initialize(ctx.store())?;
        let (listener, host_events) = channel_listener();
        hosts.subscribe(listener);

        let apps = match host {
            Some(query) => {
                let uuid = ctx.resolve_host(query)?;
                let mut model = AppModel::new(ctx.preferences.clone());
                model.initialize_for_host(ctx.store(), &uuid, false)?;
                let (listener, rx) = channel_listener();
                model.subscribe(listener);
                Some((model, rx))
            }
            None => None,
        };

        Ok(Self { hosts, host_events, apps })
    }

    fn pump(&mut self, json: bool) -> anyhow::Result<()> {
        self.hosts.process_store_events();
        let mut reset = false;
        for event in self.host_events.try_iter() {
            reset |= event == ModelEvent::Reset;
            output::print_event("hosts", &event, json)?;
        }
        if reset {
            output::print_hosts(&self.hosts, json)?;
        }

        if let Some((model, rx)) = &mut self.apps {
            model.process_store_events();
            let mut reset = false;
            for event in rx.try_iter() {
                if event == ModelEvent::HostLost {
                    warn!("Host {} is gone, app list is stale", model.host_uuid());
                }
                reset |= event == ModelEvent::Reset;
                output::print_event("apps", &event, json)?;
            }
            if reset {
                output::print_apps(model, json)?;
            }
        }
        Ok(())
    }

    fn print(&self, json: bool) -> anyhow::Result<()> {
        output::print_hosts(&self.hosts, json)?;
        if let Some((model, _)) = &self.apps {
            output::print_apps(model, json)?;
        }
        Ok(())
    }
}

fn touches_hosts_file(ctx: &Context, event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == ctx.hosts_path().file_name())
}

pub async fn run(ctx: &Context, host: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut projections = Projections::new(ctx, host)?;
    projections.print(json)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| {
            if tx.send(result).is_err() {
                debug!("Watch loop is gone, dropping file event");
            }
        },
        Config::default(),
    )
    .context("Failed to create file watcher")?;

    // Editors often replace the file, so watch the directory holding it.
    let dir = ctx
        .hosts_path()
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", dir))?;
    info!("Watching {:?} (Ctrl-C to stop)", ctx.hosts_path());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(result) = rx.recv() => match result {
                Ok(event) if touches_hosts_file(ctx, &event) => {
                    match ctx.reload_hosts() {
                        Ok(()) => projections.pump(json)?,
                        Err(e) => error!("Failed to reload hosts: {:#}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("File watch error: {}", e),
            },
            _ = &mut ctrl_c => {
                info!("Stopping watch");
                break;
            }
        }
    }

    Ok(())
}
