//! Command-line driver: materialize one laid-out document and log the result.

mod document;

use anyhow::{Context as _, anyhow, bail};
use core::cell::RefCell;
use core::time::Duration;
use document::DocumentNode;
use env_logger::{Builder, Env};
use log::{error, info, warn};
use loom_materializer::{DocumentView, ViewEvent};
use loom_resources::{DirBundle, LoomConfig, ReqwestTransport, ResourceServices, Scheduler};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;
use std::thread;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

const USAGE: &str = "usage: loom <document.json | URL> [--bundle DIR] [--descriptor URI] [--tap ID]...";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    /// Local path, or an `http(s)` URL downloaded before parsing.
    document: Option<String>,
    bundle: Option<PathBuf>,
    descriptor: Option<String>,
    /// Elements tapped in order once the first pass settles.
    taps: Vec<String>,
}

fn parse_args<I>(args: I) -> anyhow::Result<Options>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if let Some(flag) = arg.strip_prefix("--") {
            match flag {
                "bundle" => options.bundle = Some(PathBuf::from(flag_value(&mut args, flag)?)),
                "descriptor" => options.descriptor = Some(flag_value(&mut args, flag)?),
                "tap" => options.taps.push(flag_value(&mut args, flag)?),
                _ => bail!("unknown flag `{arg}`\n{USAGE}"),
            }
        } else if options.document.is_none() {
            options.document = Some(arg);
        } else {
            bail!("unexpected argument `{arg}`\n{USAGE}");
        }
    }
    Ok(options)
}

fn flag_value<I>(args: &mut I, flag: &str) -> anyhow::Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| anyhow!("`--{flag}` needs a value\n{USAGE}"))
}

/// Tick until idle or out of budget. Returns whether the scheduler went idle.
fn drive(scheduler: &mut Scheduler, interval: Duration, max_ticks: u64) -> bool {
    for _ in 0..max_ticks {
        if scheduler.is_idle() {
            return true;
        }
        scheduler.tick();
        thread::sleep(interval);
    }
    scheduler.is_idle()
}

/// Drive `future` to its output on the scheduler, `None` if the tick budget ran out.
fn complete<T: 'static>(
    scheduler: &mut Scheduler,
    config: &LoomConfig,
    future: impl Future<Output = T> + 'static,
) -> Option<T> {
    let output = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&output);
    scheduler.spawn(async move {
        let value = future.await;
        *sink.borrow_mut() = Some(value);
    });
    drive(scheduler, config.tick_interval(), config.max_ticks);
    output.take()
}

fn is_web_url(source: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| source.get(..scheme.len()).is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme)))
}

fn settle(
    scheduler: &mut Scheduler,
    events: &mut UnboundedReceiver<ViewEvent>,
    config: &LoomConfig,
) -> anyhow::Result<()> {
    if !drive(scheduler, config.tick_interval(), config.max_ticks) {
        warn!("scheduler still busy after {} ticks", config.max_ticks);
    }
    while let Ok(event) = events.try_recv() {
        match event {
            ViewEvent::Materialized { pass, nodes } => {
                info!("pass {pass}: {nodes} nodes materialized");
            }
            ViewEvent::MaterializeFailed { pass, error } => {
                return Err(error).with_context(|| format!("materialization pass {pass}"));
            }
            ViewEvent::NodeTapped { id, src } => info!("tapped `{id}` ({src})"),
            ViewEvent::LinkTapped { id, href } => info!("link `{id}` -> {href}"),
        }
    }
    Ok(())
}

fn run(options: Options) -> anyhow::Result<()> {
    let document = options.document.ok_or_else(|| anyhow!(USAGE))?;
    let config = LoomConfig::from_env();
    let bundle_root = match options.bundle.or_else(|| config.bundle_root.clone()) {
        Some(root) => root,
        None => env::current_dir()?,
    };
    info!("bundle root {}", bundle_root.display());

    let runtime = RuntimeBuilder::new_multi_thread().enable_all().build()?;
    let mut scheduler = Scheduler::new();
    let services = ResourceServices::new(
        config.clone(),
        scheduler.spawner(),
        Rc::new(DirBundle::new(bundle_root, runtime.handle().clone())),
        Rc::new(ReqwestTransport::new(runtime.handle().clone())),
    );
    let (events, mut receiver) = unbounded_channel();
    let mut view = DocumentView::new(services, events);

    if let Some(uri) = &options.descriptor {
        complete(&mut scheduler, &config, view.load_descriptor(uri))
            .ok_or_else(|| anyhow!("descriptor `{uri}` still loading after {} ticks", config.max_ticks))?
            .with_context(|| format!("loading descriptor `{uri}`"))?;
    }

    let text = if is_web_url(&document) {
        complete(&mut scheduler, &config, view.download_document(&document))
            .ok_or_else(|| anyhow!("`{document}` still downloading after {} ticks", config.max_ticks))?
            .with_context(|| format!("downloading {document}"))?
    } else {
        fs::read_to_string(&document).with_context(|| format!("reading {document}"))?
    };
    let registry = view.registry();
    let root = DocumentNode::parse(&text)
        .with_context(|| format!("parsing {document}"))?
        .into_layout(&mut registry.borrow_mut());
    view.set_tree(root);
    view.materialize()
        .ok_or_else(|| anyhow!("no layout tree to materialize"))?;
    settle(&mut scheduler, &mut receiver, &config)?;

    for id in &options.taps {
        if view.tap(id)? {
            settle(&mut scheduler, &mut receiver, &config)?;
        } else {
            warn!("`{id}` is not an interactive element");
        }
    }

    info!("visual tree:\n{}", view.tree().outline());
    Ok(())
}

fn main() {
    let _log_init = Builder::from_env(Env::default().filter_or("RUST_LOG", "info")).try_init();
    if let Err(err) = parse_args(env::args().skip(1)).and_then(run) {
        error!("{err:#}");
        exit(1);
    }
}
