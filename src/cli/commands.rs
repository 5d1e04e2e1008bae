use crate::{
    config::{ApplicationConfig, ContainerConfig},
    container::Container,
    module::{ModuleLoader, ModuleReference},
    resource::{open_store, SharedResource},
    runtime_config::RuntimeConfig,
    server::{ContainerService, HttpServer, ServerHandle},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for the container
#[derive(Parser)]
#[command(name = "brrtcontainer")]
#[command(about = "BRRTContainer CLI", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy application units and serve them over HTTP
    Serve {
        /// Container configuration file (YAML, or JSON for `.json`)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address (overrides config and `BRRTC_BIND`)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config and `BRRTC_PORT`)
        #[arg(short, long)]
        port: Option<u16>,

        /// Extra unit serving a directory or archive, as `CONTEXT=PATH`
        #[arg(long = "webapp", value_name = "CONTEXT=PATH", value_parser = parse_webapp)]
        webapps: Vec<(String, PathBuf)>,
    },
    /// Resolve or list modules across ordered store roots
    Modules {
        /// Store roots (directories or archives), searched in order
        #[arg(short, long = "root", required = true)]
        roots: Vec<PathBuf>,

        /// Module to resolve; lists every module when omitted
        name: Option<String>,
    },
}

fn parse_webapp(value: &str) -> Result<(String, PathBuf), String> {
    let (context, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CONTEXT=PATH, got '{value}'"))?;
    if path.is_empty() {
        return Err(format!("missing path in '{value}'"));
    }
    Ok((context.to_string(), PathBuf::from(path)))
}

/// Parse the process arguments and run the selected command.
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            bind,
            port,
            webapps,
        } => {
            let mut config = match &config {
                Some(path) => ContainerConfig::load(path)?,
                None => ContainerConfig::default(),
            };
            config.apply_env()?;
            if let Some(bind) = bind {
                config.http.bind = bind;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            config.applications.extend(
                webapps
                    .into_iter()
                    .map(|(context, path)| ApplicationConfig::serving(context, path)),
            );

            let container = build_container(&config)?;
            let addr = config.socket_addr();
            let handle = HttpServer(ContainerService::new(Arc::new(container)))
                .start(addr.as_str())
                .with_context(|| format!("binding {addr}"))?;
            info!(addr = %handle.addr(), "Container listening");
            wait_for_shutdown(handle)
        }
        Commands::Modules { roots, name } => {
            let roots = roots
                .iter()
                .map(|path| {
                    open_store(path).with_context(|| format!("opening module root {}", path.display()))
                })
                .collect::<Result<Vec<SharedResource>>>()?;
            let loader = ModuleLoader::new(roots);
            match name {
                Some(name) => match loader.resolve(&name) {
                    Some(module) => println!("{}", describe(&module)),
                    None => println!("{name}: absent"),
                },
                None => {
                    for module in loader.modules() {
                        println!("{}", describe(&module));
                    }
                }
            }
            Ok(())
        }
    }
}

/// Validate `config`, then build and deploy every unit in order.
pub fn build_container(config: &ContainerConfig) -> Result<Container> {
    config.validate()?;
    let container = Container::new(RuntimeConfig::from_env());
    for unit in &config.applications {
        let app = unit
            .build()
            .with_context(|| format!("building application '{}'", unit.context_path))?;
        container.deploy(app)?;
    }
    Ok(container)
}

fn describe(module: &ModuleReference) -> String {
    let descriptor = module.descriptor();
    format!(
        "{} {} {}{}",
        descriptor.name,
        descriptor.version.as_deref().unwrap_or("-"),
        module.location(),
        if descriptor.is_automatic() { " (automatic)" } else { "" }
    )
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutting down");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}
