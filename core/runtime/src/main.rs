//! Ability runtime entrypoint.
//!
//! Hosts one application bundle: a socket listener for scheduler requests,
//! strict request validation, and one worker thread per attached ability.
//! Data ability routes resolve in-process unless an external ability
//! manager socket is configured.

use clap::Parser;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod ability_thread;
mod ams_client;
mod app_runtime;
mod demo;
mod handler;
mod logging;
mod manifest;
mod record;
mod server;

use ability_core::AbilityManager;
use ams_client::AmsClient;
use app_runtime::AppRuntime;

#[derive(Parser, Debug)]
#[command(
    name = "ability-runtime",
    about = "Hosts application abilities for the scheduler",
    version
)]
struct Cli {
    /// Listen on this socket instead of ~/.ability-runtime/runtime.sock
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Bundle manifest to host instead of the built-in demo bundle
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Route data ability acquire/release through this manager socket
    #[arg(long)]
    ams_socket: Option<PathBuf>,

    /// Write logs to a daily-rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.log_dir.as_deref());

    let manifest = match manifest::load_manifest(cli.manifest.as_deref()) {
        Ok(manifest) => manifest,
        Err(err) => {
            error!(error = %err, "Failed to load bundle manifest");
            std::process::exit(1);
        }
    };

    let socket_path = match cli.socket {
        Some(path) => path,
        None => match server::runtime_socket_path() {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "Failed to resolve runtime socket path");
                std::process::exit(1);
            }
        },
    };

    if let Err(err) = server::prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare runtime socket directory");
        std::process::exit(1);
    }

    if let Err(err) = server::remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind runtime socket");
            std::process::exit(1);
        }
    };

    let runtime = match cli.ams_socket.or_else(ams_client::ams_socket_from_env) {
        Some(ams_socket) => {
            info!(path = %ams_socket.display(), "Routing data abilities through the ability manager");
            let manager: Arc<dyn AbilityManager> = Arc::new(AmsClient::new(ams_socket));
            AppRuntime::new(
                demo::demo_application(),
                demo::demo_registry(),
                manifest,
                manager,
            )
        }
        None => AppRuntime::local(demo::demo_application(), demo::demo_registry(), manifest),
    };

    info!(
        path = %socket_path.display(),
        bundle = runtime.bundle_name(),
        "Ability runtime started"
    );

    server::serve(listener, runtime);
}
