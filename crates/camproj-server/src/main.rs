//! `camproj` command-line entry point.
//!
//! ```text
//! camproj serve --port 8000 --config service.json
//! camproj detect frame.png --pretty
//! camproj homography points.json
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use camproj::config::ServiceConfig;
use camproj::detect::{decode_gray, detect_image};
use camproj::estimate::estimate_homography;
use camproj_server::wire::HomographyRequest;
use camproj_server::{router, serve, AppState, ServerOptions, DEFAULT_ALLOWED_ORIGINS};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "camproj", version, about = "ArUco detection and camera-to-projector homographies")]
struct Cli {
    /// Log level for one-shot commands (`serve` honours `RUST_LOG` first).
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Service configuration JSON (detector and homography settings).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// CORS origin to allow; repeat for several. Defaults to the local dev servers.
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,
        /// Maximum request body size in MiB.
        #[arg(long, default_value_t = 32)]
        max_body_mb: usize,
        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,
    },
    /// Detect markers in an image file and print the result as JSON.
    Detect {
        image: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Estimate a homography from a request JSON file and print the result.
    Homography {
        points: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            log::info!("loading config from {}", p.display());
            Ok(ServiceConfig::load_json(p)?)
        }
        None => Ok(ServiceConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            allow_origins,
            max_body_mb,
            json_logs,
        } => {
            camproj::core::init_tracing(json_logs, cli.log_level.directive());

            let cfg = load_config(cli.config.as_deref())?;
            let state = AppState::from_config(&cfg)?;
            let opts = ServerOptions {
                allowed_origins: if allow_origins.is_empty() {
                    DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
                } else {
                    allow_origins
                },
                max_body_bytes: max_body_mb.saturating_mul(1024 * 1024),
            };
            tracing::info!(
                dictionary = cfg.dictionary.as_str(),
                refinement = ?state.detector.params().corner_refinement,
                origins = ?opts.allowed_origins,
                "starting camproj service"
            );
            let app = router(state, &opts)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(app, SocketAddr::new(host, port)))?;
        }
        Command::Detect { image, pretty } => {
            camproj::core::init_with_level(cli.log_level.filter())?;
            let cfg = load_config(cli.config.as_deref())?;
            let detector = cfg.build_detector()?;

            let bytes = std::fs::read(&image)?;
            let gray = decode_gray(&bytes)?;
            let result = detect_image(&detector, &gray);
            log::info!(
                "{}: {} markers in {}x{}",
                image.display(),
                result.markers().len(),
                result.image_width(),
                result.image_height()
            );
            print_json(&result, pretty)?;
        }
        Command::Homography { points, pretty } => {
            camproj::core::init_with_level(cli.log_level.filter())?;
            let cfg = load_config(cli.config.as_deref())?;

            let raw = std::fs::read_to_string(&points)?;
            let req: HomographyRequest = serde_json::from_str(&raw)?;
            let result =
                estimate_homography(&req.camera_points, &req.projector_points, &cfg.homography);
            print_json(&result, pretty)?;
        }
    }

    Ok(())
}
