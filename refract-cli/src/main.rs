//! Refract CLI - image transformation server
//!
//! This binary wires the refract engine to concrete stores and serves
//! it over HTTP.
//!
//! # Examples
//!
//! Serve a local image directory with signed URLs:
//!
//! ```text
//! refract serve --secret my-secret --file-storage ./images
//! ```
//!
//! Proxy a remote origin with result caching:
//!
//! ```text
//! refract serve --secret my-secret \
//!     --http-origin https://origin.example.com/ \
//!     --file-storage ./cache/source \
//!     --result-storage ./cache/results
//! ```
//!
//! Print a signed request path:
//!
//! ```text
//! refract sign --secret my-secret fit-in/300x200/img.jpg
//! ```

mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use refract::engine::Engine;
use refract::logging;
use refract::params::{sign_path, HmacSigner};
use refract::store::{FileStore, HttpLoader, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "refract", version, about = "HTTP image transformation service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Sign a canonical request path and print the servable URL path.
    Sign {
        /// Canonical path, e.g. `fit-in/300x200/img.jpg`
        path: String,
        /// Shared signing secret
        #[arg(long)]
        secret: String,
    },
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Shared signing secret for request URLs
    #[arg(long)]
    secret: Option<String>,

    /// Serve unsigned `unsafe/` URLs (development only)
    #[arg(long)]
    allow_unsafe: bool,

    /// Directory used as a source storage (read/write cache)
    #[arg(long)]
    file_storage: Option<String>,

    /// Directory used as the result storage
    #[arg(long)]
    result_storage: Option<String>,

    /// Base URL of an HTTP origin loader
    #[arg(long)]
    http_origin: Option<Url>,

    /// Allow absolute http(s) URLs as image keys
    #[arg(long)]
    allow_remote_urls: bool,

    /// Serve everything from an in-memory store (development only)
    #[arg(long)]
    memory_storage: bool,

    /// Redirect target for the bare root path
    #[arg(long)]
    base_path_redirect: Option<String>,

    /// Transform fragment applied to every request
    #[arg(long)]
    base_params: Option<String>,

    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    load_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    process_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    save_timeout_secs: u64,

    /// Cache-Control lifetime in seconds (0 disables caching headers)
    #[arg(long, default_value_t = 604_800)]
    cache_header_ttl_secs: u64,

    /// stale-while-revalidate window in seconds
    #[arg(long, default_value_t = 86_400)]
    cache_header_swr_secs: u64,

    /// Bound on concurrent processor chains (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    process_concurrency: usize,

    /// Negotiate WebP output via the Accept header
    #[arg(long)]
    auto_webp: bool,

    /// Negotiate AVIF output via the Accept header
    #[arg(long)]
    auto_avif: bool,

    /// Reject result-cache hits older than the source image
    #[arg(long)]
    modified_time_check: bool,

    /// Respond to errors with an empty body
    #[arg(long)]
    disable_error_body: bool,

    /// Disable the params introspection endpoint
    #[arg(long)]
    disable_params_endpoint: bool,

    /// Write logs to this directory in addition to stdout
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Sign { path, secret } => {
            let signer = HmacSigner::new(secret);
            println!("{}", sign_path(&signer, &path));
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), CliError> {
    let _logging_guard = match &args.log_dir {
        Some(dir) => logging::init_logging_with_file(dir, "refract.log")?,
        None => logging::init_logging(),
    };

    if args.secret.is_none() && !args.allow_unsafe {
        return Err(CliError::Config(
            "either --secret or --allow-unsafe is required".to_string(),
        ));
    }

    let mut builder = Engine::builder()
        .unsafe_requests(args.allow_unsafe)
        .request_timeout(Duration::from_secs(args.request_timeout_secs))
        .load_timeout(Duration::from_secs(args.load_timeout_secs))
        .process_timeout(Duration::from_secs(args.process_timeout_secs))
        .save_timeout(Duration::from_secs(args.save_timeout_secs))
        .cache_header_ttl(Duration::from_secs(args.cache_header_ttl_secs))
        .cache_header_swr(Duration::from_secs(args.cache_header_swr_secs))
        .process_concurrency(args.process_concurrency)
        .auto_webp(args.auto_webp)
        .auto_avif(args.auto_avif)
        .modified_time_check(args.modified_time_check)
        .disable_error_body(args.disable_error_body)
        .disable_params_endpoint(args.disable_params_endpoint);

    if let Some(secret) = &args.secret {
        builder = builder.secret(secret.clone());
    }
    if let Some(target) = &args.base_path_redirect {
        builder = builder.base_path_redirect(target.clone());
    }
    if let Some(fragment) = &args.base_params {
        builder = builder.base_params(fragment.clone());
    }
    if let Some(dir) = &args.file_storage {
        builder = builder.storage(Arc::new(FileStore::new(dir.clone())));
    }
    if args.memory_storage {
        builder = builder.storage(Arc::new(MemoryStore::new()));
    }
    if let Some(dir) = &args.result_storage {
        builder = builder.result_storage(Arc::new(FileStore::new(dir.clone())));
    }
    if let Some(origin) = &args.http_origin {
        let loader = HttpLoader::new()
            .map_err(|err| CliError::Config(err.to_string()))?
            .with_base_url(origin.clone());
        builder = builder.loader(Arc::new(loader));
    }
    if args.allow_remote_urls {
        let loader = HttpLoader::new().map_err(|err| CliError::Config(err.to_string()))?;
        builder = builder.loader(Arc::new(loader));
    }

    let engine = Arc::new(builder.build());
    tracing::info!(bind = %args.bind, "starting refract");
    refract::http::serve(engine, args.bind).await?;
    Ok(())
}
