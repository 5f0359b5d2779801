//! First Principles command line.
//!
//! ```text
//! first-principles verify --email admin@alphaspine.io --expect-role ORG_ADMIN
//! first-principles serve --addr 127.0.0.1:8787
//! first-principles policies --check-only
//! first-principles client-config
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use first_principles_lib::admin::create_admin_client;
use first_principles_lib::api::{self, ApiContext};
use first_principles_lib::backend::rest::DEFAULT_TIMEOUT_SECS;
use first_principles_lib::backend::{Backend, BackendError, RestBackend};
use first_principles_lib::config::{self, AdminConfig, BackendConfig, ConfigError};
use first_principles_lib::images::REMOTE_IMAGE_PATTERNS;
use first_principles_lib::imaging::DecoderConfig;
use first_principles_lib::models::UserRole;
use first_principles_lib::policy::{self, PolicyError};
use first_principles_lib::verify::{run_protocol, Credentials, Expectations};

#[derive(Parser)]
#[command(name = "first-principles")]
#[command(version, about = "First Principles backend tooling")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, fetch the profile (creating it if missing) and its organization
    Verify {
        #[arg(long)]
        email: String,

        #[arg(long, env = "FP_VERIFY_PASSWORD", hide_env_values = true)]
        password: String,

        /// Role the profile must have, e.g. ORG_ADMIN
        #[arg(long)]
        expect_role: Option<UserRole>,

        /// Organization name the profile must resolve to
        #[arg(long)]
        expect_org: Option<String>,

        /// Organization for a provisioned profile when the session has no org claim
        #[arg(long)]
        default_org: Option<Uuid>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the admin HTTP API
    Serve {
        /// Listen address (default from FP_API_ADDR, else 127.0.0.1:8787)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Print the row access policy SQL
    Policies {
        /// Only validate the catalogue
        #[arg(long)]
        check_only: bool,
    },

    /// Print the image allowlist and DICOM decoder configuration as JSON
    ClientConfig,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Server(#[from] api::server::ServerError),
    #[error("Cannot start async runtime: {0}")]
    Runtime(std::io::Error),
    #[error("Cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    VerificationFailed(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    first_principles_lib::init_tracing();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let result = match cli.command {
        Commands::Verify {
            email,
            password,
            expect_role,
            expect_org,
            default_org,
            json,
        } => cmd_verify(
            &Credentials::new(&email, &password),
            &Expectations {
                role: expect_role,
                organization: expect_org,
            },
            default_org,
            json,
        ),
        Commands::Serve { addr } => cmd_serve(addr),
        Commands::Policies { check_only } => cmd_policies(check_only),
        Commands::ClientConfig => cmd_client_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn request_backend(config: &BackendConfig) -> Result<RestBackend, BackendError> {
    RestBackend::new(
        config.url.as_str(),
        config.publishable_key.clone(),
        DEFAULT_TIMEOUT_SECS,
    )
}

fn cmd_verify(
    credentials: &Credentials,
    expected: &Expectations,
    default_org: Option<Uuid>,
    json: bool,
) -> Result<(), CliError> {
    let config = BackendConfig::from_env()?;
    let backend = request_backend(&config)?;

    let report = run_protocol(&backend, credentials, expected, default_org);

    if json {
        println!("{}", report.to_json()?);
    } else {
        for step in &report.steps {
            let code = step.code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default();
            println!("{:<20} {:?}{code} {}", step.step.as_str(), step.outcome, step.detail);
        }
        println!("{}", report.summary);
    }

    if report.diagnosis.is_healthy() {
        Ok(())
    } else {
        Err(CliError::VerificationFailed(report.summary))
    }
}

fn cmd_serve(addr: Option<SocketAddr>) -> Result<(), CliError> {
    let addr = match addr {
        Some(addr) => addr,
        None => config::api_addr_from_lookup(|name| std::env::var(name).ok())?,
    };

    // Both clients are built before the runtime: the HTTP client is blocking.
    let backend: Arc<dyn Backend> = Arc::new(request_backend(&BackendConfig::from_env()?)?);
    let admin = Arc::new(create_admin_client(&AdminConfig::from_env()?)?);
    let ctx = ApiContext::new(backend, admin);

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let result = runtime.block_on(api::serve(ctx.clone(), addr));
    drop(runtime);
    // last handle to the blocking clients is released outside the runtime
    drop(ctx);
    result.map_err(CliError::from)
}

fn cmd_policies(check_only: bool) -> Result<(), CliError> {
    let policies = policy::default_policies();
    policy::validate_policies(&policies)?;
    if check_only {
        println!("{} policies, no self-reference or cycle", policies.len());
    } else {
        print!("{}", policy::render_script(&policies));
    }
    Ok(())
}

fn cmd_client_config() -> Result<(), CliError> {
    let output = serde_json::json!({
        "images": { "remotePatterns": REMOTE_IMAGE_PATTERNS },
        "decoder": DecoderConfig::default(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
