use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "./uploads/projects";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Project management API with file attachments")]
pub struct Args {
    /// Host to bind to (overrides PROJECTS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PROJECTS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides PROJECTS_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides PROJECTS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::resolve(args, |key| env::var(key))?, migrate))
    }

    /// Merge CLI arguments over values looked up with `var`.
    fn resolve<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = var("PROJECTS_HOST").unwrap_or_else(|_| DEFAULT_HOST.into());
        let env_port = match var("PROJECTS_PORT") {
            Ok(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing PROJECTS_PORT value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading PROJECTS_PORT"),
        };
        let env_upload_dir =
            var("PROJECTS_UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.into());

        // The database location has no sensible default.
        let database_url = match args.database_url {
            Some(url) => url,
            None => var("PROJECTS_DATABASE_URL")
                .context("PROJECTS_DATABASE_URL must be set (or pass --database-url)")?,
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.or(env_port).unwrap_or(DEFAULT_PORT),
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            database_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
