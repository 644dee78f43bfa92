//! Runtime context for CLI commands

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use zd_core::{Config, ConnectionConfig, CoreError, Frame, PostgresConfig};
use zd_db::{Database, SqlDatabase};
use zd_jinja::TemplateResolver;

use crate::cli::{GlobalArgs, OutputFormat, PgEnvArgs};

/// Settings resolved from flags, environment and zangetsu.yml
pub(crate) struct Settings {
    /// Connection to use, if one could be resolved
    pub connection: Option<ConnectionConfig>,

    /// SQL template directory
    pub sql_dir: PathBuf,
}

impl Settings {
    /// Resolve settings. `--url` wins over the config file, which wins over
    /// the libpq variables.
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let loaded = load_config(args)?;

        let sql_dir = match (&args.sql_dir, &loaded) {
            (Some(dir), _) => dir.clone(),
            (None, Some((config, root))) => config.sql_dir_absolute(root),
            (None, None) => PathBuf::from("sql"),
        };

        let connection = if let Some(url) = &args.url {
            Some(ConnectionConfig::from_connection_string(url).context("Invalid --url")?)
        } else if let Some((config, root)) = &loaded {
            if config.connections.is_empty() && args.connection.is_none() {
                postgres_from_env(&args.pg)
            } else {
                let conn = config
                    .get_connection(args.connection.as_deref())
                    .context("Failed to select connection")?;
                Some(anchor_paths(conn.clone(), root))
            }
        } else if let Some(name) = &args.connection {
            bail!("Connection '{name}' requested but no zangetsu.yml was found");
        } else {
            postgres_from_env(&args.pg)
        };

        let connection =
            connection.map(|c| c.with_default_credentials(args.credentials.as_deref()));
        Ok(Self {
            connection,
            sql_dir,
        })
    }

    pub fn templates(&self) -> TemplateResolver {
        TemplateResolver::new(self.sql_dir.clone())
    }
}

/// Runtime context holding an opened database adapter
pub(crate) struct RuntimeContext {
    /// The adapter; connected unless built with [`RuntimeContext::open`]
    pub db: Box<dyn Database>,

    /// Output format for frames
    pub format: OutputFormat,
}

impl RuntimeContext {
    /// Resolve the connection and build its adapter without connecting.
    pub fn open(args: &GlobalArgs) -> Result<Self> {
        let settings = Settings::resolve(args)?;
        let Some(config) = &settings.connection else {
            bail!(
                "No connection configured. Pass --url, add a connection to zangetsu.yml, or set PGDATABASE"
            );
        };
        log::debug!("Using {config}");
        Ok(Self {
            db: zd_db::open(config, settings.templates()),
            format: args.format,
        })
    }

    /// Resolve, build and connect.
    pub fn connect(args: &GlobalArgs) -> Result<Self> {
        let mut ctx = Self::open(args)?;
        ctx.db
            .connect()
            .with_context(|| format!("Failed to connect to {}", ctx.db.describe()))?;
        Ok(ctx)
    }

    /// The adapter as a SQL database, or an error for backends without SQL.
    pub fn sql(&self) -> Result<&dyn SqlDatabase> {
        match self.db.as_sql() {
            Some(db) => Ok(db),
            None => bail!(
                "The {} backend does not run SQL templates or transactions",
                self.db.db_type()
            ),
        }
    }

    pub fn print(&self, frame: &Frame) -> Result<()> {
        print_frame(frame, self.format)
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        if self.db.is_connected() {
            if let Err(e) = self.db.close() {
                log::warn!("Failed to close connection: {e}");
            }
        }
    }
}

/// Print a frame to stdout in the requested format.
pub(crate) fn print_frame(frame: &Frame, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print!("{frame}"),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&frame.to_json_records())
                .context("Failed to serialize result as JSON")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Load the config named by `--config`, or zangetsu.yml in the current
/// directory if there is one. Returns the config with its root directory.
fn load_config(args: &GlobalArgs) -> Result<Option<(Config, PathBuf)>> {
    if let Some(path) = &args.config {
        let config = Config::load(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(Some((config, root)));
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    match Config::load_from_dir(&cwd) {
        Ok(config) => Ok(Some((config, cwd))),
        Err(CoreError::ConfigNotFound { .. }) => Ok(None),
        Err(e) => Err(e).context("Failed to load zangetsu.yml"),
    }
}

/// Relative DuckDB and credential paths in the config file are relative to
/// the file itself.
fn anchor_paths(mut config: ConnectionConfig, root: &Path) -> ConnectionConfig {
    match &mut config {
        ConnectionConfig::DuckDb(c) if !c.is_memory() && Path::new(&c.path).is_relative() => {
            c.path = root.join(&c.path).display().to_string();
        }
        ConnectionConfig::BigQuery(c) => anchor(&mut c.credentials_path, root),
        ConnectionConfig::Spreadsheet(c) => anchor(&mut c.credentials_path, root),
        _ => {}
    }
    config
}

fn anchor(path: &mut Option<PathBuf>, root: &Path) {
    if let Some(p) = path.as_mut().filter(|p| p.is_relative()) {
        *p = root.join(&*p);
    }
}

fn postgres_from_env(pg: &PgEnvArgs) -> Option<ConnectionConfig> {
    if pg.database.is_none() && pg.host.is_none() {
        return None;
    }
    let defaults = PostgresConfig::default();
    Some(ConnectionConfig::Postgres(PostgresConfig {
        host: pg.host.clone(),
        port: pg.port.unwrap_or(defaults.port),
        database: pg.database.clone(),
        username: pg.user.clone(),
        password: pg.password.clone(),
        ..defaults
    }))
}
