use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use alt_audit::{
    BATCH_SIZE_CHOICES, Caller, CommerceStore, ContentStore, DEFAULT_BATCH_SIZE, ExportConfig,
    ExportRequest, ExportService, NonceAction, NonceIssuer, ScanOptions, SiteSnapshot,
    StaticAuthorizer, output,
};
use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::server::{self, AppState};

/// Session the `scan` command acts as unless told otherwise.
const CLI_SESSION: &str = "cli";

#[derive(Debug, Parser)]
#[command(name = "alt-audit")]
#[command(about = "Find images without alt text and export them to CSV", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a site snapshot once and write a report
    Scan(ScanArgs),
    /// Serve the admin endpoints over HTTP
    Serve(ServeArgs),
    /// Print an anti-forgery token for a session
    Nonce(NonceArgs),
}

/// Where the site comes from and where reports go.
#[derive(Debug, Args)]
pub struct SiteArgs {
    /// Site snapshot file (.json, .yaml or .yml)
    #[arg(long, short = 's')]
    pub snapshot: PathBuf,

    /// Directory that receives report files
    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Base URL of the download endpoint
    #[arg(long, default_value = "http://127.0.0.1:8000/download")]
    pub download_base_url: String,

    /// Do not write a temp-<hash>.csv working copy next to each report
    #[arg(long)]
    pub no_working_copy: bool,
}

#[derive(Debug, Args)]
pub struct SecretArgs {
    /// Server secret used to sign anti-forgery tokens
    #[arg(long, env = "ALT_AUDIT_SECRET", hide_env_values = true)]
    pub secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// Media-library attachments
    Media,
    /// Inline images in published posts and pages
    Content,
    /// Product featured and gallery images
    Commerce,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub secret: SecretArgs,

    /// Sources to scan
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [Source::Media, Source::Content, Source::Commerce]
    )]
    pub sources: Vec<Source>,

    /// Maximum records fetched per source
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Session the download link is issued to
    #[arg(long, default_value = CLI_SESSION)]
    pub session: String,

    /// Print the JSON envelope instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub secret: SecretArgs,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// Sessions allowed to run exports and download reports (comma separated)
    #[arg(long = "admin-session", value_delimiter = ',', required = true)]
    pub admin_sessions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenAction {
    Export,
    Download,
}

impl From<TokenAction> for NonceAction {
    fn from(action: TokenAction) -> Self {
        match action {
            TokenAction::Export => Self::Export,
            TokenAction::Download => Self::Download,
        }
    }
}

#[derive(Debug, Args)]
pub struct NonceArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    /// Session the token is bound to
    #[arg(long)]
    pub session: String,

    /// Action the token authorizes
    #[arg(long, value_enum, default_value_t = TokenAction::Export)]
    pub action: TokenAction,
}

/// Parse arguments and run the selected command.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan(args) => {
            let stdout = std::io::stdout();
            run_scan(&args, &mut stdout.lock())
        }
        Commands::Serve(args) => run_serve(&args, cli.verbose).await,
        Commands::Nonce(args) => {
            let issuer = NonceIssuer::new(args.secret.secret);
            let token = issuer.issue(args.action.into(), &Caller::new(args.session));
            writeln!(std::io::stdout(), "{token}")?;
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build an export service over `site`, granting `admin_sessions`.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded.
pub fn build_service<I, S>(
    site: &SiteArgs,
    secret: &str,
    admin_sessions: I,
) -> anyhow::Result<ExportService>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let snapshot = Arc::new(SiteSnapshot::load(&site.snapshot)?);
    debug!(
        attachments = snapshot.attachments.len(),
        content = snapshot.content.len(),
        commerce = snapshot.has_commerce(),
        "snapshot loaded"
    );
    let commerce = snapshot
        .has_commerce()
        .then(|| Arc::clone(&snapshot) as Arc<dyn CommerceStore>);

    Ok(ExportService::new(
        snapshot as Arc<dyn ContentStore>,
        commerce,
        Arc::new(StaticAuthorizer::new(admin_sessions)),
        NonceIssuer::new(secret),
        ExportConfig::new(&site.report_dir, site.download_base_url.as_str())
            .with_working_copy(!site.no_working_copy),
    ))
}

/// Run one export as `args.session` and print the outcome.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded, the export fails, or
/// writing output fails.
pub fn run_scan(args: &ScanArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    if !BATCH_SIZE_CHOICES.contains(&args.batch_size) {
        warn!(
            batch_size = args.batch_size,
            "batch size is not one of the admin form choices"
        );
    }
    let service = build_service(&args.site, &args.secret.secret, [args.session.as_str()])?;
    let caller = Caller::new(args.session.as_str());
    let request = ExportRequest {
        options: ScanOptions::none(args.batch_size)
            .with_media_library(args.sources.contains(&Source::Media))
            .with_content_images(args.sources.contains(&Source::Content))
            .with_commerce_images(args.sources.contains(&Source::Commerce)),
        nonce: service.nonces().issue(NonceAction::Export, &caller),
        caller,
    };

    let result = service.run(&request);
    if args.json {
        output::write_json(&result, out)?;
    }
    match result {
        Ok(summary) => {
            if !args.json {
                output::write_human(&summary, out)?;
            }
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err)).context("Export failed"),
    }
}

async fn run_serve(args: &ServeArgs, verbose: u8) -> anyhow::Result<()> {
    if args.admin_sessions.iter().all(|s| s.trim().is_empty()) {
        bail!("At least one non-empty --admin-session is required");
    }
    let service = build_service(
        &args.site,
        &args.secret.secret,
        args.admin_sessions.iter().map(|s| s.trim().to_owned()),
    )?;
    server::serve(AppState::new(service), &args.bind, verbose).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_defaults() {
        let cli = Cli::try_parse_from([
            "alt-audit",
            "scan",
            "--snapshot",
            "site.yaml",
            "--secret",
            "s",
        ])
        .unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(
            args.sources,
            vec![Source::Media, Source::Content, Source::Commerce]
        );
        assert_eq!(args.batch_size, 100);
        assert_eq!(args.session, "cli");
        assert_eq!(args.site.report_dir, PathBuf::from("reports"));
        assert!(!args.json);
    }

    #[test]
    fn test_serve_requires_admin_sessions() {
        assert!(
            Cli::try_parse_from(["alt-audit", "serve", "-s", "site.json", "--secret", "s"])
                .is_err()
        );
        let cli = Cli::try_parse_from([
            "alt-audit",
            "-vv",
            "serve",
            "-s",
            "site.json",
            "--secret",
            "s",
            "--admin-session",
            "a,b",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.admin_sessions, vec!["a", "b"]);
    }
}
