use anyhow::Context;
use photo_organizer::config::OrganizerConfig;
use photo_organizer::organize::runner::Organizer;
use photo_organizer::session;
use photo_organizer::storage::CredentialStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run { local_webserver: bool },
    Logout,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run {
        local_webserver: true,
    };
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--noauth-local-webserver" | "--noauth_local_webserver" => {
                if let CliMode::Run { local_webserver } = &mut mode {
                    *local_webserver = false;
                }
            }
            "--logout" => mode = CliMode::Logout,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    init_tracing();
    let mut config = OrganizerConfig::from_env()?;

    let local_webserver = match mode {
        CliMode::Help => {
            println!("Usage: photo-organizer [--noauth-local-webserver] [--logout]");
            println!(
                "  --noauth-local-webserver   Paste the authorization code instead of using a loopback redirect"
            );
            println!("  --logout                   Remove cached credentials and exit");
            return Ok(());
        }
        CliMode::Logout => {
            CredentialStore::new(config.credentials_path.clone()).delete_token()?;
            info!("cached credentials removed");
            return Ok(());
        }
        CliMode::Run { local_webserver } => local_webserver,
    };
    config.use_local_webserver = local_webserver;

    let mut drive = session::connect(&config)
        .await
        .context("failed to authorize with Google Drive")?;
    let mut report = Organizer::from_config(&config).run(&mut drive).await?;
    report.log_summary();

    if let Some(aborted) = report.placement.aborted.take() {
        return Err(aborted.error)
            .with_context(|| format!("placement stopped at {}", aborted.month));
    }
    if !report.is_complete() {
        anyhow::bail!(
            "{} photo(s) could not be added to their month folder",
            report.placement.failures.len()
        );
    }
    Ok(())
}
