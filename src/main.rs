//! AstraDNS Admin - Entry Point
//!
//! Command-line front end over the session controllers. Each invocation
//! restores the session from the credential store, performs one intent and
//! exits (except `watch`, which polls until Ctrl-C).

use anyhow::{bail, Result};
use astradns_admin::{
    ClientConfig, EntityId, FileCredentialStore, RequestError, RestClient, SessionController,
    SessionError, SettingsView, StatsSnapshot, StatsView, QpsSeries, ViewTab,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const USAGE: &str = "\
Usage: astradns-admin <COMMAND> [ARGS]

Commands:
  login <username> <password>      Log in with username and password
  login --token <token>            Log in with an existing token
  logout                           Forget the stored credential
  status                           Show session state
  stats                            Show traffic statistics once
  watch                            Poll statistics until Ctrl-C
  block <domain>                   Add a domain to the block set
  config                           Show server config
  config set <key=value>...        Update dns_port, api_port or jwt_secret
  blocklists                       List blocklists
  blocklists add <url>             Add a blocklist
  blocklists rm <id>               Remove a blocklist
  redirects                        List redirects
  redirects add <domain> <dns>     Add a redirect (dns as host:port)
  redirects rm <id>                Remove a redirect

Environment variables:
  ASTRADNS_API_URL                 Backend URL (default: http://localhost:8080)
  ASTRADNS_POLL_INTERVAL_MS        Stats poll interval (default: 10000)
  ASTRADNS_PROFILE                 Client profile name (default: default)
  ASTRADNS_CREDENTIAL_PATH         Credential file override
  ASTRADNS_LOGOUT_ON_UNAUTHORIZED  Drop session on 401/403 (default: true)";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("AstraDNS Admin v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("{}", USAGE);
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    // Logs go to stderr so command output stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::from_env()?;
    let store = Arc::new(FileCredentialStore::new(config.credential_path.clone()));
    let mut session = SessionController::new(store, RestClient::from_config(&config), &config);

    let result = run(&mut session, &config, &args).await;
    if let Err(e) = &result {
        if let Some(SessionError::Request(request_error)) = e.downcast_ref::<SessionError>() {
            report(&mut session, request_error);
        } else if let Some(request_error) = e.downcast_ref::<RequestError>() {
            report(&mut session, request_error);
        }
    }
    result
}

fn report(session: &mut SessionController, error: &RequestError) {
    if session.observe(error) {
        eprintln!("Session expired or rejected; log in again.");
    }
}

async fn run(session: &mut SessionController, config: &ClientConfig, args: &[String]) -> Result<()> {
    let command = args[0].as_str();
    let rest = &args[1..];

    match (command, rest) {
        ("login", [flag, token]) if flag == "--token" => {
            session.login(token.as_str())?;
            session.deactivate();
            println!("Logged in.");
        }
        ("login", [username, password]) => {
            session.authenticate(username, password).await?;
            session.deactivate();
            println!("Logged in as {}.", username);
        }
        ("logout", []) => {
            session.logout();
            println!("Logged out.");
        }
        ("status", []) => print_status(session, config),
        ("stats", []) => {
            let view = StatsView::new(session.api()?);
            view.refresh().await?;
            print_stats(&view.stats(), &view.qps());
        }
        ("watch", []) => watch(session, config).await?,
        ("block", [domain]) => {
            let view = StatsView::new(session.api()?);
            view.block_domain(domain.as_str()).await?;
            println!("Blocked {}.", domain);
            print_stats(&view.stats(), &view.qps());
        }
        ("config", []) => {
            let settings = SettingsView::new(session.api()?);
            let current = settings.config.load().await?;
            println!("dns_port   {}", current.dns_port);
            println!("api_port   {}", current.api_port);
            println!("jwt_secret {}", current.jwt_secret);
        }
        ("config", [set, pairs @ ..]) if set == "set" && !pairs.is_empty() => {
            let settings = SettingsView::new(session.api()?);
            settings.config.load().await?;
            let mut draft = settings.config.draft();
            for pair in pairs {
                let Some((key, value)) = pair.split_once('=') else {
                    bail!("expected key=value, got {}", pair);
                };
                draft.set_field(key, value).map_err(anyhow::Error::msg)?;
            }
            settings.config.save(&draft).await?;
            println!("Config updated.");
        }
        ("blocklists", []) => {
            let settings = SettingsView::new(session.api()?);
            settings.blocklists.refresh().await?;
            print_blocklists(&settings);
        }
        ("blocklists", [add, url]) if add == "add" => {
            let settings = SettingsView::new(session.api()?);
            settings.add_blocklist(url.as_str()).await?;
            print_blocklists(&settings);
        }
        ("blocklists", [rm, id]) if rm == "rm" => {
            let settings = SettingsView::new(session.api()?);
            settings.remove_blocklist(&EntityId::from(id.as_str())).await?;
            print_blocklists(&settings);
        }
        ("redirects", []) => {
            let settings = SettingsView::new(session.api()?);
            settings.redirects.refresh().await?;
            print_redirects(&settings);
        }
        ("redirects", [add, domain, dns]) if add == "add" => {
            let settings = SettingsView::new(session.api()?);
            settings.add_redirect(domain.as_str(), dns.as_str()).await?;
            print_redirects(&settings);
        }
        ("redirects", [rm, id]) if rm == "rm" => {
            let settings = SettingsView::new(session.api()?);
            settings.remove_redirect(&EntityId::from(id.as_str())).await?;
            print_redirects(&settings);
        }
        _ => bail!("unknown command: {}\n\n{}", args.join(" "), USAGE),
    }

    Ok(())
}

fn print_status(session: &SessionController, config: &ClientConfig) {
    println!("API:      {}", config.api_url);
    println!("Profile:  {}", config.profile);
    if !session.is_authenticated() {
        println!("Session:  anonymous");
        return;
    }
    let credential = session.credential();
    println!("Session:  authenticated");
    if let Some(claims) = credential.claims() {
        if let Some(username) = claims.username {
            println!("User:     {}", username);
        }
    }
    if let Some(expires_at) = credential.expires_at() {
        println!("Expires:  {}", expires_at.to_rfc3339());
    }
}

async fn watch(session: &mut SessionController, config: &ClientConfig) -> Result<()> {
    session.activate(ViewTab::Dashboard)?;
    info!("Polling every {:?}", config.poll_interval);

    let start = tokio::time::Instant::now() + config.poll_interval;
    let mut ticker = tokio::time::interval_at(start, config.poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Render whatever the last completed cycle produced
                if let Some(view) = session.dashboard() {
                    print_stats(&view.stats(), &view.qps());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.deactivate();
                return Ok(());
            }
        }
    }
}

fn print_stats(stats: &StatsSnapshot, qps: &QpsSeries) {
    println!(
        "Requests: {}  allowed: {}  blocked: {} ({:.1}%)",
        stats.total_requests,
        stats.allowed(),
        stats.blocked,
        stats.blocked_percent()
    );
    println!("Top domains:");
    for (domain, count) in stats.top_domains_sorted() {
        println!("  {}: {}", domain, count);
    }
    if let (Some(first), Some(last)) = (qps.points().first(), qps.points().last()) {
        println!("QPS: {} bucket(s), {} .. {}", qps.len(), first.label, last.label);
        if let Some(peak) = qps.peak() {
            println!("  peak {} at {}", peak.rate, peak.label);
        }
    }
}

fn print_blocklists(settings: &SettingsView) {
    let items = settings.blocklists.items();
    if items.is_empty() {
        println!("No blocklists.");
    }
    for entry in items.iter() {
        println!("{:>6}  {}", entry.id.as_str(), entry.url);
    }
}

fn print_redirects(settings: &SettingsView) {
    let items = settings.redirects.items();
    if items.is_empty() {
        println!("No redirects.");
    }
    for entry in items.iter() {
        println!("{:>6}  {} -> {}", entry.id.as_str(), entry.domain, entry.dns);
    }
}
