// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use rwssl::{
    find_apps, resolve, Config, Error, IssueOutcome, Result, SslManager, SystemRunner, Variant,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the configured log filter.
const LOG_ENV: &str = "RWSSL_LOG";

// ============================================================================
// Helper functions
// ============================================================================

/// Display a confirmation prompt and return true if user confirms with 'y' or 'yes'
fn confirm_prompt(message: &str) -> bool {
    print!("{} [y/N] ", message);
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

fn init_logging(config: &Config, quiet: bool, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(&config.log.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        "compact" => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .init(),
        _ => registry.with(fmt::layer().with_writer(io::stderr)).init(),
    }
}

// ============================================================================
// CLI definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "rwssl")]
#[command(about = "Let's Encrypt SSL for ServerPilot nginx-sp apps")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    rwssl list                     # All apps with their owners and domains
    rwssl get blog                 # Issue or renew a certificate for app 'blog'
    rwssl get --all                # Issue or renew for every app
    rwssl force blog               # Redirect HTTP to HTTPS
    rwssl remove blog --yes        # Revoke and go back to plain HTTP")]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Config file (default: $RWSSL_CONFIG or /etc/rwssl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List apps with their owners and domains
    List {
        /// Only list apps of this SSH user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show an app's owner, domains and certificate
    Info {
        /// App name
        app: String,
    },

    /// Issue or renew a certificate and enable HTTPS
    Get {
        /// App name
        #[arg(required_unless_present = "all")]
        app: Option<String>,

        /// SSH user owning the app (verified against its vhost)
        #[arg(short, long)]
        user: Option<String>,

        /// Process every app (of --user, if given)
        #[arg(long, conflicts_with = "app")]
        all: bool,
    },

    /// Revoke the certificate and serve the app over plain HTTP
    Remove {
        /// App name
        app: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Redirect HTTP to HTTPS
    Force {
        /// App name
        app: String,
    },

    /// Stop redirecting HTTP to HTTPS
    Unforce {
        /// App name
        app: String,
    },

    /// Write a plain HTTP vhost for an app
    Vhost {
        /// App name
        app: String,

        /// SSH user owning the app
        #[arg(short, long)]
        user: String,

        /// Comma-separated domains, the first one is the primary name
        #[arg(short, long)]
        domains: String,

        /// Do not reload nginx-sp afterwards
        #[arg(long)]
        no_reload: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output helper that respects --quiet.
#[derive(Clone, Copy)]
struct Output {
    quiet: bool,
}

impl Output {
    fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Print a standard message (suppressed with --quiet)
    fn print(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }
}

fn main() {
    // Reset SIGPIPE to default behavior (exit) instead of panic
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        return cmd_completions(shell);
    }

    let config = Config::discover(cli.config.as_deref())?;
    init_logging(&config, cli.quiet, cli.verbose);
    let out = Output::new(cli.quiet);

    let runner = SystemRunner::new(config.command_timeout_secs);
    let manager = SslManager::new(&config, &runner);

    match cli.command {
        Commands::List { user } => cmd_list(&manager, user.as_deref()),
        Commands::Info { app } => cmd_info(&manager, &app),
        Commands::Get { app, user, all } => {
            if all {
                cmd_get_all(&manager, user.as_deref(), out)
            } else {
                cmd_get(&manager, user.as_deref(), app.as_deref(), out)
            }
        }
        Commands::Remove { app, yes } => cmd_remove(&manager, &app, yes, out),
        Commands::Force { app } => cmd_force(&manager, &app, out),
        Commands::Unforce { app } => cmd_unforce(&manager, &app, out),
        Commands::Vhost {
            app,
            user,
            domains,
            no_reload,
        } => cmd_vhost(&manager, &user, &app, &domains, !no_reload, out),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

fn cmd_list(manager: &SslManager, user: Option<&str>) -> Result<()> {
    let apps = find_apps(manager.paths(), user)?;

    if apps.is_empty() {
        println!("No apps found.");
        return Ok(());
    }

    println!("{:>3}  {:<20} {:<16} DOMAINS", "#", "APP", "USER");
    println!("{}", "-".repeat(60));

    for (i, record) in apps.iter().enumerate() {
        println!(
            "{:>3}  {:<20} {:<16} {}",
            i + 1,
            record.app,
            record.user,
            record.domains.joined()
        );
    }

    Ok(())
}

fn cmd_info(manager: &SslManager, app: &str) -> Result<()> {
    let info = manager.info(app)?;

    println!("App:         {}", info.app);
    println!("User:        {}", info.details.user);
    println!("Domains:     {}", info.details.domains.as_slice().join(" "));
    println!("Vhost:       {}", info.vhost.display());
    match info.certificate {
        Some(path) => println!("Certificate: {}", path.display()),
        None => println!("Certificate: none"),
    }

    Ok(())
}

fn report_outcome(app: &str, outcome: &IssueOutcome, out: Output) {
    match outcome {
        IssueOutcome::Activated {
            validated,
            rejected,
            ..
        } => {
            out.print(&format!(
                "SSL activated for app {} (Domains Secured: {})",
                app,
                validated.join(" ")
            ));
            for r in rejected {
                out.print(&format!("  Skipped {}: {}", r.domain, r.reason));
            }
        }
        IssueOutcome::NotAvailable { rejected } => {
            out.print(&format!("SSL not available for app {} yet.", app));
            for r in rejected {
                out.print(&format!("  {}: {}", r.domain, r.reason));
            }
        }
    }
}

fn cmd_get(
    manager: &SslManager,
    user: Option<&str>,
    app: Option<&str>,
    out: Output,
) -> Result<()> {
    let app_ref = resolve(manager.paths(), user, app)?;
    let outcome = manager.get_cert(&app_ref.app)?;
    report_outcome(&app_ref.app, &outcome, out);
    Ok(())
}

fn cmd_get_all(manager: &SslManager, user: Option<&str>, out: Output) -> Result<()> {
    let results = manager.get_cert_all(user)?;

    if results.is_empty() {
        out.print("No apps found.");
        return Ok(());
    }

    let mut failed = Vec::new();
    for (app, result) in &results {
        match result {
            Ok(outcome) => report_outcome(app, outcome, out),
            Err(e) => {
                eprintln!("Error: {}: {}", app, e);
                failed.push(app.as_str());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::BatchFailed {
            failed: failed.len(),
            total: results.len(),
            apps: failed.join(", "),
        })
    }
}

fn cmd_remove(manager: &SslManager, app: &str, yes: bool, out: Output) -> Result<()> {
    if !yes
        && !confirm_prompt(&format!(
            "Revoke the certificate of app '{}' and disable HTTPS?",
            app
        ))
    {
        out.print("Aborted.");
        return Ok(());
    }

    manager.remove_cert(app)?;
    out.print(&format!("SSL certificate removed for app {}.", app));
    Ok(())
}

fn cmd_force(manager: &SslManager, app: &str, out: Output) -> Result<()> {
    manager.force_ssl(app)?;
    out.print(&format!("HTTPS is now forced for app {}.", app));
    Ok(())
}

fn cmd_unforce(manager: &SslManager, app: &str, out: Output) -> Result<()> {
    match manager.unforce_ssl(app)? {
        Variant::Plain => out.print(&format!(
            "HTTPS is no longer forced for app {} (no certificate, serving plain HTTP).",
            app
        )),
        _ => out.print(&format!("HTTPS is no longer forced for app {}.", app)),
    }
    Ok(())
}

fn cmd_vhost(
    manager: &SslManager,
    user: &str,
    app: &str,
    domains: &str,
    reload: bool,
    out: Output,
) -> Result<()> {
    let path = manager.create_vhost(user, app, domains, reload)?;
    out.print(&format!("Wrote {}", path.display()));
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "rwssl", &mut io::stdout());
    Ok(())
}
