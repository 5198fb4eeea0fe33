//! wp-inspect CLI - run one diagnostic inspection against a WordPress site

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use wp_inspect::{
    Console, Context, Invocation, MysqlCli, Runner, SiteConfig, TabularSource,
    Unavailable, VulnerabilityClient, logging, source::DEFAULT_TABLE_PREFIX, vuln::DEFAULT_API_BASE,
};

/// WordPress site diagnostics - options, tables, logs, and known vulnerabilities
#[derive(Parser, Debug)]
#[command(name = "wp-inspect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Inspection to run (see `list`)
    command: String,

    /// Arguments for the inspection, e.g. a number of days
    args: Vec<String>,

    /// WordPress content root (directory containing wp-config.php)
    #[arg(long = "path", default_value = ".")]
    path: PathBuf,

    /// Write results to this CSV file instead of printing a table
    #[arg(long = "export", value_name = "FILE")]
    export: Option<PathBuf>,

    /// Vulnerability API base URL
    #[arg(long = "vuln-api", default_value = DEFAULT_API_BASE)]
    vuln_api: String,

    /// Enable debug logging on stderr
    #[arg(long = "debug")]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.debug);

    let vulns = match VulnerabilityClient::builder().base_url(&args.vuln_api).build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Database-backed inspections fail individually when the site config is unusable
    let site = SiteConfig::load(&args.path);
    let table_prefix = site
        .as_ref()
        .map(|config| config.table_prefix.clone())
        .unwrap_or_else(|_| DEFAULT_TABLE_PREFIX.to_string());
    let db: Box<dyn TabularSource> = match site {
        Ok(config) => Box::new(MysqlCli::new(config)),
        Err(e) => {
            tracing::debug!(error = %e, "No usable site configuration");
            Box::new(Unavailable::new(e.to_string()))
        }
    };

    let ctx = Context {
        root: std::path::absolute(&args.path).unwrap_or_else(|_| args.path.clone()),
        db: db.as_ref(),
        table_prefix,
        vulns: &vulns,
        now: chrono::Local::now(),
    };

    let invocation = Invocation {
        command: args.command,
        args: args.args,
        export: args.export,
    };

    let mut runner = Runner::new(ctx, Console::stdio());
    runner.run(&invocation).await.into()
}
