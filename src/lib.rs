//! wp-inspect - WordPress site diagnostics
//!
//! A fixed catalogue of inspections over a site's database, log files, and a
//! remote vulnerability API. Every inspection yields an [`Outcome`]; data
//! outcomes are rendered as a table or exported as CSV.
//!
//! # Example
//!
//! ```no_run
//! use wp_inspect::{Console, Context, Invocation, Runner, Unavailable, VulnerabilityClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> wp_inspect::Result<()> {
//!     let db = Unavailable::new("no database configured");
//!     let vulns = VulnerabilityClient::new()?;
//!     let ctx = Context {
//!         root: "/var/www/html".into(),
//!         db: &db,
//!         table_prefix: "wp_".into(),
//!         vulns: &vulns,
//!         now: chrono::Local::now(),
//!     };
//!     let mut runner = Runner::new(ctx, Console::stdio());
//!     let invocation = Invocation {
//!         command: "debug-log".into(),
//!         args: vec!["30".into()],
//!         export: None,
//!     };
//!     runner.run(&invocation).await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod inspect;
pub mod logging;
pub mod logscan;
pub mod output;
pub mod runner;
pub mod source;
pub mod table;
pub mod vuln;

pub use error::{Error, Result};
pub use inspect::{Context, Inspection, InspectionArgs, Outcome};
pub use logscan::{LogEntry, LogScanner};
pub use output::{Announcer, Console, export_csv, render_table};
pub use runner::{CATALOGUE, Invocation, Runner, Status};
pub use source::{MysqlCli, SiteConfig, TabularSource, Unavailable};
pub use table::{Row, TabularResult, Value};
pub use vuln::{VulnerabilityClient, VulnerabilityClientBuilder};
