//! Inspections and their outcomes

use crate::error::Result;
use crate::logscan::{DEFAULT_WINDOW_DAYS, LogScanner};
use crate::source::TabularSource;
use crate::table::TabularResult;
use crate::vuln::{VULNERABILITY_COLUMNS, VulnerabilityClient, installed_core_version};
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Default number of rows for `autoload-options`
pub const DEFAULT_OPTION_LIMIT: u32 = 20;

/// Debug log written by WP_DEBUG_LOG, relative to the content root
const DEBUG_LOG: &str = "wp-content/debug.log";

/// WooCommerce log directory, relative to the content root
const WC_LOG_DIR: &str = "wp-content/uploads/wc-logs";

/// WooCommerce plugin file as stored in `active_plugins`
const WC_PLUGIN: &str = "woocommerce/woocommerce.php";

/// Result of running one inspection
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows to show or export
    Data(TabularResult),
    /// Ran fine, found nothing
    Empty(String),
    /// Precondition unmet or collaborator error
    Failure(String),
}

/// Collaborators handed to every inspection
pub struct Context<'a> {
    /// Content root (the directory holding wp-config.php)
    pub root: PathBuf,
    /// Database access
    pub db: &'a dyn TabularSource,
    /// Table name prefix, e.g. `wp_`
    pub table_prefix: String,
    /// Vulnerability API
    pub vulns: &'a VulnerabilityClient,
    /// Reference time for log windows
    pub now: DateTime<Local>,
}

/// The closed set of inspections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    /// Registered inspections
    List,
    /// Largest autoloaded options
    AutoloadOptions,
    /// Database table sizes
    TableSizes,
    /// Administrator accounts
    AdminUsers,
    /// Recent debug.log entries
    DebugLog,
    /// Recent WooCommerce log entries
    WooCommerceLogs,
    /// Known core vulnerabilities
    CoreVulnerabilities,
}

/// Arguments after conversion by the runner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InspectionArgs {
    /// Trailing window for log inspections
    pub days: Option<u32>,
    /// Row limit for option listings
    pub limit: Option<u32>,
    /// Explicit core version
    pub version: Option<String>,
}

impl Inspection {
    /// Run against the given collaborators. Errors become `Failure`.
    pub async fn run(self, ctx: &Context<'_>, args: &InspectionArgs) -> Outcome {
        let result = match self {
            Self::List => crate::runner::catalogue_table(),
            Self::AutoloadOptions => autoload_options(ctx, args.limit.unwrap_or(DEFAULT_OPTION_LIMIT)),
            Self::TableSizes => table_sizes(ctx),
            Self::AdminUsers => admin_users(ctx),
            Self::DebugLog => debug_log(ctx, args.days.unwrap_or(DEFAULT_WINDOW_DAYS)),
            Self::WooCommerceLogs => wc_logs(ctx, args.days.unwrap_or(DEFAULT_WINDOW_DAYS)),
            Self::CoreVulnerabilities => core_vulnerabilities(ctx, args.version.as_deref()).await,
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(inspection = ?self, error = %e, "Inspection failed");
            Outcome::Failure(e.to_string())
        })
    }
}

/// Wrap query records, or report `empty` when there are none
fn records_outcome(
    ctx: &Context<'_>,
    sql: &str,
    columns: &[&str],
    empty: &str,
) -> Result<Outcome> {
    let records = ctx.db.query(sql)?;
    if records.is_empty() {
        return Ok(Outcome::Empty(empty.to_string()));
    }
    Ok(Outcome::Data(TabularResult::from_records(
        columns.iter().copied(),
        records,
    )?))
}

fn autoload_options(ctx: &Context<'_>, limit: u32) -> Result<Outcome> {
    let sql = format!(
        "SELECT option_name AS name, LENGTH(option_value) AS bytes \
         FROM {}options \
         WHERE autoload IN ('yes', 'on', 'auto', 'auto-on') \
         ORDER BY bytes DESC LIMIT {}",
        ctx.table_prefix, limit
    );
    records_outcome(ctx, &sql, &["name", "bytes"], "No autoloaded options found.")
}

fn table_sizes(ctx: &Context<'_>) -> Result<Outcome> {
    let sql = format!(
        "SELECT table_name AS `table`, table_rows AS `rows`, \
         ROUND((data_length + index_length) / 1024 / 1024, 2) AS size_mb \
         FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name LIKE '{}%' \
         ORDER BY (data_length + index_length) DESC",
        like_escape(&ctx.table_prefix)
    );
    records_outcome(ctx, &sql, &["table", "rows", "size_mb"], "No tables found.")
}

fn admin_users(ctx: &Context<'_>) -> Result<Outcome> {
    let p = &ctx.table_prefix;
    let sql = format!(
        "SELECT u.user_login AS login, u.user_email AS email, u.user_registered AS registered \
         FROM {p}users u JOIN {p}usermeta m ON m.user_id = u.ID \
         WHERE m.meta_key = '{p}capabilities' AND m.meta_value LIKE '%\"administrator\"%' \
         ORDER BY u.user_registered"
    );
    records_outcome(
        ctx,
        &sql,
        &["login", "email", "registered"],
        "No administrator accounts found.",
    )
}

fn debug_log(ctx: &Context<'_>, days: u32) -> Result<Outcome> {
    LogScanner::days(days, ctx.now).scan_paths(&[ctx.root.join(DEBUG_LOG)])
}

fn wc_logs(ctx: &Context<'_>, days: u32) -> Result<Outcome> {
    if !plugin_active(ctx, WC_PLUGIN)? {
        return Ok(Outcome::Failure("WooCommerce is not active.".to_string()));
    }
    LogScanner::days(days, ctx.now).scan_directory(&ctx.root.join(WC_LOG_DIR), "*.log")
}

/// Whether `plugin` appears in the serialized `active_plugins` option
fn plugin_active(ctx: &Context<'_>, plugin: &str) -> Result<bool> {
    let sql = format!(
        "SELECT option_value FROM {}options WHERE option_name = 'active_plugins'",
        ctx.table_prefix
    );
    let needle = format!("\"{}\"", plugin);
    Ok(ctx.db.query(&sql)?.iter().any(|record| {
        record
            .get("option_value")
            .is_some_and(|v| v.to_string().contains(&needle))
    }))
}

async fn core_vulnerabilities(ctx: &Context<'_>, version: Option<&str>) -> Result<Outcome> {
    let version = match version {
        Some(v) => v.to_string(),
        None => installed_core_version(&ctx.root)?,
    };

    let vulns = ctx.vulns.core(&version).await?;
    if vulns.is_empty() {
        return Ok(Outcome::Empty(format!(
            "No known vulnerabilities for WordPress {}.",
            version
        )));
    }

    let rows = vulns.iter().map(|v| v.to_row()).collect();
    Ok(Outcome::Data(TabularResult::from_records(
        VULNERABILITY_COLUMNS,
        rows,
    )?))
}

/// Escape `_` and `%` for a LIKE pattern
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('%', "\\%")
}
