//! Command registry and runner
//!
//! Maps a command name to an inspection, converts its arguments, runs it,
//! and routes the outcome to a sink and the operator.

use crate::error::Result;
use crate::inspect::{Context, Inspection, InspectionArgs, Outcome};
use crate::logscan::DEFAULT_WINDOW_DAYS;
use crate::output::{Announcer, export_csv, render_table};
use crate::table::{TabularResult, row};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Which positional arguments a command takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Params {
    None,
    Days,
    Limit,
    Version,
}

/// A registered command
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// Name typed by the operator
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Inspection it runs
    pub inspection: Inspection,
    params: Params,
}

/// Every registered command, in listing order
pub const CATALOGUE: &[Command] = &[
    Command {
        name: "list",
        description: "List the available inspections",
        inspection: Inspection::List,
        params: Params::None,
    },
    Command {
        name: "autoload-options",
        description: "Largest autoloaded options [limit, default 20]",
        inspection: Inspection::AutoloadOptions,
        params: Params::Limit,
    },
    Command {
        name: "table-sizes",
        description: "Size and row count of every site table",
        inspection: Inspection::TableSizes,
        params: Params::None,
    },
    Command {
        name: "admin-users",
        description: "Accounts with the administrator role",
        inspection: Inspection::AdminUsers,
        params: Params::None,
    },
    Command {
        name: "debug-log",
        description: "Recent wp-content/debug.log entries [days, default 7]",
        inspection: Inspection::DebugLog,
        params: Params::Days,
    },
    Command {
        name: "wc-logs",
        description: "Recent WooCommerce log entries [days, default 7]",
        inspection: Inspection::WooCommerceLogs,
        params: Params::Days,
    },
    Command {
        name: "core-vulnerabilities",
        description: "Known vulnerabilities for the installed core [version]",
        inspection: Inspection::CoreVulnerabilities,
        params: Params::Version,
    },
];

/// Find a command by name
pub fn lookup(name: &str) -> Option<&'static Command> {
    CATALOGUE.iter().find(|c| c.name == name)
}

/// The catalogue as a `{command, description}` result
pub fn catalogue_table() -> Result<Outcome> {
    let rows = CATALOGUE
        .iter()
        .map(|c| row([("command", c.name), ("description", c.description)]))
        .collect();
    Ok(Outcome::Data(TabularResult::from_records(
        ["command", "description"],
        rows,
    )?))
}

/// One command invocation
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Command name
    pub command: String,
    /// Positional arguments, in order
    pub args: Vec<String>,
    /// CSV destination; relative paths resolve against the content root
    pub export: Option<PathBuf>,
}

/// Result of one command for the host CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => ExitCode::SUCCESS,
            Status::Failure => ExitCode::FAILURE,
        }
    }
}

/// Parse a count argument, falling back to `default` when absent or not a
/// non-negative integer. The second value is true when a fallback replaced
/// something the operator actually typed.
pub fn parse_count(arg: Option<&str>, default: u32) -> (u32, bool) {
    match arg {
        None => (default, false),
        Some(raw) => match raw.trim().parse() {
            Ok(n) => (n, false),
            Err(_) => (default, true),
        },
    }
}

/// Runs invocations against one set of collaborators
pub struct Runner<'a, A: Announcer> {
    ctx: Context<'a>,
    announcer: A,
}

impl<'a, A: Announcer> Runner<'a, A> {
    pub fn new(ctx: Context<'a>, announcer: A) -> Self {
        Self { ctx, announcer }
    }

    /// Hand back the announcer
    pub fn into_announcer(self) -> A {
        self.announcer
    }

    /// Run one invocation and report its outcome
    pub async fn run(&mut self, invocation: &Invocation) -> Status {
        let Some(command) = lookup(&invocation.command) else {
            self.announcer.error(&format!(
                "'{}' is not a registered inspection. See 'list'.",
                invocation.command
            ));
            return Status::Failure;
        };

        let args = self.convert_args(command, &invocation.args);
        tracing::debug!(command = command.name, ?args, "Running inspection");
        let outcome = command.inspection.run(&self.ctx, &args).await;
        self.route(outcome, invocation.export.as_deref())
    }

    fn convert_args(&mut self, command: &Command, raw: &[String]) -> InspectionArgs {
        let first = raw.first().map(String::as_str);
        let mut args = InspectionArgs::default();

        let mut count = |name: &str, default: u32| {
            let (value, fell_back) = parse_count(first, default);
            if fell_back {
                self.announcer.warning(&format!(
                    "'{}' is not a valid {}; using {}.",
                    first.unwrap_or_default(),
                    name,
                    default
                ));
            }
            Some(value)
        };

        match command.params {
            Params::None => {}
            Params::Days => args.days = count("number of days", DEFAULT_WINDOW_DAYS),
            Params::Limit => {
                args.limit = count("limit", crate::inspect::DEFAULT_OPTION_LIMIT)
            }
            Params::Version => args.version = first.map(str::to_string),
        }
        args
    }

    fn route(&mut self, outcome: Outcome, export: Option<&Path>) -> Status {
        match outcome {
            Outcome::Data(result) => match export {
                None => {
                    self.announcer.print(&render_table(&result));
                    Status::Success
                }
                Some(path) => self.export(&result, path),
            },
            Outcome::Empty(message) => {
                self.announcer.empty(&message);
                Status::Success
            }
            Outcome::Failure(reason) => {
                self.announcer.error(&reason);
                Status::Failure
            }
        }
    }

    fn export(&mut self, result: &TabularResult, path: &Path) -> Status {
        let path = self.ctx.root.join(path);
        match export_csv(result, &path) {
            Ok(rows) => {
                let shown = std::fs::canonicalize(&path).unwrap_or(path);
                self.announcer.success(&format!(
                    "Exported {} rows to {}",
                    rows,
                    shown.display()
                ));
                Status::Success
            }
            Err(e) => {
                self.announcer.error(&e.to_string());
                Status::Failure
            }
        }
    }
}
