//! Tabular data sources and site configuration

use crate::error::{Error, Result};
use crate::table::{Row, Value};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Site configuration file, relative to the content root
pub const WP_CONFIG_FILE: &str = "wp-config.php";

/// Table prefix WordPress uses when none is configured
pub const DEFAULT_TABLE_PREFIX: &str = "wp_";

/// Query execution interface returning named-field records
pub trait TabularSource {
    /// Run `sql` and return every record it produced
    fn query(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Database settings read from wp-config.php
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_host: String,
    pub table_prefix: String,
}

impl SiteConfig {
    /// Load `wp-config.php` from the content root
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(WP_CONFIG_FILE);
        let contents = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Extract database settings from PHP source
    pub fn parse(contents: &str) -> Result<Self> {
        let define_re = Regex::new(
            r#"define\(\s*['"](DB_NAME|DB_USER|DB_PASSWORD|DB_HOST)['"]\s*,\s*['"]([^'"]*)['"]\s*\)"#,
        )
        .map_err(|e| Error::SiteConfig(e.to_string()))?;
        let prefix_re = Regex::new(r#"\$table_prefix\s*=\s*['"]([^'"]+)['"]"#)
            .map_err(|e| Error::SiteConfig(e.to_string()))?;

        let define = |name: &str| {
            define_re
                .captures_iter(contents)
                .find(|caps| &caps[1] == name)
                .map(|caps| caps[2].to_string())
        };

        let db_name =
            define("DB_NAME").ok_or_else(|| Error::SiteConfig("DB_NAME is not defined".into()))?;

        Ok(Self {
            db_name,
            db_user: define("DB_USER").unwrap_or_default(),
            db_password: define("DB_PASSWORD").unwrap_or_default(),
            db_host: define("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            table_prefix: prefix_re
                .captures(contents)
                .map(|caps| caps[1].to_string())
                .unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string()),
        })
    }
}

/// Where the database server listens
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Tcp { host: String, port: Option<u16> },
    Socket { host: String, path: String },
}

impl Endpoint {
    /// Split a DB_HOST value: `host`, `host:port`, or `host:/path/to.sock`
    fn parse(db_host: &str) -> Self {
        match db_host.split_once(':') {
            Some((host, rest)) if rest.starts_with('/') => Self::Socket {
                host: host.to_string(),
                path: rest.to_string(),
            },
            Some((host, rest)) => Self::Tcp {
                host: host.to_string(),
                port: rest.parse().ok(),
            },
            None => Self::Tcp {
                host: db_host.to_string(),
                port: None,
            },
        }
    }
}

/// Runs queries through the `mysql` command-line client in batch mode
#[derive(Debug, Clone)]
pub struct MysqlCli {
    binary: String,
    config: SiteConfig,
}

impl MysqlCli {
    /// Client using the `mysql` binary found on PATH
    pub fn new(config: SiteConfig) -> Self {
        Self::with_binary("mysql", config)
    }

    /// Client using a specific binary
    pub fn with_binary(binary: impl Into<String>, config: SiteConfig) -> Self {
        Self {
            binary: binary.into(),
            config,
        }
    }

    fn command(&self, sql: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--batch")
            .arg("--default-character-set=utf8mb4")
            .arg(format!("--user={}", self.config.db_user))
            .arg(format!("--database={}", self.config.db_name));

        match Endpoint::parse(&self.config.db_host) {
            Endpoint::Tcp { host, port } => {
                cmd.arg(format!("--host={}", host));
                if let Some(port) = port {
                    cmd.arg(format!("--port={}", port));
                }
            }
            Endpoint::Socket { host, path } => {
                cmd.arg(format!("--host={}", host))
                    .arg(format!("--socket={}", path));
            }
        }

        // Keeps the password out of the process list
        cmd.env("MYSQL_PWD", &self.config.db_password);
        cmd.arg("--execute").arg(sql);
        cmd
    }
}

impl TabularSource for MysqlCli {
    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!(sql, "Running query");
        let output = self
            .command(sql)
            .output()
            .map_err(|e| Error::Database(format!("could not run '{}': {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Database(stderr.trim().to_string()));
        }

        Ok(parse_batch_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `mysql --batch` output: a tab-separated header line, then one line
/// per record with `\t`, `\n`, `\\` and `\0` escaped and `NULL` for nulls.
pub fn parse_batch_output(text: &str) -> Vec<Row> {
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<String> = header.split('\t').map(unescape).collect();

    lines
        .map(|line| {
            columns
                .iter()
                .cloned()
                .zip(line.split('\t').map(batch_value))
                .collect()
        })
        .collect()
}

fn batch_value(field: &str) -> Value {
    if field == "NULL" {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>()
        && i.to_string() == field
    {
        return Value::Integer(i);
    }
    if field.contains('.')
        && !field.starts_with('.')
        && let Ok(x) = field.parse::<f64>()
        && x.is_finite()
    {
        return Value::Float(x);
    }
    Value::Text(unescape(field))
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Stand-in source when no database is reachable; every query fails
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TabularSource for Unavailable {
    fn query(&self, _sql: &str) -> Result<Vec<Row>> {
        Err(Error::Database(self.reason.clone()))
    }
}
