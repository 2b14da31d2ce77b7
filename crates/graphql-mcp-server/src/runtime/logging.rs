//! Logging config and utilities
//!
//! Logs go to stderr, since stdout carries the stdio MCP transport, or to a
//! rolling file when a log directory is configured.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prefix of rolling log file names
const LOG_FILE_PREFIX: &str = "graphql_mcp_server";

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Logging {
    /// The log level to use for tracing
    #[serde(default = "default_level", deserialize_with = "deserialize_level")]
    #[schemars(schema_with = "level")]
    pub level: Level,

    /// The directory to write log files to
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Log file rotation period to use when log file path provided
    /// [default: hourly]
    #[serde(default)]
    pub rotation: LogRotationKind,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: default_level(),
            path: None,
            rotation: LogRotationKind::default(),
        }
    }
}

/// How often a new log file is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogRotationKind {
    #[serde(alias = "MINUTELY", alias = "Minutely")]
    Minutely,
    #[default]
    #[serde(alias = "HOURLY", alias = "Hourly")]
    Hourly,
    #[serde(alias = "DAILY", alias = "Daily")]
    Daily,
    #[serde(alias = "NEVER", alias = "Never")]
    Never,
}

impl From<LogRotationKind> for Rotation {
    fn from(value: LogRotationKind) -> Self {
        match value {
            LogRotationKind::Minutely => Rotation::MINUTELY,
            LogRotationKind::Hourly => Rotation::HOURLY,
            LogRotationKind::Daily => Rotation::DAILY,
            LogRotationKind::Never => Rotation::NEVER,
        }
    }
}

impl Logging {
    pub fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            env_filter = env_filter.add_directive("rmcp=warn".parse()?);
        }
        Ok(env_filter)
    }

    /// Install the global subscriber
    ///
    /// Logs go to a rolling file in `path` when one is set, or to stderr when it
    /// is not or the file cannot be opened. The returned guard flushes file logs
    /// when dropped, so it must live as long as the process.
    pub fn setup(&self) -> Result<Option<WorkerGuard>, anyhow::Error> {
        let env_filter = self.env_filter()?;

        let appender = self.path.as_deref().map(|path| self.file_appender(path));
        let (writer, ansi, guard) = match appender {
            Some(Ok(appender)) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(writer), false, Some(guard))
            }
            Some(Err(e)) => {
                eprintln!("Logging to stderr instead of a file: {e:#}");
                (BoxMakeWriter::new(std::io::stderr), true, None)
            }
            None => (BoxMakeWriter::new(std::io::stderr), true, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(false),
            )
            .try_init()
            .context("Failed to install the log subscriber")?;

        Ok(guard)
    }

    fn file_appender(&self, path: &Path) -> Result<RollingFileAppender, anyhow::Error> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("could not create log directory {}", path.display()))?;

        RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(path)
            .with_context(|| format!("could not open a log file in {}", path.display()))
    }
}

const fn default_level() -> Level {
    Level::INFO
}

/// Levels are written by name, in any case
fn deserialize_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse()
        .map_err(|e| serde::de::Error::custom(format!("invalid log level {raw:?}: {e}")))
}

fn level(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    /// Log level
    #[derive(JsonSchema)]
    #[schemars(rename_all = "lowercase")]
    // Only used to generate the schema
    #[allow(dead_code)]
    enum Level {
        Trace,
        Debug,
        Info,
        Warn,
        Error,
    }

    Level::json_schema(generator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\"debug\"", Level::DEBUG)]
    #[case("\"WARN\"", Level::WARN)]
    #[case("\"trace\"", Level::TRACE)]
    fn it_parses_levels(#[case] raw: &str, #[case] expected: Level) {
        let logging: Logging =
            serde_json::from_str(&format!(r#"{{ "level": {raw} }}"#)).unwrap();

        assert_eq!(logging.level, expected);
    }

    #[test]
    fn it_rejects_unknown_levels() {
        assert!(serde_json::from_str::<Logging>(r#"{ "level": "loud" }"#).is_err());
    }

    #[test]
    fn it_defaults_to_info_on_stderr() {
        let logging: Logging = serde_json::from_str("{}").unwrap();

        assert_eq!(logging.level, Level::INFO);
        assert!(logging.path.is_none());
        assert_eq!(logging.rotation, LogRotationKind::Hourly);
    }

    #[rstest]
    #[case("\"minutely\"", Rotation::MINUTELY)]
    #[case("\"Hourly\"", Rotation::HOURLY)]
    #[case("\"DAILY\"", Rotation::DAILY)]
    #[case("\"never\"", Rotation::NEVER)]
    fn it_maps_rotations(#[case] raw: &str, #[case] expected: Rotation) {
        let kind: LogRotationKind = serde_json::from_str(raw).unwrap();

        assert_eq!(Rotation::from(kind), expected);
    }

    #[test]
    fn it_opens_log_files_in_a_new_directory() {
        figment::Jail::expect_with(|_jail| {
            let logging = Logging::default();

            assert!(logging.file_appender(Path::new("logs/server")).is_ok());
            assert!(Path::new("logs/server").is_dir());
            Ok(())
        });
    }

    #[test]
    fn it_reports_unusable_log_directories() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("taken", "not a directory")?;
            let logging = Logging::default();

            let error = logging.file_appender(Path::new("taken/logs")).unwrap_err();

            assert!(
                error.to_string().starts_with("could not create log directory taken/logs"),
                "{error:#}"
            );
            Ok(())
        });
    }
}
