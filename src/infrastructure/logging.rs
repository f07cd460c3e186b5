use crate::domain::settings::LogSettings;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the non-blocking file writer alive; drop it last so buffered
/// lines reach the file
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn level_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Relative log directories live under the per-user data dir, next to the
/// other SenStick state, so the scanner can be started from anywhere
fn resolve_log_dir(log_dir: &str) -> PathBuf {
    let dir = Path::new(log_dir);
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    match dirs::data_local_dir() {
        Some(base) => base.join("SenStick").join(dir),
        None => dir.to_path_buf(),
    }
}

fn console_layer(settings: &LogSettings) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stdout)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .with_ansi(settings.ansi_colors)
        .boxed()
}

fn file_layer(settings: &LogSettings, dir: &Path) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(parse_rotation(&settings.rotation))
        .filename_prefix(&settings.file_name_prefix)
        .filename_suffix("log")
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .boxed();
    Ok((layer, guard))
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    if settings.console_logging_enabled {
        layers.push(console_layer(settings));
    }

    let log_dir = resolve_log_dir(&settings.log_dir);
    if settings.file_logging_enabled {
        let (layer, guard) = file_layer(settings, &log_dir)?;
        layers.push(layer);
        guards.push(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(level_filter(settings))
        .try_init()?;

    if settings.file_logging_enabled {
        tracing::info!("Logging to {}", log_dir.display());
    }

    Ok(LoggingGuard { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_names() {
        assert_eq!(parse_rotation("HOURLY"), Rotation::HOURLY);
        assert_eq!(parse_rotation("minutely"), Rotation::MINUTELY);
        assert_eq!(parse_rotation("never"), Rotation::NEVER);
        assert_eq!(parse_rotation("weekly"), Rotation::DAILY);
    }

    #[test]
    fn test_log_dir_resolution() {
        let absolute = std::env::temp_dir().join("senstick_logs");
        assert_eq!(resolve_log_dir(absolute.to_str().unwrap()), absolute);

        let relative = resolve_log_dir("logs");
        assert!(relative.ends_with("logs"));
        if dirs::data_local_dir().is_some() {
            assert!(relative.parent().unwrap().ends_with("SenStick"));
        }
    }

    #[test]
    fn test_file_layer_creates_log_dir() {
        let dir = std::env::temp_dir().join(format!("senstick_log_layer_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let settings = LogSettings {
            file_logging_enabled: true,
            rotation: "never".to_string(),
            ..LogSettings::default()
        };
        let (_layer, guard) = file_layer(&settings, &dir).unwrap();
        assert!(dir.is_dir());

        drop(guard);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
