use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fswait_watcher::{DEFAULT_PATTERN, OutputFormat, SessionConfig, WatchMode};

/// Block until one of the given paths changes, then exit.
///
/// The exit code tells what happened: 0 = modified, 1 = added, 2 = removed,
/// 255 = invalid arguments. An interrupt exits with 128 while polling and
/// 130 while watching.
#[derive(Parser, Debug)]
#[command(name = "fswait", version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to watch.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Poll modification times instead of using OS notifications (files only).
    #[arg(short, long)]
    pub poll: bool,

    /// Polling interval in seconds.
    #[arg(short, long, value_name = "SECS", requires = "poll", value_parser = parse_seconds)]
    pub interval: Option<Duration>,

    /// Stop after this many seconds; implies --continuous. 0 means no limit.
    #[arg(short, long, value_name = "SECS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Keep reporting changes instead of exiting on the first one.
    #[arg(short, long)]
    pub continuous: bool,

    /// Exit with 0 whatever the kind of change.
    #[arg(short, long)]
    pub success: bool,

    /// Watch directories recursively.
    #[arg(short, long)]
    pub recursive: bool,

    /// Only report paths matching this regex (repeatable).
    #[arg(short = 'e', long = "regex", value_name = "REGEX")]
    pub regexes: Vec<String>,

    /// Only report paths matching this glob (repeatable).
    #[arg(short, long = "glob", value_name = "GLOB")]
    pub globs: Vec<String>,

    /// Print one JSON object per change.
    #[arg(short, long)]
    pub json: bool,

    /// Print nothing; rely on the exit code.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Build the session configuration from the parsed arguments.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(self.paths.iter().cloned());

        if self.poll {
            config = config.with_mode(WatchMode::Polling);
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if self.continuous {
            config = config.continuous();
        }
        if self.success {
            config = config.success_only();
        }
        if self.recursive {
            config = config.recursive();
        }

        config.regexes = std::iter::once(DEFAULT_PATTERN.to_string())
            .chain(self.regexes.iter().cloned())
            .collect();
        config.globs = self.globs.clone();
        config
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("`{value}` is not a valid duration"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fswait").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["a.txt"]).session_config();

        assert_eq!(config.mode, WatchMode::Watching);
        assert!(!config.continuous);
        assert!(!config.success_only);
        assert_eq!(config.timeout, Duration::ZERO);
        assert_eq!(config.regexes, vec![DEFAULT_PATTERN.to_string()]);
    }

    #[test]
    fn test_polling_flags() {
        let config = parse(&["-p", "-i", "0.5", "-t", "10", "a.txt", "b.txt"]).session_config();

        assert_eq!(config.mode, WatchMode::Polling);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.effective_continuous());
        assert_eq!(config.paths.len(), 2);
    }

    #[test]
    fn test_patterns_follow_default() {
        let cli = parse(&["-e", r"\.rs$", "-g", "*.toml", "-g", "*.md", "src"]);
        let config = cli.session_config();

        assert_eq!(
            config.regexes,
            vec![DEFAULT_PATTERN.to_string(), r"\.rs$".to_string()]
        );
        assert_eq!(config.globs, vec!["*.toml".to_string(), "*.md".to_string()]);
        let pattern = config.pattern().unwrap();
        assert!(pattern.matches("src/main.rs"));
        assert!(pattern.matches("README.md"));
        assert!(!pattern.matches("build.sh"));
    }

    #[test]
    fn test_interval_requires_poll() {
        let result = Cli::try_parse_from(["fswait", "-i", "2", "a.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_seconds_rejected() {
        assert!(Cli::try_parse_from(["fswait", "-t", "-1", "a.txt"]).is_err());
        assert!(Cli::try_parse_from(["fswait", "-t", "soon", "a.txt"]).is_err());
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["a"]).log_level(), "warn");
        assert_eq!(parse(&["-vv", "a"]).log_level(), "debug");
        assert_eq!(parse(&["-vvvv", "a"]).log_level(), "trace");
    }
}
