use log::LevelFilter;

/// Logging settings handed over by the command line.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: LevelFilter::Warn,
        }
    }
}

impl LogConfig {
    /// `-v` raises the level one step per occurrence, starting from `base`.
    pub fn with_verbosity(base: LevelFilter, verbose: u8) -> Self {
        let levels = [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
            LevelFilter::Trace,
        ];
        let start = levels.iter().position(|l| *l == base).unwrap_or(2);
        let index = (start + usize::from(verbose)).min(levels.len() - 1);
        LogConfig {
            level: levels[index],
        }
    }
}

/// Install the stderr logger. Calling it twice is harmless.
pub fn init(config: &LogConfig) {
    let _ = env_logger::Builder::new()
        .filter_level(config.level)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_warn() {
        assert_eq!(LogConfig::default().level, LevelFilter::Warn);
    }

    #[test]
    fn verbosity_steps_up_and_saturates() {
        assert_eq!(LogConfig::with_verbosity(LevelFilter::Warn, 0).level, LevelFilter::Warn);
        assert_eq!(LogConfig::with_verbosity(LevelFilter::Warn, 1).level, LevelFilter::Info);
        assert_eq!(LogConfig::with_verbosity(LevelFilter::Warn, 2).level, LevelFilter::Debug);
        assert_eq!(LogConfig::with_verbosity(LevelFilter::Error, 9).level, LevelFilter::Trace);
    }
}
