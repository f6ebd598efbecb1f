//! Declarative description of an executor tree.

use super::{Executor, SimulatorExecutor, SplitExecutor};
use crate::domain::error::NestradeError;
use crate::domain::freq::Freq;
use crate::domain::strategy::StrategyConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorConfig {
    Simulator {
        freq: String,
        generate_report: bool,
        verbose: bool,
        track_data: bool,
    },
    Split {
        freq: String,
        inner: Box<ExecutorConfig>,
        inner_strategy: StrategyConfig,
        generate_report: bool,
        verbose: bool,
        track_data: bool,
    },
}

impl ExecutorConfig {
    /// Chains one executor per frequency, outermost first. The last one simulates.
    pub fn nested(
        freqs: &[&str],
        inner_strategy: &StrategyConfig,
        generate_report: bool,
        verbose: bool,
    ) -> Result<Self, NestradeError> {
        let (last, outer) = freqs
            .split_last()
            .ok_or_else(|| NestradeError::invalid_config("at least one executor frequency is required"))?;

        let mut config = ExecutorConfig::Simulator {
            freq: last.trim().to_string(),
            generate_report,
            verbose,
            track_data: false,
        };
        for freq in outer.iter().rev() {
            config = ExecutorConfig::Split {
                freq: freq.trim().to_string(),
                inner: Box::new(config),
                inner_strategy: inner_strategy.clone(),
                generate_report,
                verbose,
                track_data: false,
            };
        }
        Ok(config)
    }

    pub fn freq(&self) -> Result<Freq, NestradeError> {
        let text = match self {
            ExecutorConfig::Simulator { freq, .. } | ExecutorConfig::Split { freq, .. } => freq,
        };
        text.parse()
    }

    /// Number of levels, counting this one.
    pub fn depth(&self) -> usize {
        match self {
            ExecutorConfig::Simulator { .. } => 1,
            ExecutorConfig::Split { inner, .. } => 1 + inner.depth(),
        }
    }

    /// Parses every frequency and checks each inner bar tiles its outer bar.
    pub fn validate(&self) -> Result<(), NestradeError> {
        let outer = self.freq()?;
        if let ExecutorConfig::Split { inner, .. } = self {
            let inner_freq = inner.freq()?;
            let outer_len = outer.duration().num_seconds();
            let inner_len = inner_freq.duration().num_seconds();
            if inner_len >= outer_len {
                return Err(NestradeError::invalid_config(format!(
                    "inner frequency {inner_freq} must be finer than {outer}"
                )));
            }
            if outer_len % inner_len != 0 {
                return Err(NestradeError::invalid_config(format!(
                    "{outer} is not a whole number of {inner_freq} bars"
                )));
            }
            inner.validate()?;
        }
        Ok(())
    }

    /// Builds the executor tree with this config at nesting `level` (root = 0).
    pub fn build(&self, level: usize) -> Result<Box<dyn Executor>, NestradeError> {
        self.validate()?;
        let freq = self.freq()?;
        let executor: Box<dyn Executor> = match self {
            ExecutorConfig::Simulator {
                generate_report,
                verbose,
                track_data,
                ..
            } => Box::new(
                SimulatorExecutor::new(freq, level)
                    .with_report(*generate_report)
                    .with_verbose(*verbose)
                    .with_track_data(*track_data),
            ),
            ExecutorConfig::Split {
                inner,
                inner_strategy,
                generate_report,
                verbose,
                track_data,
                ..
            } => Box::new(
                SplitExecutor::new(freq, level, inner.build(level + 1)?, inner_strategy.build())
                    .with_report(*generate_report)
                    .with_verbose(*verbose)
                    .with_track_data(*track_data),
            ),
        };
        Ok(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn nested_builds_outer_to_inner() {
        let config =
            ExecutorConfig::nested(&["day", "30min", "5min"], &StrategyConfig::Twap, true, false)
                .unwrap();
        assert_eq!(config.depth(), 3);
        assert_eq!(config.freq().unwrap().label(), "1day");
        let exec = config.build(0).unwrap();
        assert_eq!(exec.core().level(), 0);
        assert!(exec.core().generate_report());
    }

    #[test]
    fn single_frequency_is_a_simulator() {
        let config = ExecutorConfig::nested(&["day"], &StrategyConfig::Twap, false, false).unwrap();
        assert!(matches!(config, ExecutorConfig::Simulator { .. }));
    }

    #[test]
    fn empty_frequency_list_is_invalid() {
        let err = ExecutorConfig::nested(&[], &StrategyConfig::Twap, false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn inner_coarser_than_outer_is_invalid() {
        let config =
            ExecutorConfig::nested(&["30min", "day"], &StrategyConfig::Twap, false, false).unwrap();
        assert_eq!(config.build(0).err().unwrap().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn inner_must_tile_outer() {
        let config =
            ExecutorConfig::nested(&["day", "7min"], &StrategyConfig::Twap, false, false).unwrap();
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn unparseable_frequency_is_invalid() {
        let config = ExecutorConfig::Simulator {
            freq: "month".into(),
            generate_report: false,
            verbose: false,
            track_data: false,
        };
        assert_eq!(config.build(0).err().unwrap().kind(), ErrorKind::InvalidConfig);
    }
}
