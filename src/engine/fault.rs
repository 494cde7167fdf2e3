//! Error Injection.
//!
//! Models the device's fault behaviour for error-scenario testing. Two
//! sources can force a transfer to fail:
//!
//! * a named [`ErrorScenario`] with a probability in 0.01 % units and a
//!   recovery delay applied before the failure is reported;
//! * the ERROR_INJECT register, which fails one in `rate` transfers with a
//!   data fault and no recovery delay.

use super::rng::Pcg32;
use crate::common::constants::PROBABILITY_SCALE;
use crate::common::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named fault scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorScenario {
    #[default]
    None,
    /// Transfers time out.
    Timeout,
    /// Transferred data is corrupted.
    Corruption,
    /// The device runs out of buffer space.
    Overrun,
}

impl ErrorScenario {
    /// Default probability in 0.01 % units.
    pub fn default_probability_bp(self) -> u32 {
        match self {
            ErrorScenario::None => 0,
            ErrorScenario::Timeout => 100,
            ErrorScenario::Corruption => 50,
            ErrorScenario::Overrun => 200,
        }
    }

    /// Default recovery time in milliseconds.
    pub fn default_recovery_ms(self) -> u64 {
        match self {
            ErrorScenario::None => 0,
            ErrorScenario::Timeout => 100,
            ErrorScenario::Corruption => 50,
            ErrorScenario::Overrun => 200,
        }
    }

    /// Error reported to the caller when this scenario fires.
    pub fn to_error(self, recovery_ms: u64) -> Option<SimError> {
        match self {
            ErrorScenario::None => None,
            ErrorScenario::Timeout => Some(SimError::Timeout { recovery_ms }),
            ErrorScenario::Corruption => Some(SimError::DataFault(
                "injected data corruption".to_string(),
            )),
            ErrorScenario::Overrun => Some(SimError::ResourceExhausted(
                "injected buffer overrun".to_string(),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorScenario::None => "none",
            ErrorScenario::Timeout => "timeout",
            ErrorScenario::Corruption => "corruption",
            ErrorScenario::Overrun => "overrun",
        }
    }
}

impl FromStr for ErrorScenario {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(ErrorScenario::None),
            "timeout" => Ok(ErrorScenario::Timeout),
            "corruption" => Ok(ErrorScenario::Corruption),
            "overrun" => Ok(ErrorScenario::Overrun),
            other => Err(SimError::InvalidParameter(format!(
                "unknown error scenario '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ErrorScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective scenario-driven error injection settings for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorConfig {
    pub scenario: ErrorScenario,
    /// Probability in 0.01 % units (`0..=10000`).
    pub probability_bp: u32,
    pub recovery_ms: u64,
}

impl ErrorConfig {
    /// Settings with the scenario's default probability and recovery time.
    pub fn for_scenario(scenario: ErrorScenario) -> Self {
        Self {
            scenario,
            probability_bp: scenario.default_probability_bp(),
            recovery_ms: scenario.default_recovery_ms(),
        }
    }

    /// Explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] if the probability exceeds 100 %.
    pub fn new(scenario: ErrorScenario, probability_bp: u32, recovery_ms: u64) -> Result<Self> {
        if probability_bp > PROBABILITY_SCALE {
            return Err(SimError::InvalidParameter(format!(
                "error probability {probability_bp} exceeds {PROBABILITY_SCALE}"
            )));
        }
        Ok(Self {
            scenario,
            probability_bp,
            recovery_ms,
        })
    }

    /// `true` when this configuration can ever fire.
    pub fn is_active(&self) -> bool {
        self.scenario != ErrorScenario::None && self.probability_bp > 0
    }
}

/// A fault chosen for the current transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedFault {
    pub error: SimError,
    pub recovery: Duration,
}

/// Rolls for faults using the device's error configuration.
pub struct FaultInjector {
    config: ErrorConfig,
    register_rate: Option<u32>,
    rng: Pcg32,
    register_counter: u64,
}

impl FaultInjector {
    pub fn new(config: ErrorConfig, rng: Pcg32) -> Self {
        Self {
            config,
            register_rate: None,
            rng,
            register_counter: 0,
        }
    }

    pub fn config(&self) -> ErrorConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ErrorConfig) {
        self.config = config;
    }

    /// Register-driven injection rate (one in `rate`), or `None` when disabled.
    pub fn register_rate(&self) -> Option<u32> {
        self.register_rate
    }

    pub fn set_register_rate(&mut self, rate: Option<u32>) {
        self.register_rate = rate.filter(|&r| r > 0);
        self.register_counter = 0;
    }

    /// Decides whether the next transfer fails, and how.
    ///
    /// The scenario roll happens first; the register rate fails every
    /// `rate`-th transfer it sees.
    pub fn roll(&mut self) -> Option<InjectedFault> {
        if self.config.is_active()
            && self.rng.below(PROBABILITY_SCALE) < self.config.probability_bp
        {
            let recovery_ms = self.config.recovery_ms;
            if let Some(error) = self.config.scenario.to_error(recovery_ms) {
                return Some(InjectedFault {
                    error,
                    recovery: Duration::from_millis(recovery_ms),
                });
            }
        }

        if let Some(rate) = self.register_rate {
            self.register_counter += 1;
            if self.register_counter % u64::from(rate) == 0 {
                return Some(InjectedFault {
                    error: SimError::DataFault(format!("register-injected fault (rate 1/{rate})")),
                    recovery: Duration::ZERO,
                });
            }
        }
        None
    }
}
