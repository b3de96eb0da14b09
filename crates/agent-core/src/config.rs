//! Agent configuration, loadable from the environment.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::gateway::ResponseFormat;
use crate::strategy::StrategyKind;

/// Run settings shared by every agent a process builds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier passed to the gateway
    pub model: String,

    /// Iteration budget per run
    pub max_iterations: u32,

    pub strategy: StrategyKind,

    /// Sampling temperature
    pub temperature: f32,

    /// Overrides the strategy's own response format when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            max_iterations: 10,
            strategy: StrategyKind::React,
            temperature: 0.7,
            response_format: None,
        }
    }
}

impl AgentConfig {
    /// Read `AGENT_MODEL`, `AGENT_MAX_ITERATIONS`, `AGENT_STRATEGY`,
    /// `AGENT_TEMPERATURE` and `AGENT_RESPONSE_FORMAT`, keeping defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(model) = lookup("AGENT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(raw) = lookup("AGENT_MAX_ITERATIONS") {
            config.max_iterations = raw
                .trim()
                .parse()
                .map_err(|_| invalid("AGENT_MAX_ITERATIONS", &raw))?;
        }
        if let Some(raw) = lookup("AGENT_STRATEGY") {
            config.strategy = raw.parse()?;
        }
        if let Some(raw) = lookup("AGENT_TEMPERATURE") {
            config.temperature = raw
                .trim()
                .parse()
                .map_err(|_| invalid("AGENT_TEMPERATURE", &raw))?;
        }
        if let Some(raw) = lookup("AGENT_RESPONSE_FORMAT") {
            config.response_format = Some(
                raw.trim()
                    .parse()
                    .map_err(|_| invalid("AGENT_RESPONSE_FORMAT", &raw))?,
            );
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> AgentError {
    AgentError::Config(format!("invalid value for {key}: '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.strategy, StrategyKind::React);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AGENT_MODEL", "qwen2.5"),
            ("AGENT_MAX_ITERATIONS", "3"),
            ("AGENT_STRATEGY", "native"),
            ("AGENT_TEMPERATURE", "0.2"),
            ("AGENT_RESPONSE_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.strategy, StrategyKind::NativeToolCalling);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.response_format, Some(ResponseFormat::Json));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("AGENT_MAX_ITERATIONS", "many")],
            [("AGENT_MAX_ITERATIONS", "0")],
            [("AGENT_STRATEGY", "plan_and_execute")],
            [("AGENT_TEMPERATURE", "hot")],
            [("AGENT_RESPONSE_FORMAT", "yaml")],
        ] {
            let err = AgentConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, AgentError::Config(_)), "{vars:?}");
        }
    }
}
