//! Deployment environments and the suffix naming convention.

use crate::errors::DeployError;
use serde::{Deserialize, Serialize};

/// A named deployment target with its own directory, process and network identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    /// Returns all environments.
    pub fn all() -> &'static [Environment] {
        &[
            Environment::Production,
            Environment::Staging,
            Environment::Development,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(DeployError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Append `_<env>` to a name for every environment except production.
///
/// Every name-like field of an environment record goes through this function.
pub fn suffix(value: &str, env: Environment) -> String {
    if env.is_production() {
        value.to_string()
    } else {
        format!("{}_{}", value, env)
    }
}

/// Parse environment arguments given as repeated and/or comma-separated values.
///
/// Order is preserved and duplicates are dropped, so `staging,production staging`
/// yields `[staging, production]`.
pub fn parse_targets<S: AsRef<str>>(args: &[S]) -> Result<Vec<Environment>, DeployError> {
    let mut targets = Vec::new();
    for arg in args {
        for part in arg.as_ref().split(',') {
            if part.trim().is_empty() {
                continue;
            }
            let env: Environment = part.parse()?;
            if !targets.contains(&env) {
                targets.push(env);
            }
        }
    }
    Ok(targets)
}
