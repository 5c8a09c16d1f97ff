use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A single execution variable value as delivered by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<VarValue>),
}

impl VarValue {
    pub fn is_list(&self) -> bool {
        matches!(self, VarValue::List(_))
    }

    /// Flatten into a list of strings; scalars become a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            VarValue::List(items) => items.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::Flag(v) => write!(f, "{v}"),
            VarValue::Integer(v) => write!(f, "{v}"),
            VarValue::Float(v) => write!(f, "{v}"),
            VarValue::Text(v) => f.write_str(v),
            VarValue::List(items) => {
                let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(" "))
            }
        }
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        VarValue::Text(v.to_string())
    }
}

/// Key/value bag attached to a job and exported into the script environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionVariables(pub BTreeMap<String, VarValue>);

impl ExecutionVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VarValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarValue)> {
        self.0.iter()
    }

    /// Scalar variables only; list values are skipped.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_list())
            .map(|(k, v)| (k.as_str(), v.to_string()))
    }

    /// Maximum job duration in minutes.
    pub fn job_timeout(&self) -> Option<u64> {
        match self.get("job_timeout")? {
            VarValue::Integer(v) if *v >= 0 => Some(*v as u64),
            VarValue::Float(v) if *v >= 0.0 => Some(*v as u64),
            VarValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Branch override for the repository checkout.
    pub fn git_branch(&self) -> Option<String> {
        self.get("git_branch").map(ToString::to_string)
    }

    pub fn retry_urns(&self) -> Vec<String> {
        self.get("retry_urns").map(VarValue::to_list).unwrap_or_default()
    }

    pub fn tests(&self) -> Vec<String> {
        self.get("tests").map(VarValue::to_list).unwrap_or_default()
    }
}
