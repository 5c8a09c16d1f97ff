use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticFormat {
    Integer,
    Float,
}

/// A labelled measurement pushed to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub label: String,
    pub value: f64,
    pub format: StatisticFormat,
}

impl Statistic {
    pub fn integer(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value: value as f64,
            format: StatisticFormat::Integer,
        }
    }

    pub fn float(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            format: StatisticFormat::Float,
        }
    }
}
