use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A rollout resource as returned by service management.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Rollout {
    pub rollout_id: String,
    pub service_name: String,
    pub traffic_percent_strategy: TrafficPercentStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrafficPercentStrategy {
    /// Config id → traffic percentage, in the order the server sent them.
    pub percentages: Map<String, Value>,
}

/// Traffic split across definition ids, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficSplit {
    entries: Vec<(String, Value)>,
}

impl TrafficSplit {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Map<String, Value>> for TrafficSplit {
    fn from(map: Map<String, Value>) -> Self {
        Self { entries: map.into_iter().collect() }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for TrafficSplit {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), Value::from(v))).collect(),
        }
    }
}

impl Rollout {
    pub fn traffic_split(&self) -> TrafficSplit {
        TrafficSplit::from(self.traffic_percent_strategy.percentages.clone())
    }
}

/// Report response from service control; only the rollout id is read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportResponse {
    pub service_rollout_id: String,
}
