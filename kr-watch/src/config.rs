use std::collections::BTreeMap;
use std::fs::File;
use std::time::Duration;

use kr_core::errors::*;
use kr_core::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::waiter::ReadinessWaiter;

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECONDS)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS)
}

// Durations are written the way people type them ("90s", "5m", "1h 30m")
mod human_duration {
    use std::time::Duration;

    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
        de,
    };

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_duration(&s).map_err(de::Error::custom)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    #[serde(default = "default_timeout", with = "human_duration")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval", with = "human_duration")]
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        WaitConfig {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

// A declarative matcher: at most one of names/labels/annotations may be set, and if none of them
// are, everything of the given kind matches.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherConfig {
    pub kind: ResourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl MatcherConfig {
    pub fn to_matcher(&self) -> anyhow::Result<ResourceMatcher> {
        let rules = [!self.names.is_empty(), !self.labels.is_empty(), !self.annotations.is_empty()];
        ensure!(
            rules.iter().filter(|r| **r).count() <= 1,
            "matcher for {} may set at most one of names, labels, or annotations",
            self.kind
        );

        let matcher = if !self.names.is_empty() {
            ResourceMatcher::named(self.names.iter().cloned())
        } else if !self.labels.is_empty() {
            ResourceMatcher::labelled(self.labels.clone())
        } else if !self.annotations.is_empty() {
            ResourceMatcher::annotated(self.annotations.clone())
        } else {
            ResourceMatcher::everything()
        };

        Ok(match &self.namespace {
            Some(ns) => matcher.in_namespace(ns),
            None => matcher,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiterConfig {
    #[serde(flatten)]
    pub wait: WaitConfig,

    #[serde(default)]
    pub include: Vec<MatcherConfig>,

    #[serde(default)]
    pub exclude: Vec<MatcherConfig>,
}

impl WaiterConfig {
    pub fn load(filename: &str) -> anyhow::Result<WaiterConfig> {
        Ok(serde_yaml::from_reader(File::open(filename)?)?)
    }

    pub fn apply_to(&self, waiter: &ReadinessWaiter) -> EmptyResult {
        for m in &self.exclude {
            waiter.exclude(m.kind, m.to_matcher()?)?;
        }
        for m in &self.include {
            waiter.include(m.kind, m.to_matcher()?)?;
        }
        Ok(())
    }
}
