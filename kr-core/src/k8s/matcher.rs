use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::fmt;

use kube::Resource;

use super::*;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchRule {
    Everything,
    Named(BTreeSet<String>),
    Labelled(BTreeMap<String, String>),
    Annotated(BTreeMap<String, String>),
}

/// A predicate selecting resource instances, optionally bound to a single namespace.
///
/// Matchers are plain values: scoping one with [`ResourceMatcher::in_namespace`] returns a new
/// matcher and leaves the original untouched, so the same matcher can be handed to any number of
/// resource sets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceMatcher {
    rule: MatchRule,
    namespace: Option<String>,
}

impl ResourceMatcher {
    pub fn everything() -> ResourceMatcher {
        ResourceMatcher { rule: MatchRule::Everything, namespace: None }
    }

    pub fn named<I, S>(names: I) -> ResourceMatcher
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResourceMatcher {
            rule: MatchRule::Named(names.into_iter().map(Into::into).collect()),
            namespace: None,
        }
    }

    /// Matches resources carrying all of the given labels; extra labels on the resource are fine,
    /// and an empty requirement set matches everything.
    pub fn labelled(labels: BTreeMap<String, String>) -> ResourceMatcher {
        ResourceMatcher { rule: MatchRule::Labelled(labels), namespace: None }
    }

    /// Same semantics as [`ResourceMatcher::labelled`], but against annotations.
    pub fn annotated(annotations: BTreeMap<String, String>) -> ResourceMatcher {
        ResourceMatcher { rule: MatchRule::Annotated(annotations), namespace: None }
    }

    pub fn in_namespace(&self, namespace: &str) -> ResourceMatcher {
        ResourceMatcher {
            rule: self.rule.clone(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn rule(&self) -> &MatchRule {
        &self.rule
    }

    pub fn test(&self, obj: &impl Resource) -> bool {
        if let Some(ns) = &self.namespace
            && obj.meta().namespace.as_deref() != Some(ns.as_str())
        {
            return false;
        }

        match &self.rule {
            MatchRule::Everything => true,
            MatchRule::Named(names) => names.contains(&obj.name_any()),
            MatchRule::Labelled(required) => contains_all(obj.labels(), required),
            MatchRule::Annotated(required) => contains_all(obj.annotations(), required),
        }
    }
}

fn contains_all(actual: &BTreeMap<String, String>, required: &BTreeMap<String, String>) -> bool {
    required.iter().all(|(k, v)| actual.get(k) == Some(v))
}

impl fmt::Display for ResourceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.rule {
            MatchRule::Everything => write!(f, "everything")?,
            MatchRule::Named(names) => write!(f, "named {names:?}")?,
            MatchRule::Labelled(labels) => write!(f, "labelled {labels:?}")?,
            MatchRule::Annotated(annotations) => write!(f, "annotated {annotations:?}")?,
        }
        if let Some(ns) = &self.namespace {
            write!(f, " in {ns}")?;
        }
        Ok(())
    }
}
