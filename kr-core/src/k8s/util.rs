use std::collections::BTreeMap;

use kube::api::Resource;

use super::*;
use crate::errors::*;

impl<T: Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }

    fn matches(&self, sel: &metav1::LabelSelector) -> anyhow::Result<bool> {
        let requirements = requirements_of(sel)?;
        let labels = self.labels();
        let labels_match = sel
            .match_labels
            .iter()
            .flatten()
            .all(|(k, v)| labels.get(k) == Some(v));
        Ok(labels_match && requirements.iter().all(|r| r.holds_for(labels)))
    }
}

// Render a LabelSelector in the string form the apiserver accepts for the `labelSelector` query
// parameter, e.g. `app=web,tier in (a,b),!legacy`.  An empty selector renders as the empty string,
// which selects everything.
pub fn selector_query(sel: &metav1::LabelSelector) -> anyhow::Result<String> {
    let equalities = sel.match_labels.iter().flatten().map(|(k, v)| format!("{k}={v}"));
    let sets = requirements_of(sel)?.into_iter().map(|r| r.to_query());
    Ok(equalities.chain(sets).collect::<Vec<_>>().join(","))
}

// The events api only supports equality field selectors on involvedObject, which is fine; the uid
// is unique, and if we don't know it, kind+name is the next best thing.
pub fn involved_object_query(identity: &ResourceIdentity) -> String {
    match &identity.uid {
        Some(uid) => format!("{INVOLVED_OBJECT_UID_FIELD}={uid}"),
        None => format!(
            "{INVOLVED_OBJECT_KIND_FIELD}={},{INVOLVED_OBJECT_NAME_FIELD}={}",
            identity.kind, identity.name
        ),
    }
}

// Set-based requirements, see
// https://kubernetes.io/docs/concepts/overview/working-with-objects/labels/#set-based-requirement
enum Requirement<'a> {
    In(&'a str, &'a [String]),
    NotIn(&'a str, &'a [String]),
    Exists(&'a str),
    DoesNotExist(&'a str),
}

impl<'a> Requirement<'a> {
    // In/NotIn need at least one value, Exists/DoesNotExist must not have any
    fn parse(expr: &'a metav1::LabelSelectorRequirement) -> anyhow::Result<Requirement<'a>> {
        let key = expr.key.as_str();
        let values = expr.values.as_deref().unwrap_or_default();
        let req = match (expr.operator.as_str(), values.is_empty()) {
            ("In", false) => Requirement::In(key, values),
            ("NotIn", false) => Requirement::NotIn(key, values),
            ("Exists", true) => Requirement::Exists(key),
            ("DoesNotExist", true) => Requirement::DoesNotExist(key),
            _ => bail!(KubernetesError::malformed_label_selector(expr)),
        };
        Ok(req)
    }

    fn holds_for(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::In(key, values) => labels.get(*key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(key, values) => labels.get(*key).is_none_or(|v| !values.contains(v)),
            Requirement::Exists(key) => labels.contains_key(*key),
            Requirement::DoesNotExist(key) => !labels.contains_key(*key),
        }
    }

    fn to_query(&self) -> String {
        match self {
            Requirement::In(key, values) => format!("{key} in ({})", values.join(",")),
            Requirement::NotIn(key, values) => format!("{key} notin ({})", values.join(",")),
            Requirement::Exists(key) => key.to_string(),
            Requirement::DoesNotExist(key) => format!("!{key}"),
        }
    }
}

fn requirements_of(sel: &metav1::LabelSelector) -> anyhow::Result<Vec<Requirement<'_>>> {
    sel.match_expressions.iter().flatten().map(Requirement::parse).collect()
}
