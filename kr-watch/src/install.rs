use kr_core::prelude::*;
use serde::Deserialize;
use tracing::*;

use crate::registry::KindRegistry;

/// What a chart installer reports back after an install or upgrade.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstallResult {
    pub release_name: String,
    pub namespace: String,
    pub revision: u32,
    pub manifest: String,
}

/// Build one by-name inclusion for every resource in the rendered manifest that the registry
/// knows how to wait on.  Resources that don't set a namespace land in the install's namespace;
/// everything else in the manifest (services, config maps, etc.) is skipped.
pub fn inclusions_from_install(
    install: &InstallResult,
    registry: &KindRegistry,
) -> anyhow::Result<Vec<(ResourceKind, ResourceMatcher)>> {
    let mut inclusions = vec![];
    for doc in serde_yaml::Deserializer::from_str(&install.manifest) {
        let value = serde_yaml::Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }

        let obj: DynamicObject = serde_yaml::from_value(value)?;
        let Some(kind) = obj
            .types
            .as_ref()
            .and_then(|t| ResourceKind::from_type(&t.api_version, &t.kind))
            .filter(|k| registry.entry(*k).is_ok())
        else {
            debug!("skipping {} from release {}: not a waitable kind", obj.name_any(), install.release_name);
            continue;
        };

        let ns = obj.namespace().unwrap_or_else(|| install.namespace.clone());
        inclusions.push((kind, ResourceMatcher::named([obj.name_any()]).in_namespace(&ns)));
    }
    Ok(inclusions)
}
