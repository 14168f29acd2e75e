use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kr_core::errors::*;
use kr_core::k8s::{
    ClusterAccess,
    KubeClusterAccess,
};
use kr_core::prelude::*;
use kr_watch::{
    InstallResult,
    KindRegistry,
    ReadinessWaiter,
    WaitCancelled,
    WaitTimeout,
    WaiterConfig,
};
use tracing::*;

#[derive(clap::Args, Debug)]
pub struct Args {
    #[arg(
        short = 'c',
        long,
        long_help = "YAML file with wait settings and include/exclude matchers"
    )]
    pub config_file: Option<String>,

    #[arg(
        short = 'm',
        long,
        long_help = "rendered manifest (e.g., the output of `helm template`); every workload in it is waited on"
    )]
    pub manifest: Option<String>,

    #[arg(
        short = 'n',
        long,
        long_help = "namespace for manifest resources that don't set one",
        default_value = "default"
    )]
    pub namespace: String,

    #[arg(
        short = 'i',
        long = "include",
        value_name = "KIND/NS/NAME",
        long_help = "wait for the named resource (may be repeated)"
    )]
    pub includes: Vec<String>,

    #[arg(
        short = 'l',
        long = "selector",
        value_name = "KIND/NS/KEY=VAL,...",
        long_help = "wait for every resource of KIND in NS carrying all of the given labels (may be repeated)"
    )]
    pub selectors: Vec<String>,

    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "KIND/[NS/]NAME",
        long_help = "never wait for the named resource; without a namespace it's excluded everywhere (may be repeated)"
    )]
    pub excludes: Vec<String>,

    #[arg(
        short = 't',
        long,
        long_help = "give up after this long (overrides the config file)",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Option<Duration>,

    #[arg(
        short = 'p',
        long,
        long_help = "how often to re-check readiness (overrides the config file)",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Option<Duration>,
}

pub async fn cmd(args: &Args, client: kube::Client) -> EmptyResult {
    let config = load_config(args)?;
    let access: Arc<dyn ClusterAccess> = Arc::new(KubeClusterAccess::new(client));
    let waiter = ReadinessWaiter::new(KindRegistry::standard(access));

    let res = match configure(args, &config, &waiter) {
        Ok(()) => waiter.wait_until_ready(&config.wait).await,
        Err(err) => Err(err),
    };
    waiter.close();

    match res {
        Ok(()) => {
            println!("all resources are ready");
            Ok(())
        },
        Err(err) => {
            if let Some(timeout) = err.downcast_ref::<WaitTimeout>() {
                println!("{}", timeout.report);
            } else if let Some(cancelled) = err.downcast_ref::<WaitCancelled>() {
                println!("{}", cancelled.report);
            } else {
                krerr!(err, "readiness wait failed");
            }
            Err(err)
        },
    }
}

pub(crate) fn load_config(args: &Args) -> anyhow::Result<WaiterConfig> {
    let mut config = match &args.config_file {
        Some(f) => WaiterConfig::load(f)?,
        None => WaiterConfig::default(),
    };
    if let Some(timeout) = args.timeout {
        config.wait.timeout = timeout;
    }
    if let Some(interval) = args.poll_interval {
        config.wait.poll_interval = interval;
    }
    Ok(config)
}

// Command-line matchers are added on top of whatever the config file declares
pub(crate) fn configure(args: &Args, config: &WaiterConfig, waiter: &ReadinessWaiter) -> EmptyResult {
    config.apply_to(waiter)?;
    for arg in &args.excludes {
        let (kind, matcher) = parse_exclude(arg)?;
        waiter.exclude(kind, matcher)?;
    }
    for arg in &args.includes {
        let (kind, matcher) = parse_include(arg)?;
        waiter.include(kind, matcher)?;
    }
    for arg in &args.selectors {
        let (kind, matcher) = parse_selector(arg)?;
        waiter.include(kind, matcher)?;
    }

    if let Some(path) = &args.manifest {
        let release_name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        waiter.include_install(&InstallResult {
            release_name,
            namespace: args.namespace.clone(),
            revision: 0,
            manifest: fs::read_to_string(path)?,
        })?;
    }

    debug!("waiter configured with timeout {}", humantime::format_duration(config.wait.timeout));
    Ok(())
}

pub(crate) fn parse_include(arg: &str) -> anyhow::Result<(ResourceKind, ResourceMatcher)> {
    let parts: Vec<_> = arg.split('/').collect();
    let [kind, ns, name] = parts[..] else {
        bail!("expected KIND/NS/NAME, got {arg:?}");
    };
    ensure!(!ns.is_empty() && !name.is_empty(), "namespace and name must be non-empty in {arg:?}");
    Ok((kind.parse()?, ResourceMatcher::named([name]).in_namespace(ns)))
}

pub(crate) fn parse_exclude(arg: &str) -> anyhow::Result<(ResourceKind, ResourceMatcher)> {
    let parts: Vec<_> = arg.split('/').collect();
    match parts[..] {
        [kind, name] if !name.is_empty() => Ok((kind.parse()?, ResourceMatcher::named([name]))),
        [kind, ns, name] if !ns.is_empty() && !name.is_empty() => {
            Ok((kind.parse()?, ResourceMatcher::named([name]).in_namespace(ns)))
        },
        _ => bail!("expected KIND/NAME or KIND/NS/NAME, got {arg:?}"),
    }
}

pub(crate) fn parse_selector(arg: &str) -> anyhow::Result<(ResourceKind, ResourceMatcher)> {
    let re = Regex::new(r"^(?<kind>[^/]+)/(?<ns>[^/]+)/(?<labels>[^/]+)$")?;
    let Some(caps) = re.captures(arg) else {
        bail!("expected KIND/NS/KEY=VAL,..., got {arg:?}");
    };

    let mut labels = BTreeMap::new();
    for pair in caps["labels"].split(',') {
        let Some((k, v)) = pair.split_once('=') else {
            bail!("label selector {pair:?} is not of the form KEY=VAL");
        };
        ensure!(!k.is_empty(), "empty label key in {arg:?}");
        labels.insert(k.to_string(), v.to_string());
    }
    Ok((caps["kind"].parse()?, ResourceMatcher::labelled(labels).in_namespace(&caps["ns"])))
}
