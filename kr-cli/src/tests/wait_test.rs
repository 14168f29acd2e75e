use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use kr_core::k8s::ClusterAccess;
use kr_testutils::*;
use kr_watch::{
    KindRegistry,
    ReadinessWaiter,
};

use super::*;
use crate::wait::*;

fn parse_wait(argv: &[&str]) -> Args {
    let root = KrCommandRoot::try_parse_from(["krctl", "wait"].iter().chain(argv)).unwrap();
    match root.subcommand {
        KrSubcommand::Wait(args) => args,
        KrSubcommand::Version => panic!("expected the wait subcommand"),
    }
}

#[rstest]
fn test_parse_wait_args() {
    let args = parse_wait(&[
        "-i",
        "deploy/web/frontend",
        "--include",
        "job/web/migrate",
        "-l",
        "sts/db/app=postgres,tier=data",
        "-x",
        "pod/debug",
        "--timeout",
        "90s",
        "-p",
        "500ms",
    ]);

    assert_eq!(args.includes, vec!["deploy/web/frontend", "job/web/migrate"]);
    assert_eq!(args.selectors, vec!["sts/db/app=postgres,tier=data"]);
    assert_eq!(args.excludes, vec!["pod/debug"]);
    assert_eq!(args.timeout, Some(Duration::from_secs(90)));
    assert_eq!(args.poll_interval, Some(Duration::from_millis(500)));
    assert_eq!(args.namespace, "default");
    assert_none!(args.manifest);
}

#[rstest]
fn test_verbosity_after_subcommand() {
    let root = KrCommandRoot::try_parse_from(["krctl", "wait", "-v", "debug"]).unwrap();
    assert_eq!(root.verbosity, "debug");
}

#[rstest]
fn test_bad_timeout() {
    assert!(KrCommandRoot::try_parse_from(["krctl", "wait", "--timeout", "whenever"]).is_err());
}

#[rstest]
#[case::long_kind("Deployment/web/frontend", ResourceKind::Deployment)]
#[case::short_kind("sts/web/frontend", ResourceKind::StatefulSet)]
fn test_parse_include(#[case] arg: &str, #[case] kind: ResourceKind) {
    let (k, matcher) = parse_include(arg).unwrap();
    assert_eq!(k, kind);
    assert_eq!(matcher, ResourceMatcher::named(["frontend"]).in_namespace("web"));
}

#[rstest]
#[case::missing_ns("deploy/frontend")]
#[case::empty_name("deploy/web/")]
#[case::too_many("deploy/web/frontend/extra")]
#[case::bad_kind("service/web/frontend")]
fn test_parse_include_invalid(#[case] arg: &str) {
    assert!(parse_include(arg).is_err());
}

#[rstest]
fn test_parse_exclude() {
    let (kind, matcher) = parse_exclude("pod/debug").unwrap();
    assert_eq!(kind, ResourceKind::Pod);
    assert_eq!(matcher.namespace(), None);

    let (_, matcher) = parse_exclude("pod/web/debug").unwrap();
    assert_eq!(matcher, ResourceMatcher::named(["debug"]).in_namespace("web"));

    assert!(parse_exclude("pod").is_err());
}

#[rstest]
fn test_parse_selector() {
    let (kind, matcher) = parse_selector("ds/kube-system/app=proxy,tier=node").unwrap();
    assert_eq!(kind, ResourceKind::DaemonSet);
    assert_eq!(
        matcher,
        ResourceMatcher::labelled(BTreeMap::from([
            ("app".into(), "proxy".into()),
            ("tier".into(), "node".into())
        ]))
        .in_namespace("kube-system")
    );

    let err = parse_selector("ds/kube-system/app").unwrap_err();
    assert_contains!(err.to_string(), "KEY=VAL");
    assert!(parse_selector("ds/app=proxy").is_err());
}

#[rstest]
fn test_load_config_overrides() {
    let mut file = tempfile();
    writeln!(file.1, "timeout: 10m\npollInterval: 5s\ninclude:\n  - kind: Job\n    namespace: web").unwrap();

    let args = parse_wait(&["-c", &file.0, "-p", "1s"]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.wait.timeout, Duration::from_secs(600));
    assert_eq!(config.wait.poll_interval, Duration::from_secs(1));
    assert_eq!(config.include.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_configure_waiter() {
    let cluster = FakeCluster::new();
    cluster.apply(&build_deployment("web", "frontend", 1, 1));
    cluster.apply(&build_deployment("web", "debug", 1, 0));
    cluster.apply(&build_statefulset("db", "postgres", 1, 1));

    let access: Arc<dyn ClusterAccess> = cluster.clone();
    let waiter = ReadinessWaiter::new(KindRegistry::standard(access));
    let args = parse_wait(&["-i", "deploy/web/frontend", "-l", "sts/db/app=postgres", "-x", "deploy/debug"]);
    configure(&args, &load_config(&args).unwrap(), &waiter).unwrap();

    let names: Vec<_> = waiter
        .resources()
        .await
        .unwrap()
        .iter()
        .map(|r| r.identity().namespaced_name())
        .collect();
    assert_eq!(names, vec!["web/frontend", "db/postgres"]);
    waiter.close();
}

// A scratch file under the system temp dir, named after the calling thread so parallel tests don't collide
fn tempfile() -> (String, std::fs::File) {
    let name = std::thread::current().name().unwrap_or("krctl-test").replace("::", "-");
    let path = std::env::temp_dir().join(format!("{name}-{}.yml", std::process::id()));
    let file = std::fs::File::create(&path).unwrap();
    (path.to_string_lossy().into_owned(), file)
}
