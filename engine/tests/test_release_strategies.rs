//! Simple and rolling deploys driven through the orchestrator

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Harness, Reply, SIMPLE_APP};
use shipwright::config::timings::Timings;
use shipwright::exec::{CommandOutput, CommandRunner, CommandSpec};
use shipwright::models::deployment::{ActiveTarget, DeploymentStatus};
use shipwright::strategy::Toolkit;
use shipwright::{DeployError, Orchestrator};

fn orchestrator(h: &Harness) -> Orchestrator {
    Orchestrator::new(h.toolkit(), Timings::default())
}

/// Pre-existing release directories with the given ids
fn seed_releases(h: &Harness, ids: &[i64]) {
    for id in ids {
        std::fs::create_dir_all(h.root().join("releases").join(id.to_string())).unwrap();
    }
}

fn link(h: &Harness, pointer: &str, release: i64) {
    let target = h.root().join("releases").join(release.to_string());
    std::os::unix::fs::symlink(target, h.root().join(pointer)).unwrap();
}

#[tokio::test]
async fn test_deploy_then_failed_deploy_rolls_back() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());

    let first = orchestrator(&h).execute(&h.source(), "A", h.root()).await;
    assert!(first.is_success(), "{:?}", first.cause);
    let release_a = h.pointer("current").unwrap();
    assert_eq!(first.active, Some(ActiveTarget::Release { id: release_a.clone() }));
    assert_eq!(h.pointer("previous"), None);

    // startup grace only, first probe passed
    assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(10)]);
    assert_eq!(h.runner.commands_of("systemctl"), vec!["systemctl reload shop"]);

    h.http.route("/health", Reply::status(500));
    let second = orchestrator(&h).execute(&h.source(), "B", h.root()).await;

    assert_eq!(second.status, DeploymentStatus::Failure);
    assert_eq!(second.error_kind.as_deref(), Some("health_check"));
    assert_eq!(h.pointer("current"), Some(release_a.clone()));

    let releases = h.releases();
    assert_eq!(releases.len(), 2);
    assert!(releases.contains(&release_a));
    assert_eq!(h.runner.commands_of("systemctl").len(), 3);
}

#[tokio::test]
async fn test_repeated_failures_keep_last_good_release() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());
    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());
    let good = h.pointer("current").unwrap();

    h.http.route("/health", Reply::Refused);
    for revision in ["B", "C"] {
        let outcome = orchestrator(&h).execute(&h.source(), revision, h.root()).await;
        assert!(!outcome.is_success());
        assert_eq!(h.pointer("current"), Some(good.clone()));
    }
    assert_eq!(h.releases().len(), 3);
}

#[tokio::test]
async fn test_first_deploy_failure_cannot_roll_back() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("health_check"));
    assert_eq!(h.pointer("previous"), None);
    // 3 attempts, 2 delays, after the startup grace
    assert_eq!(h.http.requests_to("localhost:8000/health"), 3);
    assert_eq!(
        h.sleeper.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(5), Duration::from_secs(5)]
    );
}

#[tokio::test]
async fn test_retention_keeps_three_newest() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());
    seed_releases(&h, &[1_600_000_001, 1_600_000_002, 1_600_000_003, 1_600_000_004, 1_600_000_005]);
    link(&h, "current", 1_600_000_005);

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;
    assert!(outcome.is_success());

    let new_release = h.pointer("current").unwrap();
    assert_eq!(h.pointer("previous").as_deref(), Some("1600000005"));
    assert_eq!(
        h.releases(),
        vec!["1600000004".to_string(), "1600000005".to_string(), new_release]
    );
}

#[tokio::test]
async fn test_retention_never_deletes_rollback_target() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());
    seed_releases(&h, &[1_600_000_001, 1_600_000_002, 1_600_000_003, 1_600_000_004, 1_600_000_005]);
    link(&h, "current", 1_600_000_001);

    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());

    let releases = h.releases();
    assert_eq!(h.pointer("previous").as_deref(), Some("1600000001"));
    assert!(releases.contains(&"1600000001".to_string()));
    assert!(!releases.contains(&"1600000002".to_string()));
    assert!(!releases.contains(&"1600000003".to_string()));
    assert_eq!(releases.len(), 4);
}

#[tokio::test]
async fn test_failed_pre_deploy_hook_leaves_pointers_alone() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(
        r#"
name: shop
type: python
healthCheck: /health
hooks:
  preDeploy: hooks/migrate.sh
"#,
    );
    h.runner.checkout_file("hooks/migrate.sh", "#!/bin/sh\nexit 0\n", true);
    h.http.route("/health", Reply::ok());
    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());
    let good = h.pointer("current").unwrap();
    assert_eq!(h.runner.commands().iter().filter(|c| c.contains("migrate.sh")).count(), 1);

    h.runner.fail("migrate.sh", "relation already exists");
    let outcome = orchestrator(&h).execute(&h.source(), "B", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("hook"));
    assert!(outcome.cause.unwrap().contains("relation already exists"));
    assert_eq!(h.pointer("current"), Some(good));
    assert_eq!(h.pointer("previous"), None);
    assert_eq!(h.runner.commands_of("systemctl").len(), 1);
}

#[tokio::test]
async fn test_non_executable_hook_is_a_hook_error() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(
        "name: shop\ntype: python\nhealthCheck: /health\nhooks:\n  postDeploy: notify.sh\n",
    );
    h.runner.checkout_file("notify.sh", "#!/bin/sh\n", false);
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;
    assert_eq!(outcome.error_kind.as_deref(), Some("hook"));
}

#[tokio::test]
async fn test_env_file_and_requirements() {
    let h = Harness::new("port: 8000\nenv: staging\n");
    std::fs::write(h.root().join(".env.staging"), "SECRET=1\n").unwrap();
    h.runner.serve_app_config(SIMPLE_APP);
    h.runner.checkout_file("requirements.txt", "flask\n", false);
    h.http.route("/health", Reply::ok());

    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());

    let release = h.root().join("releases").join(h.pointer("current").unwrap());
    assert_eq!(std::fs::read_to_string(release.join(".env")).unwrap(), "SECRET=1\n");

    let commands = h.runner.commands();
    assert!(commands.iter().any(|c| c.starts_with("python3 -m venv")));
    assert!(commands.iter().any(|c| c.contains("bin/pip install -r")));
}

#[tokio::test]
async fn test_no_requirements_skips_pip() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());

    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());

    let commands = h.runner.commands();
    assert!(commands.iter().any(|c| c.starts_with("python3 -m venv")));
    assert!(commands.iter().all(|c| !c.contains("pip install")));
}

#[tokio::test]
async fn test_missing_dockerfile_is_a_build_error() {
    let h = Harness::new("port: 8000\n");
    h.runner
        .serve_app_config("name: shop\ntype: docker\nhealthCheck: /health\n");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("build"));
    assert!(outcome.cause.unwrap().contains("Dockerfile not found"));
    assert!(h.runner.commands_of("docker").is_empty());
}

#[tokio::test]
async fn test_build_failure_aborts_before_activation() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.runner.fail("-m venv", "No module named venv");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("build"));
    assert_eq!(h.pointer("current"), None);
    assert!(h.runner.commands_of("systemctl").is_empty());
}

#[tokio::test]
async fn test_failed_checkout_discards_release_dir() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.runner.fail("checkout --quiet", "error: pathspec 'A' did not match any file(s) known to git");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("build"));
    assert!(h.releases().is_empty());
    assert_eq!(h.pointer("current"), None);
}

#[tokio::test]
async fn test_git_that_cannot_start_is_a_build_error() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.runner.missing_program("git clone");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("build"));
    assert!(outcome.cause.unwrap().contains("git clone"));
    assert!(h.releases().is_empty());
}

#[tokio::test]
async fn test_pip_that_cannot_start_is_a_build_error() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.runner.missing_program("-m venv");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("build"));
    assert!(h.runner.commands_of("systemctl").is_empty());
}

#[tokio::test]
async fn test_retirement_error_does_not_fail_deploy() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());
    seed_releases(&h, &[1_600_000_001, 1_600_000_002, 1_600_000_003, 1_600_000_004]);
    // a directory where the previous link belongs cannot be read as a pointer
    std::fs::create_dir(h.root().join("previous")).unwrap();

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert!(outcome.is_success(), "{:?}", outcome.cause);
    assert!(h.pointer("current").is_some());
    assert_eq!(h.releases().len(), 5);
}

#[tokio::test]
async fn test_docker_release_builds_tagged_image() {
    let h = Harness::new("port: 8000\n");
    h.runner
        .serve_app_config("name: shop\ntype: docker\nhealthCheck: /health\n");
    h.runner.checkout_file("Dockerfile", "FROM python:3.12\n", false);
    h.http.route("/health", Reply::ok());

    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());

    let id = h.pointer("current").unwrap();
    let docker = h.runner.commands_of("docker");
    assert!(docker[0].starts_with(&format!("docker build -t shop:{} ", id)));
    assert_eq!(docker[1], format!("docker tag shop:{} shop:latest", id));
    assert_eq!(docker[2], "docker images shop --format {{.Tag}}");
}

#[tokio::test]
async fn test_image_prune_failures_are_warnings() {
    let h = Harness::new("port: 8000\n");
    h.runner
        .serve_app_config("name: shop\ntype: docker\nhealthCheck: /health\n");
    h.runner.checkout_file("Dockerfile", "FROM python:3.12\n", false);
    h.runner.respond("docker images", "latest\n1\n2\n3\n4\n5\n");
    h.runner.fail("docker rmi", "conflict: unable to remove repository reference");
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert!(outcome.is_success(), "{:?}", outcome.cause);
    let docker = h.runner.commands_of("docker");
    assert_eq!(docker[3..], ["docker rmi shop:1".to_string(), "docker rmi shop:2".to_string()]);
}

#[tokio::test]
async fn test_image_listing_failure_is_a_warning() {
    let h = Harness::new("port: 8000\n");
    h.runner
        .serve_app_config("name: shop\ntype: docker\nhealthCheck: /health\n");
    h.runner.checkout_file("Dockerfile", "FROM python:3.12\n", false);
    h.runner.fail("docker images", "Cannot connect to the Docker daemon");
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert!(outcome.is_success(), "{:?}", outcome.cause);
    assert!(h.runner.commands_of("docker").iter().all(|c| !c.contains("rmi")));
}

#[tokio::test]
async fn test_missing_app_config() {
    let h = Harness::new("port: 8000\n");
    h.runner.fail(":deploy.yml", "fatal: path 'deploy.yml' does not exist");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("configuration"));
    assert!(outcome.cause.unwrap().contains("deploy.yml not found"));
    assert!(outcome.app.is_none());
    assert!(h.releases().is_empty());
}

#[tokio::test]
async fn test_unsupported_app_type_fails_before_side_effects() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config("name: shop\ntype: node\nhealthCheck: /health\n");

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("configuration"));
    assert!(h.runner.commands_of("git").iter().all(|c| !c.contains("clone")));
}

#[tokio::test]
async fn test_missing_host_config() {
    let h = Harness::new("port: 8000\n");
    std::fs::remove_file(h.root().join("config.yml")).unwrap();
    h.runner.serve_app_config(SIMPLE_APP);

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;
    assert_eq!(outcome.error_kind.as_deref(), Some("configuration"));
}

#[tokio::test]
async fn test_missing_deployment_root() {
    let h = Harness::new("port: 8000\n");
    let missing = h.root().join("nope");

    let outcome = orchestrator(&h).execute(&h.source(), "A", &missing).await;
    assert_eq!(outcome.error_kind.as_deref(), Some("configuration"));
    assert!(h.runner.calls().is_empty());
}

// ================================= ROLLING ================================== //

const ROLLING_APP: &str = r#"
name: shop
type: python
healthCheck: /health
deployment:
  strategy: rolling
  batchDelay: 3
"#;

#[tokio::test]
async fn test_rolling_waits_batch_delay() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(ROLLING_APP);
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert!(outcome.is_success());
    assert_eq!(
        h.runner.commands_of("systemctl"),
        vec!["systemctl reload-or-restart shop"]
    );
    assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn test_rolling_falls_back_to_restart() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(ROLLING_APP);
    h.runner.fail("reload-or-restart", "Job type reload is not applicable");
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert!(outcome.is_success());
    assert_eq!(
        h.runner.commands_of("systemctl"),
        vec!["systemctl reload-or-restart shop", "systemctl restart shop"]
    );
}

#[tokio::test]
async fn test_rolling_reload_failure_is_fatal_without_rollback() {
    let h = Harness::new("port: 8000\nmanager: pm2\n");
    h.runner.serve_app_config(ROLLING_APP);
    h.http.route("/health", Reply::ok());
    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());
    let release_a = h.pointer("current").unwrap();

    h.runner.fail("pm2 reload shop --update-env", "process not found");
    let outcome = orchestrator(&h).execute(&h.source(), "B", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("activation"));
    // pointers stay where activation left them
    assert_ne!(h.pointer("current"), Some(release_a.clone()));
    assert_eq!(h.pointer("previous"), Some(release_a));
    assert_eq!(h.http.requests_to("/health"), 1);
}

#[tokio::test]
async fn test_systemctl_that_cannot_start_is_an_activation_error() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(ROLLING_APP);
    h.runner.missing_program("systemctl");
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("activation"));
    assert_eq!(h.http.requests_to("/health"), 0);
}

#[tokio::test]
async fn test_rolling_health_failure_rolls_back_gracefully() {
    let h = Harness::new("port: 8000\nmanager: pm2\n");
    h.runner.serve_app_config(ROLLING_APP);
    h.http.route("/health", Reply::ok());
    assert!(orchestrator(&h).execute(&h.source(), "A", h.root()).await.is_success());
    let release_a = h.pointer("current").unwrap();

    h.http.route("/health", Reply::status(503));
    let outcome = orchestrator(&h).execute(&h.source(), "B", h.root()).await;

    assert_eq!(outcome.error_kind.as_deref(), Some("health_check"));
    assert_eq!(h.pointer("current"), Some(release_a));
    assert_eq!(
        h.runner.commands_of("pm2"),
        vec![
            "pm2 reload shop --update-env",
            "pm2 reload shop --update-env",
            "pm2 reload shop --update-env",
        ]
    );
}

// ================================ BOUNDARY ================================== //

struct PanickingRunner;

#[async_trait]
impl CommandRunner for PanickingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        panic!("unexpected command: {}", spec);
    }
}

#[tokio::test]
async fn test_panic_becomes_failure_outcome() {
    let h = Harness::new("port: 8000\n");
    let toolkit = Toolkit {
        runner: Arc::new(PanickingRunner),
        ..h.toolkit()
    };

    let outcome = Orchestrator::new(toolkit, Timings::immediate())
        .execute(&h.source(), "A", h.root())
        .await;

    assert_eq!(outcome.error_kind.as_deref(), Some("internal"));
    assert!(outcome.cause.unwrap().contains("unexpected command"));
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let h = Harness::new("port: 8000\n");
    h.runner.serve_app_config(SIMPLE_APP);
    h.http.route("/health", Reply::ok());

    let outcome = orchestrator(&h).execute(&h.source(), "A", h.root()).await;
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["app"], "shop");
    assert_eq!(json["strategy"], "simple");
    assert_eq!(json["active"]["kind"], "release");
    assert!(json.get("cause").is_none());
}
