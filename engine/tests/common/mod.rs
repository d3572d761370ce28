//! Fakes for the engine's external collaborators.
//!
//! Every fake records what it was asked to do so tests can assert on exact
//! command sequences, probe attempts and sleep durations.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use shipwright::clock::Sleeper;
use shipwright::config::host::ManagerKind;
use shipwright::exec::{CommandOutput, CommandRunner, CommandSpec};
use shipwright::health::{HttpClient, HttpResponse};
use shipwright::procman::{ProcessManager, ServiceSpec};
use shipwright::strategy::Toolkit;
use shipwright::DeployError;

// ================================ COMMANDS ================================== //

struct Rule {
    pattern: String,
    /// `None` means the program could not be spawned
    output: Option<CommandOutput>,
}

/// Records commands instead of running them.
///
/// Commands succeed with empty output unless a rule matches. A `git clone`
/// creates its target directory and fills it with the configured files so
/// the rest of the pipeline sees a real tree.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    rules: Mutex<Vec<Rule>>,
    checkout_files: Mutex<Vec<(String, String, bool)>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands whose rendered form contains `pattern` print `stdout` and succeed
    pub fn respond(&self, pattern: &str, stdout: &str) {
        self.rule(
            pattern,
            CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Commands whose rendered form contains `pattern` exit 1 with `stderr`
    pub fn fail(&self, pattern: &str, stderr: &str) {
        self.rule(
            pattern,
            CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Commands whose rendered form contains `pattern` cannot be spawned
    pub fn missing_program(&self, pattern: &str) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            output: None,
        });
    }

    /// Serve `deploy.yml` for every revision
    pub fn serve_app_config(&self, yaml: &str) {
        self.respond(":deploy.yml", yaml);
    }

    /// File written into every checkout
    pub fn checkout_file(&self, name: &str, contents: &str, executable: bool) {
        self.checkout_files
            .lock()
            .unwrap()
            .push((name.to_string(), contents.to_string(), executable));
    }

    fn rule(&self, pattern: &str, output: CommandOutput) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            output: Some(output),
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered commands, e.g. `systemctl reload shop`
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    /// Rendered commands starting with `program`
    pub fn commands_of(&self, program: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| c.program == program)
            .map(|c| c.to_string())
            .collect()
    }

    fn populate_checkout(&self, target: &Path) {
        std::fs::create_dir_all(target).unwrap();
        for (name, contents, executable) in self.checkout_files.lock().unwrap().iter() {
            let path = target.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, contents).unwrap();
            if *executable {
                make_executable(&path);
            }
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.calls.lock().unwrap().push(spec.clone());
        let rendered = spec.to_string();

        let matched = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|rule| rendered.contains(&rule.pattern))
            .map(|rule| rule.output.clone());
        let output = match matched {
            Some(Some(output)) => output,
            Some(None) => {
                return Err(DeployError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{}: command not found", spec.program),
                )))
            }
            None => CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            },
        };

        if output.success() && spec.program == "git" && spec.args.first().map(String::as_str) == Some("clone") {
            if let Some(target) = spec.args.last() {
                self.populate_checkout(Path::new(target));
            }
        }
        Ok(output)
    }
}

#[cfg(unix)]
pub fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) {}

// ================================== HTTP ==================================== //

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Refused,
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status(200, "ok".to_string())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }
}

struct Route {
    url_part: String,
    script: VecDeque<Reply>,
    fallback: Reply,
}

/// Scripted HTTP endpoints; unrouted URLs refuse connections
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<(Method, String)>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// URLs containing `url_part` always answer `reply`
    pub fn route(&self, url_part: &str, reply: Reply) {
        self.script(url_part, Vec::new(), reply);
    }

    /// URLs containing `url_part` answer `script` in order, then `fallback`
    pub fn script(&self, url_part: &str, script: Vec<Reply>, fallback: Reply) {
        self.routes.lock().unwrap().push(Route {
            url_part: url_part.to_string(),
            script: script.into(),
            fallback,
        });
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url_part: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(_, url)| url.contains(url_part))
            .count()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn request(
        &self,
        method: Method,
        url: &str,
        _timeout: Duration,
    ) -> Result<HttpResponse, DeployError> {
        self.requests.lock().unwrap().push((method, url.to_string()));

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().rev().find(|r| url.contains(&r.url_part)) {
                Some(route) => route.script.pop_front().unwrap_or_else(|| route.fallback.clone()),
                None => Reply::Refused,
            }
        };
        match reply {
            Reply::Status(status, body) => Ok(HttpResponse { status, body }),
            Reply::Refused => Err(DeployError::Internal(format!("connection refused: {}", url))),
        }
    }
}

// ================================= SLEEPS =================================== //

/// Returns immediately and remembers every requested wait
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

// ============================ PROCESS MANAGER =============================== //

/// Records process manager calls as `"<action> <name>"` strings
#[derive(Default)]
pub struct FakeProcessManager {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
}

impl FakeProcessManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `action` (`reload`, `graceful_reload`, `start`, `ensure_running`, `stop`) fail
    pub fn fail_on(&self, action: &str) {
        self.failing.lock().unwrap().push(action.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, action: &str, detail: String) -> Result<(), DeployError> {
        self.calls.lock().unwrap().push(format!("{} {}", action, detail));
        if self.failing.lock().unwrap().iter().any(|a| a == action) {
            return Err(DeployError::ActivationError(format!("{} failed", action)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessManager for FakeProcessManager {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Systemd
    }

    async fn reload(&self, name: &str) -> Result<(), DeployError> {
        self.record("reload", name.to_string())
    }

    async fn graceful_reload(&self, name: &str) -> Result<(), DeployError> {
        self.record("graceful_reload", name.to_string())
    }

    async fn start(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        self.record("start", format!("{}:{}", service.name, service.port))
    }

    async fn ensure_running(&self, service: &ServiceSpec) -> Result<(), DeployError> {
        self.record("ensure_running", format!("{}:{}", service.name, service.port))
    }

    async fn stop(&self, name: &str) -> Result<(), DeployError> {
        self.record("stop", name.to_string())
    }
}

// ================================ HARNESS =================================== //

pub const SIMPLE_APP: &str = r#"
name: shop
type: python
healthCheck: /health
"#;

/// A deployment root in a temp dir plus a full set of fakes
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub runner: Arc<FakeRunner>,
    pub http: Arc<FakeHttp>,
    pub sleeper: Arc<RecordingSleeper>,
}

impl Harness {
    /// Deployment root with a `config.yml` holding `host_config`
    pub fn new(host_config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yml"), host_config).unwrap();
        Self {
            dir,
            runner: FakeRunner::new(),
            http: FakeHttp::new(),
            sleeper: RecordingSleeper::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> PathBuf {
        PathBuf::from("/srv/git/shop.git")
    }

    pub fn toolkit(&self) -> Toolkit {
        Toolkit {
            runner: self.runner.clone(),
            http: self.http.clone(),
            sleeper: self.sleeper.clone(),
        }
    }

    /// File name the pointer at `name` resolves to, if set
    pub fn pointer(&self, name: &str) -> Option<String> {
        let target = std::fs::read_link(self.root().join(name)).ok()?;
        target.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    /// Release directory names, ascending
    pub fn releases(&self) -> Vec<String> {
        let dir = self.root().join("releases");
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
