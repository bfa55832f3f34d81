//! Unit tests for the deployment pipeline.
//!
//! Each test stages a scratch host under a temporary directory, re-roots the
//! default layout into it, and drives [`Deployer`] with stubbed commands,
//! probes and operator answers.

use super::{Deployer, RunOptions};
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::manifest::ArtifactKind;
use crate::prompt::MockOperatorPrompt;
use crate::report::{Step, StepStatus};
use crate::test_utils::{ScriptedPrompt, StubExecutor, StubProber};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const ALL_FILES: [&str; 4] = [
    "fractal_app.py",
    "fractal.service",
    "fractal_nginx.conf",
    "nginx.conf",
];

struct Host {
    _dir: TempDir,
    source: Utf8PathBuf,
    config: DeployConfig,
}

impl Host {
    fn with_files(self, names: &[&str]) -> Self {
        for name in names {
            fs::write(self.source.join(name), format!("contents of {name}"))
                .expect("write source file");
        }
        self
    }
}

#[fixture]
fn host() -> Host {
    let dir = TempDir::new().expect("failed to create temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp path not UTF-8");
    let source = root.join("deploy");
    fs::create_dir_all(&source).expect("create source dir");
    let config = DeployConfig {
        source_dir: source.clone(),
        ..DeployConfig::default()
    }
    .rooted(&root.join("host"));
    Host {
        _dir: dir,
        source,
        config,
    }
}

fn no_sleep(_: Duration) {}

const QUIET: RunOptions = RunOptions {
    skip_install: true,
    print_summary: false,
};

#[rstest]
fn full_run_places_every_file_and_writes_receipt(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new();
    let prober = StubProber::new();
    let prompt = ScriptedPrompt::answering(false);
    let mut stderr = Vec::new();

    let result = Deployer::new(&host.config, &executor, &prober, &prompt)
        .with_options(QUIET)
        .with_sleep(no_sleep)
        .run(&mut stderr)
        .expect("deployment should succeed");

    assert!(!prompt.was_asked());
    assert_eq!(result.deployed.len(), 4);
    let steps: Vec<Step> = result.steps.iter().map(|record| record.step).collect();
    assert_eq!(
        steps,
        std::iter::successors(Some(Step::FIRST), |step| step.next()).collect::<Vec<_>>()
    );
    assert_eq!(result.status_of(Step::Install), Some(StepStatus::Skipped));
    assert_eq!(result.probes_passed(), 4);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let paths = &host.config.paths;
    assert_eq!(
        fs::read_to_string(&paths.main_config).expect("read main config"),
        "contents of nginx.conf"
    );
    assert!(paths.receipt.is_file());
    assert!(stderr.is_empty());
    #[cfg(unix)]
    assert_eq!(
        fs::read_link(&paths.site_enabled).expect("site link"),
        paths.site_available.as_std_path()
    );
}

#[rstest]
fn run_issues_service_commands_in_order(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new();

    Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("deployment should succeed");

    assert_eq!(
        executor.calls(),
        vec![
            "systemctl daemon-reload",
            "systemctl enable fractal",
            "systemctl restart fractal",
            "nginx -t",
            "systemctl restart nginx",
            "systemctl is-active fractal",
            "systemctl is-active nginx",
        ]
    );
}

#[rstest]
fn missing_source_dir_fails_before_anything_runs(host: Host) {
    let config = DeployConfig {
        source_dir: host.source.join("absent"),
        ..host.config.clone()
    };
    let executor = StubExecutor::new();
    let prompt = ScriptedPrompt::answering(true);

    let err = Deployer::new(&config, &executor, &StubProber::new(), &prompt)
        .with_options(QUIET)
        .with_sleep(no_sleep)
        .run(&mut Vec::new())
        .expect_err("missing source directory should abort");

    assert!(matches!(err, DeployError::SourceDirMissing { .. }));
    assert!(!prompt.was_asked());
    assert!(executor.calls().is_empty());
    assert!(!config.paths.app_dir.exists());
}

#[rstest]
fn declined_prompt_aborts_without_copying(host: Host) {
    let host = host.with_files(&["fractal_app.py", "nginx.conf"]);
    let executor = StubExecutor::new();
    let mut prompt = MockOperatorPrompt::new();
    prompt
        .expect_confirm()
        .withf(|question| question.starts_with("2 of 4 deployment files are missing"))
        .times(1)
        .returning(|_| Ok(false));

    let err = Deployer::new(&host.config, &executor, &StubProber::new(), &prompt)
        .with_options(QUIET)
        .with_sleep(no_sleep)
        .run(&mut Vec::new())
        .expect_err("declining should abort");

    assert!(matches!(
        err,
        DeployError::OperatorDeclined { ref missing }
            if missing == &[ArtifactKind::ServiceUnit, ArtifactKind::SiteConfig]
    ));
    assert!(!host.config.paths.app_dir.exists());
    assert!(!host.config.paths.main_config.exists());
    assert!(executor.calls().is_empty());
}

#[rstest]
fn accepted_prompt_deploys_what_is_present(host: Host) {
    let host = host.with_files(&["fractal_app.py", "fractal.service", "nginx.conf"]);
    let prompt = ScriptedPrompt::answering(true);

    let result = Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &StubProber::new(),
        &prompt,
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("deployment should continue");

    assert!(prompt.was_asked());
    assert_eq!(result.missing, vec![ArtifactKind::SiteConfig]);
    assert_eq!(result.deployed.len(), 3);
    assert!(result.destination_of(ArtifactKind::SiteConfig).is_none());
    assert!(!host.config.paths.site_enabled.exists());
    assert_eq!(result.warnings.len(), 1);
}

#[rstest]
fn failed_config_test_stops_before_restart(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new().fail_on("nginx -t", "unexpected end of file");

    let err = Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect_err("configuration test failure should abort");

    assert!(matches!(
        err,
        DeployError::ConfigTestFailed { ref message } if message == "unexpected end of file"
    ));
    assert!(executor.was_invoked("nginx -t"));
    assert!(!executor.was_invoked("systemctl restart nginx"));
    assert!(!executor.was_invoked("systemctl is-active nginx"));
}

#[rstest]
fn failed_app_service_commands_are_warnings(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new()
        .fail_on("systemctl enable fractal", "unit not found")
        .fail_on("systemctl is-active fractal", "inactive");

    let result = Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("service warnings are not fatal");

    assert!(executor.was_invoked("systemctl restart nginx"));
    assert!(result.warnings.iter().any(|w| w.contains("unit not found")));
    assert!(result.warnings.iter().any(|w| w.contains("fractal is not active")));
}

#[rstest]
fn failed_probes_are_reported_not_fatal(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let prober = StubProber::new().unreachable("http://localhost/light");

    let result = Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &prober,
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("probe failures are not fatal");

    assert_eq!(prober.requested().len(), 4);
    assert_eq!(result.probes_passed(), 3);
    assert_eq!(result.status_of(Step::Report), Some(StepStatus::Succeeded));
    assert!(result.warnings.iter().any(|w| w.contains("nginx light render")));
}

#[rstest]
fn install_step_checks_and_installs_packages(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new().fail_on("which nginx", "");

    Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(RunOptions {
        skip_install: false,
        print_summary: false,
    })
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("deployment should succeed");

    let calls = executor.calls();
    let install: Vec<&str> = calls.iter().take(5).map(String::as_str).collect();
    assert_eq!(
        install,
        vec![
            "which nginx",
            "which pip3",
            "apt-get update",
            "apt-get install -y nginx",
            "pip3 install flask numpy matplotlib werkzeug",
        ]
    );
}

#[rstest]
fn failed_package_install_is_fatal(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let executor = StubExecutor::new().fail_on(
        "pip3 install flask numpy matplotlib werkzeug",
        "no matching distribution",
    );

    let err = Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(RunOptions {
        skip_install: false,
        print_summary: false,
    })
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect_err("install failure should abort");

    assert!(matches!(err, DeployError::PackageInstall { .. }));
    assert!(!host.config.paths.app_dir.exists());
}

#[rstest]
fn existing_configuration_is_backed_up_before_overwrite(host: Host) {
    let host = host.with_files(&ALL_FILES);
    let main_config = host.config.paths.main_config.clone();
    fs::create_dir_all(main_config.parent().expect("parent")).expect("create nginx dir");
    fs::write(&main_config, "worker_processes 1;").expect("write existing config");

    let result = Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("deployment should succeed");

    assert_eq!(result.backups.len(), 1);
    let backup = result.backups.first().expect("one backup");
    assert!(backup.as_str().starts_with(&format!("{main_config}.backup.")));
    assert_eq!(
        fs::read_to_string(backup).expect("read backup"),
        "worker_processes 1;"
    );
    assert_eq!(
        fs::read_to_string(&main_config).expect("read new config"),
        "contents of nginx.conf"
    );
}

#[cfg(unix)]
#[rstest]
fn failed_backup_is_a_warning_and_deploy_continues(host: Host) {
    use std::os::unix::net::UnixListener;

    let host = host.with_files(&ALL_FILES);
    let app_dir = host.config.paths.app_dir.clone();
    fs::create_dir_all(&app_dir).expect("create app dir");
    // A socket cannot be opened for copying, whoever runs the test.
    let _socket = UnixListener::bind(app_dir.join("app.sock")).expect("bind socket");

    let result = Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("a failed backup is not fatal");

    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.starts_with(&format!("could not back up {app_dir}"))),
        "warnings: {:?}",
        result.warnings
    );
    assert_eq!(result.deployed.len(), ALL_FILES.len());
    assert_eq!(
        fs::read_to_string(app_dir.join("fractal_app.py")).expect("read deployed app"),
        "contents of fractal_app.py"
    );
    assert_eq!(result.status_of(Step::Report), Some(StepStatus::Succeeded));
}

#[rstest]
fn static_assets_are_swept_into_app_dir(host: Host) {
    let host = host.with_files(&ALL_FILES);
    fs::write(host.source.join("favicon.ico"), [0_u8, 1, 2]).expect("write asset");

    let result = Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(QUIET)
    .with_sleep(no_sleep)
    .run(&mut Vec::new())
    .expect("deployment should succeed");

    assert_eq!(result.assets, vec![host.config.paths.app_dir.join("favicon.ico")]);
}

#[rstest]
fn summary_is_printed_when_requested(host: Host) {
    colored::control::set_override(false);
    let host = host.with_files(&ALL_FILES);
    let mut stderr = Vec::new();

    Deployer::new(
        &host.config,
        &StubExecutor::new(),
        &StubProber::new(),
        &ScriptedPrompt::answering(true),
    )
    .with_options(RunOptions {
        skip_install: true,
        print_summary: true,
    })
    .with_sleep(no_sleep)
    .run(&mut stderr)
    .expect("deployment should succeed");

    let text = String::from_utf8(stderr).expect("stderr not UTF-8");
    assert!(text.contains("deployment summary"));
    assert!(text.contains("4/4 probes passed"));
}

#[rstest]
fn dry_run_changes_nothing(host: Host) {
    let host = host.with_files(&["fractal_app.py"]);
    let executor = StubExecutor::new();
    let mut stderr = Vec::new();

    Deployer::new(
        &host.config,
        &executor,
        &StubProber::new(),
        &ScriptedPrompt::answering(false),
    )
    .dry_run(&mut stderr)
    .expect("dry run should succeed");

    let text = String::from_utf8(stderr).expect("stderr not UTF-8");
    assert!(text.contains("[missing]"));
    assert!(executor.calls().is_empty());
    assert!(!host.config.paths.app_dir.exists());
}
