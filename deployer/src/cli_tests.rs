//! Tests for deployer CLI parsing and config overrides.

use super::*;
use crate::config::CONFIG_ENV_VAR;
use rstest::rstest;
use std::io::Write;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["fractal-deploy"]);
    assert!(cli.source_dir.is_none());
    assert!(cli.config.is_none());
    assert!(cli.root.is_none());
    assert!(!cli.assume_yes);
    assert!(!cli.skip_install);
    assert!(!cli.dry_run);
    assert!(!cli.json);
    assert!(!cli.no_color);
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[test]
fn cli_parses_source_dir_and_root() {
    let cli = Cli::parse_from([
        "fractal-deploy",
        "-s",
        "/srv/release",
        "--root",
        "/tmp/stage",
    ]);
    assert_eq!(cli.source_dir, Some(Utf8PathBuf::from("/srv/release")));
    assert_eq!(cli.root, Some(Utf8PathBuf::from("/tmp/stage")));
}

#[rstest]
#[case::short("-y")]
#[case::long("--assume-yes")]
fn cli_parses_assume_yes(#[case] flag: &str) {
    let cli = Cli::parse_from(["fractal-deploy", flag]);
    assert!(cli.assume_yes);
}

#[rstest]
#[case::single("-v", 1)]
#[case::double("-vv", 2)]
#[case::long("--verbose", 1)]
fn cli_counts_verbosity(#[case] flag: &str, #[case] expected: u8) {
    let cli = Cli::parse_from(["fractal-deploy", flag]);
    assert_eq!(cli.verbosity, expected);
}

#[test]
fn cli_rejects_verbose_with_quiet() {
    let result = Cli::try_parse_from(["fractal-deploy", "-v", "-q"]);
    assert!(result.is_err());
}

#[rstest]
#[case::defaults(&[], false, true)]
#[case::skip_install(&["--skip-install"], true, true)]
#[case::json_suppresses_summary(&["--json"], false, false)]
#[case::quiet_suppresses_summary(&["--quiet"], false, false)]
fn run_options_follow_flags(
    #[case] flags: &[&str],
    #[case] skip_install: bool,
    #[case] print_summary: bool,
) {
    let cli = Cli::parse_from(std::iter::once("fractal-deploy").chain(flags.iter().copied()));
    assert_eq!(
        cli.run_options(),
        RunOptions {
            skip_install,
            print_summary,
        }
    );
}

#[test]
fn resolve_config_applies_overrides_then_root() {
    let cli = Cli {
        source_dir: Some(Utf8PathBuf::from("/srv/release")),
        root: Some(Utf8PathBuf::from("/tmp/stage")),
        receipt: Some(Utf8PathBuf::from("/root/receipt.txt")),
        ..Cli::default()
    };

    let config = temp_env::with_var_unset(CONFIG_ENV_VAR, || cli.resolve_config())
        .expect("defaults should load");

    assert_eq!(config.source_dir, "/srv/release");
    assert_eq!(config.paths.receipt, "/tmp/stage/root/receipt.txt");
    assert_eq!(config.paths.main_config, "/tmp/stage/etc/nginx/nginx.conf");
    assert_eq!(config.paths.log_file, "/tmp/stage/var/log/fractal-deploy.log");
}

#[test]
fn resolve_config_reads_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create config file");
    writeln!(file, "source_dir = \"/srv/from-file\"\n\n[services]\napp_service = \"fractal-web\"")
        .expect("write config");
    let path = Utf8PathBuf::try_from(file.path().to_path_buf()).expect("temp path not UTF-8");
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let config = cli.resolve_config().expect("config should load");

    assert_eq!(config.source_dir, "/srv/from-file");
    assert_eq!(config.services.app_service, "fractal-web");
    assert_eq!(config.services.web_service, "nginx");
}

#[test]
fn resolve_config_reports_unknown_keys() {
    let mut file = tempfile::NamedTempFile::new().expect("create config file");
    writeln!(file, "sorce_dir = \"typo\"").expect("write config");
    let path = Utf8PathBuf::try_from(file.path().to_path_buf()).expect("temp path not UTF-8");
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let err = cli.resolve_config().expect_err("unknown key should be rejected");
    assert!(err.to_string().contains("invalid configuration"));
}
