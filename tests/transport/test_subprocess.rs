//! Tests for launching the `droid` executable

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kodegen_droid_agent::transport::subprocess::{CommandBuilder, DANGEROUS_ENV_VARS};
use kodegen_droid_agent::{
    DefaultResolver, DroidError, ExecutableResolver, Launcher, Result, SessionOptions,
    SubprocessLauncher,
};

struct MissingResolver;

impl ExecutableResolver for MissingResolver {
    fn resolve(&self) -> Result<PathBuf> {
        Err(DroidError::executable_not_found())
    }
}

fn args_of(options: &SessionOptions) -> Vec<String> {
    let cmd = CommandBuilder::new(Path::new("/opt/factory/droid"), options).build();
    cmd.as_std()
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_command_uses_stream_jsonrpc_on_both_ends() {
    let options = SessionOptions::builder().cwd("/srv/project").build();
    let args = args_of(&options);

    assert_eq!(
        args,
        [
            "exec",
            "--input-format",
            "stream-jsonrpc",
            "--output-format",
            "stream-jsonrpc",
            "--cwd",
            "/srv/project",
        ]
    );
}

#[test]
fn test_command_passes_only_allowlisted_flags() {
    let options = SessionOptions::builder()
        .cwd("/srv/project")
        .extra_arg("model", Some("glm-4.6".to_string()))
        .extra_arg("skip-permissions-unsafe", None)
        .extra_arg("log-level", Some("debug".to_string()))
        .build();
    let args = args_of(&options);

    let tail = &args[7..];
    assert_eq!(tail, ["--log-level", "debug", "--model", "glm-4.6"]);
    assert!(!args.iter().any(|a| a.contains("skip-permissions")));
}

#[test]
fn test_command_passes_configured_model() {
    let options = SessionOptions::builder()
        .cwd("/srv/project")
        .model("glm-4.6")
        .extra_arg("model", Some("other-model".to_string()))
        .extra_arg("reasoning-effort", Some("high".to_string()))
        .build();
    let args = args_of(&options);

    assert_eq!(
        &args[7..],
        ["--model", "glm-4.6", "--reasoning-effort", "high"]
    );
}

#[test]
fn test_command_filters_dangerous_environment() {
    let options = SessionOptions::builder()
        .cwd("/srv/project")
        .env("FACTORY_API_KEY", "fk-test")
        .env("LD_PRELOAD", "/tmp/evil.so")
        .env("NODE_OPTIONS", "--inspect")
        .build();
    let cmd = CommandBuilder::new(Path::new("droid"), &options).build();
    let envs: Vec<_> = cmd.as_std().get_envs().collect();

    assert!(envs.contains(&(OsStr::new("FACTORY_API_KEY"), Some(OsStr::new("fk-test")))));
    for (key, _) in &envs {
        let key = key.to_string_lossy();
        assert!(
            !DANGEROUS_ENV_VARS.contains(&key.as_ref()),
            "{key} leaked into the child environment"
        );
    }
}

#[test]
fn test_explicit_resolver_path_wins() {
    let resolver = DefaultResolver::with_path("/opt/factory/bin/droid");
    assert_eq!(
        resolver.resolve().unwrap(),
        PathBuf::from("/opt/factory/bin/droid")
    );
}

#[test]
fn test_unresolvable_executable_is_reported() {
    let launcher = SubprocessLauncher::with_resolver(Arc::new(MissingResolver));
    let options = SessionOptions::builder().cwd(std::env::temp_dir()).build();

    match launcher.launch(&options) {
        Err(DroidError::ExecutableNotFound(msg)) => assert!(msg.contains("DROID_BIN")),
        Err(other) => panic!("expected ExecutableNotFound, got {other}"),
        Ok(_) => panic!("launch should fail"),
    }
}

#[tokio::test]
async fn test_nonexistent_executable_fails_to_spawn() {
    let resolver = DefaultResolver::with_path("/nonexistent/path/to/droid");
    let launcher = SubprocessLauncher::with_resolver(Arc::new(resolver));
    let options = SessionOptions::builder().cwd(std::env::temp_dir()).build();

    match launcher.launch(&options) {
        Err(DroidError::Spawn(msg)) => assert!(msg.contains("/nonexistent/path/to/droid")),
        Err(other) => panic!("expected Spawn, got {other}"),
        Ok(_) => panic!("launch should fail"),
    }
}

#[tokio::test]
async fn test_missing_working_directory_is_named() {
    let resolver = DefaultResolver::with_path("/nonexistent/path/to/droid");
    let launcher = SubprocessLauncher::with_resolver(Arc::new(resolver));
    let options = SessionOptions::builder()
        .cwd("/nonexistent/workspace")
        .build();

    match launcher.launch(&options) {
        Err(DroidError::Spawn(msg)) => assert!(msg.contains("/nonexistent/workspace")),
        Err(other) => panic!("expected Spawn, got {other}"),
        Ok(_) => panic!("launch should fail"),
    }
}
