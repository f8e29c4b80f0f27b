use super::LaunchError;
use super::resolve::ResolvedLaunch;
use crate::logging;
use std::convert::Infallible;
use std::env;
use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

/// Locates the first command token on the `PATH` of the final environment.
pub fn locate_program(launch: &ResolvedLaunch) -> Result<PathBuf, LaunchError> {
    let program = launch.program().ok_or(LaunchError::EmptyCommand)?;
    let search_path = launch.env.get(OsStr::new("PATH"));
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

    which::which_in(program, search_path, cwd).map_err(|source| LaunchError::NotFound {
        program: program.to_string_lossy().into_owned(),
        source,
    })
}

/// Replaces the current process with the resolved command.
///
/// The `Ok` side is uninhabited: when this returns, the exec failed.
pub fn replace_process(launch: &ResolvedLaunch) -> Result<Infallible, LaunchError> {
    let program = locate_program(launch)?;
    let (argv0, args) = launch
        .command
        .split_first()
        .ok_or(LaunchError::EmptyCommand)?;

    logging::flush();

    let source = Command::new(&program)
        .arg0(argv0)
        .args(args)
        .env_clear()
        .envs(&launch.env)
        .exec();

    Err(LaunchError::Exec { program, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::ffi::OsString;

    fn launch_with(command: &[&str], path: Option<&str>) -> ResolvedLaunch {
        let mut env = BTreeMap::new();
        if let Some(path) = path {
            env.insert(OsString::from("PATH"), OsString::from(path));
        }
        ResolvedLaunch {
            game_id: "test".into(),
            override_path: None,
            command: command.iter().map(OsString::from).collect(),
            env,
        }
    }

    #[test]
    fn program_is_found_on_final_path() {
        let temp = tempfile::tempdir().unwrap();
        let tool = temp.path().join("wrapper-tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let launch = launch_with(
            &["wrapper-tool", "/games/x"],
            Some(temp.path().to_str().unwrap()),
        );
        assert_eq!(locate_program(&launch).unwrap(), tool);
    }

    #[test]
    fn missing_program_fails_before_exec() {
        let launch = launch_with(&["steamos-diy-missing-wrapper"], Some("/nonexistent"));
        match replace_process(&launch) {
            Err(LaunchError::NotFound { program, .. }) => {
                assert_eq!(program, "steamos-diy-missing-wrapper")
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(never) => match never {},
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        let launch = launch_with(&[], Some("/usr/bin"));
        assert!(matches!(
            locate_program(&launch),
            Err(LaunchError::EmptyCommand)
        ));
    }
}
