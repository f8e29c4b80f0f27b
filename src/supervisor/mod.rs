//! Session supervisor: runs the persisted session, then flips to the other one.
//!
//! Each iteration re-reads the session state, blocks on the matching session
//! child, and persists the opposite target once that child exits for any
//! reason. A switch request from outside only has to rewrite the state file
//! and end the running child; the next iteration picks the new session up.
//!
//! SIGTERM/SIGINT/SIGHUP sent to the supervisor are forwarded to the running
//! child and stop the loop without touching the state file.

mod command;
mod runner;

pub use command::{
    DEFAULT_COMPOSITOR_FLAGS, EXPORTED_ENV_PREFIXES, STEAM_CLIENT_FLAGS, SessionCommand,
    SessionCommands, SessionEnv, compositor_flags, is_exported_key,
};
pub use runner::{ChildExit, ProcessRunner, SessionRunner};

use crate::config::types::KEY_NEXT_SESSION;
use crate::config::{ConfigError, GlobalConfig, KvConfig};
use crate::session::{SessionState, SessionTarget};
use anyhow::{Context, Result};
use log::{error, info, warn};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use std::time::Duration;

/// Pause between iterations; keeps a crashing session from spinning.
pub const ITERATION_PAUSE: Duration = Duration::from_millis(500);

/// Next session after `current` ended. Every exit flips the target.
pub fn next_state(current: SessionTarget, _exit: ChildExit) -> SessionTarget {
    current.opposite()
}

pub struct Supervisor {
    state: SessionState,
    commands: SessionCommands,
    env: SessionEnv,
    runner: Arc<dyn SessionRunner>,
    should_quit: Arc<AtomicBool>,
    current_child: Arc<AtomicI32>,
    pause: Duration,
}

impl Supervisor {
    /// Builds a supervisor from the SSoT and the user manifesto.
    ///
    /// # Errors
    /// Fails if `next_session` or any session binary is missing from the SSoT.
    pub fn from_config(global: &GlobalConfig) -> Result<Self, ConfigError> {
        let state = SessionState::new(global.require(KEY_NEXT_SESSION)?);
        let manifesto = KvConfig::load_optional(&global.user_config());
        let commands = SessionCommands::from_config(global, &manifesto)?;
        let env = SessionEnv::from_process(global.values());

        let should_quit = Arc::new(AtomicBool::new(false));
        let current_child = Arc::new(AtomicI32::new(0));
        let runner = Arc::new(ProcessRunner::new(
            current_child.clone(),
            should_quit.clone(),
        ));

        Ok(Self {
            state,
            commands,
            env,
            runner,
            should_quit,
            current_child,
            pause: ITERATION_PAUSE,
        })
    }

    pub fn with_runner(
        state: SessionState,
        commands: SessionCommands,
        env: SessionEnv,
        runner: Arc<dyn SessionRunner>,
    ) -> Self {
        Self {
            state,
            commands,
            env,
            runner,
            should_quit: Arc::new(AtomicBool::new(false)),
            current_child: Arc::new(AtomicI32::new(0)),
            pause: ITERATION_PAUSE,
        }
    }

    /// Runs until a termination signal arrives.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Session supervisor starting (state file {})",
            self.state.path().display()
        );

        let mut signals =
            Signals::new([SIGTERM, SIGINT, SIGHUP]).context("Failed to register signal handler")?;
        let quit_flag = self.should_quit.clone();
        let current_child = self.current_child.clone();

        // Lives until process exit; nothing to clean up.
        thread::spawn(move || {
            for sig in signals.forever() {
                info!("Received signal {sig} - stopping after the current session");
                quit_flag.store(true, Ordering::Release);
                runner::forward_termination(current_child.load(Ordering::Acquire));
            }
        });

        while !self.should_quit.load(Ordering::Acquire) {
            if self.run_once().is_none() {
                break;
            }
            thread::sleep(self.pause);
        }

        info!("Session supervisor shutting down");
        Ok(())
    }

    /// One iteration: read, run, persist the opposite target.
    ///
    /// Returns `None` without writing when shutdown was requested while the
    /// session was running.
    pub fn run_once(&self) -> Option<SessionTarget> {
        let current = self.state.read();
        info!("Starting {} session", current.as_str().to_uppercase());

        let exit = self
            .runner
            .run(self.commands.for_target(current), &self.env);

        if self.should_quit.load(Ordering::Acquire) {
            info!("{current} session ended ({exit}) during shutdown; state left untouched");
            return None;
        }

        let next = next_state(current, exit);
        if exit != ChildExit::Exited(0) {
            warn!("{current} session ended abnormally ({exit})");
        }
        info!("{current} session ended; switching to {next}");

        if let Err(err) = self.state.write(next) {
            error!("Failed to persist next session: {err:#}");
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::KEY_BIN_GS;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<SessionCommand>>,
        exit: ChildExit,
        quit_on_run: Option<Arc<AtomicBool>>,
    }

    impl RecordingRunner {
        fn new(exit: ChildExit) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                exit,
                quit_on_run: None,
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|cmd| cmd.program.to_string_lossy().into_owned())
                .collect()
        }
    }

    impl SessionRunner for RecordingRunner {
        fn run(&self, command: &SessionCommand, _env: &SessionEnv) -> ChildExit {
            self.calls.lock().unwrap().push(command.clone());
            if let Some(flag) = &self.quit_on_run {
                flag.store(true, Ordering::Release);
            }
            self.exit
        }
    }

    fn global(text: &str) -> GlobalConfig {
        GlobalConfig::from_parts(PathBuf::from("/etc/default/steamos_diy.conf"), KvConfig::parse(text))
    }

    fn commands() -> SessionCommands {
        let global = global("bin_gs=gamescope\nbin_steam=steam\nbin_plasma=startplasma-wayland\n");
        SessionCommands::from_config(&global, &KvConfig::default()).unwrap()
    }

    fn supervisor(dir: &tempfile::TempDir, runner: Arc<dyn SessionRunner>) -> Supervisor {
        Supervisor::with_runner(
            SessionState::new(dir.path().join("next_session")),
            commands(),
            SessionEnv::default(),
            runner,
        )
    }

    #[test]
    fn transition_always_flips() {
        for exit in [
            ChildExit::Exited(0),
            ChildExit::Exited(1),
            ChildExit::Signaled(9),
            ChildExit::Failed,
        ] {
            assert_eq!(next_state(SessionTarget::Steam, exit), SessionTarget::Desktop);
            assert_eq!(next_state(SessionTarget::Desktop, exit), SessionTarget::Steam);
        }
    }

    #[test]
    fn round_trip_from_steam() {
        let temp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new(ChildExit::Exited(0)));
        let supervisor = supervisor(&temp, runner.clone());
        supervisor.state.write(SessionTarget::Steam).unwrap();

        assert_eq!(supervisor.run_once(), Some(SessionTarget::Desktop));
        assert_eq!(supervisor.state.read(), SessionTarget::Desktop);
        assert_eq!(supervisor.run_once(), Some(SessionTarget::Steam));
        assert_eq!(supervisor.state.read(), SessionTarget::Steam);

        assert_eq!(runner.programs(), vec!["gamescope", "startplasma-wayland"]);
    }

    #[test]
    fn missing_state_starts_steam() {
        let temp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new(ChildExit::Exited(0)));
        let supervisor = supervisor(&temp, runner.clone());

        assert_eq!(supervisor.run_once(), Some(SessionTarget::Desktop));
        assert_eq!(runner.programs(), vec!["gamescope"]);
    }

    #[test]
    fn crashed_session_still_flips() {
        let temp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new(ChildExit::Signaled(11)));
        let supervisor = supervisor(&temp, runner);
        supervisor.state.write(SessionTarget::Desktop).unwrap();

        assert_eq!(supervisor.run_once(), Some(SessionTarget::Steam));
        assert_eq!(supervisor.state.read(), SessionTarget::Steam);
    }

    #[test]
    fn external_switch_is_honoured_on_next_iteration() {
        let temp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new(ChildExit::Exited(0)));
        let supervisor = supervisor(&temp, runner.clone());

        supervisor.run_once();
        // Trigger rewrote the intent while the desktop session was running.
        supervisor.state.write(SessionTarget::Desktop).unwrap();
        supervisor.run_once();

        assert_eq!(runner.programs(), vec!["gamescope", "startplasma-wayland"]);
        assert_eq!(supervisor.state.read(), SessionTarget::Steam);
    }

    #[test]
    fn shutdown_during_session_keeps_state() {
        let temp = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let mut runner = RecordingRunner::new(ChildExit::Signaled(15));
        runner.quit_on_run = Some(flag.clone());

        let mut supervisor = supervisor(&temp, Arc::new(runner));
        supervisor.should_quit = flag;
        supervisor.state.write(SessionTarget::Steam).unwrap();

        assert_eq!(supervisor.run_once(), None);
        assert_eq!(supervisor.state.read(), SessionTarget::Steam);
    }

    #[test]
    fn steam_command_layout() {
        let cmds = commands();
        let steam = cmds.for_target(SessionTarget::Steam);
        assert_eq!(steam.program, "gamescope");
        assert_eq!(
            steam.args,
            vec!["-e", "-f", "--", "steam", "-gamepadui", "-steamos3"]
        );
        assert!(cmds.for_target(SessionTarget::Desktop).args.is_empty());
    }

    #[test]
    fn manifesto_flags_replace_defaults() {
        let global = global("bin_gs=gamescope\nbin_steam=steam\nbin_plasma=plasma\n");
        let manifesto = KvConfig::parse("GAME_WRAPPER=gamemoderun\n-e\n-W 1920 -H 1080\n--rt\n");
        let cmds = SessionCommands::from_config(&global, &manifesto).unwrap();
        assert_eq!(
            cmds.for_target(SessionTarget::Steam).args,
            vec![
                "-e", "-W", "1920", "-H", "1080", "--rt", "--", "steam", "-gamepadui",
                "-steamos3"
            ]
        );
    }

    #[test]
    fn missing_binary_is_a_config_error() {
        let global = global("bin_steam=steam\nbin_plasma=plasma\nnext_session=/tmp/x\n");
        match SessionCommands::from_config(&global, &KvConfig::default()) {
            Err(ConfigError::MissingKey { key, .. }) => assert_eq!(key, KEY_BIN_GS),
            other => panic!("expected missing key, got {other:?}"),
        }
        assert!(Supervisor::from_config(&global).is_err());
    }

    #[test]
    fn session_env_exports_only_desktop_keys() {
        let config = KvConfig::parse(
            "XDG_CURRENT_DESKTOP=KDE\nKDE_FULL_SESSION=true\nbin_steam=steam\n--rt\nSDL_VIDEODRIVER=wayland\n",
        );
        let env = SessionEnv::build(
            vec![
                ("PATH".into(), "/usr/bin".into()),
                ("XDG_CURRENT_DESKTOP".into(), "old".into()),
            ],
            &config,
        );
        assert_eq!(env.get("PATH").unwrap(), "/usr/bin");
        assert_eq!(env.get("XDG_CURRENT_DESKTOP").unwrap(), "KDE");
        assert_eq!(env.get("KDE_FULL_SESSION").unwrap(), "true");
        assert_eq!(env.get("SDL_VIDEODRIVER").unwrap(), "wayland");
        assert!(env.get("bin_steam").is_none());
        assert!(env.get("--rt").is_none());
    }

    #[test]
    fn process_runner_reports_exit_codes() {
        let runner = ProcessRunner::new(
            Arc::new(AtomicI32::new(0)),
            Arc::new(AtomicBool::new(false)),
        );
        let env = SessionEnv::from_process(&KvConfig::default());

        assert_eq!(
            runner.run(&SessionCommand::new("sh", ["-c", "exit 3"]), &env),
            ChildExit::Exited(3)
        );
        assert_eq!(
            runner.run(&SessionCommand::new("sh", ["-c", "kill -9 $$"]), &env),
            ChildExit::Signaled(9)
        );
        assert_eq!(
            runner.run(
                &SessionCommand::new("/nonexistent/steamos-diy-session", Vec::<String>::new()),
                &env
            ),
            ChildExit::Failed
        );
    }

    #[test]
    fn real_children_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let global = global(&format!(
            "bin_gs=true\nbin_steam=steam\nbin_plasma=true\nnext_session={}\nuser_config={}\n",
            temp.path().join("next_session").display(),
            temp.path().join("config").display(),
        ));
        let supervisor = Supervisor::from_config(&global).unwrap();

        assert_eq!(supervisor.run_once(), Some(SessionTarget::Desktop));
        assert_eq!(supervisor.run_once(), Some(SessionTarget::Steam));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("next_session")).unwrap(),
            "steam"
        );
    }
}
