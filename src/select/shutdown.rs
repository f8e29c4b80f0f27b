//! Ways of ending the foreground session.
//!
//! Every mechanism reports whether it ran, was unavailable on this system, or
//! ran and failed. Callers walk an ordered chain until one succeeds.

use log::{debug, info, warn};
use std::ffi::OsString;
use std::fmt;
use std::process::{Command, Stdio};
use zbus::proxy;

const KDE_SHUTDOWN_SERVICE: &str = "org.kde.Shutdown";
const KDE_SHUTDOWN_PATH: &str = "/Shutdown";
const KDE_LOGOUT_METHOD: &str = "logout";

/// Command-line D-Bus clients tried after the direct bus call, in order.
pub const QDBUS_CLIENTS: &[&str] = &["qdbus6", "qdbus"];

/// KDE session manager shutdown interface.
#[proxy(
    interface = "org.kde.Shutdown",
    default_service = "org.kde.Shutdown",
    default_path = "/Shutdown"
)]
trait KdeShutdown {
    /// Ends the Plasma session without confirmation.
    #[zbus(name = "logout")]
    fn logout(&self) -> zbus::Result<()>;
}

/// Result of one termination attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownAttempt {
    Done,
    /// The mechanism does not exist here (binary or bus service missing).
    Unavailable(String),
    /// The mechanism ran and reported an error.
    Failed(String),
}

impl fmt::Display for ShutdownAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

pub trait ShutdownMechanism {
    fn name(&self) -> String;
    fn attempt(&self) -> ShutdownAttempt;
}

/// Tries each mechanism in order and stops at the first success.
/// Returns whether any mechanism succeeded.
pub fn run_chain(mechanisms: &[Box<dyn ShutdownMechanism>]) -> bool {
    for mechanism in mechanisms {
        let name = mechanism.name();
        match mechanism.attempt() {
            ShutdownAttempt::Done => {
                info!("{name}: done");
                return true;
            }
            attempt @ ShutdownAttempt::Unavailable(_) => debug!("{name}: {attempt}"),
            attempt @ ShutdownAttempt::Failed(_) => warn!("{name}: {attempt}"),
        }
    }
    false
}

/// Runs an external program, treating a missing binary as unavailable.
pub struct CommandMechanism {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandMechanism {
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<steam> -shutdown`: asks the running game client to exit.
    pub fn steam_shutdown(steam_bin: &str) -> Self {
        Self::new(steam_bin, ["-shutdown"])
    }

    /// `<client> org.kde.Shutdown /Shutdown logout`.
    pub fn qdbus_logout(client: &str) -> Self {
        Self::new(
            client,
            [KDE_SHUTDOWN_SERVICE, KDE_SHUTDOWN_PATH, KDE_LOGOUT_METHOD],
        )
    }
}

impl ShutdownMechanism for CommandMechanism {
    fn name(&self) -> String {
        let mut name = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            name.push(' ');
            name.push_str(&arg.to_string_lossy());
        }
        name
    }

    fn attempt(&self) -> ShutdownAttempt {
        let program = match which::which(&self.program) {
            Ok(path) => path,
            Err(err) => return ShutdownAttempt::Unavailable(err.to_string()),
        };

        match Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => ShutdownAttempt::Done,
            Ok(status) => ShutdownAttempt::Failed(status.to_string()),
            Err(err) => ShutdownAttempt::Failed(err.to_string()),
        }
    }
}

/// Direct `org.kde.Shutdown.logout` call on the session bus.
pub struct KdeDbusLogout;

impl ShutdownMechanism for KdeDbusLogout {
    fn name(&self) -> String {
        format!("D-Bus {KDE_SHUTDOWN_SERVICE}.{KDE_LOGOUT_METHOD}")
    }

    fn attempt(&self) -> ShutdownAttempt {
        let connection = match zbus::blocking::Connection::session() {
            Ok(connection) => connection,
            Err(err) => return ShutdownAttempt::Unavailable(format!("no session bus: {err}")),
        };

        let proxy = match KdeShutdownProxyBlocking::new(&connection) {
            Ok(proxy) => proxy,
            Err(err) => return ShutdownAttempt::Failed(err.to_string()),
        };

        match proxy.logout() {
            Ok(()) => ShutdownAttempt::Done,
            Err(err) if is_service_unknown(&err) => ShutdownAttempt::Unavailable(err.to_string()),
            Err(err) => ShutdownAttempt::Failed(err.to_string()),
        }
    }
}

fn is_service_unknown(err: &zbus::Error) -> bool {
    match err {
        zbus::Error::MethodError(name, _, _) => {
            name.as_str() == "org.freedesktop.DBus.Error.ServiceUnknown"
        }
        zbus::Error::FDO(fdo) => matches!(**fdo, zbus::fdo::Error::ServiceUnknown(_)),
        _ => false,
    }
}

/// Ordered desktop logout chain: bus call first, then the qdbus clients.
pub fn desktop_logout_chain() -> Vec<Box<dyn ShutdownMechanism>> {
    let mut chain: Vec<Box<dyn ShutdownMechanism>> = vec![Box::new(KdeDbusLogout)];
    chain.extend(
        QDBUS_CLIENTS
            .iter()
            .map(|client| Box::new(CommandMechanism::qdbus_logout(client)) as Box<dyn ShutdownMechanism>),
    );
    chain
}
