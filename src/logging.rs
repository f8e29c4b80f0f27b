//! Logger setup shared by all binaries.
//!
//! Records go to the system journal through a `logger -t <tag>` child when the
//! `logger` utility is installed, and to stderr otherwise. `STEAMOS_DIY_LOG=stderr`
//! forces stderr; `RUST_LOG` adjusts the filter (default `info`).

use env_logger::{Builder, Env, Target};
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

pub const LOG_SINK_ENV: &str = "STEAMOS_DIY_LOG";

/// Journal tag for the supervisor and switch trigger.
pub const TAG_SESSION: &str = "steamos-diy";
/// Journal tag for the launch resolver.
pub const TAG_ENGINE: &str = "steamos-diy-sdy";
/// Journal tag for the compatibility shims.
pub const TAG_SHIM: &str = "BRANCH-SHIM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Journal,
    Stderr,
}

fn requested_sink() -> Sink {
    match env::var(LOG_SINK_ENV).as_deref() {
        Ok("stderr") => Sink::Stderr,
        Ok("journal") | Err(_) => Sink::Journal,
        Ok(other) => {
            eprintln!("{LOG_SINK_ENV}={other} is not a known sink, using journal");
            Sink::Journal
        }
    }
}

/// Installs the global logger. `prefix` is prepended to every message, e.g.
/// `[SELECT]`, so one journal tag can carry several components.
pub fn init(tag: &str, prefix: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    let sink = match requested_sink() {
        Sink::Journal => match journal_pipe(tag) {
            Some(pipe) => {
                builder.target(Target::Pipe(pipe));
                Sink::Journal
            }
            None => Sink::Stderr,
        },
        Sink::Stderr => Sink::Stderr,
    };

    let prefix = prefix.to_string();
    match sink {
        Sink::Journal => {
            builder.format(move |buf, record| {
                writeln!(buf, "{} <{}> {}", prefix, record.level(), record.args())
            });
        }
        Sink::Stderr => {
            let tag = tag.to_string();
            builder.format(move |buf, record| {
                writeln!(
                    buf,
                    "{}: {} <{}> {}",
                    tag,
                    prefix,
                    record.level(),
                    record.args()
                )
            });
        }
    }

    // A logger may already be installed when running under the test harness.
    let _ = builder.try_init();
}

/// Flushes buffered records; call before replacing the process image.
pub fn flush() {
    log::logger().flush();
}

fn journal_pipe(tag: &str) -> Option<Box<dyn Write + Send>> {
    let logger = which::which("logger").ok()?;
    let child = Command::new(logger)
        .args(["-t", tag])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    let stdin = child.stdin?;
    Some(Box::new(stdin))
}
