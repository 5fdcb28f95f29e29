//! Process-wide translation of fatal conditions into structured errors.
//!
//! Until a hook is installed every error raised by the tree, parser or
//! emitter aborts the process. After installation the error is handed to the
//! hook and then returned to the caller. Installation happens once per
//! process; every public entry point calls [`init_once`] before doing work.

use std::panic::Location;
use std::sync::OnceLock;

use tracing::{debug, error};

use crate::errors::{SourceLocation, YamlError};

/// Observer invoked for every error before it is returned to the caller.
pub type ErrorHook = fn(&YamlError);

static HOOK: OnceLock<ErrorHook> = OnceLock::new();

fn log_error(err: &YamlError) {
    debug!(kind = ?err.kind(), "{}", err);
}

/// Install the default hook unless one is already present.
pub fn init_once() {
    HOOK.get_or_init(|| {
        debug!("error channel installed");
        log_error as ErrorHook
    });
}

/// Install a caller-provided hook.
///
/// Returns `false` if a hook (default or custom) was already installed; the
/// existing hook stays in place.
pub fn install(hook: ErrorHook) -> bool {
    HOOK.set(hook).is_ok()
}

pub fn is_installed() -> bool {
    HOOK.get().is_some()
}

/// Route an error through the installed hook.
pub fn raise(err: YamlError) -> YamlError {
    match HOOK.get() {
        Some(hook) => {
            hook(&err);
            err
        }
        None => {
            error!("fatal error before error channel installation: {}", err);
            std::process::abort()
        }
    }
}

/// Build a runtime error tagged with the caller's location and raise it.
#[track_caller]
pub fn fatal(message: impl Into<String>) -> YamlError {
    let caller = Location::caller();
    raise(YamlError::Runtime {
        message: message.into(),
        location: SourceLocation {
            name: caller.file(),
            line: caller.line(),
        },
    })
}

pub(crate) fn violation(message: impl Into<String>) -> YamlError {
    raise(YamlError::structural(message))
}
