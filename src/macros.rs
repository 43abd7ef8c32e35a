// src/macros.rs

//
// Crate-internal log macros.
//
// With the `logging` feature every level forwards to `tracing`, so events
// keep the emitting module as their target (`ipc_rpc::client`,
// `ipc_rpc::server`, `ipc_rpc::transport::memory`, ...).
//
// Without it only `log_error!` survives, printed to stderr with an `ipc-rpc:`
// prefix. Its one caller is the dispatcher reporting a handler task that
// panicked or was cancelled, which would otherwise vanish silently.
//
// Levels as used here:
//   error  a handler task died
//   warn   a rejected inbound message, an unencodable handler result,
//          an interrupted connection
//   info   dispatcher attached, channel invalidated or about to terminate
//   debug  per-call and per-transport lifecycle traces
//
// Call sites pass plain format strings, never tracing fields, so both
// expansions accept the same tokens. The no-op expansions are a block, so
// `Err(e) => { log_warn!("{e}"); }` compiles either way.
//

#![allow(unused_macros)]

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("ipc-rpc: {}", format_args!($($arg)*))
    };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

// Arguments are dropped unevaluated when logging is off.
#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{}};
}

pub(crate) use {log_debug, log_error, log_info, log_warn};

#[cfg(test)]
mod tests {
    // ---
    #[test]
    fn test_macros_accept_call_site_forms() {
        // ---
        let method = "math/add";
        let outcome: Result<u32, String> = Err("boom".into());

        match outcome {
            Ok(_) => {
                log_debug!("call {method} completed");
            }
            Err(e) => {
                log_warn!("call {method} failed: {e}");
            }
        }
        log_info!("dispatcher serving {} method(s)", 1);
        log_error!("handler for {method} id={} failed", 7);
    }

    #[cfg(not(feature = "logging"))]
    #[test]
    fn test_disabled_levels_skip_arguments() {
        // ---
        let mut evaluated = false;
        log_debug!("{}", {
            evaluated = true;
            1
        });
        assert!(!evaluated);
    }
}
