// Lightweight, dependency-free diagnostics.
//
// The engine does not pull in a logging crate; these macros are
// `println!`/`eprintln!` dressed up with a level prefix. `trace!` and
// `debug!` are silent unless running under `cfg(test)` or the `trace-log`
// feature; `warn!` always prints, since it flags a scan step the engine
// chose to skip rather than fail on.

#[macro_export]
macro_rules! trace(
    ( $($thing:expr),* ) => {
        if cfg!(any(test, feature = "trace-log")) { println! { $($thing),* } }
    };
);

#[macro_export]
macro_rules! debug(
    ( $($thing:expr),* ) => {
        if cfg!(any(test, feature = "trace-log")) { println! { $($thing),* } }
    };
);

#[macro_export]
macro_rules! warn(
    ( $($thing:expr),* ) => {
        eprintln! { $($thing),* }
    };
);
