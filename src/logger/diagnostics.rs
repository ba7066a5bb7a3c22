/// Emits an SDK diagnostic under the `gt8004_sdk` target.
///
/// With `debug` on the event goes out at the given level; otherwise it is
/// demoted to `trace` so a host application stays quiet unless it opts in.
macro_rules! diag {
    ($debug:expr, $level:ident, $($arg:tt)+) => {
        if $debug {
            tracing::$level!(target: "gt8004_sdk", $($arg)+);
        } else {
            tracing::trace!(target: "gt8004_sdk", $($arg)+);
        }
    };
}

pub(crate) use diag;
