use crate::{Error, QueryError, Result};
use anyhow::Context;
use std::{future::Future, sync::OnceLock};
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// Drive `future` to completion from synchronous code.
///
/// Inside a multi thread runtime the worker is handed over with `block_in_place` and the future
/// runs on that runtime. Outside of any runtime it runs on a shared one, started on first use, so
/// that sessions relying on tokio timers and sockets work. A current thread runtime cannot be
/// blocked without stalling the future, the call fails instead.
pub fn block_on<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(Error::new(QueryError::Runtime(
                "blocking calls are not supported on a current thread runtime, await `execute` \
                 instead"
                    .into(),
            ))),
            _ => tokio::task::block_in_place(|| handle.block_on(future)),
        },
        Err(..) => blocking_runtime()?.block_on(future),
    }
}

fn blocking_runtime() -> Result<&'static Runtime> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    log::debug!("Starting the runtime for blocking calls");
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("cask-blocking")
        .enable_all()
        .build()
        .context("While starting the runtime for blocking calls")?;
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// Write `values` into `out`, calling `f` for each one and putting `separator` between the
/// elements that produced some output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            &$query[..$crate::floor_char_boundary(&$query, 497)].trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

/// Largest index not greater than `index` that falls on a char boundary of `value`.
pub fn floor_char_boundary(value: &str, index: usize) -> usize {
    if index >= value.len() {
        return value.len();
    }
    let mut index = index;
    while !value.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Sends the value through the channel and logs in case of error.
#[macro_export]
macro_rules! send_value {
    ($tx:expr, $value:expr) => {{
        if let Err(e) = $tx.send($value) {
            log::trace!("Receiver dropped: {}", e);
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn tick() -> Result<u8> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(7)
    }

    #[test]
    fn block_outside_runtime() {
        assert_eq!(block_on(tick()).unwrap(), 7);
        assert_eq!(block_on(tick()).unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn block_inside_multi_thread_runtime() {
        assert_eq!(block_on(tick()).unwrap(), 7);
    }

    #[tokio::test]
    async fn block_inside_current_thread_runtime() {
        let error = block_on(tick()).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Runtime(..))
        ));
    }

    #[test]
    fn separated() {
        let mut out = String::from("(");
        separated_by(&mut out, [1, 2, 3], |out, v| out.push_str(&v.to_string()), ", ");
        out.push(')');
        assert_eq!(out, "(1, 2, 3)");

        let mut out = String::new();
        separated_by(
            &mut out,
            ["a", "", "b"],
            |out, v| out.push_str(v),
            " AND ",
        );
        assert_eq!(out, "a AND b");
    }

    #[test]
    fn truncate() {
        let short = "SELECT * FROM \"t\"";
        assert_eq!(format!("{}", truncate_long!(short)), short);
        let long = "é".repeat(400);
        let printed = format!("{}", truncate_long!(long));
        assert!(printed.ends_with("..."));
        assert!(printed.len() <= 500);
    }
}
