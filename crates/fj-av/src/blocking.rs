//! Bridge from synchronous entry points into async code.

use std::future::Future;

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Drive `fut` to completion from synchronous code.
///
/// Inside a multi-threaded runtime the current worker is handed over with
/// `block_in_place`. A current-thread runtime cannot block, so the future
/// runs on a scoped thread with its own runtime. Outside any runtime a
/// temporary one is created.
pub(crate) fn block_on<F>(fut: F) -> fj_core::Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
        }
        Ok(_) => std::thread::scope(|s| {
            s.spawn(move || -> fj_core::Result<F::Output> {
                Ok(temporary_runtime()?.block_on(fut))
            })
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        }),
        Err(_) => Ok(temporary_runtime()?.block_on(fut)),
    }
}

fn temporary_runtime() -> fj_core::Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_runtime() {
        assert_eq!(block_on(async { 1 + 1 }).unwrap(), 2);
    }

    #[tokio::test]
    async fn inside_current_thread_runtime() {
        let value = block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            7
        })
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn inside_multi_thread_runtime() {
        assert_eq!(block_on(async { "ok" }).unwrap(), "ok");
    }
}
