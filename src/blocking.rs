//! Blocking adapters over the async operations.
//!
//! Every `*_blocking` method in the crate funnels through [`block_on`]:
//! - Outside a runtime, a throwaway current-thread runtime drives the future.
//! - Inside a multi-thread runtime, the worker is handed off with
//!   `block_in_place` and the future runs on the existing runtime.
//! - Inside a current-thread runtime blocking would deadlock, so the call
//!   is rejected.

use std::future::Future;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{SessionError, SessionResult};

/// Drive `future` to completion from synchronous code.
pub fn block_on<F: Future>(future: F) -> SessionResult<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
            _ => Err(SessionError::InvalidOperation(
                "blocking call made from a current-thread runtime".into(),
            )),
        },
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| SessionError::InvalidOperation(format!("failed to build runtime: {}", e)))?;
            Ok(runtime.block_on(future))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_runtime() {
        let value = block_on(async { 7 }).unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn inside_multi_thread_runtime() {
        let value = block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            11
        })
        .unwrap();
        assert_eq!(value, 11);
    }

    #[tokio::test]
    async fn rejected_on_current_thread_runtime() {
        let err = block_on(async {}).unwrap_err();
        assert!(matches!(err, SessionError::InvalidOperation(_)));
    }
}
