//! Panic containment for runner bodies.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures_util::FutureExt;
use serde_json::json;
use syncline_types::error::ConnectorError;

static HOOK: Once = Once::new();

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the process-wide hook that records a backtrace for each panic.
///
/// The previously installed hook still runs. Idempotent.
pub fn install_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Run `fut`, converting a panic into an internal `PANIC` error.
///
/// The error message carries the panic payload and `details.backtrace` the
/// trace captured on the panicking thread.
pub async fn contain<F, T>(fut: F) -> Result<T, ConnectorError>
where
    F: Future<Output = Result<T, ConnectorError>>,
{
    install_hook();
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let backtrace = LAST_BACKTRACE.with(|slot| slot.borrow_mut().take());
            let err = ConnectorError::internal("PANIC", format!("panic: {message}"));
            Err(match backtrace {
                Some(trace) => err.with_details(json!({ "backtrace": trace })),
                None => err,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
