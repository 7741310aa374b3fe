use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::errors::MarketDataError;

/// Run a provider future, turning a panic into a `ProviderError`.
pub(crate) async fn guarded<T, F>(provider: &str, future: F) -> Result<T, MarketDataError>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
