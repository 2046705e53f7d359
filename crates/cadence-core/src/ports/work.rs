//! Work trait - 繰り返し実行される処理の定義

use std::future::Future;

use async_trait::async_trait;

use crate::domain::BoxError;

/// Work is the unit executed once per occurrence.
///
/// # 使用例
/// ```ignore
/// struct Ping;
///
/// #[async_trait]
/// impl Work<u32> for Ping {
///     async fn run(&self) -> Result<u32, BoxError> {
///         Ok(200)
///     }
/// }
/// ```
///
/// Closures returning a future implement it directly:
/// `scheduler.schedule(|| async { Ok::<_, BoxError>(1) }, trigger)`.
#[async_trait]
pub trait Work<T>: Send + Sync {
    async fn run(&self) -> Result<T, BoxError>;
}

#[async_trait]
impl<T, F, Fut> Work<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Send + 'static,
{
    async fn run(&self) -> Result<T, BoxError> {
        (self)().await
    }
}
