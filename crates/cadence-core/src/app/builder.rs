//! ManagedSchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 差し替え可能な ports（Clock, EventSink, IdGenerator）の注入

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::app::config::SchedulerConfig;
use crate::app::recurring::TaskContext;
use crate::app::runtime::ManagedScheduler;
use crate::impls::{TokioExecutor, TracingEventSink};
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, UlidGenerator};

/// ManagedSchedulerBuilder はスケジューラを構築
///
/// # 使用例
/// ```ignore
/// let scheduler = ManagedSchedulerBuilder::new()
///     .pool_size(2)
///     .history_limit(Some(32))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定値を検証
/// - 不正な値があれば BuildError を返す（実行時に初めて気づくことがない）
pub struct ManagedSchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    events: Option<Arc<dyn EventSink>>,
    ids: Option<Arc<dyn IdGenerator>>,
    runtime: Option<Handle>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid pool size {0}: at least one worker is required.")]
    InvalidPoolSize(usize),

    #[error("Invalid history limit 0: keep at least one record, or use None to keep all of them.")]
    InvalidHistoryLimit,

    #[error("No tokio runtime: build inside a runtime or pass one with `runtime()`.")]
    NoRuntime,
}

impl ManagedSchedulerBuilder {
    /// 既定の設定で ManagedSchedulerBuilder を作成
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: None,
            events: None,
            ids: None,
            runtime: None,
        }
    }

    /// 設定をまとめて差し替え
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    pub fn history_limit(mut self, limit: Option<usize>) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// 時刻源を差し替え（テストでは TokioClock）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// イベントの出力先（既定: TracingEventSink）
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// occurrence を実行する tokio runtime（既定: 呼び出し元の runtime）
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// ManagedSchedulerBuilder を構築して ManagedScheduler を生成
    ///
    /// # 検証
    /// - pool_size が 0 なら BuildError::InvalidPoolSize
    /// - history_limit が Some(0) なら BuildError::InvalidHistoryLimit
    /// - runtime が見つからなければ BuildError::NoRuntime
    pub fn build(self) -> Result<ManagedScheduler, BuildError> {
        if self.config.pool_size == 0 {
            return Err(BuildError::InvalidPoolSize(self.config.pool_size));
        }
        if self.config.history_limit == Some(0) {
            return Err(BuildError::InvalidHistoryLimit);
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let events = self.events.unwrap_or_else(|| Arc::new(TracingEventSink));
        let executor = Arc::new(TokioExecutor::new(
            runtime,
            self.config.pool_size,
            Arc::clone(&clock),
        ));

        info!(
            name = %self.config.name,
            pool_size = self.config.pool_size,
            history_limit = ?self.config.history_limit,
            "Scheduler built"
        );
        let ctx = TaskContext {
            executor: executor.clone(),
            clock,
            ids,
            events,
            history_limit: self.config.history_limit,
        };
        Ok(ManagedScheduler::new(self.config, executor, ctx))
    }
}

impl Default for ManagedSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
