//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてスケジューラを実装します。
//!
//! # 主要コンポーネント
//! - **ManagedSchedulerBuilder**: スケジューラの構築とワイヤリング
//! - **ManagedScheduler**: タスク投入の表面
//! - **RecurringTask / OneShotTask**: TaskListener の 2 つの実装
//! - **ManagedFuture / TriggerManagedFuture**: 呼び出し側に返す future

pub mod builder;
pub mod config;
pub mod future;
pub mod one_shot;
pub mod recurring;
pub mod runtime;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ManagedSchedulerBuilder};
pub use self::config::SchedulerConfig;
pub use self::future::{ManagedFuture, TriggerManagedFuture};
pub use self::one_shot::OneShotTask;
pub use self::recurring::{RecurringTask, TaskContext};
pub use self::runtime::ManagedScheduler;
