//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻を timestamp 部に使う ULID

use crate::domain::ids::{OccurrenceId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は task / occurrence の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の worker から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_occurrence_id(&self) -> OccurrenceId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使うので、FixedClock のテストでは timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_occurrence_id(&self) -> OccurrenceId {
        OccurrenceId::from(self.next_ulid())
    }
}
