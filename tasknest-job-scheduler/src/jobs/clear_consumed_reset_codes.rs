use tasknest_common::db::reset_code::Dao as ResetCodeDao;
use tasknest_common::db::DbThreadPool;

use async_trait::async_trait;
use std::time::Duration;

use crate::jobs::{Job, JobError};

/// Prunes consumed codes once they are old enough to be useless for auditing
/// a recent reset.
pub struct ClearConsumedResetCodesJob {
    max_age: Duration,
    db_thread_pool: DbThreadPool,
    is_running: bool,
}

impl ClearConsumedResetCodesJob {
    pub fn new(max_age: Duration, db_thread_pool: DbThreadPool) -> Self {
        Self {
            max_age,
            db_thread_pool,
            is_running: false,
        }
    }
}

#[async_trait]
impl Job for ClearConsumedResetCodesJob {
    fn name(&self) -> &'static str {
        "Clear Consumed Reset Codes"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.is_running = true;

        let max_age = self.max_age;
        let dao = ResetCodeDao::new(&self.db_thread_pool);
        let deleted_count =
            tokio::task::spawn_blocking(move || dao.delete_consumed_codes_older_than(max_age))
                .await??;

        if deleted_count != 0 {
            log::info!("Deleted {} consumed reset code(s)", deleted_count);
        }

        self.is_running = false;
        Ok(())
    }
}
