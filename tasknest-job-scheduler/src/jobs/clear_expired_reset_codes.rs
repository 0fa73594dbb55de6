use tasknest_common::db::reset_code::Dao as ResetCodeDao;
use tasknest_common::db::DbThreadPool;

use async_trait::async_trait;

use crate::jobs::{Job, JobError};

pub struct ClearExpiredResetCodesJob {
    db_thread_pool: DbThreadPool,
    is_running: bool,
}

impl ClearExpiredResetCodesJob {
    pub fn new(db_thread_pool: DbThreadPool) -> Self {
        Self {
            db_thread_pool,
            is_running: false,
        }
    }
}

#[async_trait]
impl Job for ClearExpiredResetCodesJob {
    fn name(&self) -> &'static str {
        "Clear Expired Reset Codes"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.is_running = true;

        let dao = ResetCodeDao::new(&self.db_thread_pool);
        let deleted_count =
            tokio::task::spawn_blocking(move || dao.delete_all_expired_codes()).await??;

        if deleted_count != 0 {
            log::info!("Deleted {} expired reset code(s)", deleted_count);
        }

        self.is_running = false;
        Ok(())
    }
}
