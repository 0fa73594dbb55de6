use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use std::time::{Duration, SystemTime};

use crate::db::{DaoError, DbThreadPool};
use crate::schema::password_reset_codes as reset_code_fields;
use crate::schema::password_reset_codes::dsl::password_reset_codes;

/// Maintenance operations on the reset-code table. The request handlers never
/// delete rows; pruning belongs to the job scheduler alone.
pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn delete_all_expired_codes(&self) -> Result<usize, DaoError> {
        Ok(diesel::delete(
            password_reset_codes.filter(reset_code_fields::expiration.lt(SystemTime::now())),
        )
        .execute(&mut self.db_thread_pool.get()?)?)
    }

    pub fn delete_consumed_codes_older_than(&self, max_age: Duration) -> Result<usize, DaoError> {
        let cutoff = SystemTime::now() - max_age;

        Ok(diesel::delete(
            password_reset_codes
                .filter(reset_code_fields::used.eq(true))
                .filter(reset_code_fields::created_timestamp.lt(cutoff)),
        )
        .execute(&mut self.db_thread_pool.get()?)?)
    }
}
