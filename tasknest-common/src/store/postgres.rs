use async_trait::async_trait;
use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::reset_code::{NewResetCode, ResetCode};
use crate::schema::password_reset_codes as reset_code_fields;
use crate::schema::password_reset_codes::dsl::password_reset_codes;
use crate::store::{ResetCodeStore, StoreError};

pub struct PostgresStore {
    db_thread_pool: DbThreadPool,
}

impl PostgresStore {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }
}

#[async_trait]
impl ResetCodeStore for PostgresStore {
    async fn save_code(
        &self,
        email: &str,
        code: &str,
        created_timestamp: SystemTime,
        expiration: SystemTime,
    ) -> Result<(), StoreError> {
        let pool = self.db_thread_pool.clone();
        let email = String::from(email);
        let code = String::from(code);

        tokio::task::spawn_blocking(move || -> Result<(), DaoError> {
            let new_code = NewResetCode {
                id: Uuid::now_v7(),
                email: &email,
                code: &code,
                created_timestamp,
                expiration,
                used: false,
            };

            dsl::insert_into(password_reset_codes)
                .values(&new_code)
                .execute(&mut pool.get()?)?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::RuntimeFailure(e.to_string()))??;

        Ok(())
    }

    async fn find_consumable_codes(&self, email: &str) -> Result<Vec<ResetCode>, StoreError> {
        let pool = self.db_thread_pool.clone();
        let email = String::from(email);

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<ResetCode>, DaoError> {
            Ok(password_reset_codes
                .filter(reset_code_fields::email.eq(&email))
                .filter(reset_code_fields::used.eq(false))
                .filter(reset_code_fields::expiration.gt(SystemTime::now()))
                .order(reset_code_fields::created_timestamp.desc())
                .load::<ResetCode>(&mut pool.get()?)?)
        })
        .await
        .map_err(|e| StoreError::RuntimeFailure(e.to_string()))??;

        Ok(rows)
    }

    async fn consume_code(&self, id: Uuid) -> Result<bool, StoreError> {
        let pool = self.db_thread_pool.clone();

        let affected_rows = tokio::task::spawn_blocking(move || -> Result<usize, DaoError> {
            // The filter makes the flip a compare-and-swap; a concurrent
            // consumer leaves zero rows to update.
            Ok(dsl::update(
                password_reset_codes
                    .find(id)
                    .filter(reset_code_fields::used.eq(false)),
            )
            .set(reset_code_fields::used.eq(true))
            .execute(&mut pool.get()?)?)
        })
        .await
        .map_err(|e| StoreError::RuntimeFailure(e.to_string()))??;

        Ok(affected_rows == 1)
    }

    async fn release_code(&self, id: Uuid) -> Result<(), StoreError> {
        let pool = self.db_thread_pool.clone();

        tokio::task::spawn_blocking(move || -> Result<(), DaoError> {
            dsl::update(password_reset_codes.find(id))
                .set(reset_code_fields::used.eq(false))
                .execute(&mut pool.get()?)?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::RuntimeFailure(e.to_string()))??;

        Ok(())
    }
}
