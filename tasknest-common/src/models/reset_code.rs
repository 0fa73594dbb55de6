use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::password_reset_codes;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = password_reset_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResetCode {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
    pub used: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = password_reset_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewResetCode<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub code: &'a str,
    pub created_timestamp: SystemTime,
    pub expiration: SystemTime,
    pub used: bool,
}
