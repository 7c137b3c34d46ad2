/*
 *  Copyright 2025-2026 Seatline Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! User records.

use super::models::{NewUserRow, UserRow};
use super::{now_naive, DAL};
use crate::database::schema::users;
use crate::error::StoreError;
use crate::models::{NewUser, User};
use diesel::prelude::*;

#[derive(Clone)]
pub struct UserDAL<'a> {
    dal: &'a DAL,
}

impl<'a> UserDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a user. The name is trimmed and must not be blank, since it is
    /// addressed in every notification.
    pub async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        if !new_user.email.contains('@') {
            return Err(StoreError::Invalid(format!(
                "'{}' is not an email address",
                new_user.email
            )));
        }
        let name = new_user.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Invalid("name must not be blank".to_string()));
        }
        let row = NewUserRow {
            email: new_user.email,
            name,
            role: new_user.role.as_str().to_string(),
            created_at: now_naive(),
        };

        let created: UserRow = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .returning(UserRow::as_returning())
                .get_result(conn)
        })?;

        created.try_into()
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = crate::with_connection!(self.dal, |conn| {
            users::table
                .find(id)
                .select(UserRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        let row: Option<UserRow> = crate::with_connection!(self.dal, |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(UserRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(User::try_from).transpose()
    }
}
