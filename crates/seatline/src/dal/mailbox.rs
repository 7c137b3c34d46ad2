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

use diesel::prelude::*;

use super::models::{MailboxRow, NewMailboxRow};
use super::{now_naive, DAL};
use crate::database::schema::mailbox;
use crate::error::StoreError;
use crate::models::{MailboxMessage, NewMailboxMessage};

#[derive(Clone)]
pub struct MailboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> MailboxDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn create(&self, message: NewMailboxMessage) -> Result<MailboxMessage, StoreError> {
        let row = NewMailboxRow {
            user_id: message.user_id,
            recipient: message.recipient,
            kind: message.kind,
            subject: message.subject,
            body: message.body,
            created_at: now_naive(),
        };

        let created: MailboxRow = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(mailbox::table)
                .values(&row)
                .returning(MailboxRow::as_returning())
                .get_result(conn)
        })?;

        Ok(created.into())
    }

    /// A user's messages, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<MailboxMessage>, StoreError> {
        let rows: Vec<MailboxRow> = crate::with_connection!(self.dal, |conn| {
            mailbox::table
                .filter(mailbox::user_id.eq(user_id))
                .order((mailbox::created_at.desc(), mailbox::id.desc()))
                .limit(limit)
                .select(MailboxRow::as_select())
                .load(conn)
        })?;
        Ok(rows.into_iter().map(MailboxMessage::from).collect())
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<i64, StoreError> {
        let count: i64 = crate::with_connection!(self.dal, |conn| {
            mailbox::table
                .filter(mailbox::user_id.eq(user_id))
                .count()
                .get_result(conn)
        })?;
        Ok(count)
    }
}
