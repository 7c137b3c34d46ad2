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

use async_trait::async_trait;
use std::fmt::Debug;

use crate::dal::DAL;
use crate::error::DeliveryError;
use crate::models::NewMailboxMessage;

/// Where composed notifications are sent.
///
/// Returns an identifier for the delivered message. Implementations must be
/// safe to call more than once for the same logical notification: the queue
/// delivers at least once.
#[async_trait]
pub trait DeliveryChannel: Send + Sync + Debug {
    async fn deliver(&self, message: NewMailboxMessage) -> Result<String, DeliveryError>;
}

/// Delivers into the in-app mailbox table.
#[derive(Debug, Clone)]
pub struct MailboxChannel {
    dal: DAL,
}

impl MailboxChannel {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }
}

#[async_trait]
impl DeliveryChannel for MailboxChannel {
    async fn deliver(&self, message: NewMailboxMessage) -> Result<String, DeliveryError> {
        let stored = self.dal.mailbox().create(message).await?;
        Ok(format!("mailbox-{}", stored.id))
    }
}
