//! Telegram channel adapter.
//!
//! Wraps the master bot's teloxide `Dispatcher` and drives the long-polling
//! event loop until the process exits. Other bots only send.

use std::sync::Arc;

use qqtg_relay::Bridge;
use teloxide::prelude::*;
use tracing::info;

use crate::credential::TelegramCredential;
use crate::handler::handle_message;

/// Long-polling loop for the master bot. No public URL required.
pub struct TelegramAdapter {
    master: Arc<TelegramCredential>,
    bridge: Arc<Bridge>,
}

impl TelegramAdapter {
    pub fn new(master: Arc<TelegramCredential>, bridge: Arc<Bridge>) -> Self {
        Self { master, bridge }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Returns only when the dispatcher shuts down.
    pub async fn run(self) {
        let bot = self.master.bot().clone();
        info!(
            chat_id = self.master.chat_id().0,
            "Telegram: starting long-polling dispatcher"
        );

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![self.bridge, self.master])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
