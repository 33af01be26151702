use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand as TgBotCommand};
use tracing::{info, warn};

use relaybot_core::{
    commands::CommandHandler, config::Config, messaging::MessagingPort, redeem::CodeStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    /// This bot's username; `/cmd@name` addressed to any other bot is ignored.
    pub bot_username: Option<String>,
    pub commands: CommandHandler,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Commands shown in the Telegram client menu. Admin commands are left out.
fn menu_commands() -> Vec<TgBotCommand> {
    vec![
        TgBotCommand::new("redeem", "Redeem a premium code"),
        TgBotCommand::new("checkmypremium", "Show your premium status"),
        TgBotCommand::new("help", "Show help"),
    ]
}

pub async fn run_polling(cfg: Arc<Config>, store: CodeStore) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!(username = %me.username(), "bot started");
            me.user.username.clone()
        }
        Err(e) => {
            warn!(error = %e, "get_me failed; commands addressed with @username are ignored");
            None
        }
    };
    info!(admins = cfg.admin_user_ids.len(), "admin users configured");

    if let Err(e) = bot.set_my_commands(menu_commands()).await {
        warn!(error = %e, "failed to register command menu");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        bot_username,
        commands: CommandHandler::new(store, cfg.admin_user_ids.clone()),
        messenger,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_core::commands::BotCommand;

    #[test]
    fn menu_lists_only_user_commands() {
        for c in menu_commands() {
            let cmd = BotCommand::from_name(&c.command).unwrap();
            assert!(!cmd.is_admin_only(), "{} should not be in the menu", c.command);
        }
    }
}
