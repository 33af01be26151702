//! Telegram update handlers.
//!
//! Only slash commands are handled here. Replies are rendered by the core
//! [`CommandHandler`] and sent back through the messenger.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, warn};

use relaybot_core::{
    commands::{parse_command, unknown_command_reply, Caller, CommandHandler},
    domain::{ChatId, UserId},
};

use crate::router::AppState;

/// True when the command carries an `@username` suffix naming some other bot.
/// Without a known username every suffixed command counts as foreign.
pub fn addressed_to_other_bot(text: &str, bot_username: Option<&str>) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    let Some((_, target)) = first.split_once('@') else {
        return false;
    };
    match bot_username {
        Some(me) => !target.eq_ignore_ascii_case(me),
        None => true,
    }
}

/// Reply for a command message, or `None` when the text is not a command for
/// this bot.
pub async fn reply_for(
    commands: &CommandHandler,
    bot_username: Option<&str>,
    caller: &Caller,
    text: &str,
) -> Option<String> {
    if !text.starts_with('/') || addressed_to_other_bot(text, bot_username) {
        return None;
    }
    if let Some(reply) = commands.handle_text(caller, text).await {
        return Some(reply);
    }
    let (name, _) = parse_command(text);
    Some(unknown_command_reply(&name))
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let caller = Caller {
        user_id: UserId(user.id.0 as i64),
        display_name: user.full_name(),
    };
    let bot_username = state.bot_username.as_deref();
    let Some(reply) = reply_for(&state.commands, bot_username, &caller, text).await else {
        return Ok(());
    };
    debug!(user_id = caller.user_id.0, "command handled");

    if let Err(e) = state.messenger.send_html(ChatId(msg.chat.id.0), &reply).await {
        warn!(chat_id = msg.chat.id.0, error = %e, "failed to send reply");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use relaybot_core::{memory::InMemoryCodeRepository, redeem::CodeStore};

    const ME: Option<&str> = Some("relay_bot");

    fn caller() -> Caller {
        Caller {
            user_id: UserId(7),
            display_name: "Ann".to_string(),
        }
    }

    fn commands() -> CommandHandler {
        CommandHandler::new(
            CodeStore::new(Arc::new(InMemoryCodeRepository::new())),
            vec![1],
        )
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        assert_eq!(reply_for(&commands(), ME, &caller(), "hello").await, None);
    }

    #[tokio::test]
    async fn unknown_commands_get_escaped_reply() {
        let reply = reply_for(&commands(), ME, &caller(), "/<b>oops")
            .await
            .unwrap();
        assert_eq!(reply, "Unknown command: /&lt;b&gt;oops");
    }

    #[tokio::test]
    async fn known_commands_reach_the_core_handler() {
        let reply = reply_for(&commands(), ME, &caller(), "/redeem NOPE1234")
            .await
            .unwrap();
        assert!(reply.contains("Invalid"), "{reply}");
    }

    #[test]
    fn recognises_commands_for_other_bots() {
        assert!(!addressed_to_other_bot("/gen 1 7d", ME));
        assert!(!addressed_to_other_bot("/gen@Relay_Bot 1 7d", ME));
        assert!(addressed_to_other_bot("/gen@other_bot 1 7d", ME));
        assert!(addressed_to_other_bot("/gen@relay_bot 1 7d", None));
        assert!(!addressed_to_other_bot("/gen 1 7d", None));
    }

    #[tokio::test]
    async fn commands_for_other_bots_are_ignored() {
        let h = commands();
        assert_eq!(reply_for(&h, ME, &caller(), "/gen@other_bot 1 7d").await, None);
        assert_eq!(reply_for(&h, ME, &caller(), "/stats@other_bot").await, None);

        let reply = reply_for(&h, ME, &caller(), "/gen@relay_bot 1 7d").await.unwrap();
        assert!(reply.contains("don't have permission"), "{reply}");
    }
}
