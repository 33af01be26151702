//! Bot command handling: argument parsing, authorization, store calls and
//! reply formatting. Messenger-agnostic; adapters feed text in and send the
//! returned HTML back.

use chrono::{Local, Utc};
use tracing::{error, warn};

use crate::{
    domain::UserId,
    duration::{format_duration_days, parse_duration_days},
    formatting::{escape_html, format_timestamp, mention_html},
    redeem::CodeStore,
    security::is_authorized,
    Error,
};

pub const MAX_CODES_PER_BATCH: i64 = 40;

/// Split `/cmd@botname arg1 ...` into a lowercase command and the raw rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Who sent the command.
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: UserId,
    pub display_name: String,
}

/// Commands handled by the premium subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Gen,
    Redeem,
    CodeStats,
    CleanExpired,
    CheckMyPremium,
}

impl BotCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "gen" => Some(BotCommand::Gen),
            "redeem" => Some(BotCommand::Redeem),
            "codestats" => Some(BotCommand::CodeStats),
            "cleanexpired" => Some(BotCommand::CleanExpired),
            "checkmypremium" => Some(BotCommand::CheckMyPremium),
            _ => None,
        }
    }

    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            BotCommand::Gen | BotCommand::CodeStats | BotCommand::CleanExpired
        )
    }
}

/// Routes parsed commands to the store and renders replies.
#[derive(Clone)]
pub struct CommandHandler {
    store: CodeStore,
    admin_user_ids: Vec<i64>,
}

impl CommandHandler {
    pub fn new(store: CodeStore, admin_user_ids: Vec<i64>) -> Self {
        Self {
            store,
            admin_user_ids,
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        is_authorized(Some(user_id), &self.admin_user_ids)
    }

    /// Handle a raw `/command args` message. Returns `None` for commands this
    /// subsystem does not own.
    pub async fn handle_text(&self, caller: &Caller, text: &str) -> Option<String> {
        let (name, args) = parse_command(text);
        let cmd = BotCommand::from_name(&name)?;
        Some(self.execute(caller, cmd, &args).await)
    }

    pub async fn execute(&self, caller: &Caller, cmd: BotCommand, args: &str) -> String {
        if cmd.is_admin_only() && !self.is_admin(caller.user_id) {
            warn!(user_id = caller.user_id.0, ?cmd, "admin command refused");
            return "❌ You don't have permission to use this command!".to_string();
        }

        match cmd {
            BotCommand::Start | BotCommand::Help => help_text(self.is_admin(caller.user_id)),
            BotCommand::Gen => self.gen(args).await,
            BotCommand::Redeem => self.redeem(caller, args).await,
            BotCommand::CodeStats => self.code_stats().await,
            BotCommand::CleanExpired => self.clean_expired().await,
            BotCommand::CheckMyPremium => self.check_my_premium(caller).await,
        }
    }

    async fn gen(&self, args: &str) -> String {
        let parts: Vec<&str> = args.split_whitespace().collect();
        if parts.len() != 2 {
            return gen_usage();
        }

        let Ok(count) = parts[0].parse::<i64>() else {
            return "❌ Invalid input! Please use correct format.".to_string();
        };
        if count > MAX_CODES_PER_BATCH {
            return format!("❌ Maximum {MAX_CODES_PER_BATCH} codes can be generated at once!");
        }
        if count < 1 {
            return "❌ Count must be at least 1!".to_string();
        }

        let Some(duration_days) = parse_duration_days(&parts[1].to_lowercase()) else {
            return invalid_duration_help();
        };

        let batch = match self.store.generate_codes(count as u32, duration_days).await {
            Ok(b) => b,
            Err(Error::InvalidInput(reason)) => {
                warn!(%reason, "/gen duration rejected");
                return invalid_duration_help();
            }
            Err(e) => {
                error!(error = %e, "/gen failed");
                return "❌ Error generating codes. Please try again later.".to_string();
            }
        };

        let mut lines = vec![
            format!("🎟️ <b>{count} Premium Code(s) Generated</b>"),
            format!(
                "⏱️ <b>Duration:</b> {}",
                format_duration_days(batch.premium_duration_days)
            ),
            format!(
                "📅 <b>Valid Until:</b> {}\n",
                format_timestamp(&batch.expires_at.with_timezone(&Local))
            ),
            "<b>Redemption Codes:</b>\n".to_string(),
        ];
        for code in &batch.codes {
            lines.push(format!("<code>/redeem {code}</code>"));
        }
        lines.push(
            "\n<b>Note:</b> Users can redeem these codes using the /redeem command.".to_string(),
        );
        lines.join("\n")
    }

    async fn redeem(&self, caller: &Caller, args: &str) -> String {
        let parts: Vec<&str> = args.split_whitespace().collect();
        if parts.len() != 1 {
            return "❌ <b>Usage:</b> <code>/redeem &lt;code&gt;</code>\n<b>Example:</b> <code>/redeem JS19MNUX</code>"
                .to_string();
        }
        let code = parts[0].to_uppercase();

        match self.store.redeem_code(&code, caller.user_id).await {
            Ok(outcome) => {
                let (success, message) = outcome.into_reply();
                if success {
                    format!(
                        "🎉 <b>Congratulations, {}!</b>\n{message}",
                        mention_html(caller.user_id, &caller.display_name)
                    )
                } else {
                    message
                }
            }
            Err(Error::InvalidInput(reason)) => {
                warn!(
                    user_id = caller.user_id.0,
                    code = %code,
                    %reason,
                    "/redeem grant out of range"
                );
                "❌ This code's premium duration cannot be applied. Ask an admin for a new code."
                    .to_string()
            }
            Err(e) => {
                error!(user_id = caller.user_id.0, error = %e, "/redeem failed");
                "❌ Error redeeming code. Please try again later.".to_string()
            }
        }
    }

    async fn code_stats(&self) -> String {
        match self.store.get_codes_stats().await {
            Ok(stats) => format!(
                "📊 <b>Redeem Codes Statistics</b>\n\n\
✅ <b>Active Codes:</b> {}\n\
✅ <b>Used Codes:</b> {}\n\
⏰ <b>Expired Codes:</b> {}\n\
📊 <b>Total Codes:</b> {}",
                stats.active,
                stats.used,
                stats.expired,
                stats.total()
            ),
            Err(e) => {
                error!(error = %e, "/codestats failed");
                "❌ Error getting stats. Please try again later.".to_string()
            }
        }
    }

    async fn clean_expired(&self) -> String {
        match self.store.clean_expired_codes().await {
            Ok(n) => format!(
                "🗑️ <b>Cleanup Complete!</b>\n✅ Deleted {n} expired codes from database."
            ),
            Err(e) => {
                error!(error = %e, "/cleanexpired failed");
                "❌ Error cleaning expired codes. Please try again later.".to_string()
            }
        }
    }

    async fn check_my_premium(&self, caller: &Caller) -> String {
        let now = Utc::now();
        match self.store.premium_until_at(caller.user_id, now).await {
            Ok(Some(until)) => {
                let left_days = (until - now).num_milliseconds() as f64 / 86_400_000.0;
                format!(
                    "✅ <b>Premium Status: ACTIVE</b>\n\
📅 <b>Expires On:</b> {}\n\
⏰ <b>Time Left:</b> {}",
                    format_timestamp(&until.with_timezone(&Local)),
                    format_duration_days(left_days)
                )
            }
            Ok(None) => "❌ <b>Premium Status: INACTIVE</b>\n\n\
You don't have an active premium subscription. Use <code>/redeem &lt;code&gt;</code> to activate premium access."
                .to_string(),
            Err(e) => {
                error!(user_id = caller.user_id.0, error = %e, "/checkmypremium failed");
                "❌ Error checking premium status. Please try again later.".to_string()
            }
        }
    }
}

fn help_text(is_admin: bool) -> String {
    let mut body = String::from(
        "🤖 <b>Premium Access</b>\n\n\
<b>📋 Commands:</b>\n\
/redeem &lt;code&gt; - Redeem a premium code\n\
/checkmypremium - Show your premium status\n\
/help - Show this help message",
    );
    if is_admin {
        body.push_str(
            "\n\n<b>🔐 Admin:</b>\n\
/gen &lt;count&gt; &lt;duration&gt; - Generate up to 40 codes\n\
/codestats - Code statistics\n\
/cleanexpired - Delete expired unused codes",
        );
    }
    body
}

fn gen_usage() -> String {
    "❌ <b>Invalid format!</b>\n\n\
<b>Usage:</b> <code>/gen &lt;count&gt; &lt;duration&gt;</code>\n\n\
<b>Examples:</b>\n\
• <code>/gen 10 7d</code> - 10 codes for 7 days\n\
• <code>/gen 5 2h</code> - 5 codes for 2 hours\n\
• <code>/gen 3 30m</code> - 3 codes for 30 minutes\n\
• <code>/gen 1 1y</code> - 1 code for 1 year\n\
• <code>/gen 15 45s</code> - 15 codes for 45 seconds\n\n\
<b>Supported formats:</b> <code>d</code> (days), <code>h</code> (hours), <code>m</code> (minutes), <code>s</code> (seconds), <code>y</code> (years)"
        .to_string()
}

fn invalid_duration_help() -> String {
    "❌ <b>Invalid duration format!</b>\n\n\
<b>Supported formats:</b>\n\
• <code>7d</code> or <code>7days</code> - 7 days\n\
• <code>2h</code> or <code>2hours</code> - 2 hours\n\
• <code>30m</code> or <code>30minutes</code> - 30 minutes\n\
• <code>45s</code> or <code>45seconds</code> - 45 seconds\n\
• <code>1y</code> or <code>1year</code> - 1 year"
        .to_string()
}

/// Escaped echo of an unknown command name.
pub fn unknown_command_reply(name: &str) -> String {
    format!("Unknown command: /{}", escape_html(name))
}
