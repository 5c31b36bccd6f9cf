pub mod prelude;

pub mod chat_messages;
pub mod comments;
pub mod login_attempts;
pub mod password_reset_tokens;
pub mod users;
