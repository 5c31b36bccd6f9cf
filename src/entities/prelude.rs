pub use super::chat_messages::Entity as ChatMessages;
pub use super::comments::Entity as Comments;
pub use super::login_attempts::Entity as LoginAttempts;
pub use super::password_reset_tokens::Entity as PasswordResetTokens;
pub use super::users::Entity as Users;
