pub mod chat;
pub mod comment;
pub mod login_attempt;
pub mod reset_token;
pub mod user;
