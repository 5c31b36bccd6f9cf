pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod login_throttle;
pub use login_throttle::LoginThrottle;

pub mod policy;

pub mod reset_service;
pub use reset_service::{PasswordResetService, ResetError};

pub mod notifier;
pub use notifier::{LogNotifier, ResetNotifier, WebhookNotifier};

pub mod comments;
pub use comments::{CommentError, CommentService};

pub mod chat;
pub use chat::{ChatConnection, ChatError, ChatHub};

pub mod maintenance;
pub use maintenance::Maintenance;
