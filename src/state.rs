use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, ChatHub, CommentService, PasswordResetService, ResetNotifier, SeaOrmAuthService,
    notifier,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub resets: Arc<PasswordResetService>,

    pub comments: Arc<CommentService>,

    pub chat: Arc<ChatHub>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let notifier = notifier::from_config(&config.mail, &config.reset)?;
        Self::with_notifier(config, notifier).await
    }

    /// Same as [`SharedState::new`] but with a caller-supplied reset notifier.
    pub async fn with_notifier(
        config: Config,
        notifier: Arc<dyn ResetNotifier>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            config.forum.default_profile_color.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let resets = Arc::new(PasswordResetService::new(
            store.clone(),
            config.security.clone(),
            config.reset.clone(),
            notifier,
        ));

        let comments = Arc::new(CommentService::from_config(store.clone(), &config.forum));
        let chat = Arc::new(ChatHub::new(store.clone(), &config.chat));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            resets,
            comments,
            chat,
        })
    }
}
