//! Gateway state
//!
//! Application state for the gateway server.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_common::{AppConfig, AppError, SessionSigner};
use gatehouse_core::{SessionStore, Trie, UserDirectory};

use crate::notifier::Notifier;
use crate::proxy::ServiceProxy;
use crate::sessions::{LoginThrottle, SessionManager};

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server. Cloning is cheap.
#[derive(Clone)]
pub struct GatewayState {
    sessions: SessionManager,
    throttle: LoginThrottle,
    /// User records backing login and search results
    directory: Arc<dyn UserDirectory>,
    /// Prefix index over user names
    index: Arc<Trie>,
    /// WebSocket registry fed by the notification queue
    notifier: Arc<Notifier>,
    /// One proxy per configured service prefix
    proxies: Arc<Vec<Arc<ServiceProxy>>>,
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Assemble the state from its backing store and directory
    ///
    /// Builds the signer, throttle, notifier and service proxies from
    /// `config`, and seeds the search index from every user in `directory`.
    /// Background tasks (queue consumer, store purging) are not started
    /// here.
    pub async fn build(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, AppError> {
        let signer = SessionSigner::new(&config.session.signing_key)
            .map_err(|e| AppError::Config(e.to_string()))?;
        let sessions = SessionManager::new(signer, Arc::clone(&store));
        let throttle = LoginThrottle::new(store, config.session.max_login_failures);

        let index = Arc::new(Trie::new());
        let users = directory.all().await?;
        let mut entries = 0;
        for user in &users {
            entries += index.add_indexed_user(&user.first_name, &user.last_name, &user.user_name, user.id);
        }
        tracing::info!(users = users.len(), entries = entries, "Search index seeded");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.proxy.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("failed to build proxy client: {e}")))?;

        let proxies = config
            .services
            .iter()
            .map(|route| ServiceProxy::new(route, client.clone(), sessions.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let notifier = Notifier::new_shared(Duration::from_millis(config.queue.reconnect_delay_ms));

        Ok(Self {
            sessions,
            throttle,
            directory,
            index,
            notifier,
            proxies: Arc::new(proxies),
            config: Arc::new(config),
        })
    }

    /// Session issue / resolve / revoke
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Failed-login throttle
    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    pub fn index(&self) -> &Arc<Trie> {
        &self.index
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn proxies(&self) -> &[Arc<ServiceProxy>] {
        &self.proxies
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("sessions", &self.sessions)
            .field("notifier", &self.notifier)
            .field("proxies", &self.proxies)
            .field("config", &"AppConfig")
            .finish()
    }
}
