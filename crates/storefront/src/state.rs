//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::auth::TokenService;
use crate::services::images::ImageStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, token signing keys and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    tokens: TokenService,
    images: ImageStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Opened storage backend
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn Store>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_hours);
        let images = ImageStore::new(config.image_dir.clone(), config.max_upload_bytes);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                images,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The storage backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Bearer token issuer and verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Uploaded image directory.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.store().backend())
            .field("tokens", self.tokens())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl AppState {
    /// State over a JSON store in `dir`, for handler tests.
    pub(crate) async fn for_tests(dir: &std::path::Path) -> Self {
        use std::collections::HashMap;

        let data_dir = dir.display().to_string();
        let image_dir = dir.join("images").display().to_string();
        let vars: HashMap<String, String> = [
            ("RIGSHOP_JWT_SECRET", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            ("RIGSHOP_DATA_DIR", data_dir.as_str()),
            ("RIGSHOP_IMAGE_DIR", image_dir.as_str()),
            ("RIGSHOP_MAX_UPLOAD_BYTES", "1024"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let config = StorefrontConfig::from_vars(&vars).unwrap();
        let store = crate::db::JsonStore::open(dir).await.unwrap();
        Self::new(config, Arc::new(store))
    }
}
