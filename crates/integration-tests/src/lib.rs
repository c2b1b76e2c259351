//! Integration tests for the Rigshop storefront.
//!
//! Each test starts the full router on an ephemeral port over a JSON store
//! in a temporary directory and talks to it over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rigshop-integration-tests
//! ```

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tempfile::TempDir;

use rigshop_core::{Price, ProductCategory, UserRole};
use rigshop_storefront::config::StorefrontConfig;
use rigshop_storefront::db::JsonStore;
use rigshop_storefront::models::{NewProduct, Product, User};
use rigshop_storefront::services::auth::AuthService;
use rigshop_storefront::{AppState, router};

/// Password given to every account created through [`TestContext`].
pub const PASSWORD: &str = "correct horse battery";

const JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

/// A running server and a client pointed at it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub state: AppState,
    _dir: TempDir,
}

impl TestContext {
    /// Start a server with a generous auth rate limit.
    pub async fn new() -> Self {
        Self::with_vars(&[]).await
    }

    /// Start a server, overriding configuration variables.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data_dir = dir.path().join("data").display().to_string();
        let image_dir = dir.path().join("images").display().to_string();

        let mut vars: HashMap<String, String> = [
            ("RIGSHOP_JWT_SECRET", JWT_SECRET),
            ("RIGSHOP_DATA_DIR", data_dir.as_str()),
            ("RIGSHOP_IMAGE_DIR", image_dir.as_str()),
            ("RIGSHOP_AUTH_RATE_PERIOD_SECS", "1"),
            ("RIGSHOP_AUTH_RATE_BURST", "1000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        for (key, value) in overrides {
            vars.insert((*key).to_owned(), (*value).to_owned());
        }

        let config = StorefrontConfig::from_vars(&vars).expect("Invalid test configuration");
        let store = JsonStore::open(dir.path().join("data"))
            .await
            .expect("Failed to open JSON store");
        let state = AppState::new(config, Arc::new(store));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local address");
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            state,
            _dir: dir,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Create an account directly in the store.
    ///
    /// # Panics
    ///
    /// Panics if the account cannot be created.
    pub async fn create_account(&self, email: &str, role: UserRole) -> User {
        AuthService::new(self.state.store())
            .create_account(email, "Test Account", PASSWORD, role)
            .await
            .expect("Failed to create account")
    }

    /// Log in through the API and return the bearer token.
    ///
    /// # Panics
    ///
    /// Panics if the login is rejected.
    pub async fn login(&self, email: &str) -> String {
        let body: Value = self
            .post("/api/auth/login")
            .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Login request failed")
            .json()
            .await
            .expect("Login response was not JSON");
        body["token"]
            .as_str()
            .expect("Login returned no token")
            .to_owned()
    }

    /// Create an account and log it in.
    pub async fn signed_in(&self, email: &str, role: UserRole) -> (User, String) {
        let user = self.create_account(email, role).await;
        let token = self.login(email).await;
        (user, token)
    }

    /// Add a product directly to the store.
    ///
    /// # Panics
    ///
    /// Panics if the product cannot be stored.
    pub async fn add_product(&self, name: &str, category: ProductCategory, dollars: i64, stock: u32) -> Product {
        self.state
            .store()
            .create_product(NewProduct {
                name: name.to_owned(),
                description: None,
                brand: Some("Test Brand".to_owned()),
                price: Price::from_dollars(dollars),
                category,
                subcategory: None,
                stock,
                image_url: None,
                specs: BTreeMap::new(),
            })
            .await
            .expect("Failed to create product")
    }
}

/// A shipping address that passes validation.
#[must_use]
pub fn shipping() -> Value {
    serde_json::json!({
        "shipping": {
            "full_name": "Ada Lovelace",
            "address": "12 Analytical Way",
            "city": "London",
            "phone": "+44 20 7946 0000",
        }
    })
}

/// Parse a decimal string field into a [`Price`].
///
/// # Panics
///
/// Panics if the value is not a decimal string.
#[must_use]
pub fn price(value: &Value) -> Price {
    serde_json::from_value(value.clone()).expect("Not a price")
}
