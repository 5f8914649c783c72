use std::{net::SocketAddr, sync::OnceLock, time::Duration};

use anyhow::Result;
use reqwest::{redirect::Policy, Client, Response};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use waitlist::{
    config::{get_or_init_config, AppConfig, StoreBackend},
    database::{PgStore, Store},
    init_dbg_tracing,
    templ_manager::TemplateManager,
    App, AppState,
};

/// Set `TEST_LOG=1` to see the server logs while running the tests.
fn init_test_subscriber() {
    static SUBSCRIBER: OnceLock<()> = OnceLock::new();
    SUBSCRIBER.get_or_init(|| {
        if std::env::var("TEST_LOG").is_ok() {
            init_dbg_tracing();
        }
    });
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Store,
    pub http_client: Client,
}

impl TestApp {
    /// Spawns the app on a random port, backed by a fresh in-memory store.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Like `spawn`, `customize` can change the config before the app is built.
    pub async fn spawn_with(customize: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        init_test_subscriber();

        let mut config = get_or_init_config().clone();
        // Trying to bind port 0 will trigger an OS scan for an available port
        config.net_config.host = [127, 0, 0, 1];
        config.net_config.app_port = 0;
        config.store_config.backend = StoreBackend::Memory;
        customize(&mut config);

        let app = App::build_from_config(&config).await?;
        Self::spawn_app(app)
    }

    /// Spawns the app with a postgres store whose database can't be reached.
    pub async fn spawn_with_unreachable_db() -> Result<Self> {
        init_test_subscriber();

        let mut db_config = get_or_init_config().db_config.clone();
        // Nothing listens on port 1.
        db_config.host = "127.0.0.1".to_string();
        db_config.port = 1;
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy_with(db_config.connection_options());

        let app_state = AppState::try_new(
            Store::Postgres(PgStore::from_pool(pool)),
            TemplateManager::init(),
            get_or_init_config().subscribe_config.clone(),
        )?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;

        Self::spawn_app(App::new(app_state, listener))
    }

    fn spawn_app(app: App) -> Result<Self> {
        let addr = app.local_addr()?;
        let store = app.app_state.store.clone();
        tokio::spawn(waitlist::serve(app));

        // Redirects are part of what we test, never follow them.
        let http_client = Client::builder().redirect(Policy::none()).build()?;

        Ok(TestApp {
            addr,
            store,
            http_client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.http_client.get(self.url(path)).send().await
    }

    pub async fn post_subscribe_form(&self, form: &[(&str, &str)]) -> reqwest::Result<Response> {
        self.http_client
            .post(self.url("/api/subscribe"))
            .form(form)
            .send()
            .await
    }

    pub async fn post_subscribe_json(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Result<Response> {
        self.http_client
            .post(self.url("/api/subscribe"))
            .json(body)
            .send()
            .await
    }

    /// Posts `body` verbatim with the given `content-type`.
    pub async fn post_subscribe_raw(
        &self,
        content_type: &str,
        body: &'static str,
    ) -> reqwest::Result<Response> {
        self.http_client
            .post(self.url("/api/subscribe"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
    }

    pub async fn subscriber_count(&self) -> Result<i64> {
        Ok(self.store.count().await?)
    }
}

pub fn assert_resp_redir_to(resp: &Response, location: &str) {
    assert_eq!(resp.status().as_u16(), 303);
    assert_eq!(
        resp.headers()
            .get("Location")
            .expect("redirect without a location header"),
        location
    );
}
