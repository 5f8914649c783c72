use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderName;
use derive_more::Deref;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    config::{AppConfig, SubscribeConfig},
    database::Store,
    templ_manager::TemplateManager,
    Result,
};

// ###################################
// ->  Structs
// ###################################
pub struct App {
    pub app_state: AppState,
    pub listener: TcpListener,
}
impl App {
    pub fn new(app_state: AppState, listener: TcpListener) -> Self {
        App {
            app_state,
            listener,
        }
    }

    pub async fn build_from_config(config: &AppConfig) -> Result<Self> {
        let store = Store::init(config).await?;
        let tm = TemplateManager::init();

        let app_state = AppState::try_new(store, tm, config.subscribe_config.clone())?;

        let addr = SocketAddr::from((config.net_config.host, config.net_config.app_port));
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("{:<20} - {}", "Listening on:", addr);

        let app = App::new(app_state, listener);
        Ok(app)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

pub struct InternalState {
    pub store: Store,
    pub templ_mgr: TemplateManager,
    pub subscribe_config: SubscribeConfig,
    /// Parsed once from `subscribe_config.client_ip_header`.
    pub client_ip_header: HeaderName,
}

/// Application state containing all global data.
/// It implements `Deref` to easily access the fields on `InternalState`
/// Uses an `Arc` so it can be cloned around.
#[derive(Clone, Deref)]
pub struct AppState(Arc<InternalState>);

impl AppState {
    pub fn try_new(
        store: Store,
        templ_mgr: TemplateManager,
        subscribe_config: SubscribeConfig,
    ) -> Result<Self> {
        let client_ip_header = subscribe_config.client_ip_header_name()?;

        Ok(AppState(Arc::new(InternalState {
            store,
            templ_mgr,
            subscribe_config,
            client_ip_header,
        })))
    }
}
