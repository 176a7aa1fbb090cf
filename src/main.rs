use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use nettap_daemon::config::NetTapConfig;
use nettap_daemon::enrichment::alert_enrichment::AlertEnrichment;
use nettap_daemon::enrichment::fingerprint::Fingerprinter;
use nettap_daemon::enrichment::oui::OuiTable;
use nettap_daemon::handlers;
use nettap_daemon::health::bridge::{BridgeHealthMonitor, spawn_bridge_cycle};
use nettap_daemon::health::internet::{InternetHealthMonitor, spawn_internet_cycle};
use nettap_daemon::search_client::SearchClient;
use nettap_daemon::storage_manager::{StorageManager, spawn_storage_cycle};
use nettap_daemon::stores::{AckStore, BaselineStore, InvestigationStore, ScheduleStore, PersistentMap};
use nettap_daemon::tshark::TSharkService;
use nettap_daemon::update_checker::UpdateChecker;
use nettap_daemon::update_executor::UpdateExecutor;
use nettap_daemon::version_manager::VersionManager;
use nettap_daemon::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nettap_daemon=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::var("NETTAP_CONFIG").unwrap_or_else(|_| "./nettap.toml".to_string());
    let config = Arc::new(NetTapConfig::load(&config_path)?);
    tracing::info!("starting nettap-daemon");

    let search = SearchClient::new(config.opensearch.url.clone());
    let storage = Arc::new(StorageManager::new(search.clone(), config.storage.clone()));
    let oui = Arc::new(OuiTable::load(&config.paths.oui_file));
    let fingerprinter = Arc::new(Fingerprinter::new(search.clone()));
    let alert_enrichment = Arc::new(AlertEnrichment::load(&config.paths.suricata_descriptions_file));
    let bridge_monitor = Arc::new(BridgeHealthMonitor::new(&config.bridge));
    let internet_monitor = Arc::new(InternetHealthMonitor::new(&config.internet));
    let tshark = Arc::new(TSharkService::new(config.tshark.clone()));
    let version_manager = Arc::new(VersionManager::new(&config.version, search.clone()));
    let update_checker = Arc::new(UpdateChecker::new(
        config.version.github_repo.clone(),
        config.paths.geoip_db_path.clone(),
    ));
    let update_executor = Arc::new(UpdateExecutor::new(&config.version, &config.paths));

    let ack_store: Arc<AckStore> = Arc::new(PersistentMap::load(&config.paths.alert_ack_file));
    let baseline_store: Arc<BaselineStore> = Arc::new(PersistentMap::load(&config.paths.baseline_file));
    let investigation_store: Arc<InvestigationStore> = Arc::new(PersistentMap::load(&config.paths.investigations_file));
    let schedule_store: Arc<ScheduleStore> = Arc::new(PersistentMap::load(&config.paths.schedules_file));

    spawn_storage_cycle(storage.clone(), config.storage.cycle_interval_secs);
    spawn_bridge_cycle(bridge_monitor.clone(), config.bridge.sample_interval_secs);
    spawn_internet_cycle(internet_monitor.clone(), config.internet.sample_interval_secs);

    let state = AppState {
        config,
        search,
        storage,
        oui,
        fingerprinter,
        alert_enrichment,
        bridge_monitor,
        internet_monitor,
        tshark,
        version_manager,
        update_checker,
        update_executor,
        ack_store,
        baseline_store,
        investigation_store,
        schedule_store,
    };

    let app = Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/api/system/health", get(handlers::health::system_health))
        // Storage
        .route("/api/storage/status", get(handlers::storage::status))
        .route("/api/storage/prune", post(handlers::storage::prune))
        .route("/api/storage/indices", get(handlers::storage::list_indices))
        // Alerts
        .route("/api/alerts", get(handlers::alerts::list))
        .route("/api/alerts/count", get(handlers::alerts::count))
        .route("/api/alerts/{id}", get(handlers::alerts::get_one))
        .route("/api/alerts/{id}/acknowledge", post(handlers::alerts::acknowledge))
        // Devices
        .route("/api/devices", get(handlers::devices::list))
        .route("/api/devices/{ip}", get(handlers::devices::get_one))
        .route("/api/devices/{ip}/connections", get(handlers::devices::connections))
        // Risk
        .route("/api/risk/scores", get(handlers::risk::list))
        .route("/api/risk/scores/{ip}", get(handlers::risk::get_one))
        // Traffic
        .route("/api/traffic/summary", get(handlers::traffic::summary))
        .route("/api/traffic/top-talkers", get(handlers::traffic::top_talkers))
        .route("/api/traffic/categories", get(handlers::traffic::categories))
        // Bridge health
        .route("/api/bridge/health", get(handlers::bridge::health))
        .route("/api/bridge/history", get(handlers::bridge::history))
        .route("/api/bridge/stats", get(handlers::bridge::stats))
        .route("/api/bridge/bypass/enable", post(handlers::bridge::bypass_enable))
        .route("/api/bridge/bypass/disable", post(handlers::bridge::bypass_disable))
        // Internet health
        .route("/api/internet/health", get(handlers::internet::health))
        .route("/api/internet/history", get(handlers::internet::history))
        .route("/api/internet/stats", get(handlers::internet::stats))
        // tshark
        .route("/api/tshark/analyze", post(handlers::tshark::analyze))
        .route("/api/tshark/version", get(handlers::tshark::version))
        .route("/api/tshark/available", get(handlers::tshark::available))
        .route("/api/tshark/validate-filter", post(handlers::tshark::validate_filter))
        .route("/api/tshark/protocols", get(handlers::tshark::protocols))
        .route("/api/tshark/fields/{protocol}", get(handlers::tshark::fields))
        // System versions and updates
        .route("/api/system/versions", get(handlers::system::versions))
        .route("/api/system/versions/{name}", get(handlers::system::get_version))
        .route("/api/system/versions/scan", post(handlers::system::scan_versions))
        .route("/api/system/updates/available", get(handlers::system::updates_available))
        .route("/api/system/updates/available/{component}", get(handlers::system::update_for))
        .route("/api/system/updates/check", post(handlers::system::check_updates))
        .route("/api/system/updates/apply", post(handlers::system::apply_updates))
        .route("/api/system/updates/rollback", post(handlers::system::rollback))
        // Investigations
        .route(
            "/api/investigations",
            get(handlers::investigations::list).post(handlers::investigations::create),
        )
        .route(
            "/api/investigations/{id}",
            get(handlers::investigations::get_one)
                .patch(handlers::investigations::update)
                .delete(handlers::investigations::delete),
        )
        .route("/api/investigations/{id}/notes", post(handlers::investigations::add_note))
        .route("/api/investigations/{id}/links", post(handlers::investigations::add_links))
        // Report schedules
        .route(
            "/api/schedules",
            get(handlers::schedules::list).post(handlers::schedules::create),
        )
        .route(
            "/api/schedules/{id}",
            get(handlers::schedules::get_one)
                .patch(handlers::schedules::update)
                .delete(handlers::schedules::delete),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("nettap-daemon listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
