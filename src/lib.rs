pub mod config;
pub mod devices;
pub mod enrichment;
pub mod error;
pub mod handlers;
pub mod health;
pub mod index_classifier;
pub mod models;
pub mod query_builder;
pub mod risk_scorer;
pub mod search_client;
pub mod storage_manager;
pub mod stores;
pub mod subprocess;
pub mod tshark;
pub mod update_checker;
pub mod update_executor;
pub mod version_manager;

use std::sync::Arc;

use config::NetTapConfig;
use enrichment::alert_enrichment::AlertEnrichment;
use enrichment::fingerprint::Fingerprinter;
use enrichment::oui::OuiTable;
use health::bridge::BridgeHealthMonitor;
use health::internet::InternetHealthMonitor;
use search_client::SearchClient;
use storage_manager::StorageManager;
use stores::{AckStore, BaselineStore, InvestigationStore, ScheduleStore};
use tshark::TSharkService;
use update_checker::UpdateChecker;
use update_executor::UpdateExecutor;
use version_manager::VersionManager;

/// Process-wide singletons shared by every HTTP handler. Index entries and
/// history samples read through these are value types, copied out to
/// callers and never aliased.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NetTapConfig>,
    pub search: SearchClient,
    pub storage: Arc<StorageManager>,
    pub oui: Arc<OuiTable>,
    pub fingerprinter: Arc<Fingerprinter>,
    pub alert_enrichment: Arc<AlertEnrichment>,
    pub bridge_monitor: Arc<BridgeHealthMonitor>,
    pub internet_monitor: Arc<InternetHealthMonitor>,
    pub tshark: Arc<TSharkService>,
    pub version_manager: Arc<VersionManager>,
    pub update_checker: Arc<UpdateChecker>,
    pub update_executor: Arc<UpdateExecutor>,
    pub ack_store: Arc<AckStore>,
    pub baseline_store: Arc<BaselineStore>,
    pub investigation_store: Arc<InvestigationStore>,
    pub schedule_store: Arc<ScheduleStore>,
}
