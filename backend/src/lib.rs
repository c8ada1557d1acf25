//! # Daycare Console Backend
//!
//! All non-UI logic of the childcare management console.
//!
//! The crate brings together:
//! - **Domain**: intake ledger, intake orchestration, the parent verification
//!   gate and attendance reconciliation
//! - **Storage**: the remote API the console runs against
//! - **IO**: notifications, the absence-confirmation prompt and the periodic
//!   attendance refresh
//!
//! ## Architecture
//!
//! ```text
//! UI Layer (screens, dialogs, toasts)
//!     ↓
//! IO Layer (Notifier, AbsencePrompt, PeriodicRefresh)
//!     ↓
//! Domain Layer (services)
//!     ↓
//! Storage Layer (REST client / in-memory)
//! ```

pub mod config;
pub mod domain;
pub mod io;
pub mod logging;
pub mod storage;

use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use std::path::Path;
use std::sync::Arc;

pub use config::ConsoleConfig;
pub use domain::*;
pub use io::*;
pub use storage::{InMemoryConnection, RestConnection};

/// Services shared by every screen of one console session
#[derive(Clone)]
pub struct AppState {
    pub config: ConsoleConfig,
    pub connection: Arc<RestConnection>,
    pub form_ledger: FormLedger<RestConnection>,
    pub intake_service: IntakeService<RestConnection>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Reconciler for one day's attendance screen
    pub fn attendance_for(&self, date: NaiveDate) -> AttendanceReconciler<RestConnection> {
        AttendanceReconciler::new(self.connection.clone(), self.notifier.clone(), date)
    }

    /// Gate for a parent who opened an access link
    pub fn parent_access_gate(&self, token: &str) -> ParentAccessGate<RestConnection> {
        ParentAccessGate::open(self.connection.clone(), token)
    }

    pub fn attendance_refresh_config(&self) -> PeriodicRefreshConfig {
        PeriodicRefreshConfig::from_config(&self.config)
    }
}

/// Build the application state for a validated config
pub fn initialize_backend(config: ConsoleConfig, notifier: Arc<dyn Notifier>) -> Result<AppState> {
    config.validate()?;

    info!("Setting up API connection to {}", config.api_base_url);
    let connection = Arc::new(RestConnection::from_config(&config)?);

    info!("Setting up domain services");
    let form_ledger = FormLedger::new(connection.clone());
    let intake_service =
        IntakeService::new(connection.clone()).with_dashboard_batch_size(config.dashboard_batch_size);

    info!("Setting up application state");
    Ok(AppState {
        config,
        connection,
        form_ledger,
        intake_service,
        notifier,
    })
}

/// Load the config file, install logging and build the state
pub fn initialize_from_config_file(path: &Path) -> Result<AppState> {
    let config = ConsoleConfig::load_or_create(path)?;
    logging::init_logging(&config.log_level)?;
    initialize_backend(config, Arc::new(LogNotifier))
}
