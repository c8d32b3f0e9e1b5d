//! Services module
//!
//! Business logic services that coordinate between commands and repository.

pub mod doctors;
pub mod patients;
pub mod settings;
pub mod sync;
mod transaction;

pub use doctors::DoctorsService;
pub use patients::PatientsService;
pub use settings::{AppSettings, SettingsService, SyncSettings};
pub use sync::{
    AlwaysOnline, ConnectivityProbe, HttpProbe, RemoteSink, SimulatedRemote, SyncReport,
    SyncService,
};
