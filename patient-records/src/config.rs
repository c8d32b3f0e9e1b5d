//! Application configuration constants
//!
//! Central location for file names, directory names, intervals and
//! validation boundaries used throughout the persistence core.

use std::time::Duration;

// ===== Storage Layout =====

/// SQLite database file inside the application data directory
pub const DATABASE_FILE_NAME: &str = "doctor-app.db";

/// Directory holding patient photographs
pub const PATIENT_IMAGES_DIR: &str = "patient_images";

/// Directory holding doctor photographs
pub const DOCTOR_IMAGES_DIR: &str = "doctor_images";

/// JSON settings file inside the application data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variable overriding the data directory of the headless binary
pub const DATA_DIR_ENV: &str = "PATIENT_RECORDS_DATA_DIR";

// ===== Database =====

/// How long a statement waits on a locked database before failing
pub const DATABASE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ===== Images =====

/// Extension used when the declared image type carries no subtype
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Only encoding accepted in an inline image payload
pub const IMAGE_PAYLOAD_ENCODING: &str = "base64";

/// Random hex characters appended to image file names
pub const IMAGE_NAME_ENTROPY_LEN: usize = 8;

// ===== Sync =====

/// Default delay between outbox drains (5 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5 * 60;

/// Minimum accepted delay between outbox drains.
/// Shorter values only generate probe traffic.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 10;

/// Endpoint probed with a HEAD request to detect connectivity
pub const DEFAULT_CONNECTIVITY_PROBE_URL: &str = "https://www.google.com/favicon.ico";

/// Timeout for the connectivity probe
pub const CONNECTIVITY_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
