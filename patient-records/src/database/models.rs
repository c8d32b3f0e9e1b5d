//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization across the command boundary.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// A patient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    /// Filesystem path of the stored photograph
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_synced: bool,
    /// `file://` locator resolved from `image_path` at read time, never stored
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Fields supplied when creating a patient
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

impl NewPatient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check required fields before anything is written.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_age(self.age)
    }
}

/// Partial update of a patient; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

impl PatientUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_age(self.age)
    }

    /// Merge provided fields over the current row.
    pub fn apply_to(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if self.age.is_some() {
            patient.age = self.age;
        }
        if self.gender.is_some() {
            patient.gender = self.gender;
        }
        if self.phone.is_some() {
            patient.phone = self.phone;
        }
        if self.email.is_some() {
            patient.email = self.email;
        }
        if self.address.is_some() {
            patient.address = self.address;
        }
        if self.medical_history.is_some() {
            patient.medical_history = self.medical_history;
        }
    }
}

/// A doctor record, parallel to [`Patient`] with a specialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_synced: bool,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Fields supplied when creating a doctor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewDoctor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Partial update of a doctor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoctorUpdate {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl DoctorUpdate {
    pub fn validate(&self) -> Result<()> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }

    pub fn apply_to(self, doctor: &mut Doctor) {
        if let Some(name) = self.name {
            doctor.name = name;
        }
        if self.specialization.is_some() {
            doctor.specialization = self.specialization;
        }
        if self.phone.is_some() {
            doctor.phone = self.phone;
        }
        if self.email.is_some() {
            doctor.email = self.email;
        }
        if self.address.is_some() {
            doctor.address = self.address;
        }
    }
}

/// A name is stored as given; it only has to contain something besides whitespace.
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_age(age: Option<i64>) -> Result<()> {
    match age {
        Some(age) if age < 0 => Err(AppError::Validation(format!(
            "age must not be negative (got {})",
            age
        ))),
        _ => Ok(()),
    }
}

/// Tables whose mutations are recorded in the sync queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTable {
    Patients,
    Doctors,
}

impl SyncTable {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTable::Patients => "patients",
            SyncTable::Doctors => "doctors",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "patients" => Some(SyncTable::Patients),
            "doctors" => Some(SyncTable::Doctors),
            _ => None,
        }
    }
}

impl fmt::Display for SyncTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of mutation recorded in the sync queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum SyncAction {
    Insert,
    Update,
    Delete,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Insert => "INSERT",
            SyncAction::Update => "UPDATE",
            SyncAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(SyncAction::Insert),
            "UPDATE" => Ok(SyncAction::Update),
            "DELETE" => Ok(SyncAction::Delete),
            other => Err(AppError::Validation(format!(
                "unknown sync action '{}'",
                other
            ))),
        }
    }
}

/// One entry of the append-only sync queue
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncQueueEntry {
    pub id: i64,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub action: SyncAction,
    /// JSON snapshot of the record at mutation time
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub is_processed: bool,
}

impl SyncQueueEntry {
    /// Decode the stored snapshot.
    pub fn payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.data)?)
    }

    pub fn table(&self) -> Option<SyncTable> {
        SyncTable::from_name(&self.table_name)
    }
}
