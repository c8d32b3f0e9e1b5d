//! Patient-related commands

use crate::app::AppState;
use crate::database::{NewPatient, Patient, PatientUpdate};
use crate::error::Result;

/// List all patients, newest first
pub async fn list_patients(state: &AppState) -> Result<Vec<Patient>> {
    state.patients_service.list_patients().await
}

/// Get a patient by ID
pub async fn get_patient(state: &AppState, id: i64) -> Result<Patient> {
    state.patients_service.get_patient(id).await
}

/// Create a patient with an optional `data:` URI photo
pub async fn create_patient(
    state: &AppState,
    patient: NewPatient,
    image_data: Option<String>,
) -> Result<Patient> {
    state
        .patients_service
        .create_patient(patient, image_data.as_deref())
        .await
}

/// Update a patient; omitted fields are kept
pub async fn update_patient(
    state: &AppState,
    id: i64,
    changes: PatientUpdate,
    image_data: Option<String>,
) -> Result<Patient> {
    state
        .patients_service
        .update_patient(id, changes, image_data.as_deref())
        .await
}

pub async fn delete_patient(state: &AppState, id: i64) -> Result<bool> {
    state.patients_service.delete_patient(id).await
}

/// Patients with changes not yet synced, oldest first
pub async fn list_unsynced_patients(state: &AppState) -> Result<Vec<Patient>> {
    state.patients_service.list_unsynced_patients().await
}

pub async fn mark_patient_synced(state: &AppState, id: i64) -> Result<bool> {
    state.patients_service.mark_patient_synced(id).await
}
