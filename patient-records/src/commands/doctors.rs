//! Doctor-related commands

use crate::app::AppState;
use crate::database::{Doctor, DoctorUpdate, NewDoctor};
use crate::error::Result;

/// List doctors alphabetically
pub async fn list_doctors(state: &AppState) -> Result<Vec<Doctor>> {
    state.doctors_service.list_doctors().await
}

pub async fn get_doctor(state: &AppState, id: i64) -> Result<Doctor> {
    state.doctors_service.get_doctor(id).await
}

pub async fn create_doctor(
    state: &AppState,
    doctor: NewDoctor,
    image_data: Option<String>,
) -> Result<Doctor> {
    state
        .doctors_service
        .create_doctor(doctor, image_data.as_deref())
        .await
}

pub async fn update_doctor(
    state: &AppState,
    id: i64,
    changes: DoctorUpdate,
    image_data: Option<String>,
) -> Result<Doctor> {
    state
        .doctors_service
        .update_doctor(id, changes, image_data.as_deref())
        .await
}

pub async fn delete_doctor(state: &AppState, id: i64) -> Result<bool> {
    state.doctors_service.delete_doctor(id).await
}

pub async fn mark_doctor_synced(state: &AppState, id: i64) -> Result<bool> {
    state.doctors_service.mark_doctor_synced(id).await
}
