//! Patients service
//!
//! Transactional patient CRUD. Each write runs the row change, the optional
//! image write and the sync-queue append on one transaction, so either all
//! three persist or none do. Integrates Repository, ImageStore and the outbox.

use super::transaction::{commit_or_compensate, discard_image, path_to_column};
use crate::database::outbox;
use crate::database::{NewPatient, Patient, PatientUpdate, Repository, SyncAction, SyncTable};
use crate::error::{AppError, Result};
use crate::storage::{ImagePayload, ImageStore};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::path::PathBuf;

/// Service for managing patients
#[derive(Clone)]
pub struct PatientsService {
    repo: Repository,
    images: ImageStore,
}

impl PatientsService {
    pub fn new(repo: Repository, images: ImageStore) -> Self {
        Self { repo, images }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Create a patient, optionally with a photo (`data:` URI)
    pub async fn create_patient(
        &self,
        fields: NewPatient,
        image_data: Option<&str>,
    ) -> Result<Patient> {
        tracing::info!("Creating patient: {}", fields.name.trim());

        fields.validate()?;
        let payload = image_data.map(ImagePayload::parse).transpose()?;

        let mut tx = self.repo.begin().await?;
        let mut written = None;
        let outcome = self
            .insert_in_tx(&mut tx, &fields, payload.as_ref(), &mut written)
            .await;
        let patient = commit_or_compensate(tx, outcome, written, &self.images).await?;

        tracing::info!("Patient created successfully: {}", patient.id);

        Ok(self.hydrate(patient))
    }

    async fn insert_in_tx(
        &self,
        conn: &mut SqliteConnection,
        fields: &NewPatient,
        payload: Option<&ImagePayload>,
        written: &mut Option<PathBuf>,
    ) -> Result<Patient> {
        let id = Repository::insert_patient(conn, fields).await?;

        if let Some(payload) = payload {
            let path = self.images.save(payload, id).await?;
            *written = Some(path.clone());
            Repository::set_patient_image(conn, id, &path_to_column(&path)?).await?;
        }

        let patient = Repository::fetch_patient(conn, id)
            .await?
            .ok_or(AppError::PatientNotFound(id))?;

        outbox::append(
            conn,
            SyncTable::Patients.as_str(),
            id,
            SyncAction::Insert,
            &serde_json::to_value(&patient)?,
        )
        .await?;

        Ok(patient)
    }

    /// Get a patient by ID
    pub async fn get_patient(&self, id: i64) -> Result<Patient> {
        let patient = self.repo.get_patient(id).await?;
        Ok(self.hydrate(patient))
    }

    /// List all patients, newest first
    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let patients = self.repo.list_patients().await?;
        Ok(patients.into_iter().map(|p| self.hydrate(p)).collect())
    }

    /// Patients with local changes not yet acknowledged, oldest first
    pub async fn list_unsynced_patients(&self) -> Result<Vec<Patient>> {
        let patients = self.repo.list_unsynced_patients().await?;
        Ok(patients.into_iter().map(|p| self.hydrate(p)).collect())
    }

    pub async fn mark_patient_synced(&self, id: i64) -> Result<bool> {
        self.repo.mark_patient_synced(id).await
    }

    /// Update a patient. Omitted fields keep their stored values.
    pub async fn update_patient(
        &self,
        id: i64,
        changes: PatientUpdate,
        image_data: Option<&str>,
    ) -> Result<Patient> {
        tracing::debug!("Updating patient: {}", id);

        changes.validate()?;
        let payload = image_data.map(ImagePayload::parse).transpose()?;

        let mut tx = self.repo.begin().await?;
        let mut written = None;
        let outcome = self
            .update_in_tx(&mut tx, id, changes, payload.as_ref(), &mut written)
            .await;
        let (patient, replaced) =
            commit_or_compensate(tx, outcome, written, &self.images).await?;

        if let Some(old) = replaced.filter(|p| !p.is_empty()) {
            discard_image(&self.images, &old).await;
        }

        tracing::debug!("Patient updated successfully: {}", id);

        Ok(self.hydrate(patient))
    }

    /// Returns the merged row and the image path it replaced
    async fn update_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        changes: PatientUpdate,
        payload: Option<&ImagePayload>,
        written: &mut Option<PathBuf>,
    ) -> Result<(Patient, Option<String>)> {
        let mut patient = Repository::fetch_patient(conn, id)
            .await?
            .ok_or(AppError::PatientNotFound(id))?;

        changes.apply_to(&mut patient);

        let mut replaced = None;
        if let Some(payload) = payload {
            let path = self.images.save(payload, id).await?;
            *written = Some(path.clone());
            replaced = patient.image_path.replace(path_to_column(&path)?);
        }

        patient.updated_at = Utc::now();
        patient.is_synced = false;

        if Repository::write_patient(conn, &patient).await? == 0 {
            return Err(AppError::PatientNotFound(id));
        }

        outbox::append(
            conn,
            SyncTable::Patients.as_str(),
            id,
            SyncAction::Update,
            &serde_json::to_value(&patient)?,
        )
        .await?;

        Ok((patient, replaced))
    }

    /// Delete a patient and its photo
    pub async fn delete_patient(&self, id: i64) -> Result<bool> {
        tracing::info!("Deleting patient: {}", id);

        let mut tx = self.repo.begin().await?;
        let outcome = Self::delete_in_tx(&mut tx, id).await;
        let image_path = commit_or_compensate(tx, outcome, None, &self.images).await?;

        if let Some(path) = image_path.filter(|p| !p.is_empty()) {
            discard_image(&self.images, &path).await;
        }

        tracing::info!("Patient deleted successfully: {}", id);

        Ok(true)
    }

    async fn delete_in_tx(conn: &mut SqliteConnection, id: i64) -> Result<Option<String>> {
        let patient = Repository::fetch_patient(conn, id)
            .await?
            .ok_or(AppError::PatientNotFound(id))?;

        if Repository::delete_patient_row(conn, id).await? == 0 {
            return Err(AppError::Generic(format!(
                "Failed to delete patient with ID {}",
                id
            )));
        }

        outbox::append(
            conn,
            SyncTable::Patients.as_str(),
            id,
            SyncAction::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await?;

        Ok(patient.image_path)
    }

    /// Attach the resolved image locator
    fn hydrate(&self, mut patient: Patient) -> Patient {
        patient.image_url = patient
            .image_path
            .as_deref()
            .and_then(|path| self.images.resolve_locator(path));
        patient
    }
}
