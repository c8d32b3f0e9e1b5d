//! Doctors service
//!
//! Same write protocol as patients: row, photo and sync-queue entry commit
//! together or not at all.

use super::transaction::{commit_or_compensate, discard_image, path_to_column};
use crate::database::outbox;
use crate::database::{Doctor, DoctorUpdate, NewDoctor, Repository, SyncAction, SyncTable};
use crate::error::{AppError, Result};
use crate::storage::{ImagePayload, ImageStore};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::path::PathBuf;

/// Service for managing doctors
#[derive(Clone)]
pub struct DoctorsService {
    repo: Repository,
    images: ImageStore,
}

impl DoctorsService {
    pub fn new(repo: Repository, images: ImageStore) -> Self {
        Self { repo, images }
    }

    pub async fn create_doctor(&self, fields: NewDoctor, image_data: Option<&str>) -> Result<Doctor> {
        tracing::info!("Creating doctor: {}", fields.name.trim());

        fields.validate()?;
        let payload = image_data.map(ImagePayload::parse).transpose()?;

        let mut tx = self.repo.begin().await?;
        let mut written = None;
        let outcome = self
            .insert_in_tx(&mut tx, &fields, payload.as_ref(), &mut written)
            .await;
        let doctor = commit_or_compensate(tx, outcome, written, &self.images).await?;

        tracing::info!("Doctor created successfully: {}", doctor.id);

        Ok(self.hydrate(doctor))
    }

    async fn insert_in_tx(
        &self,
        conn: &mut SqliteConnection,
        fields: &NewDoctor,
        payload: Option<&ImagePayload>,
        written: &mut Option<PathBuf>,
    ) -> Result<Doctor> {
        let id = Repository::insert_doctor(conn, fields).await?;

        if let Some(payload) = payload {
            let path = self.images.save(payload, id).await?;
            *written = Some(path.clone());
            Repository::set_doctor_image(conn, id, &path_to_column(&path)?).await?;
        }

        let doctor = Repository::fetch_doctor(conn, id)
            .await?
            .ok_or(AppError::DoctorNotFound(id))?;

        outbox::append(
            conn,
            SyncTable::Doctors.as_str(),
            id,
            SyncAction::Insert,
            &serde_json::to_value(&doctor)?,
        )
        .await?;

        Ok(doctor)
    }

    pub async fn get_doctor(&self, id: i64) -> Result<Doctor> {
        let doctor = self.repo.get_doctor(id).await?;
        Ok(self.hydrate(doctor))
    }

    /// List doctors alphabetically
    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let doctors = self.repo.list_doctors().await?;
        Ok(doctors.into_iter().map(|d| self.hydrate(d)).collect())
    }

    pub async fn mark_doctor_synced(&self, id: i64) -> Result<bool> {
        self.repo.mark_doctor_synced(id).await
    }

    pub async fn update_doctor(
        &self,
        id: i64,
        changes: DoctorUpdate,
        image_data: Option<&str>,
    ) -> Result<Doctor> {
        tracing::debug!("Updating doctor: {}", id);

        changes.validate()?;
        let payload = image_data.map(ImagePayload::parse).transpose()?;

        let mut tx = self.repo.begin().await?;
        let mut written = None;
        let outcome = self
            .update_in_tx(&mut tx, id, changes, payload.as_ref(), &mut written)
            .await;
        let (doctor, replaced) = commit_or_compensate(tx, outcome, written, &self.images).await?;

        if let Some(old) = replaced.filter(|p| !p.is_empty()) {
            discard_image(&self.images, &old).await;
        }

        Ok(self.hydrate(doctor))
    }

    async fn update_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        changes: DoctorUpdate,
        payload: Option<&ImagePayload>,
        written: &mut Option<PathBuf>,
    ) -> Result<(Doctor, Option<String>)> {
        let mut doctor = Repository::fetch_doctor(conn, id)
            .await?
            .ok_or(AppError::DoctorNotFound(id))?;

        changes.apply_to(&mut doctor);

        let mut replaced = None;
        if let Some(payload) = payload {
            let path = self.images.save(payload, id).await?;
            *written = Some(path.clone());
            replaced = doctor.image_path.replace(path_to_column(&path)?);
        }

        doctor.updated_at = Utc::now();
        doctor.is_synced = false;

        if Repository::write_doctor(conn, &doctor).await? == 0 {
            return Err(AppError::DoctorNotFound(id));
        }

        outbox::append(
            conn,
            SyncTable::Doctors.as_str(),
            id,
            SyncAction::Update,
            &serde_json::to_value(&doctor)?,
        )
        .await?;

        Ok((doctor, replaced))
    }

    pub async fn delete_doctor(&self, id: i64) -> Result<bool> {
        tracing::info!("Deleting doctor: {}", id);

        let mut tx = self.repo.begin().await?;
        let outcome = Self::delete_in_tx(&mut tx, id).await;
        let image_path = commit_or_compensate(tx, outcome, None, &self.images).await?;

        if let Some(path) = image_path.filter(|p| !p.is_empty()) {
            discard_image(&self.images, &path).await;
        }

        Ok(true)
    }

    async fn delete_in_tx(conn: &mut SqliteConnection, id: i64) -> Result<Option<String>> {
        let doctor = Repository::fetch_doctor(conn, id)
            .await?
            .ok_or(AppError::DoctorNotFound(id))?;

        if Repository::delete_doctor_row(conn, id).await? == 0 {
            return Err(AppError::Generic(format!(
                "Failed to delete doctor with ID {}",
                id
            )));
        }

        outbox::append(
            conn,
            SyncTable::Doctors.as_str(),
            id,
            SyncAction::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await?;

        Ok(doctor.image_path)
    }

    fn hydrate(&self, mut doctor: Doctor) -> Doctor {
        doctor.image_url = doctor
            .image_path
            .as_deref()
            .and_then(|path| self.images.resolve_locator(path));
        doctor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, SyncOutbox};
    use std::path::Path;
    use tempfile::TempDir;

    const PNG_PAYLOAD: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    async fn create_test_service() -> (DoctorsService, SyncOutbox, TempDir) {
        let pool = create_memory_pool().await.unwrap();
        let temp = TempDir::new().unwrap();
        let images = ImageStore::new(temp.path().join("doctor_images"), "doctor");
        images.initialize().await.unwrap();

        (
            DoctorsService::new(Repository::new(pool.clone()), images),
            SyncOutbox::new(pool),
            temp,
        )
    }

    #[tokio::test]
    async fn test_create_doctor_with_photo() {
        let (service, outbox, _temp) = create_test_service().await;

        let doctor = service
            .create_doctor(
                NewDoctor {
                    specialization: Some("Cardiology".to_string()),
                    ..NewDoctor::new("Dr. Ada Quinn")
                },
                Some(PNG_PAYLOAD),
            )
            .await
            .unwrap();

        let path = doctor.image_path.clone().unwrap();
        assert!(Path::new(&path).exists());
        assert!(doctor.image_url.is_some());
        assert_eq!(doctor.specialization.as_deref(), Some("Cardiology"));

        let trail = outbox
            .entries_for(SyncTable::Doctors, doctor.id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, SyncAction::Insert);
        assert_eq!(trail[0].payload().unwrap()["specialization"], "Cardiology");
    }

    #[tokio::test]
    async fn test_list_doctors_alphabetical() {
        let (service, _outbox, _temp) = create_test_service().await;

        for name in ["zoe Park", "Adam Stone", "maria Lopez"] {
            service.create_doctor(NewDoctor::new(name), None).await.unwrap();
        }

        let names: Vec<String> = service
            .list_doctors()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Adam Stone", "maria Lopez", "zoe Park"]);
    }

    #[tokio::test]
    async fn test_update_doctor_keeps_other_fields() {
        let (service, outbox, _temp) = create_test_service().await;

        let doctor = service
            .create_doctor(
                NewDoctor {
                    phone: Some("555-0199".to_string()),
                    ..NewDoctor::new("Dr. Ada Quinn")
                },
                None,
            )
            .await
            .unwrap();

        let updated = service
            .update_doctor(
                doctor.id,
                DoctorUpdate {
                    specialization: Some("Neurology".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0199"));
        assert_eq!(updated.specialization.as_deref(), Some("Neurology"));
        assert!(!updated.is_synced);

        let trail = outbox
            .entries_for(SyncTable::Doctors, doctor.id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, SyncAction::Update);
    }

    #[tokio::test]
    async fn test_create_doctor_rolls_back_on_outbox_failure() {
        let (service, _outbox, temp) = create_test_service().await;
        sqlx::query("DROP TABLE sync_queue")
            .execute(service.repo.pool())
            .await
            .unwrap();

        let result = service
            .create_doctor(NewDoctor::new("Dr. Ada Quinn"), Some(PNG_PAYLOAD))
            .await;
        assert!(result.is_err());
        assert!(service.list_doctors().await.unwrap().is_empty());

        let leftovers = std::fs::read_dir(temp.path().join("doctor_images"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_mark_doctor_synced_until_next_edit() {
        let (service, _outbox, _temp) = create_test_service().await;
        let doctor = service
            .create_doctor(NewDoctor::new("Dr. Ada Quinn"), None)
            .await
            .unwrap();

        assert!(service.mark_doctor_synced(doctor.id).await.unwrap());
        assert!(!service.mark_doctor_synced(doctor.id + 50).await.unwrap());
        assert!(service.get_doctor(doctor.id).await.unwrap().is_synced);

        let edited = service
            .update_doctor(
                doctor.id,
                DoctorUpdate {
                    phone: Some("555-0199".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert!(!edited.is_synced);
    }

    #[tokio::test]
    async fn test_delete_doctor() {
        let (service, outbox, _temp) = create_test_service().await;

        let doctor = service
            .create_doctor(NewDoctor::new("Dr. Ada Quinn"), Some(PNG_PAYLOAD))
            .await
            .unwrap();
        let path = doctor.image_path.clone().unwrap();

        assert!(service.delete_doctor(doctor.id).await.unwrap());
        assert!(!Path::new(&path).exists());
        assert!(matches!(
            service.get_doctor(doctor.id).await,
            Err(AppError::DoctorNotFound(_))
        ));

        let trail = outbox
            .entries_for(SyncTable::Doctors, doctor.id)
            .await
            .unwrap();
        assert_eq!(trail.last().unwrap().action, SyncAction::Delete);

        assert!(matches!(
            service.delete_doctor(doctor.id).await,
            Err(AppError::DoctorNotFound(_))
        ));
    }
}
