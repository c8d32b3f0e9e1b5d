//! Repository layer for database operations
//!
//! Row-level queries for patients and doctors. Statements that take part in a
//! multi-step write accept the caller's connection so the services can run
//! them inside one transaction; plain reads go through the pool.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a write transaction on the single connection
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ===== Patients =====

    /// Insert a patient row without an image; returns the generated id
    pub async fn insert_patient(conn: &mut SqliteConnection, fields: &NewPatient) -> Result<i64> {
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO patients (
                name, age, gender, phone, email, address, medical_history,
                created_at, updated_at, is_synced
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&fields.name)
        .bind(fields.age)
        .bind(&fields.gender)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(&fields.address)
        .bind(&fields.medical_history)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        tracing::debug!("Inserted patient row: {}", id);
        Ok(id)
    }

    pub async fn fetch_patient(conn: &mut SqliteConnection, id: i64) -> Result<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(patient)
    }

    pub async fn set_patient_image(
        conn: &mut SqliteConnection,
        id: i64,
        image_path: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE patients SET image_path = ? WHERE id = ?")
            .bind(image_path)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Overwrite every mutable column and clear the synced flag.
    /// Returns the number of affected rows.
    pub async fn write_patient(conn: &mut SqliteConnection, patient: &Patient) -> Result<u64> {
        let rows = sqlx::query(
            r#"
            UPDATE patients SET
                name = ?,
                age = ?,
                gender = ?,
                phone = ?,
                email = ?,
                address = ?,
                medical_history = ?,
                image_path = ?,
                updated_at = ?,
                is_synced = 0
            WHERE id = ?
            "#,
        )
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.phone)
        .bind(&patient.email)
        .bind(&patient.address)
        .bind(&patient.medical_history)
        .bind(&patient.image_path)
        .bind(patient.updated_at)
        .bind(patient.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(rows)
    }

    pub async fn delete_patient_row(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows)
    }

    /// Get a patient by ID
    pub async fn get_patient(&self, id: i64) -> Result<Patient> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::PatientNotFound(id))
    }

    /// List all patients, newest first
    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(patients)
    }

    /// Patients not yet acknowledged by the remote side, oldest first
    pub async fn list_unsynced_patients(&self) -> Result<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE is_synced = 0 ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(patients)
    }

    pub async fn mark_patient_synced(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("UPDATE patients SET is_synced = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Marked patient {} as synced: {}", id, rows > 0);
        Ok(rows > 0)
    }

    // ===== Doctors =====

    pub async fn insert_doctor(conn: &mut SqliteConnection, fields: &NewDoctor) -> Result<i64> {
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO doctors (
                name, specialization, phone, email, address,
                created_at, updated_at, is_synced
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.specialization)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(&fields.address)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        tracing::debug!("Inserted doctor row: {}", id);
        Ok(id)
    }

    pub async fn fetch_doctor(conn: &mut SqliteConnection, id: i64) -> Result<Option<Doctor>> {
        let doctor = sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(doctor)
    }

    pub async fn set_doctor_image(
        conn: &mut SqliteConnection,
        id: i64,
        image_path: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE doctors SET image_path = ? WHERE id = ?")
            .bind(image_path)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn write_doctor(conn: &mut SqliteConnection, doctor: &Doctor) -> Result<u64> {
        let rows = sqlx::query(
            r#"
            UPDATE doctors SET
                name = ?,
                specialization = ?,
                phone = ?,
                email = ?,
                address = ?,
                image_path = ?,
                updated_at = ?,
                is_synced = 0
            WHERE id = ?
            "#,
        )
        .bind(&doctor.name)
        .bind(&doctor.specialization)
        .bind(&doctor.phone)
        .bind(&doctor.email)
        .bind(&doctor.address)
        .bind(&doctor.image_path)
        .bind(doctor.updated_at)
        .bind(doctor.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(rows)
    }

    pub async fn delete_doctor_row(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM doctors WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows)
    }

    pub async fn get_doctor(&self, id: i64) -> Result<Doctor> {
        sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::DoctorNotFound(id))
    }

    /// List all doctors by name
    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let doctors = sqlx::query_as::<_, Doctor>(
            "SELECT * FROM doctors ORDER BY name COLLATE NOCASE ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(doctors)
    }

    pub async fn mark_doctor_synced(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("UPDATE doctors SET is_synced = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    // ===== Sync acknowledgement =====

    /// Mark a record synced unless newer unprocessed queue entries exist for it.
    pub async fn mark_synced_if_settled(
        conn: &mut SqliteConnection,
        table: SyncTable,
        record_id: i64,
    ) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE {table} SET is_synced = 1
            WHERE id = ?
              AND NOT EXISTS (
                  SELECT 1 FROM sync_queue
                  WHERE table_name = ? AND record_id = ? AND is_processed = 0
              )
            "#,
            table = table.as_str()
        );

        let rows = sqlx::query(&sql)
            .bind(record_id)
            .bind(table.as_str())
            .bind(record_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}
