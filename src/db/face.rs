//! Enrolled face repository

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use image::RgbImage;
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::DbPool;
use crate::identity::AuthorizationLevel;
use crate::session::{Enrollment, IdentityRegistry, NewFace};
use crate::vision::save_jpeg;
use crate::{Error, Result};

const SELECT_COLUMNS: &str =
    "SELECT id, face_id, name, authorization, encoding, image_path, created_at FROM faces";

/// An enrolled face
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub id: i64,
    pub face_id: String,
    pub name: String,
    pub authorization: AuthorizationLevel,
    pub embedding: Vec<f32>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Face repository
#[derive(Clone)]
pub struct FaceRepo {
    pool: DbPool,
    faces_dir: PathBuf,
}

impl FaceRepo {
    /// Create a repository that stores face crops under `faces_dir`
    #[must_use]
    pub fn new(pool: DbPool, faces_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            faces_dir: faces_dir.into(),
        }
    }

    /// Insert a face record
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(
        &self,
        face_id: &str,
        name: &str,
        authorization: AuthorizationLevel,
        embedding: &[f32],
        image_path: Option<&Path>,
    ) -> Result<FaceRecord> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now();
        let image_path = image_path.map(|p| p.to_string_lossy().into_owned());

        conn.execute(
            "INSERT INTO faces (face_id, name, authorization, encoding, image_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                face_id,
                name,
                authorization.as_str(),
                embedding_to_bytes(embedding),
                image_path,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(FaceRecord {
            id: conn.last_insert_rowid(),
            face_id: face_id.to_string(),
            name: name.to_string(),
            authorization,
            embedding: embedding.to_vec(),
            image_path,
            created_at: now,
        })
    }

    /// Save the face crop and insert a record under a fresh face id
    ///
    /// # Errors
    ///
    /// Returns error if the image cannot be written or the insert fails
    pub fn register_face(
        &self,
        name: &str,
        authorization: AuthorizationLevel,
        embedding: &[f32],
        face_image: &RgbImage,
    ) -> Result<FaceRecord> {
        let face_id = generate_face_id();

        std::fs::create_dir_all(&self.faces_dir)?;
        let image_path = self.faces_dir.join(format!("{face_id}.jpg"));
        save_jpeg(face_image, &image_path)?;

        let record = self.insert(&face_id, name, authorization, embedding, Some(&image_path))?;
        tracing::info!(face_id, name, path = %image_path.display(), "face registered");
        Ok(record)
    }

    /// Find a face by its face id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, face_id: &str) -> Result<Option<FaceRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE face_id = ?1"),
            [face_id],
            row_to_record,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// All enrolled faces, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn all(&self) -> Result<Vec<FaceRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .map_err(|e| Error::Database(e.to_string()))?;

        let faces = stmt
            .query_map([], row_to_record)
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(faces)
    }

    /// Number of enrolled faces
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl IdentityRegistry for FaceRepo {
    fn register(&self, face: &NewFace, enrollment: &Enrollment) -> Result<String> {
        self.register_face(
            &enrollment.name,
            enrollment.authorization,
            &face.embedding,
            &face.face_image,
        )
        .map(|record| record.face_id)
    }
}

/// Face id of the form `YYYYmmddHHMMSS_<8 hex>`
fn generate_face_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FaceRecord> {
    let authorization: String = row.get(3)?;
    let encoding: Vec<u8> = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(FaceRecord {
        id: row.get(0)?,
        face_id: row.get(1)?,
        name: row.get(2)?,
        authorization: authorization.parse().unwrap_or_default(),
        embedding: embedding_from_bytes(&encoding),
        image_path: row.get(5)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Serialize an embedding as little-endian f32 bytes
#[must_use]
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from little-endian f32 bytes
#[must_use]
pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
            f32::from_le_bytes(arr)
        })
        .collect()
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
