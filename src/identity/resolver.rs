//! Resolve the face in view against enrolled identities

use std::sync::Arc;

use super::enroll::generate_unique_username;
use super::face::{FaceDetector, face_distance};
use crate::Result;
use crate::db::FaceRepo;
use crate::session::{IdentityResolver, NewFace, Resolution};
use crate::vision::Frame;

/// Default maximum embedding distance for a match
pub const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;

/// Matches detected faces against the face repository
pub struct FaceIdentityResolver {
    detector: Arc<dyn FaceDetector>,
    faces: FaceRepo,
    tolerance: f32,
}

impl FaceIdentityResolver {
    #[must_use]
    pub fn new(detector: Arc<dyn FaceDetector>, faces: FaceRepo, tolerance: f32) -> Self {
        Self {
            detector,
            faces,
            tolerance,
        }
    }
}

impl IdentityResolver for FaceIdentityResolver {
    fn resolve(&self, frames: &[Frame]) -> Result<Resolution> {
        let known = self.faces.all()?;

        // Newest first, every other frame
        for frame in frames.iter().rev().step_by(2) {
            let Some(face) = self.detector.detect(frame)?.into_iter().next() else {
                continue;
            };

            if let Some(record) = known
                .iter()
                .find(|k| face_distance(&k.embedding, &face.embedding) <= self.tolerance)
            {
                return Ok(Resolution::Known {
                    face_id: record.face_id.clone(),
                    name: record.name.clone(),
                });
            }

            let face_image = frame.crop(face.location)?;
            let temp_name = generate_unique_username();
            tracing::debug!(temp_name, known = known.len(), "face did not match any enrolled user");

            return Ok(Resolution::New(NewFace {
                temp_name,
                face_image,
                embedding: face.embedding,
            }));
        }

        Ok(Resolution::NoFace)
    }
}
