//! Terminal enrollment for new faces

use std::path::PathBuf;

use chrono::Local;
use dialoguer::{Input, Select};
use image::RgbImage;
use uuid::Uuid;

use crate::session::{Enrollment, EnrollmentPrompt};
use crate::vision::save_jpeg;
use crate::{Error, Result};

/// Prefix of auto-generated names
const GENERATED_PREFIX: &str = "User_";

/// Access level granted to an enrolled identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthorizationLevel {
    #[default]
    Guest,
    User,
    Admin,
}

impl AuthorizationLevel {
    /// All levels, lowest first
    pub const ALL: [Self; 3] = [Self::Guest, Self::User, Self::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AuthorizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthorizationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(Error::Enrollment(format!(
                "unknown authorization level: {other}"
            ))),
        }
    }
}

/// Generate a unique placeholder name: `User_YYYYmmddHHMMSS_<6 hex>`
#[must_use]
pub fn generate_unique_username() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{GENERATED_PREFIX}{}_{}",
        Local::now().format("%Y%m%d%H%M%S"),
        &suffix[..6]
    )
}

/// Whether `name` was produced by [`generate_unique_username`]
#[must_use]
pub fn is_generated_username(name: &str) -> bool {
    name.starts_with(GENERATED_PREFIX)
}

/// Interactive enrollment on the controlling terminal
///
/// The face crop is written to `preview_path` so the user can check who is
/// being enrolled. An empty or interrupted name enrolls a guest with a
/// generated name.
#[derive(Debug)]
pub struct TerminalEnrollment {
    preview_path: PathBuf,
}

impl TerminalEnrollment {
    #[must_use]
    pub fn new(preview_path: impl Into<PathBuf>) -> Self {
        Self {
            preview_path: preview_path.into(),
        }
    }

    fn show_preview(&self, face_image: &RgbImage) {
        if let Some(parent) = self.preview_path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!(error = %e, "failed to create preview directory");
            return;
        }

        match save_jpeg(face_image, &self.preview_path) {
            Ok(()) => println!("Face preview saved to {}", self.preview_path.display()),
            Err(e) => tracing::warn!(error = %e, "failed to save face preview"),
        }
    }
}

impl EnrollmentPrompt for TerminalEnrollment {
    fn enroll(&mut self, face_image: &RgbImage) -> Result<Enrollment> {
        println!("\nNew face detected\n");
        self.show_preview(face_image);

        let name = match Input::<String>::new()
            .with_prompt("Enter your name (leave blank to continue as guest)")
            .allow_empty(true)
            .interact_text()
        {
            Ok(name) => name.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "name prompt interrupted");
                String::new()
            }
        };

        if name.is_empty() {
            tracing::info!("enrolling as guest");
            return Ok(Enrollment::guest());
        }

        let labels: Vec<&str> = AuthorizationLevel::ALL
            .iter()
            .map(|level| level.as_str())
            .collect();
        let authorization = match Select::new()
            .with_prompt("Authorization level")
            .items(&labels)
            .default(1)
            .interact()
        {
            Ok(index) => AuthorizationLevel::ALL
                .get(index)
                .copied()
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "authorization prompt interrupted");
                AuthorizationLevel::Guest
            }
        };

        Ok(Enrollment {
            name,
            authorization,
        })
    }
}
