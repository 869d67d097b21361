//! Identity resolution and face registry integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ada::db::FaceRepo;
use ada::identity::{
    AuthorizationLevel, DEFAULT_MATCH_TOLERANCE, DetectedFace, FaceDetector,
    FaceIdentityResolver, is_generated_username,
};
use ada::session::{Enrollment, IdentityRegistry, IdentityResolver, NewFace, Resolution};
use ada::vision::{FaceBox, Frame};
use ada::{Error, Result};

mod common;

const FACE_COLOR: [u8; 3] = [200, 150, 120];
const EMPTY_COLOR: [u8; 3] = [10, 10, 10];

/// Finds one face in frames of `FACE_COLOR`, none elsewhere
struct ColorDetector {
    embedding: Vec<f32>,
    calls: AtomicUsize,
}

impl ColorDetector {
    fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector for ColorDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if frame.image().get_pixel(0, 0).0 != FACE_COLOR {
            return Ok(Vec::new());
        }
        Ok(vec![DetectedFace {
            location: FaceBox {
                top: 2,
                right: 12,
                bottom: 8,
                left: 4,
            },
            embedding: self.embedding.clone(),
        }])
    }
}

struct BrokenDetector;

impl FaceDetector for BrokenDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>> {
        Err(Error::Identity("face service unreachable".to_string()))
    }
}

fn face_frame() -> Frame {
    Frame::solid(16, 16, FACE_COLOR)
}

fn empty_frame() -> Frame {
    Frame::solid(16, 16, EMPTY_COLOR)
}

fn setup_repo(dir: &std::path::Path) -> FaceRepo {
    FaceRepo::new(common::setup_test_db(), dir.join("faces"))
}

#[test]
fn test_close_embedding_resolves_known_user() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    repo.insert(
        "20260101120000_aaaaaaaa",
        "Alice",
        AuthorizationLevel::User,
        &[0.0, 0.0, 0.0],
        None,
    )
    .unwrap();

    let detector = Arc::new(ColorDetector::new(vec![0.1, 0.1, 0.1]));
    let resolver = FaceIdentityResolver::new(detector, repo, DEFAULT_MATCH_TOLERANCE);

    let resolution = resolver.resolve(&[face_frame()]).unwrap();
    let Resolution::Known { face_id, name } = resolution else {
        panic!("expected a known face, got {resolution:?}");
    };
    assert_eq!(face_id, "20260101120000_aaaaaaaa");
    assert_eq!(name, "Alice");
}

#[test]
fn test_first_match_within_tolerance_wins() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    repo.insert("far", "Carol", AuthorizationLevel::Guest, &[5.0, 5.0, 5.0], None)
        .unwrap();
    repo.insert("near_1", "Dave", AuthorizationLevel::User, &[0.3, 0.0, 0.0], None)
        .unwrap();
    repo.insert("near_2", "Erin", AuthorizationLevel::User, &[0.0, 0.0, 0.0], None)
        .unwrap();

    let detector = Arc::new(ColorDetector::new(vec![0.0, 0.0, 0.0]));
    let resolver = FaceIdentityResolver::new(detector, repo, DEFAULT_MATCH_TOLERANCE);

    let Resolution::Known { name, .. } = resolver.resolve(&[face_frame()]).unwrap() else {
        panic!("expected a known face");
    };
    assert_eq!(name, "Dave");
}

#[test]
fn test_unmatched_face_is_new() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    repo.insert("x", "Alice", AuthorizationLevel::User, &[1.0, 1.0, 1.0], None)
        .unwrap();

    let detector = Arc::new(ColorDetector::new(vec![0.0, 0.0, 0.0]));
    let resolver = FaceIdentityResolver::new(detector, repo, DEFAULT_MATCH_TOLERANCE);

    let resolution = resolver.resolve(&[face_frame()]).unwrap();
    let Resolution::New(face) = resolution else {
        panic!("expected a new face, got {resolution:?}");
    };
    assert!(is_generated_username(&face.temp_name));
    assert_eq!(face.face_image.dimensions(), (8, 6));
    assert_eq!(face.embedding, vec![0.0, 0.0, 0.0]);
}

#[test]
fn test_empty_registry_makes_every_face_new() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(ColorDetector::new(vec![0.5]));
    let resolver =
        FaceIdentityResolver::new(detector, setup_repo(dir.path()), DEFAULT_MATCH_TOLERANCE);

    assert!(matches!(
        resolver.resolve(&[face_frame()]).unwrap(),
        Resolution::New(_)
    ));
}

#[test]
fn test_every_other_frame_is_examined_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(ColorDetector::new(vec![0.0]));
    let resolver = FaceIdentityResolver::new(
        Arc::clone(&detector) as Arc<dyn FaceDetector>,
        setup_repo(dir.path()),
        DEFAULT_MATCH_TOLERANCE,
    );

    let frames: Vec<Frame> = (0..5).map(|_| empty_frame()).collect();
    assert!(matches!(resolver.resolve(&frames).unwrap(), Resolution::NoFace));
    assert_eq!(detector.calls(), 3);

    // The newest frame holds a face: found on the first look
    let mut frames: Vec<Frame> = (0..4).map(|_| empty_frame()).collect();
    frames.push(face_frame());
    assert!(matches!(resolver.resolve(&frames).unwrap(), Resolution::New(_)));
    assert_eq!(detector.calls(), 4);
}

#[test]
fn test_no_frames_is_no_face() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(ColorDetector::new(vec![0.0]));
    let resolver =
        FaceIdentityResolver::new(detector, setup_repo(dir.path()), DEFAULT_MATCH_TOLERANCE);

    assert!(matches!(resolver.resolve(&[]).unwrap(), Resolution::NoFace));
}

#[test]
fn test_detector_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = FaceIdentityResolver::new(
        Arc::new(BrokenDetector),
        setup_repo(dir.path()),
        DEFAULT_MATCH_TOLERANCE,
    );

    assert!(resolver.resolve(&[face_frame()]).is_err());
}

#[test]
fn test_registered_face_is_recognized_next_time() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());

    let new_face = NewFace {
        temp_name: "User_20260101120000_abc123".to_string(),
        face_image: image::RgbImage::from_pixel(8, 6, image::Rgb(FACE_COLOR)),
        embedding: vec![0.2, 0.4, 0.6],
    };
    let enrollment = Enrollment {
        name: "Bob".to_string(),
        authorization: AuthorizationLevel::Admin,
    };

    let face_id = repo.register(&new_face, &enrollment).unwrap();

    let record = repo.find(&face_id).unwrap().unwrap();
    assert_eq!(record.name, "Bob");
    assert_eq!(record.authorization, AuthorizationLevel::Admin);
    assert_eq!(record.embedding, vec![0.2, 0.4, 0.6]);
    assert!(dir.path().join("faces").join(format!("{face_id}.jpg")).exists());

    let detector = Arc::new(ColorDetector::new(vec![0.2, 0.4, 0.6]));
    let resolver = FaceIdentityResolver::new(detector, repo.clone(), DEFAULT_MATCH_TOLERANCE);

    let Resolution::Known { face_id: found, name } = resolver.resolve(&[face_frame()]).unwrap()
    else {
        panic!("expected the registered face to match");
    };
    assert_eq!(found, face_id);
    assert_eq!(name, "Bob");
    assert_eq!(repo.count().unwrap(), 1);
}
