use std::sync::Arc;

use crate::db::StudentRepository;
use crate::io::ImageStore;
use crate::verify::FaceVerifier;

/// Everything a request handler may touch, built once in `main` and shared read-only.
pub struct AppState<R, V> {
    pub students: R,
    pub verifier: V,
    pub images: ImageStore,
}

pub type Shared<R, V> = Arc<AppState<R, V>>;

impl<R: StudentRepository, V: FaceVerifier> AppState<R, V> {
    pub fn new(students: R, verifier: V, images: ImageStore) -> Shared<R, V> {
        Arc::new(Self {
            students,
            verifier,
            images,
        })
    }
}
