use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::db::StudentRepository;
use crate::err::Error;
use crate::io::TransientImage;
use crate::models::{FieldChanges, NewStudent, StudentUpdate, StudentView};
use crate::state::AppState;
use crate::validation::{validate_name, NameField};
use crate::verify::FaceVerifier;

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub fn parse_student_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|_| Error::invalid("Invalid student ID format"))
}

pub async fn register<R, V>(
    state: &AppState<R, V>,
    first_name: &str,
    last_name: &str,
    photo: &Upload,
) -> Result<Uuid, Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    validate_name(NameField::First, first_name)?;
    validate_name(NameField::Last, last_name)?;

    let image_path = state.images.store(&photo.bytes, &photo.filename).await?;
    let student = NewStudent::new(
        first_name,
        last_name,
        image_path.display().to_string(),
        Utc::now(),
    )?;
    match state.students.insert(student).await {
        Ok(id) => {
            log::info!("Registered {} {} as {}", first_name, last_name, id);
            Ok(id)
        }
        Err(err) => {
            state.images.discard(&image_path).await;
            Err(err)
        }
    }
}

/// Unverified -> NotFound | Found -> Matched | NotMatched. The submitted photo never outlives this call.
pub async fn mark<R, V>(
    state: &AppState<R, V>,
    first_name: &str,
    last_name: &str,
    photo: &Upload,
) -> Result<(), Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    validate_name(NameField::First, first_name)?;
    validate_name(NameField::Last, last_name)?;

    let student = state
        .students
        .find_by_name(first_name, last_name)
        .await?
        .ok_or_else(Error::student_not_found)?;

    let candidate = TransientImage::store(&photo.bytes, &photo.filename).await?;
    let verdict = state
        .verifier
        .verify(Path::new(&student.image_path), candidate.path())
        .await;
    candidate.discard().await;

    if !verdict? {
        log::warn!("Face did not match for student {}", student.id);
        return Err(Error::FaceMismatch {
            detail: "Face did not match".to_string(),
        });
    }

    let changes = FieldChanges::marked_present(Utc::now());
    if !state.students.update_fields(student.id, &changes).await? {
        return Err(Error::student_not_found());
    }
    log::info!("Attendance marked for student {}", student.id);
    Ok(())
}

pub async fn list<R, V>(state: &AppState<R, V>) -> Result<Vec<StudentView>, Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    let students = state.students.list_all().await?;
    Ok(students.into_iter().map(StudentView::from).collect())
}

pub async fn reset<R, V>(state: &AppState<R, V>) -> Result<u64, Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    let cleared = state.students.reset_all_flags().await?;
    log::info!("Reset attendance marks on {} student(s)", cleared);
    Ok(cleared)
}

pub async fn update<R, V>(
    state: &AppState<R, V>,
    id: Uuid,
    update: StudentUpdate,
) -> Result<StudentView, Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    let changes = update.into_changes(Utc::now())?;
    if !state.students.update_fields(id, &changes).await? {
        return Err(Error::student_not_found());
    }
    match state.students.find(id).await? {
        Some(student) => Ok(StudentView::from(student)),
        None => Err(Error::InternalError {
            kind: "DatabaseError",
            detail: "Failed to retrieve updated student".to_string(),
        }),
    }
}

pub async fn delete<R, V>(state: &AppState<R, V>, id: Uuid) -> Result<(), Error>
where
    R: StudentRepository,
    V: FaceVerifier,
{
    let student = state
        .students
        .find(id)
        .await?
        .ok_or_else(Error::student_not_found)?;

    state.images.discard(Path::new(&student.image_path)).await;

    if !state.students.delete(id).await? {
        return Err(Error::StudentNotFound {
            detail: "Student not found or already deleted".to_string(),
        });
    }
    log::info!("Deleted student {}", id);
    Ok(())
}
