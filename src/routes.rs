use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{ContentLengthLimitRejection, JsonRejection};
use axum::extract::{ContentLengthLimit, Multipart, Path};
use axum::handler::Handler;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::attendance::{self, parse_student_id, Upload};
use crate::db::StudentRepository;
use crate::err::{created, handler404, proceeds, Error, Payload};
use crate::models::{AttendanceToggle, StudentUpdate, StudentView};
use crate::state::Shared;
use crate::verify::FaceVerifier;

/// Ceiling for multipart uploads. Photos larger than this are refused with 413.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

type StudentUpload = Result<
    ContentLengthLimit<Multipart, MAX_UPLOAD_BYTES>,
    ContentLengthLimitRejection<MultipartRejection>,
>;

pub fn router<R, V>(state: Shared<R, V>) -> Router
where
    R: StudentRepository,
    V: FaceVerifier,
{
    Router::new()
        .route("/students", get(list_students::<R, V>))
        .route("/students/register", post(register_student::<R, V>))
        .route("/students/mark", post(mark_attendance::<R, V>))
        .route("/students/reset", post(reset_marks::<R, V>))
        .route(
            "/students/:id",
            put(update_student::<R, V>)
                .patch(update_student::<R, V>)
                .delete(delete_student::<R, V>),
        )
        .route("/students/:id/attendance", put(toggle_attendance::<R, V>))
        .fallback(handler404.into_service())
        .layer(Extension(state))
}

pub fn cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    message: &'static str,
    student_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentList {
    students: Vec<StudentView>,
}

struct StudentForm {
    first_name: String,
    last_name: String,
    file: Upload,
}

async fn read_student_form(upload: StudentUpload) -> Result<StudentForm, Error> {
    let ContentLengthLimit(mut multipart) = upload?;
    let (mut first_name, mut last_name, mut file) = (None, None, None);

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("first_name") => first_name = Some(field.text().await?),
            Some("last_name") => last_name = Some(field.text().await?),
            Some("file") => {
                let filename = match field.file_name() {
                    Some(name) if !name.trim().is_empty() => name.to_owned(),
                    _ => return Err(Error::invalid("Uploaded file has no filename")),
                };
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    return Err(Error::invalid("Uploaded file is empty"));
                }
                file = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let missing = |field: &str| Error::invalid(format!("Missing form field `{}`", field));
    Ok(StudentForm {
        first_name: first_name.ok_or_else(|| missing("first_name"))?,
        last_name: last_name.ok_or_else(|| missing("last_name"))?,
        file: file.ok_or_else(|| missing("file"))?,
    })
}

async fn register_student<R: StudentRepository, V: FaceVerifier>(
    Extension(state): Extension<Shared<R, V>>,
    upload: StudentUpload,
) -> Payload<Registered> {
    let form = read_student_form(upload).await?;
    let id = attendance::register(&state, &form.first_name, &form.last_name, &form.file).await?;
    created(Registered {
        message: "Student registered",
        student_id: id.to_string(),
    })
}

async fn mark_attendance<R: StudentRepository, V: FaceVerifier>(
    Extension(state): Extension<Shared<R, V>>,
    upload: StudentUpload,
) -> Payload<Message> {
    let form = read_student_form(upload).await?;
    attendance::mark(&state, &form.first_name, &form.last_name, &form.file).await?;
    proceeds(Message {
        message: "Attendance marked",
    })
}

async fn list_students<R: StudentRepository, V: FaceVerifier>(
    Extension(state): Extension<Shared<R, V>>,
) -> Payload<StudentList> {
    proceeds(StudentList {
        students: attendance::list(&state).await?,
    })
}

async fn reset_marks<R: StudentRepository, V: FaceVerifier>(
    Extension(state): Extension<Shared<R, V>>,
) -> Payload<Message> {
    attendance::reset(&state).await?;
    proceeds(Message {
        message: "All marks reset",
    })
}

async fn update_student<R: StudentRepository, V: FaceVerifier>(
    Path(id): Path<String>,
    Extension(state): Extension<Shared<R, V>>,
    body: Result<Json<StudentUpdate>, JsonRejection>,
) -> Payload<StudentView> {
    let id = parse_student_id(&id)?;
    let Json(update) = body?;
    proceeds(attendance::update(&state, id, update).await?)
}

async fn toggle_attendance<R: StudentRepository, V: FaceVerifier>(
    Path(id): Path<String>,
    Extension(state): Extension<Shared<R, V>>,
    body: Result<Json<AttendanceToggle>, JsonRejection>,
) -> Payload<StudentView> {
    let id = parse_student_id(&id)?;
    let Json(toggle) = body?;
    proceeds(attendance::update(&state, id, toggle.into()).await?)
}

async fn delete_student<R: StudentRepository, V: FaceVerifier>(
    Path(id): Path<String>,
    Extension(state): Extension<Shared<R, V>>,
) -> Payload<Message> {
    let id = parse_student_id(&id)?;
    attendance::delete(&state, id).await?;
    proceeds(Message {
        message: "Student deleted successfully",
    })
}
