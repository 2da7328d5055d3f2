use std::future::Future;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{FieldChanges, NewStudent, Student};

/// Student records keyed by id. Every mutation touches a single row, except the bulk reset.
pub trait StudentRepository: Send + Sync + 'static {
    fn insert(&self, student: NewStudent) -> impl Future<Output = Result<Uuid, Error>> + Send;

    fn find(&self, id: Uuid) -> impl Future<Output = Result<Option<Student>, Error>> + Send;

    fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = Result<Option<Student>, Error>> + Send;

    fn list_all(&self) -> impl Future<Output = Result<Vec<Student>, Error>> + Send;

    /// Returns `false` when no student has this id.
    fn update_fields(
        &self,
        id: Uuid,
        changes: &FieldChanges,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    fn reset_all_flags(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Returns `false` when no student has this id.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool, Error>> + Send;
}

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pg = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pg).await?;
    Ok(pg)
}

#[derive(Debug, Clone)]
pub struct PgStudents {
    pg: PgPool,
}

impl PgStudents {
    pub fn new(pg: PgPool) -> Self {
        Self { pg }
    }
}

impl StudentRepository for PgStudents {
    async fn insert(&self, student: NewStudent) -> Result<Uuid, Error> {
        let id = Uuid::new_v4();
        let res = sqlx::query(
            "INSERT INTO students (id, first_name, last_name, image_path, marked_today, registration_date, last_seen_date) \
             VALUES ($1, $2, $3, $4, FALSE, $5, NULL)",
        )
        .bind(id)
        .bind(student.first_name)
        .bind(student.last_name)
        .bind(student.image_path)
        .bind(student.registration_date)
        .execute(&self.pg)
        .await?;

        if res.rows_affected() < 1 {
            return Err(Error::InternalError {
                kind: "DatabaseError",
                detail: "Could not save student to database!".to_string(),
            });
        }
        Ok(id)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Student>, Error> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pg)
            .await?;
        Ok(student)
    }

    async fn find_by_name(&self, first_name: &str, last_name: &str) -> Result<Option<Student>, Error> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE first_name = $1 AND last_name = $2 \
             ORDER BY registration_date, id LIMIT 1",
        )
        .bind(first_name.trim())
        .bind(last_name.trim())
        .fetch_optional(&self.pg)
        .await?;
        Ok(student)
    }

    async fn list_all(&self) -> Result<Vec<Student>, Error> {
        let students =
            sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY registration_date, id")
                .fetch_all(&self.pg)
                .await?;
        Ok(students)
    }

    async fn update_fields(&self, id: Uuid, changes: &FieldChanges) -> Result<bool, Error> {
        let res = sqlx::query(
            "UPDATE students SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                marked_today = COALESCE($4, marked_today), \
                last_seen_date = COALESCE($5, last_seen_date) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(changes.marked_today)
        .bind(changes.last_seen_date)
        .execute(&self.pg)
        .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn reset_all_flags(&self) -> Result<u64, Error> {
        let res = sqlx::query("UPDATE students SET marked_today = FALSE")
            .execute(&self.pg)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Error> {
        let res = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pg)
            .await?;
        Ok(res.rows_affected() >= 1)
    }
}

/// In-process store with the same semantics as [`PgStudents`], kept in insertion order.
#[cfg(test)]
pub mod memory {
    use std::sync::{Mutex, MutexGuard};

    use uuid::Uuid;

    use super::StudentRepository;
    use crate::err::Error;
    use crate::models::{FieldChanges, NewStudent, Student};

    #[derive(Debug, Default)]
    pub struct MemoryStudents {
        rows: Mutex<Vec<Student>>,
    }

    impl MemoryStudents {
        pub fn new() -> Self {
            Self::default()
        }

        fn rows(&self) -> MutexGuard<'_, Vec<Student>> {
            self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl StudentRepository for MemoryStudents {
        async fn insert(&self, student: NewStudent) -> Result<Uuid, Error> {
            let id = Uuid::new_v4();
            self.rows().push(Student {
                id,
                first_name: student.first_name,
                last_name: student.last_name,
                image_path: student.image_path,
                marked_today: false,
                registration_date: student.registration_date,
                last_seen_date: None,
            });
            Ok(id)
        }

        async fn find(&self, id: Uuid) -> Result<Option<Student>, Error> {
            Ok(self.rows().iter().find(|s| s.id == id).cloned())
        }

        async fn find_by_name(&self, first_name: &str, last_name: &str) -> Result<Option<Student>, Error> {
            let (first_name, last_name) = (first_name.trim(), last_name.trim());
            Ok(self
                .rows()
                .iter()
                .find(|s| s.first_name == first_name && s.last_name == last_name)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<Student>, Error> {
            Ok(self.rows().clone())
        }

        async fn update_fields(&self, id: Uuid, changes: &FieldChanges) -> Result<bool, Error> {
            let mut rows = self.rows();
            match rows.iter_mut().find(|s| s.id == id) {
                Some(student) => {
                    apply(changes, student);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn reset_all_flags(&self) -> Result<u64, Error> {
            let mut rows = self.rows();
            rows.iter_mut().for_each(|s| s.marked_today = false);
            Ok(rows.len() as u64)
        }

        async fn delete(&self, id: Uuid) -> Result<bool, Error> {
            let mut rows = self.rows();
            let before = rows.len();
            rows.retain(|s| s.id != id);
            Ok(rows.len() < before)
        }
    }

    fn apply(changes: &FieldChanges, student: &mut Student) {
        if let Some(first_name) = &changes.first_name {
            student.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            student.last_name = last_name.clone();
        }
        if let Some(marked_today) = changes.marked_today {
            student.marked_today = marked_today;
        }
        if let Some(last_seen_date) = changes.last_seen_date {
            student.last_seen_date = Some(last_seen_date);
        }
    }
}
