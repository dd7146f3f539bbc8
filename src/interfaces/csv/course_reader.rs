use crate::application::registrar::Registrar;
use crate::domain::course::NewCourse;
use crate::error::{RegistryError, Result};
use std::io::Read;
use tracing::warn;

/// Reads catalog entries from a CSV source.
///
/// Expects the header `title, description, level, price, duration_months,
/// credits`; `description`, `level` and `credits` may be left empty. Fields
/// are trimmed and every row is validated before it is yielded.
pub struct CourseReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CourseReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes and validates courses, one result per row.
    pub fn courses(self) -> impl Iterator<Item = Result<NewCourse>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(RegistryError::from)
                .and_then(NewCourse::validate)
        })
    }
}

/// Adds every valid row of `source` to the catalog and returns how many were
/// imported. Invalid rows are logged and skipped; the valid ones are stored
/// in a single batch, so a storage failure leaves the catalog untouched.
pub async fn import_courses<R: Read>(registrar: &Registrar, source: R) -> Result<usize> {
    let mut valid = Vec::new();
    for (row, course) in CourseReader::new(source).courses().enumerate() {
        match course {
            Ok(course) => valid.push(course),
            Err(e) => warn!(row = row + 1, error = %e, "skipping course row"),
        }
    }
    let added = registrar.add_courses(valid).await?;
    Ok(added.len())
}
