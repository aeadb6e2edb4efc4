pub mod import;
pub mod schedule;
pub mod station;

pub(crate) fn convert_error(why: sqlx::Error) -> crate::Error {
    match why {
        sqlx::Error::RowNotFound => crate::Error::NotFound,
        other => crate::Error::Sql(other),
    }
}
