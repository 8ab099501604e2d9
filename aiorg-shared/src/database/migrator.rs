//! Embedded migration set, following the host family's `MIGRATOR` constant
//! convention (`tasker_shared::database::migrator::MIGRATOR` in the
//! teacher's `#[sqlx::test(migrator = ...)]` attributes).

/// Applied in order against a fresh database by `sqlx::test` and by
/// `Store::connect` at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
