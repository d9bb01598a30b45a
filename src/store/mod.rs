mod error;
mod records;
mod schema;
mod writer;

pub use error::{StoreError, WriteError};
pub use records::{FixRecord, StoredFix, StoredSatellite};
pub use schema::{Store, Transaction, DB_FILE_NAME, SCHEMA_VERSION};
pub use writer::TransactionalWriter;
