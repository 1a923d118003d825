pub mod field;
pub mod index;
pub mod invariant;
pub mod preset;
pub mod record;

pub use field::{FieldKind, FieldModel};
pub use index::IndexModel;
pub use invariant::{SumInvariant, WriteMode};
pub use preset::Preset;
pub use record::{ModelError, RecordModel};
