use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

///
/// IndexModel
/// Runtime descriptor for the secondary index of one record kind.
///
/// Entries are composed as `name`, then each field value in declared order,
/// then the primary key. Field order is significant for prefix scans.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexModel {
    pub name: String,
    pub fields: Vec<String>,
}

impl IndexModel {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Display for IndexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.fields.join(", "))
    }
}
