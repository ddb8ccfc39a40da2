use serde::Serialize;

use crate::output::TableFormat;

/// One `name = value` pair, for any key/value listing.
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TableFormat for Property {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "VALUE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.value.clone()]
    }
}
