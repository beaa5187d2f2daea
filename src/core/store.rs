// Contract for the remote attribute store the accessors and schema units talk to.
use crate::core::attr::AttributeMap;
use crate::core::error::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Select {
    Count,
    AllAttributes,
}

/// Result of a scan. `items` is empty for [`Select::Count`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOutput {
    pub count: u64,
    pub items: Vec<AttributeMap>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyType {
    String,
    Number,
}

impl KeyType {
    pub fn as_tag(self) -> &'static str {
        match self {
            KeyType::String => "S",
            KeyType::Number => "N",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "S" => Some(KeyType::String),
            "N" => Some(KeyType::Number),
            _ => None,
        }
    }
}

/// Minimal table definition: a name and a single hash key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub key: String,
    pub key_type: KeyType,
}

impl TableDef {
    pub fn new(name: impl Into<String>, key: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            key_type,
        }
    }
}

pub trait Store: Send + Sync {
    fn scan(&self, table: &str, select: Select) -> Result<ScanOutput, Error>;

    fn put_item(&self, table: &str, item: AttributeMap) -> Result<(), Error>;

    fn create_table(&self, def: &TableDef) -> Result<(), Error>;

    fn delete_table(&self, table: &str) -> Result<(), Error>;
}
