pub mod config;
pub mod error;
pub mod db;
pub mod family;
pub mod store;

pub use config::Config;
pub use error::{KinshipError, Result};
pub use family::{
    BiologicalRelation, Direction, FamilySummary, FamilyTree, GenerationMode, NewPerson,
    PersonHandle, PersonRecord, RelationshipCache, RelationshipRecord,
};
pub use store::SqliteFamilyStore;
