//! Clearance persistence layer
//!
//! Implements the repository interfaces of `clearance-domain`.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ memory/          InMemoryStore (all traits)   │
//! │ snapshot.rs      JSON load / atomic save      │
//! └───────────────────────────────────────────────┘
//!                        ▲ implements
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │ clearance-domain  PackageRepository, ...      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use clearance_domain::Repositories;
//! use clearance_persistence::{load_store, save_store};
//!
//! let store = Arc::new(load_store("data/clearance.json")?);
//! let repos = Repositories::from_store(store.clone());
//! // ...
//! save_store(&store, "data/clearance.json")?;
//! ```

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::{InMemoryStore, StoreState};
pub use snapshot::{load_store, save_store};
