//! Emporium Replica: keeps local copies of foreign entities in sync.
//!
//! A [`ReplicaProjector`] applies each envelope kind to one collection:
//!
//! | Kind     | Effect                                   |
//! |----------|------------------------------------------|
//! | `CREATE` | insert if absent                         |
//! | `UPDATE` | merge into existing, no-op if absent     |
//! | `DELETE` | remove by identifier                     |
//! | `UPSERT` | merge into existing or insert            |
//! | `INSERT` | insert each snapshot that is not present |
//!
//! Every kind is idempotent, so redelivery after a crash between apply and
//! commit converges to the same state. `CREATE`, `INSERT` and `UPSERT`
//! message ids are also recorded per consumer so a replay is skipped.

pub mod projector;

pub use projector::{ProjectionOutcome, ReplicaProjector, start_projection};
