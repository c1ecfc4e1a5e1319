//! letsmeet core
//!
//! Trust-scored meetups: hosts publish small-group meetings, members apply,
//! hosts review applications against a fixed capacity, and every outcome
//! feeds a per-user trust score that gates who may host and who may apply.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Core error kinds
//! ├── service.rs     - MeetupCore facade
//! ├── profiles.rs    - Lazy profile creation and updates
//! ├── models/        - Users, meetings, applications, attendance, ledger
//! ├── meetings/      - Meeting lifecycle and application workflow
//! ├── reputation/    - Trust score system
//! │   ├── score.rs   - Pure score engine
//! │   ├── gate.rs    - Host / apply thresholds
//! │   └── keeper.rs  - Ledger appends
//! ├── api/           - HTTP routes and security middleware
//! └── database/      - Store trait, PostgreSQL and in-memory stores
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod meetings;
pub mod models;
pub mod profiles;
pub mod reputation;
pub mod service;

// Re-export main types for convenience
pub use config::MeetupConfig;
pub use database::{DatabasePool, MeetingTx, MeetupStore, MemoryStore, StoreError, UserTx};
pub use error::{
    ConflictReason, CoreError, CoreResult, ErrorKind, ForbiddenReason, Resource, ValidationError,
};
pub use meetings::{ApplicationWorkflow, MeetingLifecycle};
pub use models::{
    Application, ApplicationStatus, Attendance, AttendanceOutcome, Meeting, MeetingParams,
    MeetingStatus, MeetingView, ProfileUpdate, ScoreEntry, ScoreReason, User,
};
pub use profiles::ProfileService;
pub use reputation::{ScoreKeeper, TrustGate, TrustLevel, TrustThresholds, trust_level};
pub use service::MeetupCore;
