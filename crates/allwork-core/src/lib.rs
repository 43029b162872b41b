pub mod board;
pub mod change;
pub mod error;
pub mod member;
pub mod profile;
pub mod session;
pub mod task;
pub mod team;

pub use board::{BoardSnapshot, BoardState};
pub use change::{ChangeEvent, ChangeKind};
pub use error::PreconditionError;
pub use member::{Role, TeamMember};
pub use profile::Profile;
pub use session::{AuthUser, Session};
pub use task::{Priority, Status, Task};
pub use team::Team;
