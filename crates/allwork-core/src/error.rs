use thiserror::Error;

/// Client-side checks that run before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("type a task title first")]
    EmptyTaskTitle,

    #[error("give the team a name first")]
    EmptyTeamName,

    #[error("enter an email address")]
    EmptyEmail,

    #[error("team \"{team}\" still has {count} task(s); delete or move them first")]
    TeamHasTasks { team: String, count: i64 },

    #[error("user not found: {0} must sign up first")]
    UserNotFound(String),

    #[error("task is still being saved")]
    TaskPending,
}
