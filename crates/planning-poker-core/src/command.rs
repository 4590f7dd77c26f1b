//! Command abstractions.

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// The team the command targets.
    fn team_name(&self) -> &str;
}
