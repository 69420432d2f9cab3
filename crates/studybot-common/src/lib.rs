pub mod error;
pub mod turn;
pub mod types;

pub use error::{Error, Result};
pub use turn::{
    Session, ToolCall, ToolCallResult, ToolFailureKind, ToolResult, Turn, TurnRole, User,
};
pub use types::{SessionId, UserId};
