//! Message opcodes.

use std::fmt;

/// The closed set of opcodes this implementation understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
}

impl TryFrom<i32> for OpCode {
    /// The unrecognized opcode.
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            other => Err(other),
        }
    }
}

impl OpCode {
    /// Returns whether a request with this opcode expects a reply.
    ///
    /// Writes and cursor kills are fire-and-forget; clients learn about their
    /// failures through a later `getLastError`.
    pub fn can_reply(self) -> bool {
        matches!(self, OpCode::Query | OpCode::GetMore)
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Reply => "reply",
            OpCode::Update => "update",
            OpCode::Insert => "insert",
            OpCode::Query => "query",
            OpCode::GetMore => "get_more",
            OpCode::Delete => "delete",
            OpCode::KillCursors => "kill_cursors",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
