use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::identity::{Caller, UserId};

/// Access level an operation declares. The dispatcher checks it once, before the
/// operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone, including anonymous callers.
    Public,
    /// Any verified user.
    Authenticated,
    /// A verified user; the store additionally scopes the write to rows that user owns.
    Owner,
}

/// Outcome of a successful access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Anyone(Caller),
    User(UserId),
}

impl Grant {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Grant::Anyone(caller) => caller.user_id(),
            Grant::User(user_id) => Some(*user_id),
        }
    }

    pub fn require_user(&self) -> Result<UserId> {
        self.user_id().ok_or_else(|| {
            LibError::unauthorized(
                "Authentication required",
                anyhow!("operation needs a user but the grant is anonymous"),
            )
        })
    }
}

impl Access {
    pub const fn requires_user(self) -> bool {
        matches!(self, Access::Authenticated | Access::Owner)
    }

    pub fn authorize(self, caller: Caller) -> Result<Grant> {
        if !self.requires_user() {
            return Ok(Grant::Anyone(caller));
        }

        caller.user_id().map(Grant::User).ok_or_else(|| {
            LibError::unauthorized(
                "Authentication required",
                anyhow!("anonymous caller attempted {:?} operation", self),
            )
        })
    }
}
