//! Data models shared by the voting engine and the reference vote authority.
//!
//! Wire shapes match the frontend TypeScript interfaces (camelCase fields).

mod issue;
mod session;
mod vote;

pub use issue::*;
pub use session::*;
pub use vote::*;
