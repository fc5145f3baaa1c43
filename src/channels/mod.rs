//! Upstream message sources: Gmail and GroupMe.

pub mod cursor;
pub mod gmail;
pub mod gmail_types;
pub mod groupme;
pub mod groupme_types;

pub use cursor::{CursorStore, InMemoryCursorStore};
pub use gmail::{GmailClient, MailQuery};
pub use gmail_types::MailRecord;
pub use groupme::GroupMeClient;
pub use groupme_types::{ChatMessage, GroupInfo, GroupMessages, GroupSummary};
