//! Terminal chat client
//!
//! Connects to a relay, prints the message stream and sends stdin lines as
//! chat messages.

mod terminal;

pub use terminal::*;
