//! Administrative query sessions.
//!
//! A client connection that manages a server gets one [`ProtocolSession`]
//! against that server's query interface. The [`SessionRegistry`] enforces
//! one session per connection and ordered replacement.

mod command;
mod presence;
mod protocol;
mod registry;
mod state;

pub use command::AdminCommand;
pub use presence::OnlineClientSet;
pub use protocol::{ProtocolSession, QuerySettings};
pub use registry::SessionRegistry;
pub use state::SessionState;
