//! Wire protocol for Paddock.
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`Recipient`]): what travels on the wire.
//! - **Catalog** ([`MapOption`], [`VehicleOption`]): static session data.
//! - **Views** ([`LobbySnapshot`], [`LobbyView`]): replicated lobby state
//!   and the client-side reducer that keeps it current.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, types out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Lobby (commands)
//! ```

mod catalog;
mod codec;
mod error;
mod types;
mod view;

pub use catalog::{Difficulty, MapOption, VehicleOption};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use paddock_transport::ConnectionId;
pub use types::{
    ClientMessage, CountdownState, Direction, Envelope, PROTOCOL_VERSION, Payload,
    Recipient, RejectReason, ServerMessage,
};
pub use view::{CountdownStatus, LobbySnapshot, LobbyView, ParticipantView, TallyView};
