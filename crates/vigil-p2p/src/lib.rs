pub mod codec;
pub mod message;
pub mod peer;
pub mod peer_manager;

pub use codec::{decode_message, encode_message, CodecError, MAX_MESSAGE_SIZE, WIRE_VERSION};
pub use message::NetMessage;
pub use peer::{Peer, PeerId};
pub use peer_manager::{PeerManager, PeerMap};
