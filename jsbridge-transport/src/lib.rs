pub mod channel;
pub mod codec;
pub mod framed;
pub mod pump;
pub mod transport;

pub use channel::{ChannelEndpoint, ChannelReceiver, ChannelSender, ChannelTransport};
pub use codec::{CodecError, FramedConfig, ProcessMessageCodec};
pub use framed::{FramedLink, FramedReceiver, FramedSender};
pub use pump::MessagePump;
pub use transport::{MessageSource, TransportError};
