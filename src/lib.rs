// capchan: bundle bytes, file descriptors and channel endpoints into one
// message buffer and deliver it over a local socket transport.

pub mod message {
    pub mod buffer;
    pub mod layout;
    pub mod view;
    pub use buffer::MessageBuf; // re-export for stable path
    pub use view::DescriptorView;
}

pub mod channel {
    pub mod endpoint;
    pub mod flags;
    pub mod record;
    pub mod uds;
    pub use endpoint::Channel; // re-export for stable path
    pub use flags::ChannelFlags;
    pub use record::EmbeddedChannel;
}

pub mod debug {
    pub mod hexdump;
}

pub mod ffi;

pub use channel::{Channel, ChannelFlags, EmbeddedChannel};
pub use message::{DescriptorView, MessageBuf};
