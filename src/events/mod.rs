//! Serialized delivery of listener callbacks
//!
//! Every discovery and service callback runs as a job on a single task, so
//! all listeners observe one total order of events no matter which provider
//! or pairing exchange produced them.

mod dispatcher;
mod listener;


pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::isolate;
pub use listener::{
    ChannelListener, DiscoveryEvent, DiscoveryListener, DiscoveryStream, ListenerId,
};
