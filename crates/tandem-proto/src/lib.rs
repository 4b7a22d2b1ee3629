//! Signaling vocabulary for Tandem room sessions.
//!
//! The room server speaks JSON-RPC over a persistent channel. Clients issue
//! requests (`joinRoom`, `publishVideo`, `receiveVideoFrom`, `onIceCandidate`,
//! `leaveRoom`) and receive push notifications about room membership and ICE
//! candidates. This crate only describes the messages: how they are carried is
//! the signaling channel's business.
//!
//! Every inbound message is parsed into a typed value before the session sees
//! it. Anything that does not have the expected shape becomes a
//! [`ProtocolError`], which the session treats as a failed request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod candidate;
pub mod errors;
pub mod member;
pub mod notification;
pub mod request;
pub mod response;

pub use candidate::{CandidateInit, IceCandidate};
pub use errors::{ProtocolError, Result};
pub use member::{Member, StreamInfo, sender_name};
pub use notification::Notification;
pub use request::{Request, RequestId};
pub use response::{RpcError, parse_join_room, parse_sdp_answer};
