//! Call dispatch: routing, envelopes, failure policy and the connection
//! handler that exposes them over the socket.
//!
//! Each call moves through resolve, bind, invoke and envelope on its own;
//! a failure at any step becomes an exception envelope for that call only.

mod envelope;
mod errors;
mod handler;
mod policy;
mod router;
mod shape;

pub use envelope::{CallRequest, PollMessage, ResponseEnvelope};
pub use errors::CallError;
pub use handler::{CourierConnectionHandler, ResponseWriter};
pub use policy::ErrorPolicy;
pub use router::{Router, RouterSettings};
