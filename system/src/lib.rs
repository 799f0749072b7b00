pub extern crate serde;
pub extern crate serde_json;

mod error;
mod message;
mod registry;
mod session;
mod session_id;
mod transport;
mod types;

pub use error::{DeliveryError, RegistryError};
pub use message::{parse_request, ClientRequest, ResponseKind, ServerResponse};
pub use registry::{Departure, SessionRegistry};
pub use session::Session;
pub use session_id::{is_well_formed, SessionIdGenerator, MAX_ATTEMPTS, SESSION_ID_LEN};
pub use transport::Deliver;
pub use types::{ConnectionId, Payload, SessionId};
