//! Auth-domain identifiers, password handling, and token models.

pub mod credential;
pub mod id;
pub mod identity_policy;
pub mod password;
pub mod token;

pub use credential::*;
pub use id::*;
pub use identity_policy::*;
pub use password::*;
pub use token::{claims::*, record::*, refresh::*, secret::*};
