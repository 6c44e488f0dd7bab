//! Access claims, refresh token wire forms, and ledger records.

pub mod claims;
pub mod record;
pub mod refresh;
pub mod secret;
