//! # Quill Auth
//!
//! Authentication sessions for the Quill bot toolkit.
//!
//! The [`SessionManager`] owns credential sessions for one bot process:
//!
//! - the primary **service** identity, authenticated with a key-backed
//!   signed token, and
//! - **on-behalf-of** identities, obtained through a two-step handshake
//!   (application token, then exchange for a per-user token).
//!
//! Sessions expose `token()` / `refresh()`; token replacement is atomic,
//! so a session can be shared read-only across the event loop, the
//! resource services and the retry executor's recovery actions.

pub mod authenticator;
pub mod manager;
pub mod session;
pub mod signer;

pub use authenticator::{BotAuthenticator, OboAuthenticator, OboTarget};
pub use manager::{AuthSettings, OboSession, ServiceSession, SessionManager};
pub use session::{AuthSession, BoxedSession, TokenPair, TokenStore};
pub use signer::{BoxedSigner, RsaKeySigner, TokenSigner};
