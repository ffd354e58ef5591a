//! Browser session authentication

pub mod session;

pub use session::{
    sign_session, Identity, SessionClaims, SessionRejection, SessionValidator,
    SignedSessionValidator,
};
