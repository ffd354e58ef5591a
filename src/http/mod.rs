//! Browser-facing HTTP/1.1.
//!
//! Only as much of the protocol as the dashboard needs: requests are parsed
//! off a keep-alive socket, handed to the proxy handler, and the answer is
//! written back with framing headers owned by [`writer`].
//!
//! Each connection cycles through four states in [`connection`]:
//!
//! ```text
//!   Reading ──request──▶ Processing ──response──▶ Writing
//!      ▲  │                                         │
//!      │  └─ 400/413 on bad input ─────────────────▶│
//!      └──────────── keep-alive ◀───────────────────┤
//!                                                   └─ close ─▶ Closed
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
