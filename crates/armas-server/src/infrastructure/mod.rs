//! Infrastructure layer for the access-control server.
//!
//! Contains the OS-facing adapters: the packet filter, network discovery,
//! file-system storage, and the HTTP surface.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `armas_core`, but production code in `application` MUST NOT import it.
//! (Application unit tests do borrow the in-memory packet filter.)

pub mod discovery;
pub mod http;
pub mod packet_filter;
pub mod storage;
