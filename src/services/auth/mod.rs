pub mod exemption;
pub mod factory;
pub mod gatekeeper;
pub mod verifier;

pub use factory::build_gatekeeper;
pub use gatekeeper::Gatekeeper;
pub use verifier::JwtVerifier;
