/*
 * Responsibility
 * - Public entry points of the middleware layers
 * - auth::gatekeeper (edge authentication), http (transport concerns)
 */
pub mod auth;
pub mod http;
