//! Stateless cart identity: signed guest cookies, bearer tokens, and the
//! resolver that picks a cart key for each request.

pub mod auth;
pub mod cookie;
pub mod resolver;
pub mod signature;

pub use auth::TokenAuthenticator;
pub use cookie::{CookieSettings, SessionCookie};
pub use resolver::{
    CART_KEY_HEADER, CookieIntent, IdentityResolver, IdentitySource, RequestContext, Resolution,
};
pub use signature::Signer;
