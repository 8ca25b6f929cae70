mod auth;
mod listens;
mod session;

pub use auth::TokenManager;
pub use listens::ListenCache;
pub use session::FileSessionStore;
pub use session::MemorySessionStore;
pub use session::SessionStore;
