mod session;

pub use session::{Role, Session, Turn};
