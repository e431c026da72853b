//! Pure game rules. Nothing in here knows about sockets, clocks or storage.

pub mod consensus;
pub mod history;
pub mod ledger;
pub mod night;
pub mod roles;
pub mod roster;
pub mod session;
pub mod setup;
pub mod win;

pub use session::{Session, SessionStatus, SessionView, TimerDirective, Transition};
