//! Screens, flows and the identity backend seam.
//!
//! Control flow on start: [`splash::Splash`] → [`flow::LoginScreen::enter`]
//! (session gate) → form actions on [`flow::LoginScreen`] → [`profile::ProfileSync`]
//! → `NavigateTo(Content)`.

pub mod flow;
pub mod gate;
pub mod navigator;
pub mod profile;
pub mod service;
pub mod session;
pub mod splash;
pub mod ui;
pub mod validate;

pub use self::flow::{LoginScreen, Outcome};
pub use self::navigator::{Navigator, Screen, Transition};
pub use self::service::{IdentityService, ServiceError};
pub use self::session::Session;
