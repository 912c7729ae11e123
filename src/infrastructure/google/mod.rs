//! Google OAuth (installed-app flow) and the Drive v3 REST client

pub mod drive;
pub mod error;
pub mod oauth;

pub use drive::{DriveClient, DriveFile};
pub use error::GoogleError;
pub use oauth::{ClientSecrets, DRIVE_SCOPE, GoogleAuth, StoredToken};
