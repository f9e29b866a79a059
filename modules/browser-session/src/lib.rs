pub mod error;
pub mod page;
pub mod profiles;
pub mod session;

pub use error::{BrowserSessionError, Result};
pub use page::{CdpPage, PageSnapshot};
pub use profiles::{
    copy_profile, default_user_data_dir, find_profile_by_email, list_profiles, ChromeProfile,
};
pub use session::{find_available_port, verify_debugger, LaunchOptions, ProfileSession};
