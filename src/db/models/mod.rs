//! Database models split into separate files.

pub mod appointment;
pub mod message;
pub mod shared_item;
pub mod task;
pub mod user;
pub mod user_settings;

pub use self::appointment::*;
pub use self::message::*;
pub use self::shared_item::*;
pub use self::task::*;
pub use self::user::*;
pub use self::user_settings::*;
