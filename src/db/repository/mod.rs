pub mod appointment;
pub mod message;
pub mod shared_item;
pub mod task;
pub mod user;
pub mod user_settings;

pub use appointment::AppointmentRepository;
pub use message::MessageRepository;
pub use shared_item::SharedItemRepository;
pub use task::TaskRepository;
pub use user::UserRepository;
pub use user_settings::UserSettingsRepository;
