pub mod book;
pub mod circulation;
pub mod notification;
pub mod user;
