pub mod football;
pub mod widget;
