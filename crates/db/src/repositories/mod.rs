mod widget_repo;

pub use widget_repo::WidgetRepo;
