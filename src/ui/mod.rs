pub mod chat_view;
pub mod input_area;
pub mod markup;
pub mod message_widget;
pub mod sidebar;
