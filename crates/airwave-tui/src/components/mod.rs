pub mod admin_panel;
pub mod auth_form;
pub mod comments;
pub mod confirm_dialog;
pub mod header;
pub mod help_overlay;
pub mod player_bar;
pub mod profile_form;
pub mod station_detail;
pub mod station_list;
