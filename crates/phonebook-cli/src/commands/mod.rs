pub mod add;
pub mod avatar;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod list;
pub mod pending;
pub mod resend;
pub mod search;
pub mod show;
pub mod sync;
