#[path = "../common/mod.rs"]
mod common;

mod comments;
mod list_content;
