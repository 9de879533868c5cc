//! Integration tests for the mindfold persistence core

mod cascade_delete;
mod lazy_loading;
mod layout_visibility;
mod rename_moves;
mod sessions;
mod support;
