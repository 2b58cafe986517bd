pub mod edit;
pub mod history;
pub mod search;
pub mod store;
pub mod view;
