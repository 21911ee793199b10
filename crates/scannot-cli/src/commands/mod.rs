pub mod classify;
pub mod evaluate;
pub mod models;
pub mod train;
