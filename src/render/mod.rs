pub mod compositor;
pub mod effects;
pub mod page;
