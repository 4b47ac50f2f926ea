pub mod he;
pub mod pbar;
