pub mod chromosome;
pub mod error;
pub mod offset_table;
pub mod operation_pool;
pub mod operations;
pub mod synchronizer;
pub mod track;
pub mod translator;
pub mod variant;
pub mod variant_reader;
